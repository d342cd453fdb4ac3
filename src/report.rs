//! Owned copies of the ledger, for reports that need more than a line-by-line
//! dump.
//!
//! Building one of these allocates. That's fine outside the allocator, and
//! inside it the re-entrancy flag sends those allocations straight to the
//! system allocator.

use std::{fmt, io};

use serde::{Deserialize, Serialize};

use crate::{
    alloc::{ledger::Ledger, manual::RawAlloc},
    serialize::serde_addr,
};

/// Headline of every leak report
pub const SUMMARY: &str = "memory leak detected, count:";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakRecord {
    #[serde(with = "serde_addr")]
    pub address: usize,
    pub file: String,
    pub line: u32,
}

impl fmt::Display for LeakRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "addr:{:p} file:{} line:{}",
            self.address as *const u8, self.file, self.line
        )
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeakReport {
    pub count: usize,
    pub leaks: Vec<LeakRecord>,
}

impl LeakReport {
    pub fn from_ledger<A>(ledger: &Ledger<A>) -> Self
    where
        A: RawAlloc,
    {
        let leaks: Vec<_> = ledger
            .iter()
            .map(|record| LeakRecord {
                address: record.address() as usize,
                file: record.file().to_owned(),
                line: record.line(),
            })
            .collect();
        Self {
            count: leaks.len(),
            leaks,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn write_json<W>(&self, mut sink: W) -> io::Result<()>
    where
        W: io::Write,
    {
        serde_json::to_writer(&mut sink, self)?;
        writeln!(sink)
    }
}

/// Same text as the exit report
impl fmt::Display for LeakReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{SUMMARY}{}", self.count)?;
        for leak in &self.leaks {
            writeln!(f, "{leak}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::LeakReport;
    use crate::alloc::ledger::Ledger;

    fn ledger() -> Ledger {
        let mut ledger = Ledger::new();
        ledger.insert("a.rs", 10, 0x100 as *const u8);
        ledger.insert("b.rs", 20, 0x200 as *const u8);
        ledger
    }

    #[test]
    fn json_uses_hex_addresses() {
        let report = LeakReport::from_ledger(&ledger());
        let mut buf = Vec::new();
        report.write_json(&mut buf).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(
            value,
            json!({
                "count": 2,
                "leaks": [
                    { "address": "0x200", "file": "b.rs", "line": 20 },
                    { "address": "0x100", "file": "a.rs", "line": 10 },
                ],
            })
        );
        let back: LeakReport = serde_json::from_slice(&buf).unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn integer_addresses_are_accepted() {
        let report: LeakReport = serde_json::from_value(json!({
            "count": 1,
            "leaks": [{ "address": 1, "file": "x.rs", "line": 3 }],
        }))
        .unwrap();
        assert_eq!(report.leaks[0].address, 1);
        assert!(serde_json::from_value::<LeakReport>(json!({
            "count": 1,
            "leaks": [{ "address": "1", "file": "x.rs", "line": 3 }],
        }))
        .is_err());
    }

    #[test]
    fn text_matches_the_ledger_dump() {
        let ledger = ledger();
        let mut dump = Vec::new();
        ledger.dump(&mut dump).unwrap();
        let text = LeakReport::from_ledger(&ledger).to_string();
        assert_eq!(
            text,
            format!(
                "memory leak detected, count:2\n{}",
                String::from_utf8(dump).unwrap()
            )
        );
        assert!(LeakReport::from_ledger(&Ledger::new()).is_empty());
    }
}
