//! The exit report can only be seen from outside the process, so the test
//! re-runs this very binary as a child that leaks on purpose.

use std::{env, process::Command};

use memleak::{LeakReport, LeakTracker};

#[global_allocator]
static GLOBAL: LeakTracker = LeakTracker;

const CHILD_ENV: &str = "MEMLEAK_EXIT_REPORT_CHILD";

#[test]
fn leak_on_purpose() {
    if env::var_os(CHILD_ENV).is_none() {
        return;
    }
    let leaked = memleak::track!(Box::new(0x5eed_u64));
    std::mem::forget(leaked);
}

fn run_child(report: &str) -> String {
    let output = Command::new(env::current_exe().unwrap())
        .args(["--exact", "leak_on_purpose", "--test-threads", "1"])
        .env(CHILD_ENV, "1")
        .env("MEMLEAK_REPORT", report)
        .output()
        .unwrap();
    assert!(output.status.success(), "{output:?}");
    String::from_utf8(output.stderr).unwrap()
}

#[test]
fn leaks_are_reported_at_exit() {
    if env::var_os(CHILD_ENV).is_some() {
        return;
    }

    let stderr = run_child("text");
    let summary = stderr
        .lines()
        .find_map(|line| line.strip_prefix("memory leak detected, count:"))
        .expect("summary line");
    let count: usize = summary.parse().unwrap();
    assert!(count >= 1);
    let ours = format!("file:{} line:", file!());
    assert_eq!(stderr.lines().filter(|l| l.contains(&ours)).count(), 1);
    assert!(stderr
        .lines()
        .filter(|l| l.starts_with("addr:"))
        .all(|l| l.contains(" file:") && l.contains(" line:")));

    let stderr = run_child("json");
    let report: LeakReport = stderr
        .lines()
        .rev()
        .find_map(|line| serde_json::from_str(line).ok())
        .expect("json report");
    assert_eq!(report.count, report.leaks.len());
    assert!(report.leaks.iter().any(|leak| leak.file == file!()));

    assert!(!run_child("off").contains("memory leak detected"));
}
