//! Runtime configuration, read once from the environment when the process-wide
//! registry comes up.
//!
//! | variable         | values                           | default |
//! |------------------|----------------------------------|---------|
//! | `MEMLEAK_REPORT` | `text`, `json`, `off`            | `text`  |

use std::{env, str::FromStr};

pub const REPORT_ENV: &str = "MEMLEAK_REPORT";

/// How the exit report is written
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    /// A summary line, then one `addr:.. file:.. line:..` line per leak
    #[default]
    Text,
    /// A single [`LeakReport`](crate::LeakReport) JSON document
    Json,
    /// Track, but never print anything
    Off,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown report format {value:?}, expected one of \"text\", \"json\", \"off\"")]
pub struct ParseReportFormatError {
    value: String,
}

impl FromStr for ReportFormat {
    type Err = ParseReportFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            v if v.eq_ignore_ascii_case("text") => Ok(Self::Text),
            v if v.eq_ignore_ascii_case("json") => Ok(Self::Json),
            v if v.eq_ignore_ascii_case("off") || v == "0" => Ok(Self::Off),
            v => Err(ParseReportFormatError {
                value: v.to_owned(),
            }),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Config {
    pub format: ReportFormat,
}

impl Config {
    pub const fn new(format: ReportFormat) -> Self {
        Self { format }
    }

    /// Read the configuration from `MEMLEAK_*` environment variables, falling
    /// back to the defaults for anything missing or unparseable
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<L>(lookup: L) -> Self
    where
        L: Fn(&str) -> Option<String>,
    {
        let format = match lookup(REPORT_ENV).map(|v| v.parse::<ReportFormat>()) {
            None => ReportFormat::default(),
            Some(Ok(format)) => format,
            Some(Err(e)) => {
                log::warn!("{REPORT_ENV}: {e}, using text");
                ReportFormat::default()
            }
        };
        Self { format }
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::{Config, ReportFormat, REPORT_ENV};

    fn lookup(value: &'static str) -> impl Fn(&str) -> Option<String> {
        move |key: &str| (key == REPORT_ENV).then(|| value.to_owned())
    }

    #[test]
    fn parses_report_formats() {
        assert_eq!("text".parse(), Ok(ReportFormat::Text));
        assert_eq!(" JSON ".parse(), Ok(ReportFormat::Json));
        assert_eq!("off".parse(), Ok(ReportFormat::Off));
        assert_eq!("0".parse(), Ok(ReportFormat::Off));
        let err = "yaml".parse::<ReportFormat>().unwrap_err();
        assert!(err.to_string().contains("\"yaml\""));
    }

    #[test]
    fn bad_format_is_a_plain_error() {
        let err = "xml".parse::<ReportFormat>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown report format \"xml\", expected one of \"text\", \"json\", \"off\""
        );
        let err: Box<dyn Error> = Box::new(err);
        assert!(err.source().is_none());
    }

    #[test]
    fn missing_or_bad_values_fall_back_to_text() {
        assert_eq!(Config::from_lookup(|_| None), Config::default());
        assert_eq!(Config::from_lookup(lookup("nope")).format, ReportFormat::Text);
        assert_eq!(Config::from_lookup(lookup("json")).format, ReportFormat::Json);
    }
}
