use serde::Deserialize;
use std::str::FromStr;
use strum_macros::{Display, EnumString};
use tracing::Level;

/// Log severity for caught exceptions.
///
/// Accepts level names (case-insensitive) or the numeric levels used by
/// Python-style logging configs (10, 20, 30, 40, 50).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, Deserialize)]
#[strum(ascii_case_insensitive, serialize_all = "lowercase")]
#[serde(try_from = "RawSeverity")]
pub enum Severity {
    Trace,
    Debug,
    Info,
    #[strum(to_string = "warn", serialize = "warning")]
    Warn,
    #[default]
    Error,
    #[strum(to_string = "critical", serialize = "fatal")]
    Critical,
}

impl Severity {
    pub fn from_number(level: u64) -> Self {
        match level {
            0..10 => Self::Trace,
            10..20 => Self::Debug,
            20..30 => Self::Info,
            30..40 => Self::Warn,
            40..50 => Self::Error,
            _ => Self::Critical,
        }
    }

    /// `tracing` has no level above error; critical maps onto it.
    pub fn level(self) -> Level {
        match self {
            Self::Trace => Level::TRACE,
            Self::Debug => Level::DEBUG,
            Self::Info => Level::INFO,
            Self::Warn => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }
}

impl From<Severity> for Level {
    fn from(severity: Severity) -> Self {
        severity.level()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSeverity {
    Number(u64),
    Name(String),
}

impl TryFrom<RawSeverity> for Severity {
    type Error = String;

    fn try_from(raw: RawSeverity) -> Result<Self, String> {
        match raw {
            RawSeverity::Number(level) => Ok(Self::from_number(level)),
            RawSeverity::Name(name) => {
                Self::from_str(&name).map_err(|_| format!("unknown log level '{name}'"))
            }
        }
    }
}
