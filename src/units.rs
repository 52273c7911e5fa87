//! Byte-count units and rate arithmetic.
//!
//! All sizes are decimal (1 KB = 1000 B). Rates are megabits per second.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    #[error("invalid unit '{0}'; supported units are 'B', 'KB' and 'MB'")]
    InvalidUnit(String),

    #[error("malformed byte count '{0}'; expected '<integer> <unit>', e.g. \"20000 B\"")]
    MalformedInput(String),
}

/// Display unit for transferred sizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
pub enum Unit {
    #[value(name = "B")]
    #[serde(rename = "B")]
    Bytes,
    #[value(name = "KB")]
    #[serde(rename = "KB")]
    Kilobytes,
    #[value(name = "MB")]
    #[serde(rename = "MB")]
    Megabytes,
}

impl Unit {
    /// Number of bytes in one of this unit.
    pub fn divisor(self) -> u64 {
        match self {
            Unit::Bytes => 1,
            Unit::Kilobytes => 1_000,
            Unit::Megabytes => 1_000_000,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Unit::Bytes => "B",
            Unit::Kilobytes => "KB",
            Unit::Megabytes => "MB",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Unit {
    type Err = UnitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "B" => Ok(Unit::Bytes),
            "KB" => Ok(Unit::Kilobytes),
            "MB" => Ok(Unit::Megabytes),
            other => Err(UnitError::InvalidUnit(other.to_string())),
        }
    }
}

/// Convert a byte count into `unit`.
pub fn format_size(bytes: u64, unit: Unit) -> f64 {
    bytes as f64 / unit.divisor() as f64
}

/// Average rate in Mbps for `bytes` moved over `elapsed_secs`.
///
/// The caller guarantees `elapsed_secs > 0`.
pub fn calculate_rate(bytes: u64, elapsed_secs: f64) -> f64 {
    debug_assert!(elapsed_secs > 0.0, "rate over a zero-length window");
    let megabits = (bytes as f64 * 8.0) / 1_000_000.0;
    megabits / elapsed_secs
}

/// Parse a byte count such as `"20000 B"` or `"3 KB"` into bytes.
///
/// An empty (or all-whitespace) string means "no cap" and yields `None`.
pub fn parse_byte_count(text: &str) -> Result<Option<u64>, UnitError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let tokens: Vec<&str> = trimmed.split_whitespace().collect();
    let [num, unit] = tokens.as_slice() else {
        return Err(UnitError::MalformedInput(text.to_string()));
    };

    let num: u64 = num
        .parse()
        .map_err(|_| UnitError::MalformedInput(text.to_string()))?;
    let unit: Unit = unit.parse()?;

    num.checked_mul(unit.divisor())
        .map(Some)
        .ok_or_else(|| UnitError::MalformedInput(text.to_string()))
}
