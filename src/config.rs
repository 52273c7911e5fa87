//! Validated, immutable run configuration.
//!
//! The CLI layer hands raw values to [`ClientConfig::new`] / [`ServerConfig::new`]
//! once at startup; every session then receives the same checked value.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::units::{parse_byte_count, Unit, UnitError};

/// Smallest and largest number of parallel client sessions.
pub const MIN_PARALLEL: u8 = 1;
pub const MAX_PARALLEL: u8 = 5;

/// Command-line defaults.
pub const DEFAULT_ADDRESS: &str = "10.0.0.2";
pub const DEFAULT_PORT: u16 = 8088;
pub const DEFAULT_DURATION_SECS: u64 = 25;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("the -t (time) duration must be greater than 0")]
    NonPositiveDuration,

    #[error("parallel sessions must be between 1 and 5, got {0}")]
    ParallelOutOfRange(u8),

    #[error("invalid --num value: {0}")]
    ByteCap(#[from] UnitError),
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Configuration shared read-only by every client session.
#[derive(Debug, Clone, Serialize)]
pub struct ClientConfig {
    /// Server IP address or host name.
    pub address: String,
    pub port: u16,
    /// Display unit for transferred sizes.
    pub unit: Unit,
    /// Interval reporting period; `None` disables interval rows.
    #[serde(serialize_with = "serialize_opt_secs")]
    pub interval: Option<Duration>,
    /// Upper bound on the send loop's wall time.
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
    /// Upper bound on total payload bytes, if any.
    pub byte_cap: Option<u64>,
    /// Number of concurrent sessions.
    pub parallel: u8,
    #[serde(serialize_with = "serialize_secs")]
    pub connect_timeout: Duration,
}

impl ClientConfig {
    /// Validate raw settings. `interval_secs == 0` disables interval reports,
    /// and an empty `num` means no byte cap.
    pub fn new(
        address: impl Into<String>,
        port: u16,
        unit: Unit,
        interval_secs: u64,
        duration_secs: u64,
        num: &str,
        parallel: u8,
    ) -> Result<Self, ConfigError> {
        if duration_secs == 0 {
            return Err(ConfigError::NonPositiveDuration);
        }
        if !(MIN_PARALLEL..=MAX_PARALLEL).contains(&parallel) {
            return Err(ConfigError::ParallelOutOfRange(parallel));
        }
        let byte_cap = parse_byte_count(num)?;

        Ok(Self {
            address: address.into(),
            port,
            unit,
            interval: (interval_secs > 0).then(|| Duration::from_secs(interval_secs)),
            duration: Duration::from_secs(duration_secs),
            byte_cap,
            parallel,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        })
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// `address:port` string used to connect and to label result rows.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Configuration for the acceptor and its per-connection handlers.
#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    /// Local interface address to bind.
    pub bind: String,
    /// Port to listen on; 0 asks the OS for an ephemeral port.
    pub port: u16,
    pub unit: Unit,
}

impl ServerConfig {
    pub fn new(bind: impl Into<String>, port: u16, unit: Unit) -> Self {
        Self {
            bind: bind.into(),
            port,
            unit,
        }
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

fn serialize_opt_secs<S: serde::Serializer>(
    d: &Option<Duration>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_some(&d.as_secs_f64()),
        None => s.serialize_none(),
    }
}
