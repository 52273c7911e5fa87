//! The transfer session protocol.
//!
//! A session is a single TCP connection. The client streams filler bytes in
//! chunks of [`CHUNK_SIZE`], then sends the [`SENTINEL`] and waits up to
//! [`ACK_TIMEOUT`] for the server's [`ACK`]. There is no framing beyond byte
//! counting: the server credits every byte it receives except the sentinel.

pub mod client;
pub mod server;

use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use crate::units::{calculate_rate, format_size, Unit};

// ---------------------------------------------------------------------------
// Wire constants
// ---------------------------------------------------------------------------

/// Payload chunk size for sends and receives.
pub const CHUNK_SIZE: usize = 1000;

/// Termination marker sent by the client after its payload.
pub const SENTINEL: &[u8] = b"BYE";

/// Server reply to the sentinel.
pub const ACK: &[u8] = b"ACK: BYE";

/// How long the client waits for [`ACK`] after sending the sentinel.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Shortest wall time a client session may measure over.
pub const MIN_SESSION_DURATION: Duration = Duration::from_millis(100);

/// Filler byte used for the client payload.
pub const FILLER: u8 = b'0';

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out connecting to {endpoint} after {timeout:?}")]
    ConnectTimeout { endpoint: String, timeout: Duration },

    #[error("timeout while waiting for acknowledgement from server")]
    AcknowledgmentTimeout,

    #[error("invalid acknowledgement message received from server: {0:?}")]
    UnexpectedAcknowledgment(String),

    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Running byte counters for one session. Never shared between sessions.
#[derive(Debug, Clone)]
pub struct TransferProgress {
    /// Bytes moved so far.
    pub total: u64,
    /// `total` as of the last interval boundary that was reported.
    pub last_reported: u64,
    pub started: Instant,
    /// Start of the interval window currently being accumulated.
    pub window_start: Duration,
    /// Elapsed time at which the current window closes.
    pub next_boundary: Duration,
}

impl TransferProgress {
    pub fn new(interval: Option<Duration>) -> Self {
        Self {
            total: 0,
            last_reported: 0,
            started: Instant::now(),
            window_start: Duration::ZERO,
            next_boundary: interval.unwrap_or(Duration::ZERO),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Final outcome of one successful client session.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionResult {
    /// Server address the session connected to.
    pub address: String,
    pub port: u16,
    pub elapsed_secs: f64,
    /// Raw payload bytes sent.
    pub bytes: u64,
    /// `bytes` expressed in `unit`.
    pub transferred: f64,
    pub unit: Unit,
    /// Average rate over the whole session, in Mbps.
    pub rate_mbps: f64,
}

impl SessionResult {
    pub fn new(
        address: impl Into<String>,
        port: u16,
        elapsed: Duration,
        bytes: u64,
        unit: Unit,
    ) -> Self {
        let elapsed_secs = elapsed.as_secs_f64();
        Self {
            address: address.into(),
            port,
            elapsed_secs,
            bytes,
            transferred: format_size(bytes, unit),
            unit,
            rate_mbps: calculate_rate(bytes, elapsed_secs),
        }
    }

    /// `address:port` label used in result rows.
    pub fn id(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }
}

/// Locate the sentinel in `chunk`, allowing for it to straddle the previous
/// read. `tail` holds the last bytes of the previous chunk.
pub(crate) fn contains_sentinel(tail: &[u8], chunk: &[u8]) -> bool {
    if chunk.windows(SENTINEL.len()).any(|w| w == SENTINEL) {
        return true;
    }
    (1..SENTINEL.len()).any(|split| {
        let (head, rest) = SENTINEL.split_at(split);
        tail.ends_with(head) && chunk.starts_with(rest)
    })
}
