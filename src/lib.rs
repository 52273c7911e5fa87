//! simpleperf -- point-to-point TCP throughput measurement.
//!
//! A server counts the bytes each connected client streams to it; a client
//! opens one or more parallel sessions, streams filler data for a fixed
//! duration or byte count, and reports interval and aggregate rates.

pub mod client;
pub mod config;
pub mod protocol;
pub mod report;
pub mod server;
pub mod units;

pub use client::{run_client, ClientReport, ResultCollection};
pub use config::{ClientConfig, ConfigError, ServerConfig};
pub use protocol::{SessionError, SessionResult};
pub use report::Console;
pub use server::PerfServer;
pub use units::{calculate_rate, format_size, parse_byte_count, Unit, UnitError};
