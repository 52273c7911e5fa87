//! Console output: the shared text sink and the result table layout.
//!
//! Every line printed by the tool goes through a [`Console`]. The console's
//! mutex is also the print lock: holding a [`Console::lock`] guard keeps a
//! multi-line block (header plus final row) from interleaving with output
//! from other sessions.

pub mod interval;

use std::fmt;
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::warn;

use crate::protocol::SessionResult;
use crate::units::{calculate_rate, format_size, Unit};

pub use interval::IntervalReporter;

/// Width of each centered table column.
const COLUMN_WIDTH: usize = 15;

const RULE: &str = "------------------------------------------------------------";

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

/// Cloneable handle to a line-oriented output sink.
#[derive(Clone)]
pub struct Console {
    sink: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Console {
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            sink: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// A console that captures everything into memory.
    pub fn buffer() -> (Self, CapturedOutput) {
        let captured = CapturedOutput::default();
        (Self::new(captured.clone()), captured)
    }

    /// Take the print lock for a block of lines.
    pub fn lock(&self) -> ConsoleGuard<'_> {
        let guard = self.sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        ConsoleGuard { guard }
    }

    /// Print a single line under the lock.
    pub fn line(&self, text: impl fmt::Display) {
        self.lock().line(text);
    }
}

/// Exclusive access to the console for the guard's lifetime.
pub struct ConsoleGuard<'a> {
    guard: MutexGuard<'a, Box<dyn Write + Send>>,
}

impl ConsoleGuard<'_> {
    pub fn line(&mut self, text: impl fmt::Display) {
        if let Err(e) = writeln!(self.guard, "{}", text).and_then(|_| self.guard.flush()) {
            warn!(error = %e, "failed to write to console");
        }
    }

    pub fn blank(&mut self) {
        self.line("");
    }
}

/// In-memory sink used by [`Console::buffer`].
#[derive(Clone, Default)]
pub struct CapturedOutput(Arc<Mutex<Vec<u8>>>);

impl CapturedOutput {
    pub fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for CapturedOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Table layout
// ---------------------------------------------------------------------------

/// Which side of the transfer a table describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Server,
}

/// Render four values as fixed-width centered columns.
pub fn format_row(
    id: impl fmt::Display,
    interval: impl fmt::Display,
    size: impl fmt::Display,
    rate: impl fmt::Display,
) -> String {
    format!(
        "{:^w$} {:^w$} {:^w$} {:^w$}",
        id.to_string(),
        interval.to_string(),
        size.to_string(),
        rate.to_string(),
        w = COLUMN_WIDTH
    )
}

pub fn header(side: Side) -> String {
    match side {
        Side::Client => format_row("ID", "Interval", "Transfer", "Bandwidth"),
        Side::Server => format_row("ID", "Interval", "Received", "Rate"),
    }
}

/// Print the table header followed by its spacer line.
pub fn print_header(out: &mut ConsoleGuard<'_>, side: Side) {
    out.line(header(side));
    out.blank();
}

/// One row covering `[start, stop)` seconds for `bytes` transferred.
pub fn window_row(
    id: &str,
    start: f64,
    stop: f64,
    bytes: u64,
    unit: Unit,
    rate_mbps: f64,
) -> String {
    format_row(
        id,
        format!("{:.2} - {:.2}", start, stop),
        format!("{:.2} {}", format_size(bytes, unit), unit),
        format!("{:.2} Mbps", rate_mbps),
    )
}

/// The summary row for a finished session.
pub fn result_row(result: &SessionResult) -> String {
    format_row(
        result.id(),
        format!("0.0 - {:.2}", result.elapsed_secs),
        format!("{:.2} {}", result.transferred, result.unit),
        format!("{:.2} Mbps", result.rate_mbps),
    )
}

/// Summary row computed directly from a byte total.
pub fn total_row(id: &str, elapsed_secs: f64, bytes: u64, unit: Unit) -> String {
    format_row(
        id,
        format!("0.0 - {:.2}", elapsed_secs),
        format!("{:.2} {}", format_size(bytes, unit), unit),
        format!("{:.2} Mbps", calculate_rate(bytes, elapsed_secs)),
    )
}

// ---------------------------------------------------------------------------
// Banners
// ---------------------------------------------------------------------------

pub fn print_server_banner(out: &mut ConsoleGuard<'_>, port: u16) {
    out.line(RULE);
    out.line(format!("       A simpleperf server is listening on port {}", port));
    out.line(RULE);
    out.blank();
}

pub fn print_client_banner(out: &mut ConsoleGuard<'_>, address: &str, port: u16) {
    out.line(RULE);
    out.line(format!(
        "A simpleperf client connecting to server {}, port {}",
        address, port
    ));
    out.line(RULE);
    out.blank();
}

pub fn print_rule(out: &mut ConsoleGuard<'_>) {
    out.blank();
    out.line(RULE);
    out.blank();
}
