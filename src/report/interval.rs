//! Periodic progress rows while a session is running.

use std::time::Duration;

use crate::protocol::TransferProgress;
use crate::units::{calculate_rate, Unit};

use super::{window_row, Console};

/// A single reported window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalSample {
    pub start: Duration,
    pub stop: Duration,
    pub bytes: u64,
    pub rate_mbps: f64,
}

/// Emits one table row per elapsed interval for a single session.
///
/// The reporter only reads the clock value it is handed; checking costs a
/// comparison when no boundary has passed.
pub struct IntervalReporter {
    period: Option<Duration>,
    unit: Unit,
    id: String,
    console: Console,
}

impl IntervalReporter {
    /// `period == None` (or zero) disables reporting entirely.
    pub fn new(
        period: Option<Duration>,
        unit: Unit,
        id: impl Into<String>,
        console: Console,
    ) -> Self {
        Self {
            period: period.filter(|p| !p.is_zero()),
            unit,
            id: id.into(),
            console,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.period.is_some()
    }

    /// Report and advance the window if `elapsed` has reached the next boundary.
    pub fn check(
        &self,
        progress: &mut TransferProgress,
        elapsed: Duration,
    ) -> Option<IntervalSample> {
        let period = self.period?;
        if elapsed < progress.next_boundary {
            return None;
        }

        let bytes = progress.total - progress.last_reported;
        let sample = IntervalSample {
            start: progress.window_start,
            stop: progress.next_boundary,
            bytes,
            rate_mbps: calculate_rate(bytes, period.as_secs_f64()),
        };

        self.console.line(window_row(
            &self.id,
            sample.start.as_secs_f64(),
            sample.stop.as_secs_f64(),
            bytes,
            self.unit,
            sample.rate_mbps,
        ));

        progress.last_reported = progress.total;
        progress.window_start = progress.next_boundary;
        progress.next_boundary += period;

        Some(sample)
    }
}
