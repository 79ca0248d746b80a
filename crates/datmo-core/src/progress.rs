//! One-way progress reporting.
//!
//! A [`ProgressSink`] receives integer percentages. Stages talk to it through
//! [`Progress`], which keeps the reported values non-decreasing within
//! `[0, 100]` and swallows sink failures after logging them, so a broken sink
//! never aborts a computation.
//!
//! # Example
//!
//! ```rust
//! use datmo_core::{Progress, ProgressSink};
//!
//! let mut seen = Vec::new();
//! let mut sink = |p: u8| seen.push(p);
//! let mut progress = Progress::new(&mut sink);
//! progress.report(40);
//! progress.report(10); // ignored, would go backwards
//! progress.finish();
//! drop(progress);
//! assert_eq!(seen, vec![40, 100]);
//! ```

use thiserror::Error;
use tracing::warn;

/// Error a progress sink may return. Never propagated to the caller.
#[derive(Debug, Error)]
#[error("progress sink failed: {0}")]
pub struct ProgressError(pub String);

/// Receiver of progress percentages in `[0, 100]`.
pub trait ProgressSink {
    /// Called with non-decreasing percentages, ending at 100.
    fn report(&mut self, percent: u8) -> Result<(), ProgressError>;
}

impl<F: FnMut(u8)> ProgressSink for F {
    fn report(&mut self, percent: u8) -> Result<(), ProgressError> {
        self(percent);
        Ok(())
    }
}

/// Sink that discards every report.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&mut self, _percent: u8) -> Result<(), ProgressError> {
        Ok(())
    }
}

/// Monotonic front-end over a [`ProgressSink`].
pub struct Progress<'a> {
    sink: &'a mut dyn ProgressSink,
    last: Option<u8>,
}

impl<'a> Progress<'a> {
    /// Wraps a sink.
    pub fn new(sink: &'a mut dyn ProgressSink) -> Self {
        Self { sink, last: None }
    }

    /// Reports `percent`, clamped to 100. Values below the last reported one
    /// are dropped.
    pub fn report(&mut self, percent: u8) {
        let percent = percent.min(100);
        if self.last.is_some_and(|last| percent <= last) {
            return;
        }
        self.last = Some(percent);
        if let Err(e) = self.sink.report(percent) {
            warn!(percent, error = %e, "progress sink failed, continuing");
        }
    }

    /// Reports a position `fraction` (0..=1) inside the `[start, end]` window.
    pub fn report_within(&mut self, start: u8, end: u8, fraction: f32) {
        let fraction = if fraction.is_finite() { fraction.clamp(0.0, 1.0) } else { 0.0 };
        let span = end.saturating_sub(start) as f32;
        self.report(start.saturating_add((span * fraction).round() as u8));
    }

    /// Reports 100.
    pub fn finish(&mut self) {
        self.report(100);
    }

    /// Last value forwarded to the sink.
    pub fn last(&self) -> Option<u8> {
        self.last
    }
}
