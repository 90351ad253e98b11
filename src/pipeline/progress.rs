//! Percent-complete tracking for a running operation.
//!
//! A [`ProgressTracker`] is created per run and starts at 0. Every unit of
//! work completed moves it to `processed * 100 / total`; it never moves
//! backwards and reads exactly 100 once the run finishes.

use std::sync::Arc;

/// Receives progress updates. All methods default to no-ops.
pub trait ProgressObserver: Send + Sync {
    /// A run of `total_units` units started
    fn on_start(&self, operation: &str, total_units: usize) {
        let _ = (operation, total_units);
    }

    /// The percentage changed
    fn on_progress(&self, operation: &str, percent: u8) {
        let _ = (operation, percent);
    }

    /// A unit failed but the run goes on
    fn on_unit_failed(&self, operation: &str, unit: usize, error: &str) {
        let _ = (operation, unit, error);
    }
}

/// Observer for callers that do not need progress events
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Observer that logs every update
pub struct TracingObserver;

impl ProgressObserver for TracingObserver {
    fn on_start(&self, operation: &str, total_units: usize) {
        tracing::debug!(operation, total_units, "operation started");
    }

    fn on_progress(&self, operation: &str, percent: u8) {
        tracing::debug!(operation, percent, "progress");
    }

    fn on_unit_failed(&self, operation: &str, unit: usize, error: &str) {
        tracing::warn!(operation, unit, error, "unit failed, continuing");
    }
}

pub type SharedObserver = Arc<dyn ProgressObserver>;

/// The progress state of one run
pub struct ProgressTracker {
    operation: String,
    total_units: usize,
    processed: usize,
    percent: u8,
    observer: SharedObserver,
}

impl ProgressTracker {
    pub fn new(operation: impl Into<String>, observer: SharedObserver) -> Self {
        Self {
            operation: operation.into(),
            total_units: 0,
            processed: 0,
            percent: 0,
            observer,
        }
    }

    /// Tracker that reports to nobody
    pub fn silent(operation: impl Into<String>) -> Self {
        Self::new(operation, Arc::new(NoopObserver))
    }

    /// Reset to 0 for a run of `total_units` units
    pub fn start(&mut self, total_units: usize) {
        self.total_units = total_units;
        self.processed = 0;
        self.percent = 0;
        self.observer.on_start(&self.operation, total_units);
        self.observer.on_progress(&self.operation, 0);
    }

    /// Record one finished unit
    pub fn advance(&mut self) {
        self.processed = (self.processed + 1).min(self.total_units);
        let percent = if self.total_units == 0 {
            0
        } else {
            (self.processed * 100 / self.total_units) as u8
        };
        self.set(percent);
    }

    /// Record a failed unit; it still counts as processed
    pub fn fail_unit(&mut self, unit: usize, error: &str) {
        self.observer.on_unit_failed(&self.operation, unit, error);
        self.advance();
    }

    /// Mark the run complete
    pub fn finish(&mut self) {
        self.processed = self.total_units;
        self.set(100);
    }

    fn set(&mut self, percent: u8) {
        if percent > self.percent {
            self.percent = percent;
            self.observer.on_progress(&self.operation, percent);
        }
    }

    pub fn percent(&self) -> u8 {
        self.percent
    }

    pub fn processed(&self) -> usize {
        self.processed
    }

    pub fn total_units(&self) -> usize {
        self.total_units
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Recording {
        updates: Mutex<Vec<u8>>,
        failures: Mutex<Vec<usize>>,
    }

    impl ProgressObserver for Recording {
        fn on_progress(&self, _operation: &str, percent: u8) {
            self.updates.lock().push(percent);
        }

        fn on_unit_failed(&self, _operation: &str, unit: usize, _error: &str) {
            self.failures.lock().push(unit);
        }
    }

    #[test]
    fn test_progress_is_monotonic_and_reaches_100() {
        let recording = Arc::new(Recording::default());
        let mut tracker = ProgressTracker::new("split", recording.clone());

        tracker.start(3);
        tracker.advance();
        tracker.advance();
        tracker.advance();
        tracker.finish();

        assert_eq!(*recording.updates.lock(), vec![0, 33, 66, 100]);
        assert_eq!(tracker.percent(), 100);
    }

    #[test]
    fn test_restart_resets_to_zero() {
        let mut tracker = ProgressTracker::silent("merge");
        tracker.start(2);
        tracker.advance();
        assert_eq!(tracker.percent(), 50);

        tracker.start(4);
        assert_eq!(tracker.percent(), 0);
        assert_eq!(tracker.processed(), 0);
        assert_eq!(tracker.total_units(), 4);
    }

    #[test]
    fn test_extra_advances_do_not_overshoot() {
        let mut tracker = ProgressTracker::silent("images");
        tracker.start(1);
        tracker.advance();
        tracker.advance();
        assert_eq!(tracker.percent(), 100);
        assert_eq!(tracker.processed(), 1);
    }

    #[test]
    fn test_failed_unit_counts_as_processed() {
        let recording = Arc::new(Recording::default());
        let mut tracker = ProgressTracker::new("images", recording.clone());
        tracker.start(4);
        tracker.fail_unit(2, "render failed");
        assert_eq!(tracker.percent(), 25);
        assert_eq!(*recording.failures.lock(), vec![2]);
    }

    #[test]
    fn test_empty_run_finishes_at_100() {
        let mut tracker = ProgressTracker::silent("compress");
        tracker.start(0);
        tracker.advance();
        assert_eq!(tracker.percent(), 0);
        tracker.finish();
        assert_eq!(tracker.percent(), 100);
    }
}
