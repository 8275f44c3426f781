//! Progress reporting, cancellation and batch status accounting

use crate::{FontError, FontResult};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Status attached to a progress update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Started,
    Completed,
    Skipped,
    Failed,
}

/// One-way message from the engine to whatever renders progress
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressUpdate {
    /// Index of the display unit (font group, source, family)
    pub index: usize,
    pub status: ProgressStatus,
    pub message: String,
    /// Overall completion in the 0..=100 range, when known
    pub percent: Option<f32>,
}

impl ProgressUpdate {
    pub fn new(index: usize, status: ProgressStatus, message: impl Into<String>) -> Self {
        Self {
            index,
            status,
            message: message.into(),
            percent: None,
        }
    }

    pub fn with_percent(mut self, done: usize, total: usize) -> Self {
        if total > 0 {
            self.percent = Some(done as f32 / total as f32 * 100.0);
        }
        self
    }
}

/// Receives progress updates; never returns data to the engine
pub trait ProgressSink: Send + Sync {
    fn update(&self, update: ProgressUpdate);
}

/// Discards every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn update(&self, _update: ProgressUpdate) {}
}

/// Forwards updates to the `log` facade at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn update(&self, update: ProgressUpdate) {
        match update.percent {
            Some(percent) => log::debug!(
                "[{}] {:?} {} ({:.0}%)",
                update.index,
                update.status,
                update.message,
                percent
            ),
            None => log::debug!("[{}] {:?} {}", update.index, update.status, update.message),
        }
    }
}

/// Shared cancellation signal checked between discrete units of work
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(FontError::Cancelled)` once cancellation was requested
    pub fn check(&self) -> FontResult<()> {
        if self.is_cancelled() {
            Err(FontError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Aggregate `{success, skipped, failed}` counts for a batch command
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Human-readable per-item failure details
    pub details: Vec<String>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    pub fn record_skip(&mut self) {
        self.skipped += 1;
    }

    pub fn record_failure(&mut self, detail: impl Into<String>) {
        self.failed += 1;
        self.details.push(detail.into());
    }

    pub fn merge(&mut self, other: &BatchReport) {
        self.succeeded += other.succeeded;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.details.extend(other.details.iter().cloned());
    }

    /// Items that were actually tried (skips are not attempts)
    pub fn attempted(&self) -> usize {
        self.succeeded + self.failed
    }

    /// Partial success is normal; only "nothing worked" is a command failure
    pub fn is_overall_failure(&self) -> bool {
        self.succeeded == 0 && self.failed > 0
    }

    /// Convert into the command-level result
    pub fn into_result(self) -> FontResult<BatchReport> {
        if self.is_overall_failure() {
            Err(FontError::BatchFailed {
                failed: self.failed,
                attempted: self.attempted(),
            })
        } else {
            Ok(self)
        }
    }
}
