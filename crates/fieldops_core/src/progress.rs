//! Submission progress reporting.

use std::sync::Mutex;
use tokio::sync::mpsc::UnboundedSender;

/// One progress update: a percentage and a short status line.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub percent: f32,
    pub message: String,
}

/// Receives progress updates. Purely cosmetic.
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: Progress);
}

/// Discards updates.
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: Progress) {}
}

impl ProgressSink for UnboundedSender<Progress> {
    fn report(&self, progress: Progress) {
        // A closed receiver only means nobody is watching.
        let _ = self.send(progress);
    }
}

/// Keeps every update, for tests and logs.
#[derive(Debug, Default)]
pub struct ProgressLog {
    updates: Mutex<Vec<Progress>>,
}

impl ProgressLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<Progress> {
        self.updates.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

impl ProgressSink for ProgressLog {
    fn report(&self, progress: Progress) {
        if let Ok(mut updates) = self.updates.lock() {
            updates.push(progress);
        }
    }
}

/// Wraps a sink and never lets the percentage go backwards.
pub(crate) struct Monotonic<'a> {
    sink: &'a dyn ProgressSink,
    last: Mutex<f32>,
}

impl<'a> Monotonic<'a> {
    pub(crate) fn new(sink: &'a dyn ProgressSink) -> Self {
        Self {
            sink,
            last: Mutex::new(0.0),
        }
    }

    pub(crate) fn report(&self, percent: f32, message: impl Into<String>) {
        let percent = match self.last.lock() {
            Ok(mut last) => {
                *last = last.max(percent.clamp(0.0, 100.0));
                *last
            }
            Err(_) => percent,
        };
        let message = message.into();
        tracing::debug!(percent, message = %message, "Submission progress");
        self.sink.report(Progress { percent, message });
    }
}
