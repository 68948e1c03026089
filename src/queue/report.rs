//! Advisory error reporting.
//!
//! Per-job failures inside the dispatch queues are non-fatal: they are
//! reported through this trait and the queue moves on. The host wires its
//! own reporter (toast, inline text); the default logs through tracing.

use crate::error::KaigiError;
use std::sync::Mutex;

/// Trait for reporting non-fatal job errors.
pub trait ErrorReporter: Send + Sync {
    /// Reports an error from the named queue.
    fn report(&self, queue: &str, error: &KaigiError);
}

/// Reporter that logs through tracing.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn report(&self, queue: &str, error: &KaigiError) {
        tracing::warn!(queue, error = %error, "job failed");
    }
}

/// Reporter that records reports for assertions in tests.
#[derive(Debug, Default)]
pub struct CollectingReporter {
    reports: Mutex<Vec<(String, String)>>,
}

impl CollectingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<(String, String)> {
        self.reports.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ErrorReporter for CollectingReporter {
    fn report(&self, queue: &str, error: &KaigiError) {
        if let Ok(mut reports) = self.reports.lock() {
            reports.push((queue.to_string(), error.to_string()));
        }
    }
}
