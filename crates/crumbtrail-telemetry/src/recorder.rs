//! Bounded breadcrumb buffer
//!
//! Appends at the tail and evicts from the head once the configured
//! capacity is exceeded, so the buffer never holds more than
//! `max_breadcrumbs` entries. Eviction is silent.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crumbtrail_core::domain::Breadcrumb;

use crate::metrics::MetricsRegistry;

/// Bounded FIFO of recent breadcrumbs.
///
/// Thread safety is provided by an internal `Mutex`; the lock is never held
/// while calling out of the recorder.
pub struct BreadcrumbRecorder {
    capacity: usize,
    buffer: Mutex<VecDeque<Breadcrumb>>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl BreadcrumbRecorder {
    /// Creates an empty recorder holding at most `capacity` breadcrumbs.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            buffer: Mutex::new(VecDeque::with_capacity(capacity)),
            metrics: None,
        }
    }

    /// Counts every recorded breadcrumb in `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Appends `breadcrumb`, evicting the oldest entries beyond capacity.
    pub fn record(&self, breadcrumb: Breadcrumb) {
        if let Some(metrics) = &self.metrics {
            metrics.record_breadcrumb(&breadcrumb.kind);
        }

        let mut buffer = self.lock();
        buffer.push_back(breadcrumb);
        while buffer.len() > self.capacity {
            buffer.pop_front();
        }
    }

    /// Detached copy of the buffer, oldest first.
    ///
    /// Later recordings never affect a snapshot already taken.
    pub fn snapshot(&self) -> Vec<Breadcrumb> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    // A panic while holding the lock cannot leave the deque half-updated,
    // so a poisoned buffer is still safe to use.
    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<Breadcrumb>> {
        self.buffer
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
