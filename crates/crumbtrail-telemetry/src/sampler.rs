//! Performance sampling
//!
//! Two independent producers feed the breadcrumb recorder:
//! - observer-based metrics, one subscription per [`MetricCategory`]
//! - the frame-drop detector, driven by a [`FrameSource`]
//!
//! A category the host cannot observe is logged and skipped; it never
//! prevents the remaining categories from being subscribed.

use std::sync::Arc;

use crumbtrail_core::{
    domain::Breadcrumb,
    ports::{FrameSource, MetricCategory, PerformanceEntry, PerformanceSource},
};
use tokio::{runtime::Handle, sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    frame_drop::{run_frame_loop, FrameDropDetector},
    metrics::MetricsRegistry,
    recorder::BreadcrumbRecorder,
};

/// Subscribes to performance signals and records them as breadcrumbs.
pub struct PerformanceSampler {
    recorder: Arc<BreadcrumbRecorder>,
    metrics: Arc<MetricsRegistry>,
    runtime: Handle,
    shutdown: CancellationToken,
}

impl PerformanceSampler {
    /// Creates a sampler whose tasks run on `runtime` until `shutdown` fires.
    pub fn new(
        recorder: Arc<BreadcrumbRecorder>,
        metrics: Arc<MetricsRegistry>,
        runtime: Handle,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            recorder,
            metrics,
            runtime,
            shutdown,
        }
    }

    /// Subscribes to each of `categories` on `source`.
    ///
    /// Returns the categories that were actually subscribed together with
    /// the forwarding tasks.
    pub fn observe(
        &self,
        source: &dyn PerformanceSource,
        categories: &[MetricCategory],
    ) -> (Vec<MetricCategory>, Vec<JoinHandle<()>>) {
        let mut observed = Vec::with_capacity(categories.len());
        let mut tasks = Vec::with_capacity(categories.len());

        for &category in categories {
            match source.observe(category) {
                Ok(entries) => {
                    debug!(%category, "Observing performance category");
                    observed.push(category);
                    tasks.push(self.runtime.spawn(forward_entries(
                        category,
                        entries,
                        Arc::clone(&self.recorder),
                        self.shutdown.clone(),
                    )));
                }
                Err(e) => {
                    warn!(%category, error = %e, "Performance category unavailable, skipping");
                    self.metrics.record_observer_failure(category.as_str());
                }
            }
        }

        info!(
            observed = observed.len(),
            requested = categories.len(),
            "Performance observers attached"
        );
        (observed, tasks)
    }

    /// Starts the frame-drop detector loop on `frames`.
    pub fn start_frame_detector(
        &self,
        frames: Box<dyn FrameSource>,
    ) -> JoinHandle<()> {
        self.runtime.spawn(run_frame_loop(
            frames,
            FrameDropDetector::new(),
            Arc::clone(&self.recorder),
            Arc::clone(&self.metrics),
            self.shutdown.clone(),
        ))
    }
}

/// Compact `{name, startTime, duration}` breadcrumb for one entry.
pub fn entry_breadcrumb(category: MetricCategory, entry: &PerformanceEntry) -> Option<Breadcrumb> {
    match serde_json::to_string(entry) {
        Ok(value) => Some(Breadcrumb::performance(category.as_str(), value)),
        Err(e) => {
            warn!(%category, error = %e, "Failed to serialize performance entry");
            None
        }
    }
}

async fn forward_entries(
    category: MetricCategory,
    mut entries: mpsc::UnboundedReceiver<PerformanceEntry>,
    recorder: Arc<BreadcrumbRecorder>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => break,

            entry = entries.recv() => {
                let Some(entry) = entry else {
                    debug!(%category, "Performance source closed");
                    break;
                };
                if let Some(crumb) = entry_breadcrumb(category, &entry) {
                    recorder.record(crumb);
                }
            }
        }
    }
}
