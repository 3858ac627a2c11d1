//! Report dispatch
//!
//! Turns an accepted error into a payload and launches the send without
//! waiting for it. Delivery failures are logged and counted, never
//! surfaced, and never retried.

use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;

use crumbtrail_core::{
    config::TelemetryConfig,
    domain::{ErrorInfo, Payload},
    ports::{ReportRequest, ReportTransport},
};
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::{
    dedup::ErrorDeduplicator,
    metrics::{MetricsRegistry, OUTCOME_ACCEPTED, OUTCOME_FAILED, OUTCOME_SUPPRESSED},
    recorder::BreadcrumbRecorder,
};

/// What `dispatch` did with an error. Says nothing about delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A send was launched
    Attempted,
    /// Duplicate within the throttle window
    Suppressed,
    /// Raised while another report was being built on this thread, or the
    /// payload could not be serialized. A dropped error does not hold a
    /// throttle window.
    Dropped,
}

thread_local! {
    static DISPATCHING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as building a report.
struct DispatchGuard;

impl DispatchGuard {
    fn enter() -> Option<Self> {
        DISPATCHING.with(|flag| {
            if flag.replace(true) {
                None
            } else {
                Some(DispatchGuard)
            }
        })
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        DISPATCHING.with(|flag| flag.set(false));
    }
}

/// Builds and sends error reports.
pub struct ReportDispatcher {
    config: Arc<TelemetryConfig>,
    headers: Vec<(String, String)>,
    recorder: Arc<BreadcrumbRecorder>,
    dedup: Arc<ErrorDeduplicator>,
    transport: Arc<dyn ReportTransport>,
    metrics: Arc<MetricsRegistry>,
    runtime: Handle,
    in_flight: TaskTracker,
}

impl ReportDispatcher {
    pub fn new(
        config: Arc<TelemetryConfig>,
        recorder: Arc<BreadcrumbRecorder>,
        dedup: Arc<ErrorDeduplicator>,
        transport: Arc<dyn ReportTransport>,
        metrics: Arc<MetricsRegistry>,
        runtime: Handle,
    ) -> Self {
        let headers = config
            .custom_headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        Self {
            config,
            headers,
            recorder,
            dedup,
            transport,
            metrics,
            runtime,
            in_flight: TaskTracker::new(),
        }
    }

    /// Reports `info` unless it is a recent duplicate. Returns immediately.
    pub fn dispatch(&self, info: ErrorInfo) -> DispatchOutcome {
        let Some(_guard) = DispatchGuard::enter() else {
            debug!(message = %info.message, "Error raised while dispatching, dropped");
            return DispatchOutcome::Dropped;
        };

        if !self.dedup.should_report(&info) {
            self.metrics.record_report(OUTCOME_SUPPRESSED);
            return DispatchOutcome::Suppressed;
        }

        let payload = Payload::new(&self.config, info, self.recorder.snapshot());
        let body = match payload.to_bytes() {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Failed to serialize error report");
                self.dedup.forget(&payload.error);
                self.metrics.record_report(OUTCOME_FAILED);
                return DispatchOutcome::Dropped;
            }
        };
        self.metrics.record_report(OUTCOME_ACCEPTED);

        let request = ReportRequest {
            url: self.config.report_url.clone(),
            headers: self.headers.clone(),
            body,
            keepalive: true,
        };
        let transport = Arc::clone(&self.transport);
        let metrics = Arc::clone(&self.metrics);
        self.in_flight.spawn_on(
            async move {
                let url = request.url.clone();
                if let Err(e) = transport.send(request).await {
                    warn!(url = %url, error = %e, "Failed to send error report");
                    metrics.record_report(OUTCOME_FAILED);
                }
            },
            &self.runtime,
        );

        debug!(
            breadcrumbs = payload.breadcrumbs.len(),
            "Error report dispatched"
        );
        DispatchOutcome::Attempted
    }

    /// Number of sends still running.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Waits up to `timeout` for in-flight sends. Returns `true` if all
    /// finished.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.in_flight.close();
        let drained = tokio::time::timeout(timeout, self.in_flight.wait())
            .await
            .is_ok();
        self.in_flight.reopen();
        drained
    }
}
