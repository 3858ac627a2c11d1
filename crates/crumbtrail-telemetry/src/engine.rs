//! Telemetry engine
//!
//! Owns one recorder, one deduplicator and one dispatcher, attaches them to
//! the host through the injected ports, and tears everything down again on
//! [`TelemetryEngine::shutdown`].
//!
//! ## Start-up order
//!
//! 1. Validate the configuration. Nothing is attached if this fails.
//! 2. Build recorder, deduplicator, metrics and dispatcher.
//! 3. Subscribe to the host error source.
//! 4. Start performance observers and the frame-drop loop.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crumbtrail_core::{
    config::TelemetryConfig,
    domain::{Breadcrumb, DomEvent, ErrorInfo, HostError},
    ports::{
        Clock, ErrorSource, FrameSource, MetricCategory, PerformanceSource, ReportTransport,
        SubscriptionId, SystemClock,
    },
};
use tokio::{runtime::Handle, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    capture::{CaptureOutcome, InputCapture},
    dedup::ErrorDeduplicator,
    dispatcher::{DispatchOutcome, ReportDispatcher},
    error::TelemetryError,
    host::{HostAdapter, HostCapabilities},
    metrics::MetricsRegistry,
    recorder::BreadcrumbRecorder,
    sampler::PerformanceSampler,
    transport::HttpTransport,
};

/// Collects the host ports before start-up.
///
/// Every port is optional. Without a transport the engine POSTs over HTTP;
/// without the other sources the matching feature is simply not attached.
pub struct EngineBuilder {
    config: TelemetryConfig,
    clock: Option<Arc<dyn Clock>>,
    transport: Option<Arc<dyn ReportTransport>>,
    error_source: Option<Arc<dyn ErrorSource>>,
    performance_source: Option<Arc<dyn PerformanceSource>>,
    frame_source: Option<Box<dyn FrameSource>>,
    capabilities: HostCapabilities,
}

impl EngineBuilder {
    pub fn new(config: TelemetryConfig) -> Self {
        Self {
            config,
            clock: None,
            transport: None,
            error_source: None,
            performance_source: None,
            frame_source: None,
            capabilities: HostCapabilities::default(),
        }
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn transport(mut self, transport: Arc<dyn ReportTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn error_source(mut self, source: Arc<dyn ErrorSource>) -> Self {
        self.error_source = Some(source);
        self
    }

    pub fn performance_source(mut self, source: Arc<dyn PerformanceSource>) -> Self {
        self.performance_source = Some(source);
        self
    }

    pub fn frame_source(mut self, source: Box<dyn FrameSource>) -> Self {
        self.frame_source = Some(source);
        self
    }

    pub fn host_capabilities(mut self, capabilities: HostCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Validates the configuration and attaches to the host.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self) -> Result<TelemetryEngine, TelemetryError> {
        let config = Arc::new(self.config.validated()?);
        let runtime = Handle::try_current().map_err(|e| TelemetryError::Runtime(e.to_string()))?;

        let metrics = Arc::new(MetricsRegistry::new()?);
        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()) as Arc<dyn Clock>);
        let transport: Arc<dyn ReportTransport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new()?),
        };

        let recorder = Arc::new(
            BreadcrumbRecorder::new(config.max_breadcrumbs).with_metrics(Arc::clone(&metrics)),
        );
        let dedup = Arc::new(ErrorDeduplicator::new(
            config.error_throttle_time_ms,
            clock,
        ));
        let dispatcher = Arc::new(ReportDispatcher::new(
            Arc::clone(&config),
            Arc::clone(&recorder),
            dedup,
            transport,
            Arc::clone(&metrics),
            runtime.clone(),
        ));
        let adapter = HostAdapter::detect(&self.capabilities);

        let subscription = match self.error_source {
            Some(source) => {
                let handler_dispatcher = Arc::clone(&dispatcher);
                let id = source
                    .subscribe(Arc::new(move |error: &HostError| {
                        handler_dispatcher.dispatch(adapter.report_through_host(error));
                    }))
                    .map_err(|e| TelemetryError::Subscribe(e.to_string()))?;
                Some((source, id))
            }
            None => None,
        };

        let shutdown = CancellationToken::new();
        let sampler = PerformanceSampler::new(
            Arc::clone(&recorder),
            Arc::clone(&metrics),
            runtime,
            shutdown.clone(),
        );

        let mut observed = Vec::new();
        let mut tasks = Vec::new();
        if config.performance.observe_metrics {
            match &self.performance_source {
                Some(source) => {
                    let (categories, handles) =
                        sampler.observe(source.as_ref(), &MetricCategory::ALL);
                    observed = categories;
                    tasks.extend(handles);
                }
                None => debug!("No performance source, observers not attached"),
            }
        }
        if config.performance.frame_drop_detection {
            match self.frame_source {
                Some(frames) => tasks.push(sampler.start_frame_detector(frames)),
                None => debug!("No frame source, frame-drop detection not attached"),
            }
        }

        info!(
            report_url = %config.report_url,
            adapter = %adapter,
            max_breadcrumbs = config.max_breadcrumbs,
            throttle_ms = config.error_throttle_time_ms,
            "Telemetry engine started"
        );

        let filter_sensitive = config.filter_sensitive_input;
        Ok(TelemetryEngine {
            config,
            adapter,
            recorder,
            dispatcher,
            metrics,
            capture: Mutex::new(InputCapture::new(filter_sensitive)),
            subscription,
            observed,
            tasks,
            shutdown,
        })
    }
}

/// A running telemetry engine.
///
/// Dropping the engine cancels its background tasks and detaches from the
/// error source. Reports already in flight are left to finish.
pub struct TelemetryEngine {
    config: Arc<TelemetryConfig>,
    adapter: HostAdapter,
    recorder: Arc<BreadcrumbRecorder>,
    dispatcher: Arc<ReportDispatcher>,
    metrics: Arc<MetricsRegistry>,
    capture: Mutex<InputCapture>,
    subscription: Option<(Arc<dyn ErrorSource>, SubscriptionId)>,
    observed: Vec<MetricCategory>,
    tasks: Vec<JoinHandle<()>>,
    shutdown: CancellationToken,
}

impl TelemetryEngine {
    pub fn builder(config: TelemetryConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    // ---- entry points ----

    pub fn record(&self, breadcrumb: Breadcrumb) {
        self.recorder.record(breadcrumb);
    }

    /// Detached copy of the current breadcrumbs.
    pub fn snapshot(&self) -> Vec<Breadcrumb> {
        self.recorder.snapshot()
    }

    pub fn report_error(&self, info: ErrorInfo) -> DispatchOutcome {
        self.dispatcher.dispatch(info)
    }

    /// Reports an error handed over directly by the host, bypassing the
    /// error source.
    pub fn report_host_error(&self, error: &HostError) -> DispatchOutcome {
        self.dispatcher
            .dispatch(self.adapter.report_through_host(error))
    }

    /// Feeds one DOM event through input capture. Returns the dispatch
    /// outcome when the event was an error.
    pub fn handle_dom_event(&self, event: DomEvent) -> Option<DispatchOutcome> {
        let outcome = self
            .capture
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .handle(event);

        match outcome {
            CaptureOutcome::Breadcrumb(breadcrumb) => {
                self.recorder.record(breadcrumb);
                None
            }
            CaptureOutcome::Error(info) => Some(self.dispatcher.dispatch(info)),
            CaptureOutcome::Ignored => None,
        }
    }

    // ---- accessors ----

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn adapter(&self) -> HostAdapter {
        self.adapter
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Performance categories that were successfully subscribed.
    pub fn observed_categories(&self) -> &[MetricCategory] {
        &self.observed
    }

    /// Token cancelled on shutdown.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    // ---- lifecycle ----

    /// Waits for every background task to end on its own, i.e. for all
    /// performance and frame sources to close.
    pub async fn wait_for_sources(&mut self) {
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "Telemetry task failed");
            }
        }
    }

    /// Waits up to `timeout` for in-flight reports.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.dispatcher.drain(timeout).await
    }

    /// Cancels background tasks, detaches from the error source and waits
    /// for the tasks to stop.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        self.detach();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!(error = %e, "Telemetry task failed during shutdown");
            }
        }
        info!(
            in_flight = self.dispatcher.in_flight(),
            "Telemetry engine stopped"
        );
    }

    fn detach(&mut self) {
        if let Some((source, id)) = self.subscription.take() {
            if !source.unsubscribe(id) {
                debug!(%id, "Error source subscription already gone");
            }
        }
    }
}

impl Drop for TelemetryEngine {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use crumbtrail_core::{
        config::{ConfigBuilder, ConfigError},
        domain::ThrownValue,
    };

    use super::*;
    use crate::host::ErrorHook;

    fn config() -> TelemetryConfig {
        ConfigBuilder::new()
            .report_url("https://collector.test/report")
            .build()
    }

    #[test]
    fn test_start_requires_runtime() {
        let err = TelemetryEngine::builder(config()).start().err().unwrap();
        assert!(matches!(err, TelemetryError::Runtime(_)));
    }

    #[tokio::test]
    async fn test_missing_report_url_attaches_nothing() {
        let hook = Arc::new(ErrorHook::new());
        let err = TelemetryEngine::builder(TelemetryConfig::default())
            .error_source(hook.clone())
            .start()
            .err()
            .unwrap();

        assert!(matches!(
            err,
            TelemetryError::Config(ConfigError::MissingReportUrl)
        ));
        assert_eq!(hook.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_detaches_error_hook() {
        let hook = Arc::new(ErrorHook::new());
        let engine = TelemetryEngine::builder(config())
            .error_source(hook.clone())
            .host_capabilities(HostCapabilities::framework(3))
            .start()
            .unwrap();

        assert_eq!(engine.adapter(), HostAdapter::FrameworkModern);
        assert_eq!(hook.subscriber_count(), 1);

        let token = engine.shutdown_token();
        engine.shutdown().await;
        assert!(token.is_cancelled());
        assert_eq!(hook.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_drop_detaches_error_hook() {
        let hook = Arc::new(ErrorHook::new());
        let engine = TelemetryEngine::builder(config())
            .error_source(hook.clone())
            .start()
            .unwrap();
        drop(engine);
        assert_eq!(hook.subscriber_count(), 0);

        // Nobody left to report to; emitting is harmless.
        hook.emit(&HostError::new(ThrownValue::Unknown, "https://app.test/"));
    }
}
