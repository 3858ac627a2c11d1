//! Prometheus metrics registry for the telemetry engine
//!
//! Counts what the engine itself does: breadcrumbs recorded, reports
//! accepted / suppressed / failed, frame drops, and observer failures.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Report outcome label values.
pub const OUTCOME_ACCEPTED: &str = "accepted";
pub const OUTCOME_SUPPRESSED: &str = "suppressed";
pub const OUTCOME_FAILED: &str = "failed";

/// Central metrics registry holding all engine metrics.
pub struct MetricsRegistry {
    registry: Registry,
    /// Counter: breadcrumbs recorded by type
    pub breadcrumbs_recorded_total: IntCounterVec,
    /// Counter: error reports by outcome (accepted, suppressed, failed)
    pub reports_total: IntCounterVec,
    /// Counter: qualifying dropped frames
    pub frame_drops_total: IntCounter,
    /// Counter: performance categories that could not be observed
    pub observer_failures_total: IntCounterVec,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with all metrics registered.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("crumbtrail".to_string()), None)?;

        let breadcrumbs_recorded_total = IntCounterVec::new(
            Opts::new("breadcrumbs_recorded_total", "Breadcrumbs recorded by type"),
            &["type"],
        )?;
        registry.register(Box::new(breadcrumbs_recorded_total.clone()))?;

        let reports_total = IntCounterVec::new(
            Opts::new("reports_total", "Error reports by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(reports_total.clone()))?;

        let frame_drops_total =
            IntCounter::with_opts(Opts::new("frame_drops_total", "Dropped frames detected"))?;
        registry.register(Box::new(frame_drops_total.clone()))?;

        let observer_failures_total = IntCounterVec::new(
            Opts::new(
                "observer_failures_total",
                "Performance categories that failed to subscribe",
            ),
            &["category"],
        )?;
        registry.register(Box::new(observer_failures_total.clone()))?;

        Ok(Self {
            registry,
            breadcrumbs_recorded_total,
            reports_total,
            frame_drops_total,
            observer_failures_total,
        })
    }

    // ========================================================================
    // Recording helpers
    // ========================================================================

    /// Record a breadcrumb of the given type.
    pub fn record_breadcrumb(&self, kind: &str) {
        self.breadcrumbs_recorded_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Record a report outcome.
    pub fn record_report(&self, outcome: &str) {
        self.reports_total.with_label_values(&[outcome]).inc();
    }

    /// Record one dropped frame.
    pub fn record_frame_drop(&self) {
        self.frame_drops_total.inc();
    }

    /// Record a category that could not be observed.
    pub fn record_observer_failure(&self, category: &str) {
        self.observer_failures_total
            .with_label_values(&[category])
            .inc();
    }

    /// Current count for a report outcome.
    pub fn reports(&self, outcome: &str) -> u64 {
        self.reports_total.with_label_values(&[outcome]).get()
    }

    // ========================================================================
    // Encoding
    // ========================================================================

    /// Encode all metrics in Prometheus text exposition format.
    pub fn encode(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
