//! Replay command - drive a real engine from a recorded event log
//!
//! The log is JSON lines, one event per line, each stamped with the host's
//! monotonic time in milliseconds:
//!
//! ```text
//! {"at_ms": 0,    "kind": "click", "target": "button#add"}
//! {"at_ms": 16,   "kind": "frame"}
//! {"at_ms": 120,  "kind": "error", "message": "boom", "url": "https://shop.test/"}
//! ```
//!
//! Time in the log drives the engine clock, so throttling and frame-drop
//! detection see the recorded gaps. Log time does not drive the idle
//! timer, which runs on runtime time: a trailing frame-drop summary is
//! recorded by the next frame or visibility event past its window, or when
//! the log ends. Blank lines and lines
//! starting with `#` are skipped.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use crumbtrail_core::{
    config::TelemetryConfig,
    domain::{DomEvent, HostError, ThrownValue},
    ports::{
        FrameEvent, ManualClock, MetricCategory, PerformanceEntry, ReportRequest,
        ReportTransport,
    },
};
use crumbtrail_telemetry::{
    metrics::{OUTCOME_ACCEPTED, OUTCOME_FAILED, OUTCOME_SUPPRESSED},
    ChannelFrameSource, ChannelPerformanceSource, ErrorHook, HostCapabilities, HttpTransport,
    TelemetryEngine,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct ReplayCommand {
    /// JSON-lines event log ("-" reads stdin)
    file: PathBuf,
    /// Override the configured collector endpoint
    #[arg(long)]
    report_url: Option<String>,
    /// Print reports instead of sending them
    #[arg(long)]
    dry_run: bool,
    /// Print engine metrics after the replay
    #[arg(long)]
    metrics: bool,
    /// Major version of the host UI framework, if any
    #[arg(long)]
    framework: Option<u32>,
    /// Treat a performance category as unsupported (repeatable)
    #[arg(long = "unsupported", value_name = "CATEGORY")]
    unsupported: Vec<MetricCategory>,
    /// Seconds to wait for in-flight reports before exiting
    #[arg(long, default_value_t = 10)]
    drain_timeout: u64,
}

/// One line of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayLine {
    pub at_ms: u64,
    #[serde(flatten)]
    pub event: ReplayEvent,
}

/// Everything a host can feed the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ReplayEvent {
    Click {
        target: String,
    },
    Input {
        target: String,
        value: String,
    },
    CompositionStart {
        target: String,
    },
    CompositionEnd {
        target: String,
        data: String,
    },
    KeyDown {
        target: String,
        key: String,
    },
    /// Uncaught error, or one raised through the framework hook
    Error {
        message: String,
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        stack: Option<String>,
        url: String,
        #[serde(default)]
        info: Option<String>,
        #[serde(default)]
        component: Option<String>,
    },
    /// Unhandled promise rejection with an arbitrary reason
    Rejection {
        #[serde(default)]
        reason: serde_json::Value,
        url: String,
    },
    /// Resource element failed to load
    Resource {
        tag: String,
        src: String,
        url: String,
    },
    Performance {
        category: MetricCategory,
        name: String,
        #[serde(rename = "startTime", default)]
        start_time: f64,
        #[serde(default)]
        duration: f64,
    },
    Frame,
    Visibility {
        visible: bool,
    },
}

/// What a replay did.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReplaySummary {
    pub events: usize,
    pub breadcrumbs: usize,
    pub reports_accepted: u64,
    pub reports_suppressed: u64,
    pub reports_failed: u64,
    pub observed_categories: Vec<MetricCategory>,
    pub drained: bool,
    /// Report bodies captured in dry-run mode
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reports: Vec<serde_json::Value>,
    #[serde(skip)]
    pub metrics: String,
}

/// Captures reports instead of sending them.
#[derive(Default)]
struct DryRunTransport {
    reports: Mutex<Vec<serde_json::Value>>,
}

impl DryRunTransport {
    fn take(&self) -> Vec<serde_json::Value> {
        std::mem::take(
            &mut *self
                .reports
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner()),
        )
    }
}

#[async_trait::async_trait]
impl ReportTransport for DryRunTransport {
    async fn send(&self, request: ReportRequest) -> Result<()> {
        let body: serde_json::Value =
            serde_json::from_slice(&request.body).context("report body is not JSON")?;
        info!(url = %request.url, "Dry run, report not sent");
        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(body);
        Ok(())
    }
}

impl ReplayCommand {
    pub async fn execute(&self, format: OutputFormat, config_path: &Path) -> Result<()> {
        let mut config = super::load_or_default(config_path)?;
        if let Some(url) = &self.report_url {
            config.report_url = url.clone();
        }

        let summary = if self.file.as_os_str() == "-" {
            self.run(config, BufReader::new(std::io::stdin().lock()))
                .await?
        } else {
            let file = std::fs::File::open(&self.file)
                .with_context(|| format!("Failed to open {}", self.file.display()))?;
            self.run(config, BufReader::new(file)).await?
        };

        print_summary(&summary, format, self.metrics)
    }

    /// Replays every line of `reader` and returns once all sources have
    /// ended and in-flight reports were given time to finish.
    pub async fn run<R: BufRead>(
        &self,
        config: TelemetryConfig,
        reader: R,
    ) -> Result<ReplaySummary> {
        let clock = Arc::new(ManualClock::new(0));
        let hook = Arc::new(ErrorHook::new());
        let mut performance = ChannelPerformanceSource::new();
        for category in &self.unsupported {
            performance = performance.without(*category);
        }
        let performance = Arc::new(performance);
        let (frames, frame_tx) = ChannelFrameSource::new();

        let dry_run = self.dry_run.then(|| Arc::new(DryRunTransport::default()));
        let transport: Arc<dyn ReportTransport> = match &dry_run {
            Some(dry_run) => dry_run.clone(),
            None => Arc::new(HttpTransport::new()?),
        };
        let capabilities = match self.framework {
            Some(major) => HostCapabilities::framework(major),
            None => HostCapabilities::global(),
        };

        let mut engine = TelemetryEngine::builder(config)
            .clock(clock.clone())
            .transport(transport)
            .error_source(hook.clone())
            .performance_source(performance.clone())
            .frame_source(Box::new(frames))
            .host_capabilities(capabilities)
            .start()?;

        let mut events = 0;
        for (index, line) in reader.lines().enumerate() {
            let line = line.context("Failed to read event log")?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let ReplayLine { at_ms, event } = serde_json::from_str(line)
                .with_context(|| format!("line {}: invalid event", index + 1))?;

            clock.set(at_ms);
            events += 1;

            match event {
                ReplayEvent::Click { target } => {
                    engine.handle_dom_event(DomEvent::Click { target });
                }
                ReplayEvent::Input { target, value } => {
                    engine.handle_dom_event(DomEvent::Input { target, value });
                }
                ReplayEvent::CompositionStart { target } => {
                    engine.handle_dom_event(DomEvent::CompositionStart { target });
                }
                ReplayEvent::CompositionEnd { target, data } => {
                    engine.handle_dom_event(DomEvent::CompositionEnd { target, data });
                }
                ReplayEvent::KeyDown { target, key } => {
                    engine.handle_dom_event(DomEvent::KeyDown { target, key, at_ms });
                }
                ReplayEvent::Error {
                    message,
                    name,
                    stack,
                    url,
                    info,
                    component,
                } => {
                    let mut error = HostError::new(
                        ThrownValue::Error {
                            name,
                            message,
                            stack,
                        },
                        url,
                    );
                    error.info = info;
                    error.component = component;
                    hook.emit(&error);
                }
                ReplayEvent::Rejection { reason, url } => {
                    let error = HostError::new(ThrownValue::Value(reason), url)
                        .with_info("unhandledrejection");
                    hook.emit(&error);
                }
                ReplayEvent::Resource { tag, src, url } => {
                    engine.handle_dom_event(DomEvent::ResourceError {
                        tag,
                        src,
                        page_url: url,
                    });
                }
                ReplayEvent::Performance {
                    category,
                    name,
                    start_time,
                    duration,
                } => {
                    let entry = PerformanceEntry {
                        name,
                        start_time,
                        duration,
                    };
                    if !performance.push(category, entry) {
                        debug!(%category, "No observer for performance entry");
                    }
                }
                ReplayEvent::Frame => send_frame(&frame_tx, FrameEvent::Frame { at_ms }),
                ReplayEvent::Visibility { visible } => {
                    send_frame(&frame_tx, FrameEvent::Visibility { visible, at_ms })
                }
            }

            // Let observer and frame tasks catch up so breadcrumbs keep log order.
            tokio::task::yield_now().await;
        }

        drop(frame_tx);
        drop(performance);
        engine.wait_for_sources().await;
        let drained = engine
            .drain(Duration::from_secs(self.drain_timeout))
            .await;
        if !drained {
            warn!("Some reports were still in flight when the replay ended");
        }

        let metrics = engine.metrics();
        let summary = ReplaySummary {
            events,
            breadcrumbs: engine.snapshot().len(),
            reports_accepted: metrics.reports(OUTCOME_ACCEPTED),
            reports_suppressed: metrics.reports(OUTCOME_SUPPRESSED),
            reports_failed: metrics.reports(OUTCOME_FAILED),
            observed_categories: engine.observed_categories().to_vec(),
            drained,
            reports: dry_run.map(|t| t.take()).unwrap_or_default(),
            metrics: metrics.encode()?,
        };

        engine.shutdown().await;
        Ok(summary)
    }
}

fn send_frame(tx: &tokio::sync::mpsc::UnboundedSender<FrameEvent>, event: FrameEvent) {
    if tx.send(event).is_err() {
        debug!("Frame-drop detection is off, frame ignored");
    }
}

fn print_summary(summary: &ReplaySummary, format: OutputFormat, with_metrics: bool) -> Result<()> {
    let formatter = get_formatter(format);

    if format.is_json() {
        let mut json = serde_json::to_value(summary).context("Failed to serialize summary")?;
        if with_metrics {
            json["metrics"] = serde_json::Value::String(summary.metrics.clone());
        }
        formatter.print_json(&json);
        return Ok(());
    }

    formatter.success(&format!("Replayed {} events", summary.events));
    formatter.field("Breadcrumbs buffered", &summary.breadcrumbs.to_string());
    formatter.field("Reports accepted", &summary.reports_accepted.to_string());
    formatter.field("Reports suppressed", &summary.reports_suppressed.to_string());
    formatter.field("Reports failed", &summary.reports_failed.to_string());
    let observed: Vec<&str> = summary
        .observed_categories
        .iter()
        .map(MetricCategory::as_str)
        .collect();
    formatter.field("Observed categories", &observed.join(", "));
    if !summary.drained {
        formatter.error("some reports were still in flight");
    }

    for report in &summary.reports {
        formatter.info("");
        formatter.print_json(report);
    }
    if with_metrics {
        formatter.info("");
        print!("{}", summary.metrics);
    }
    Ok(())
}
