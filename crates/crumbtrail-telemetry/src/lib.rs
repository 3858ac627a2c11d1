//! Crumbtrail Telemetry - the client-side telemetry engine
//!
//! Provides:
//! - `BreadcrumbRecorder`: bounded FIFO of recent user and performance events
//! - `ErrorDeduplicator`: time-windowed suppression of repeated errors
//! - `PerformanceSampler` / `FrameDropDetector`: performance breadcrumbs
//! - `ReportDispatcher`: fire-and-forget report delivery
//! - `InputCapture`: DOM event translation with sensitive-input redaction
//! - `HostAdapter` / `ErrorHook`: host error intake
//! - `MetricsRegistry`: Prometheus counters for the engine itself
//! - `TelemetryEngine`: wires everything together with an explicit shutdown

pub mod capture;
pub mod dedup;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod frame_drop;
pub mod host;
pub mod metrics;
pub mod recorder;
pub mod sampler;
pub mod sources;
pub mod transport;

pub use capture::{summarize_sensitive, CaptureOutcome, InputCapture};
pub use dedup::ErrorDeduplicator;
pub use dispatcher::{DispatchOutcome, ReportDispatcher};
pub use engine::{EngineBuilder, TelemetryEngine};
pub use error::TelemetryError;
pub use frame_drop::{FrameDropDetector, FrameDropSummary};
pub use host::{ErrorHook, HostAdapter, HostCapabilities};
pub use metrics::MetricsRegistry;
pub use recorder::BreadcrumbRecorder;
pub use sampler::PerformanceSampler;
pub use sources::{ChannelFrameSource, ChannelPerformanceSource, IntervalFrameSource};
pub use transport::HttpTransport;
