//! Port definitions (hexagonal architecture)
//!
//! Ports are the capabilities the engine needs from its host. Browser glue,
//! native shells and tests each provide their own adapters.
//!
//! ## Driven ports
//! - [`Clock`] - monotonic time in milliseconds
//! - [`ReportTransport`] - best-effort delivery of a serialized report
//! - [`ErrorSource`] - composable subscription to host error signals
//! - [`PerformanceSource`] - per-category performance entry streams
//! - [`FrameSource`] - render-frame and visibility notifications

pub mod clock;
pub mod error_source;
pub mod frames;
pub mod performance;
pub mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error_source::{ErrorHandler, ErrorSource, SubscriptionId};
pub use frames::{FrameEvent, FrameSource};
pub use performance::{MetricCategory, ObserveError, PerformanceEntry, PerformanceSource};
pub use transport::{ReportRequest, ReportTransport, CONTENT_TYPE_JSON};
