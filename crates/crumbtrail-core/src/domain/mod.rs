//! Domain entities for the telemetry engine
//!
//! Everything in here is plain data: records that the engine stores,
//! the wire payload it ships, and the inbound host events it translates.

pub mod breadcrumb;
pub mod error_info;
pub mod errors;
pub mod event;
pub mod payload;
pub mod timestamp;

pub use breadcrumb::Breadcrumb;
pub use error_info::{ErrorInfo, HostError, ThrownValue};
pub use errors::DomainError;
pub use event::DomEvent;
pub use payload::Payload;
pub use timestamp::{format_timestamp, timestamp_now};
