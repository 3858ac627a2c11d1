//! Report transport port (driven/secondary port)
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because failure modes are adapter-specific.
//! - Delivery is best-effort: the engine logs a failure and moves on. No
//!   retry, no persistence.
//! - Only transport-level failure matters; response status and body are
//!   not part of the contract.

/// MIME type of every report body.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// A fully built report ready for the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRequest {
    /// Collector endpoint
    pub url: String,
    /// Extra headers, in configuration order
    pub headers: Vec<(String, String)>,
    /// JSON body
    pub body: Vec<u8>,
    /// The request should outlive the page or process that issued it
    pub keepalive: bool,
}

/// Port trait for sending reports to the collector.
#[async_trait::async_trait]
pub trait ReportTransport: Send + Sync {
    /// Sends one report. An `Err` means the request never made it onto the wire.
    async fn send(&self, request: ReportRequest) -> anyhow::Result<()>;
}
