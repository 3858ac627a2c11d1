//! HTTP report transport
//!
//! POSTs each report as JSON. The response is logged and otherwise ignored:
//! only a failure to get the request onto the wire is an error.

use std::time::Duration;

use anyhow::{Context, Result};
use crumbtrail_core::ports::{ReportRequest, ReportTransport, CONTENT_TYPE_JSON};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE},
    Client,
};
use tracing::{debug, warn};

use crate::error::TelemetryError;

/// Request timeout used by [`HttpTransport::new`].
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// [`ReportTransport`] over `reqwest`.
///
/// Each send runs on a detached task owned by the dispatcher, so an
/// in-flight report keeps going after the engine is shut down. That is how
/// the `keepalive` flag of a [`ReportRequest`] is honored.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Creates a transport with [`DEFAULT_TIMEOUT`].
    pub fn new() -> Result<Self, TelemetryError> {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, TelemetryError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TelemetryError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wraps an existing client (useful for testing)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

/// Custom headers first, then the content type, so a misconfigured
/// `Content-Type` cannot change the body encoding.
fn build_headers(custom: &[(String, String)]) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(custom.len() + 1);
    for (name, value) in custom {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => warn!(header = %name, "Skipping invalid custom header"),
        }
    }
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE_JSON));
    headers
}

#[async_trait::async_trait]
impl ReportTransport for HttpTransport {
    async fn send(&self, request: ReportRequest) -> Result<()> {
        let ReportRequest {
            url,
            headers,
            body,
            keepalive,
        } = request;

        let response = self
            .client
            .post(&url)
            .headers(build_headers(&headers))
            .body(body)
            .send()
            .await
            .with_context(|| format!("failed to send report to {url}"))?;

        debug!(
            url = %url,
            status = %response.status(),
            keepalive,
            "Report sent"
        );
        Ok(())
    }
}
