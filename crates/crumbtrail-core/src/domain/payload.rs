//! Outbound report payload
//!
//! Composed at send time from the configured project identity, one error
//! and a point-in-time copy of the breadcrumbs. Never mutated afterwards.

use serde::Serialize;
use serde_json::{Map, Value};

use super::{breadcrumb::Breadcrumb, error_info::ErrorInfo, errors::DomainError};
use crate::config::TelemetryConfig;

/// Keys owned by the payload itself; custom data cannot override them.
pub const RESERVED_KEYS: &[&str] = &["projectName", "projectVersion", "error", "breadcrumbs"];

/// The JSON document POSTed to the collector.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Payload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_version: Option<String>,
    pub error: ErrorInfo,
    pub breadcrumbs: Vec<Breadcrumb>,
    #[serde(skip)]
    pub custom_data: Map<String, Value>,
}

impl Payload {
    /// Assembles a payload. `breadcrumbs` must already be a detached copy.
    pub fn new(config: &TelemetryConfig, error: ErrorInfo, breadcrumbs: Vec<Breadcrumb>) -> Self {
        Self {
            project_name: config.project_name.clone(),
            project_version: config.project_version.clone(),
            error,
            breadcrumbs,
            custom_data: config.custom_data.clone(),
        }
    }

    /// JSON document with custom data merged at the top level.
    pub fn to_json(&self) -> Result<Value, DomainError> {
        let mut document = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => return Err(DomainError::Serialization(e.to_string())),
        };

        for (key, value) in &self.custom_data {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            document.insert(key.clone(), value.clone());
        }

        Ok(Value::Object(document))
    }

    /// Wire bytes for the request body.
    pub fn to_bytes(&self) -> Result<Vec<u8>, DomainError> {
        let document = self.to_json()?;
        serde_json::to_vec(&document).map_err(|e| DomainError::Serialization(e.to_string()))
    }
}
