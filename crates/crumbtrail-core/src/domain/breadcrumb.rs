//! Breadcrumb record
//!
//! A breadcrumb is a small structured record of something the user or the
//! page did recently. The `type` vocabulary is open-ended; the engine itself
//! produces the kinds listed as associated constants.

use serde::{Deserialize, Serialize};

use super::timestamp::timestamp_now;

/// One recent user or system event, kept briefly for inclusion in reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Breadcrumb {
    /// Event kind (`click`, `input`, `scan`, `performance`, ...)
    #[serde(rename = "type")]
    pub kind: String,
    /// UI element or metric name the event refers to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Short serialized payload, often redacted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Local time the event was observed
    pub timestamp: String,
}

impl Breadcrumb {
    pub const CLICK: &'static str = "click";
    pub const INPUT: &'static str = "input";
    pub const SCAN: &'static str = "scan";
    pub const PERFORMANCE: &'static str = "performance";

    /// Creates a breadcrumb of the given kind stamped with the current time.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            target: None,
            value: None,
            timestamp: timestamp_now(),
        }
    }

    /// Sets the target
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Sets the value
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Overrides the timestamp (mostly useful for replays and tests)
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Shorthand for a `click` breadcrumb on `target`.
    pub fn click(target: impl Into<String>) -> Self {
        Self::new(Self::CLICK).with_target(target)
    }

    /// Shorthand for a `performance` breadcrumb.
    pub fn performance(metric: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(Self::PERFORMANCE)
            .with_target(metric)
            .with_value(value)
    }
}
