//! Error records
//!
//! [`ErrorInfo`] is one observed failure as it travels to the collector.
//! [`ThrownValue`] and [`HostError`] describe what a host hands us before
//! it has been coerced into that shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::timestamp::timestamp_now;

/// Message used when nothing better can be extracted from a thrown value.
pub const UNKNOWN_ERROR_MESSAGE: &str = "Unknown error";

/// One observed failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    /// Framework-supplied context, e.g. the lifecycle hook that failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<String>,
    /// Page the error happened on
    pub url: String,
    pub timestamp: String,
}

impl ErrorInfo {
    /// Creates an error record stamped with the current time.
    pub fn new(message: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: None,
            info: None,
            url: url.into(),
            timestamp: timestamp_now(),
        }
    }

    /// Sets the stack trace
    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Sets the framework context
    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    /// Overrides the timestamp
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = timestamp.into();
        self
    }

    /// Identity used for duplicate suppression.
    ///
    /// Order-sensitive concatenation of message, stack and url. Fields are
    /// joined with a control character so that shifting text between
    /// adjacent fields yields a different key.
    pub fn fingerprint(&self) -> String {
        let stack = self.stack.as_deref().unwrap_or_default();
        let mut key =
            String::with_capacity(self.message.len() + stack.len() + self.url.len() + 2);
        key.push_str(&self.message);
        key.push('\u{1f}');
        key.push_str(stack);
        key.push('\u{1f}');
        key.push_str(&self.url);
        key
    }
}

/// A value a host threw, in whatever shape it arrived.
#[derive(Debug, Clone, PartialEq)]
pub enum ThrownValue {
    /// An error object with the usual fields
    Error {
        name: Option<String>,
        message: String,
        stack: Option<String>,
    },
    /// A bare string was thrown
    Message(String),
    /// Anything else that could be represented as JSON
    Value(Value),
    /// Nothing usable at all
    Unknown,
}

impl ThrownValue {
    /// Best-effort `(message, stack)` extraction. Never fails.
    pub fn coerce(&self) -> (String, Option<String>) {
        let (message, stack) = match self {
            ThrownValue::Error {
                name,
                message,
                stack,
            } => {
                let message = match name.as_deref() {
                    Some(name) if !name.is_empty() && !message.starts_with(name) => {
                        format!("{name}: {message}")
                    }
                    _ => message.clone(),
                };
                (message, stack.clone())
            }
            ThrownValue::Message(message) => (message.clone(), None),
            ThrownValue::Value(value) => coerce_json(value),
            ThrownValue::Unknown => (String::new(), None),
        };

        let message = if message.trim().is_empty() {
            UNKNOWN_ERROR_MESSAGE.to_string()
        } else {
            message
        };
        (message, stack.filter(|s| !s.is_empty()))
    }
}

fn coerce_json(value: &Value) -> (String, Option<String>) {
    match value {
        Value::String(s) => (s.clone(), None),
        Value::Null => (String::new(), None),
        Value::Object(map) => {
            let stack = map.get("stack").and_then(Value::as_str).map(String::from);
            match map.get("message").and_then(Value::as_str) {
                Some(message) => (message.to_string(), stack),
                None => (value.to_string(), stack),
            }
        }
        other => (other.to_string(), None),
    }
}

/// An error as reported by the host environment, before coercion.
#[derive(Debug, Clone, PartialEq)]
pub struct HostError {
    pub thrown: ThrownValue,
    /// Hook or signal name supplied by the host (`mounted`, `unhandledrejection`, ...)
    pub info: Option<String>,
    /// Component name when a UI framework reported the error
    pub component: Option<String>,
    pub url: String,
}

impl HostError {
    pub fn new(thrown: ThrownValue, url: impl Into<String>) -> Self {
        Self {
            thrown,
            info: None,
            component: None,
            url: url.into(),
        }
    }

    /// Sets the host-supplied info
    pub fn with_info(mut self, info: impl Into<String>) -> Self {
        self.info = Some(info.into());
        self
    }

    /// Sets the component name
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }
}
