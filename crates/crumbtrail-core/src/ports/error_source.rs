//! Host error signal port
//!
//! Hosts expose their error signals (uncaught exceptions, unhandled promise
//! rejections, framework error hooks) through [`ErrorSource`]. Subscribing
//! must compose with handlers that were already registered instead of
//! replacing them, and each subscription can be detached on its own.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::HostError;

/// Callback invoked for every host error.
pub type ErrorHandler = Arc<dyn Fn(&HostError) + Send + Sync>;

/// Identifies one subscription so it can be detached later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriptionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Port trait for observing host errors.
pub trait ErrorSource: Send + Sync {
    /// Adds `handler` alongside any existing handlers.
    fn subscribe(&self, handler: ErrorHandler) -> anyhow::Result<SubscriptionId>;

    /// Removes the handler registered under `id`. Returns `false` if it was
    /// already gone.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;
}
