//! Host error intake
//!
//! A host reports failures through one of a few shapes: a global
//! uncaught-error handler, or the error hook of a UI framework. The shape is
//! probed once at start-up ([`HostCapabilities`]) and fixed as a
//! [`HostAdapter`] for the life of the engine.
//!
//! [`ErrorHook`] is the in-process [`ErrorSource`]: it fans each host error
//! out to every subscriber, including a handler that was installed before
//! the engine attached.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crumbtrail_core::{
    domain::{ErrorInfo, HostError},
    ports::{ErrorHandler, ErrorSource, SubscriptionId},
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// First framework major version whose error hook passes the component
/// separately from the hook info.
pub const MODERN_FRAMEWORK_MAJOR: u32 = 3;

/// What the host environment offers for error reporting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostCapabilities {
    /// Major version of the UI framework, if one is present
    pub framework_version: Option<u32>,
}

impl HostCapabilities {
    /// A host with only the global error handler.
    pub fn global() -> Self {
        Self::default()
    }

    /// A host running framework major version `major`.
    pub fn framework(major: u32) -> Self {
        Self {
            framework_version: Some(major),
        }
    }
}

/// How host errors are turned into [`ErrorInfo`] records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAdapter {
    /// Only the global uncaught-error / rejection signals
    GlobalHandler,
    /// Framework hook receiving `(error, component, info)` with the
    /// component already folded into `info`
    FrameworkLegacy,
    /// Framework hook receiving the component instance separately
    FrameworkModern,
}

impl HostAdapter {
    /// Picks the adapter for `caps`.
    pub fn detect(caps: &HostCapabilities) -> Self {
        match caps.framework_version {
            None => HostAdapter::GlobalHandler,
            Some(major) if major >= MODERN_FRAMEWORK_MAJOR => HostAdapter::FrameworkModern,
            Some(_) => HostAdapter::FrameworkLegacy,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HostAdapter::GlobalHandler => "global",
            HostAdapter::FrameworkLegacy => "framework-legacy",
            HostAdapter::FrameworkModern => "framework-modern",
        }
    }

    /// Coerces `error` into an [`ErrorInfo`]. Never fails.
    pub fn report_through_host(&self, error: &HostError) -> ErrorInfo {
        let (message, stack) = error.thrown.coerce();
        let mut info = ErrorInfo::new(message, error.url.clone());
        if let Some(stack) = stack {
            info = info.with_stack(stack);
        }

        let context = match self {
            HostAdapter::GlobalHandler => error.info.clone(),
            HostAdapter::FrameworkLegacy => match (&error.info, &error.component) {
                (Some(hook), Some(component)) => Some(format!("{hook} in <{component}>")),
                (Some(hook), None) => Some(hook.clone()),
                (None, Some(component)) => Some(format!("<{component}>")),
                (None, None) => None,
            },
            HostAdapter::FrameworkModern => match (&error.info, &error.component) {
                (Some(hook), Some(component)) => Some(format!("{component}: {hook}")),
                (Some(hook), None) => Some(hook.clone()),
                (None, Some(component)) => Some(component.clone()),
                (None, None) => None,
            },
        };

        match context {
            Some(context) if !context.is_empty() => info.with_info(context),
            _ => info,
        }
    }
}

impl std::fmt::Display for HostAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Composable host error hook.
///
/// Handlers run in subscription order. A panicking handler is logged and
/// does not stop the remaining handlers.
#[derive(Default)]
pub struct ErrorHook {
    handlers: Mutex<Vec<(SubscriptionId, ErrorHandler)>>,
}

impl ErrorHook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps a handler the host had installed before any subscriber, so it
    /// still sees every error.
    pub fn with_previous(handler: ErrorHandler) -> Self {
        Self {
            handlers: Mutex::new(vec![(SubscriptionId::new(), handler)]),
        }
    }

    /// Delivers `error` to every subscriber. Returns how many ran to
    /// completion.
    pub fn emit(&self, error: &HostError) -> usize {
        // Handlers may subscribe or unsubscribe, so call them outside the lock.
        let handlers: Vec<ErrorHandler> = self
            .lock()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        let mut completed = 0;
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(error))) {
                Ok(()) => completed += 1,
                Err(_) => warn!(url = %error.url, "Error hook handler panicked"),
            }
        }
        completed
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, ErrorHandler)>> {
        self.handlers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ErrorSource for ErrorHook {
    fn subscribe(&self, handler: ErrorHandler) -> anyhow::Result<SubscriptionId> {
        let id = SubscriptionId::new();
        self.lock().push((id, handler));
        debug!(%id, "Error hook subscribed");
        Ok(id)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.lock();
        let before = handlers.len();
        handlers.retain(|(existing, _)| *existing != id);
        let removed = handlers.len() != before;
        if removed {
            debug!(%id, "Error hook unsubscribed");
        }
        removed
    }
}
