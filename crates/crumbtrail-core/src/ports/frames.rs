//! Render-frame port
//!
//! A [`FrameSource`] yields one event per rendered frame plus page
//! visibility changes. Hosts that do not render (servers, tests) can feed
//! synthetic events.

/// Notification from the host's frame scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameEvent {
    /// A frame is about to be rendered at `at_ms` (host clock)
    Frame { at_ms: u64 },
    /// The page became visible or hidden at `at_ms`
    Visibility { visible: bool, at_ms: u64 },
}

impl FrameEvent {
    pub fn at_ms(&self) -> u64 {
        match self {
            FrameEvent::Frame { at_ms } | FrameEvent::Visibility { at_ms, .. } => *at_ms,
        }
    }
}

/// Port trait for render-frame notifications.
#[async_trait::async_trait]
pub trait FrameSource: Send {
    /// Waits for the next event. `None` means the source has ended.
    async fn next_event(&mut self) -> Option<FrameEvent>;
}
