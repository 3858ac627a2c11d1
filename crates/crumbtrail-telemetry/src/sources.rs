//! In-process adapters for the frame and performance ports
//!
//! - [`ChannelFrameSource`]: frames pushed by the host through a channel
//! - [`IntervalFrameSource`]: fixed-rate ticks for hosts without a renderer
//! - [`ChannelPerformanceSource`]: entries pushed by the host per category

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crumbtrail_core::ports::{
    Clock, FrameEvent, FrameSource, MetricCategory, ObserveError, PerformanceEntry,
    PerformanceSource,
};
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};

/// Frame source fed through an unbounded channel.
pub struct ChannelFrameSource {
    events: mpsc::UnboundedReceiver<FrameEvent>,
}

impl ChannelFrameSource {
    /// Returns the source and the sender the host pushes events into.
    /// Dropping every sender ends the source.
    pub fn new() -> (Self, mpsc::UnboundedSender<FrameEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { events: rx }, tx)
    }
}

#[async_trait::async_trait]
impl FrameSource for ChannelFrameSource {
    async fn next_event(&mut self) -> Option<FrameEvent> {
        self.events.recv().await
    }
}

/// Ticks at a fixed period, reading times from `clock`. The page is always
/// considered visible.
///
/// A late tick (for example a stalled executor) shows up as a long frame.
pub struct IntervalFrameSource {
    interval: Interval,
    clock: Arc<dyn Clock>,
}

impl IntervalFrameSource {
    /// Default period, roughly one 60 Hz frame.
    pub const DEFAULT_PERIOD: Duration = Duration::from_millis(16);

    /// Must be called from within a Tokio runtime.
    pub fn new(period: Duration, clock: Arc<dyn Clock>) -> Self {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval, clock }
    }
}

#[async_trait::async_trait]
impl FrameSource for IntervalFrameSource {
    async fn next_event(&mut self) -> Option<FrameEvent> {
        self.interval.tick().await;
        Some(FrameEvent::Frame {
            at_ms: self.clock.now_ms(),
        })
    }
}

/// Performance source fed by the host, one channel per subscription.
pub struct ChannelPerformanceSource {
    available: bool,
    unsupported: HashSet<MetricCategory>,
    subscribers: Mutex<HashMap<MetricCategory, Vec<mpsc::UnboundedSender<PerformanceEntry>>>>,
}

impl ChannelPerformanceSource {
    /// A source supporting every category.
    pub fn new() -> Self {
        Self {
            available: true,
            unsupported: HashSet::new(),
            subscribers: Mutex::new(HashMap::new()),
        }
    }

    /// A host with no performance observation at all.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Marks `category` as unsupported.
    pub fn without(mut self, category: MetricCategory) -> Self {
        self.unsupported.insert(category);
        self
    }

    /// Delivers `entry` to every live subscriber of `category`.
    /// Returns `false` when nobody received it.
    pub fn push(&self, category: MetricCategory, entry: PerformanceEntry) -> bool {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let Some(senders) = subscribers.get_mut(&category) else {
            return false;
        };
        senders.retain(|tx| tx.send(entry.clone()).is_ok());
        !senders.is_empty()
    }
}

impl Default for ChannelPerformanceSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PerformanceSource for ChannelPerformanceSource {
    fn observe(
        &self,
        category: MetricCategory,
    ) -> Result<mpsc::UnboundedReceiver<PerformanceEntry>, ObserveError> {
        if !self.available {
            return Err(ObserveError::Unavailable);
        }
        if self.unsupported.contains(&category) {
            return Err(ObserveError::Unsupported(category));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(category)
            .or_default()
            .push(tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use crumbtrail_core::ports::ManualClock;

    use super::*;

    #[tokio::test]
    async fn test_channel_frame_source_ends_when_sender_dropped() {
        let (mut source, tx) = ChannelFrameSource::new();
        tx.send(FrameEvent::Frame { at_ms: 5 }).unwrap();
        drop(tx);
        assert_eq!(source.next_event().await, Some(FrameEvent::Frame { at_ms: 5 }));
        assert_eq!(source.next_event().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_source_reads_clock() {
        let clock = Arc::new(ManualClock::new(40));
        let mut source = IntervalFrameSource::new(Duration::from_millis(16), clock.clone());
        assert_eq!(source.next_event().await, Some(FrameEvent::Frame { at_ms: 40 }));
        clock.advance(16);
        assert_eq!(source.next_event().await, Some(FrameEvent::Frame { at_ms: 56 }));
    }

    #[test]
    fn test_performance_source_errors() {
        let source = ChannelPerformanceSource::new().without(MetricCategory::FirstInput);
        assert!(source.observe(MetricCategory::Paint).is_ok());
        assert_eq!(
            source.observe(MetricCategory::FirstInput).unwrap_err(),
            ObserveError::Unsupported(MetricCategory::FirstInput)
        );

        let none = ChannelPerformanceSource::unavailable();
        assert_eq!(
            none.observe(MetricCategory::Paint).unwrap_err(),
            ObserveError::Unavailable
        );
    }

    #[test]
    fn test_push_drops_closed_subscribers() {
        let source = ChannelPerformanceSource::new();
        let entry = PerformanceEntry {
            name: "x".into(),
            start_time: 0.0,
            duration: 1.0,
        };
        assert!(!source.push(MetricCategory::Paint, entry.clone()));

        let mut rx = source.observe(MetricCategory::Paint).unwrap();
        assert!(source.push(MetricCategory::Paint, entry.clone()));
        assert_eq!(rx.try_recv().unwrap(), entry);

        drop(rx);
        assert!(!source.push(MetricCategory::Paint, entry));
    }
}
