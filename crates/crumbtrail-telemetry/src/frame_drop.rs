//! Frame-drop detection
//!
//! Every render frame is compared with the previous one. A gap above
//! [`FRAME_DROP_THRESHOLD_MS`] on a visible page counts as a dropped frame.
//! Drops are accumulated and emitted trailing-edge: the first drop opens a
//! [`FRAME_DROP_THROTTLE_MS`] window, and when it closes one breadcrumb
//! reports the latest gap and the number of drops seen since the last
//! emission.
//!
//! While the page is hidden the reference time tracks "now", and the first
//! frame after the page becomes visible again is never counted, so the
//! hidden interval cannot show up as a drop.

use std::sync::Arc;
use std::time::Duration;

use crumbtrail_core::{
    domain::Breadcrumb,
    ports::{FrameEvent, FrameSource},
};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{metrics::MetricsRegistry, recorder::BreadcrumbRecorder};

/// Frame gap above which a frame counts as dropped.
pub const FRAME_DROP_THRESHOLD_MS: u64 = 50;

/// Trailing-edge emission window.
pub const FRAME_DROP_THROTTLE_MS: u64 = 100;

/// Breadcrumb target used for frame-drop breadcrumbs.
pub const FRAME_DROP_TARGET: &str = "frame-drop";

/// Drops accumulated over one emission window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameDropSummary {
    /// Most recent qualifying frame gap in milliseconds
    pub frame_time: u64,
    /// Qualifying drops since the previous emission
    pub count: u32,
}

impl FrameDropSummary {
    /// `performance` breadcrumb targeting `frame-drop`.
    pub fn to_breadcrumb(&self) -> Breadcrumb {
        let value = serde_json::json!({ "frameTime": self.frame_time, "count": self.count });
        Breadcrumb::performance(FRAME_DROP_TARGET, value.to_string())
    }
}

#[derive(Debug)]
struct PendingDrops {
    summary: FrameDropSummary,
    flush_at_ms: u64,
}

/// Pure frame-drop state machine. Time only enters through its arguments.
#[derive(Debug)]
pub struct FrameDropDetector {
    threshold_ms: u64,
    throttle_ms: u64,
    last_frame_ms: Option<u64>,
    visible: bool,
    resync: bool,
    pending: Option<PendingDrops>,
}

impl FrameDropDetector {
    pub fn new() -> Self {
        Self::with_limits(FRAME_DROP_THRESHOLD_MS, FRAME_DROP_THROTTLE_MS)
    }

    pub fn with_limits(threshold_ms: u64, throttle_ms: u64) -> Self {
        Self {
            threshold_ms,
            throttle_ms,
            last_frame_ms: None,
            visible: true,
            resync: false,
            pending: None,
        }
    }

    /// Feeds one event. Returns `true` when a dropped frame was counted.
    pub fn on_event(&mut self, event: FrameEvent) -> bool {
        match event {
            FrameEvent::Frame { at_ms } => self.on_frame(at_ms),
            FrameEvent::Visibility { visible, at_ms } => {
                self.on_visibility(visible, at_ms);
                false
            }
        }
    }

    /// Handles one frame tick at `at_ms`.
    pub fn on_frame(&mut self, at_ms: u64) -> bool {
        let previous = self.last_frame_ms.replace(at_ms);

        if !self.visible || std::mem::take(&mut self.resync) {
            return false;
        }
        let Some(previous) = previous else {
            return false;
        };

        let delta = at_ms.saturating_sub(previous);
        if delta <= self.threshold_ms {
            return false;
        }

        let throttle_ms = self.throttle_ms;
        let pending = self.pending.get_or_insert_with(|| PendingDrops {
            summary: FrameDropSummary {
                frame_time: delta,
                count: 0,
            },
            flush_at_ms: at_ms + throttle_ms,
        });
        pending.summary.frame_time = delta;
        pending.summary.count += 1;
        true
    }

    /// Handles a visibility change at `at_ms`.
    pub fn on_visibility(&mut self, visible: bool, at_ms: u64) {
        self.last_frame_ms = Some(at_ms);
        if visible && !self.visible {
            self.resync = true;
        }
        self.visible = visible;
    }

    /// When the pending window closes, if any drops are pending.
    pub fn next_flush_at(&self) -> Option<u64> {
        self.pending.as_ref().map(|p| p.flush_at_ms)
    }

    /// Takes the pending summary if its window has closed by `now_ms`.
    pub fn flush_due(&mut self, now_ms: u64) -> Option<FrameDropSummary> {
        match &self.pending {
            Some(p) if p.flush_at_ms <= now_ms => self.pending.take().map(|p| p.summary),
            _ => None,
        }
    }

    /// Takes the pending summary regardless of its window.
    pub fn take_pending(&mut self) -> Option<FrameDropSummary> {
        self.pending.take().map(|p| p.summary)
    }

    /// Length of the trailing emission window.
    pub fn throttle(&self) -> Duration {
        Duration::from_millis(self.throttle_ms)
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }
}

impl Default for FrameDropDetector {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Frame loop
// ============================================================================

/// Drives `detector` from `frames` until the source ends or `shutdown` fires.
///
/// Pending drops are emitted when their window closes, either on the next
/// frame past the deadline or by timer when no frames arrive. Frame stamps
/// only ever compare with each other; the idle timer is a runtime deadline
/// armed when the window opens. When the source ends, anything still
/// pending is emitted; on cancellation it is discarded.
pub(crate) async fn run_frame_loop(
    mut frames: Box<dyn FrameSource>,
    mut detector: FrameDropDetector,
    recorder: Arc<BreadcrumbRecorder>,
    metrics: Arc<MetricsRegistry>,
    shutdown: CancellationToken,
) {
    info!("Frame-drop detector started");

    let emit = |summary: FrameDropSummary| {
        debug!(
            frame_time_ms = summary.frame_time,
            count = summary.count,
            "Recording frame-drop breadcrumb"
        );
        recorder.record(summary.to_breadcrumb());
    };

    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                if let Some(dropped) = detector.take_pending() {
                    debug!(count = dropped.count, "Discarding pending frame drops on shutdown");
                }
                break;
            }

            event = frames.next_event() => {
                let Some(event) = event else {
                    if let Some(summary) = detector.take_pending() {
                        emit(summary);
                    }
                    info!("Frame source ended");
                    break;
                };

                if let Some(summary) = detector.flush_due(event.at_ms()) {
                    emit(summary);
                    deadline = None;
                }
                if detector.on_event(event) {
                    metrics.record_frame_drop();
                    if deadline.is_none() {
                        deadline = Some(Instant::now() + detector.throttle());
                    }
                }
            }

            _ = sleep_until_deadline(deadline), if deadline.is_some() => {
                deadline = None;
                if let Some(summary) = detector.take_pending() {
                    emit(summary);
                }
            }
        }
    }

    info!("Frame-drop detector stopped");
}

async fn sleep_until_deadline(deadline: Option<Instant>) {
    if let Some(deadline) = deadline {
        tokio::time::sleep_until(deadline).await;
    }
}
