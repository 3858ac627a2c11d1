//! DOM event capture
//!
//! Translates host UI events into breadcrumbs. User-entered text never
//! leaves this module in clear when sensitive-input filtering is on: it is
//! replaced by a `length:<n>` summary before it reaches the recorder.
//!
//! ## Scanner detection
//!
//! Barcode scanners "type" a whole code in a burst and finish with Enter.
//! Printable keys arriving at most [`SCAN_MAX_KEY_INTERVAL_MS`] apart on the
//! same field are buffered; an Enter that closes a burst of at least
//! [`SCAN_MIN_LENGTH`] characters becomes a `scan` breadcrumb. Any slower
//! keystroke starts a new burst.

use std::collections::HashSet;

use crumbtrail_core::domain::{Breadcrumb, DomEvent, ErrorInfo};

/// Largest gap between two scanner keystrokes.
pub const SCAN_MAX_KEY_INTERVAL_MS: u64 = 50;

/// Shortest burst treated as a scan.
pub const SCAN_MIN_LENGTH: usize = 4;

/// Elements whose load failures are reported as errors.
pub const RESOURCE_TAGS: &[&str] = &["script", "link", "img"];

/// Keys that never interrupt a scanner burst.
const MODIFIER_KEYS: &[&str] = &["Shift", "Control", "Alt", "Meta", "CapsLock"];

/// Length-only summary of user-entered text.
pub fn summarize_sensitive(value: &str) -> String {
    format!("length:{}", value.chars().count())
}

/// What a DOM event turned into.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// Record this breadcrumb
    Breadcrumb(Breadcrumb),
    /// Report this error
    Error(ErrorInfo),
    /// Nothing to do
    Ignored,
}

#[derive(Debug)]
struct ScanBurst {
    target: String,
    chars: String,
    last_key_ms: u64,
}

/// Stateful translator from DOM events to breadcrumbs.
#[derive(Debug)]
pub struct InputCapture {
    filter_sensitive: bool,
    composing: HashSet<String>,
    burst: Option<ScanBurst>,
}

impl InputCapture {
    pub fn new(filter_sensitive: bool) -> Self {
        Self {
            filter_sensitive,
            composing: HashSet::new(),
            burst: None,
        }
    }

    /// Handles one event.
    pub fn handle(&mut self, event: DomEvent) -> CaptureOutcome {
        match event {
            DomEvent::Click { target } => CaptureOutcome::Breadcrumb(Breadcrumb::click(target)),

            DomEvent::Input { target, value } => {
                // The composed text is captured once at composition end.
                if self.composing.contains(&target) {
                    return CaptureOutcome::Ignored;
                }
                CaptureOutcome::Breadcrumb(self.text_breadcrumb(Breadcrumb::INPUT, target, &value))
            }

            DomEvent::CompositionStart { target } => {
                self.composing.insert(target);
                CaptureOutcome::Ignored
            }

            DomEvent::CompositionEnd { target, data } => {
                self.composing.remove(&target);
                if data.is_empty() {
                    return CaptureOutcome::Ignored;
                }
                CaptureOutcome::Breadcrumb(self.text_breadcrumb(Breadcrumb::INPUT, target, &data))
            }

            DomEvent::KeyDown { target, key, at_ms } => self.on_key(target, key, at_ms),

            DomEvent::ResourceError { tag, src, page_url } => {
                let tag = tag.to_ascii_lowercase();
                if !RESOURCE_TAGS.contains(&tag.as_str()) {
                    return CaptureOutcome::Ignored;
                }
                CaptureOutcome::Error(
                    ErrorInfo::new(format!("Failed to load {tag}: {src}"), page_url)
                        .with_info("resource"),
                )
            }
        }
    }

    fn on_key(&mut self, target: String, key: String, at_ms: u64) -> CaptureOutcome {
        if MODIFIER_KEYS.contains(&key.as_str()) {
            return CaptureOutcome::Ignored;
        }

        if key == "Enter" {
            let Some(burst) = self.burst.take() else {
                return CaptureOutcome::Ignored;
            };
            let in_burst = burst.target == target
                && at_ms.saturating_sub(burst.last_key_ms) <= SCAN_MAX_KEY_INTERVAL_MS;
            if in_burst && burst.chars.chars().count() >= SCAN_MIN_LENGTH {
                return CaptureOutcome::Breadcrumb(self.text_breadcrumb(
                    Breadcrumb::SCAN,
                    target,
                    &burst.chars,
                ));
            }
            return CaptureOutcome::Ignored;
        }

        let mut chars = key.chars();
        let (Some(ch), None) = (chars.next(), chars.next()) else {
            // Navigation or editing keys mean a human is typing.
            self.burst = None;
            return CaptureOutcome::Ignored;
        };

        match self.burst.as_mut() {
            Some(burst)
                if burst.target == target
                    && at_ms.saturating_sub(burst.last_key_ms) <= SCAN_MAX_KEY_INTERVAL_MS =>
            {
                burst.chars.push(ch);
                burst.last_key_ms = at_ms;
            }
            _ => {
                self.burst = Some(ScanBurst {
                    target,
                    chars: ch.to_string(),
                    last_key_ms: at_ms,
                });
            }
        }
        CaptureOutcome::Ignored
    }

    fn text_breadcrumb(&self, kind: &str, target: String, text: &str) -> Breadcrumb {
        let value = if self.filter_sensitive {
            summarize_sensitive(text)
        } else {
            text.to_string()
        };
        Breadcrumb::new(kind).with_target(target).with_value(value)
    }
}
