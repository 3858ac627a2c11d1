//! Error deduplication and throttling
//!
//! Suppresses repeats of the same error (same message, stack and url)
//! within a configurable window.
//!
//! ## Cache layout
//!
//! ```text
//! last_seen: fingerprint -> last accepted at (ms)
//! order:     [(fingerprint, at), ...]   ascending by `at`
//! ```
//!
//! Entries are only ever appended at "now" and the clock is monotonic, so
//! `order` stays sorted. Each call sweeps expired entries from its head,
//! which costs amortized O(1) per call instead of a full scan.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use crumbtrail_core::{domain::ErrorInfo, ports::Clock};
use tracing::debug;

#[derive(Debug, Default)]
struct ThrottleCache {
    last_seen: HashMap<String, u64>,
    order: VecDeque<(String, u64)>,
}

impl ThrottleCache {
    /// Drops every entry last seen strictly more than `window_ms` ago.
    fn sweep(&mut self, now_ms: u64, window_ms: u64) {
        while let Some((_, at)) = self.order.front() {
            if now_ms.saturating_sub(*at) <= window_ms {
                break;
            }
            if let Some((hash, at)) = self.order.pop_front() {
                // A refreshed hash has a newer entry further back in the queue.
                if self.last_seen.get(&hash) == Some(&at) {
                    self.last_seen.remove(&hash);
                }
            }
        }
    }
}

/// Time-windowed suppression cache for incoming error reports.
pub struct ErrorDeduplicator {
    window_ms: u64,
    clock: Arc<dyn Clock>,
    cache: Mutex<ThrottleCache>,
}

impl ErrorDeduplicator {
    /// Creates a deduplicator suppressing repeats for `window_ms`.
    pub fn new(window_ms: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            window_ms,
            clock,
            cache: Mutex::new(ThrottleCache::default()),
        }
    }

    /// Decides whether `info` should be reported.
    ///
    /// Returns `false` when the same fingerprint was accepted less than the
    /// window ago. At exactly the window boundary the error is reportable
    /// again. A suppressed duplicate does not extend its own window.
    pub fn should_report(&self, info: &ErrorInfo) -> bool {
        let hash = info.fingerprint();
        let now = self.clock.now_ms();
        let mut cache = self
            .cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        cache.sweep(now, self.window_ms);

        if let Some(&last_seen) = cache.last_seen.get(&hash) {
            if now.saturating_sub(last_seen) < self.window_ms {
                debug!(
                    message = %info.message,
                    url = %info.url,
                    age_ms = now.saturating_sub(last_seen),
                    "Suppressing duplicate error"
                );
                return false;
            }
        }

        cache.last_seen.insert(hash.clone(), now);
        cache.order.push_back((hash, now));
        true
    }

    /// Releases the window held by `info`, so its next occurrence is reported.
    ///
    /// Used when an accepted error never produced a report.
    pub fn forget(&self, info: &ErrorInfo) {
        let hash = info.fingerprint();
        let mut cache = self
            .cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // The queue slot stays behind; sweep skips slots whose time no longer matches.
        cache.last_seen.remove(&hash);
    }

    /// Number of distinct fingerprints currently tracked.
    pub fn tracked(&self) -> usize {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .last_seen
            .len()
    }

    /// Oldest last-seen time still held, if any.
    pub fn oldest_entry_ms(&self) -> Option<u64> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .last_seen
            .values()
            .min()
            .copied()
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }
}

#[cfg(test)]
mod tests {
    use crumbtrail_core::ports::ManualClock;

    use super::*;

    fn setup(window_ms: u64) -> (Arc<ManualClock>, ErrorDeduplicator) {
        let clock = Arc::new(ManualClock::new(0));
        let dedup = ErrorDeduplicator::new(window_ms, clock.clone());
        (clock, dedup)
    }

    fn error(message: &str, url: &str) -> ErrorInfo {
        ErrorInfo::new(message, url).with_stack("at handler (app.js:10:3)")
    }

    #[test]
    fn test_accept_suppress_accept() {
        let (clock, dedup) = setup(1000);
        let e = error("E", "https://app/");

        assert!(dedup.should_report(&e));
        clock.set(500);
        assert!(!dedup.should_report(&e));
        clock.set(1500);
        assert!(dedup.should_report(&e));
    }

    #[test]
    fn test_boundary_is_reportable() {
        let (clock, dedup) = setup(1000);
        let e = error("E", "https://app/");

        assert!(dedup.should_report(&e));
        clock.set(999);
        assert!(!dedup.should_report(&e));
        clock.set(1000);
        assert!(dedup.should_report(&e));
    }

    #[test]
    fn test_suppression_does_not_refresh_window() {
        let (clock, dedup) = setup(1000);
        let e = error("E", "https://app/");

        assert!(dedup.should_report(&e));
        clock.set(900);
        assert!(!dedup.should_report(&e));
        clock.set(1000);
        assert!(dedup.should_report(&e));
    }

    #[test]
    fn test_url_is_part_of_identity() {
        let (clock, dedup) = setup(1000);
        let a = error("E", "https://app/a");
        let b = error("E", "https://app/b");

        assert!(dedup.should_report(&a));
        assert!(dedup.should_report(&b));
        clock.set(10);
        assert!(!dedup.should_report(&a));
        assert!(!dedup.should_report(&b));
    }

    #[test]
    fn test_different_messages_are_independent() {
        let (_clock, dedup) = setup(1000);
        assert!(dedup.should_report(&error("first", "u")));
        assert!(dedup.should_report(&error("second", "u")));
        assert_eq!(dedup.tracked(), 2);
    }

    #[test]
    fn test_sweep_evicts_expired_entries() {
        let (clock, dedup) = setup(100);
        for n in 0..10 {
            clock.set(n * 10);
            assert!(dedup.should_report(&error(&format!("e{n}"), "u")));
        }
        assert_eq!(dedup.tracked(), 10);

        clock.set(1000);
        assert!(dedup.should_report(&error("fresh", "u")));
        assert_eq!(dedup.tracked(), 1);
    }

    #[test]
    fn test_sweep_invariant_holds_after_every_call() {
        let (clock, dedup) = setup(50);
        let messages = ["a", "b", "c", "a", "d", "b", "a"];
        for (step, message) in messages.iter().cycle().take(60).enumerate() {
            clock.advance(7 + (step as u64 % 5) * 3);
            dedup.should_report(&error(message, "u"));

            let now = clock.now_ms();
            if let Some(oldest) = dedup.oldest_entry_ms() {
                assert!(now - oldest <= dedup.window_ms());
            }
        }
    }

    #[test]
    fn test_forgotten_error_is_reportable_again() {
        let (clock, dedup) = setup(1000);
        let e = error("E", "u");

        assert!(dedup.should_report(&e));
        dedup.forget(&e);
        assert_eq!(dedup.tracked(), 0);
        assert!(dedup.should_report(&e));

        clock.set(500);
        assert!(!dedup.should_report(&e));
        clock.set(1000);
        assert!(dedup.should_report(&e));
        assert_eq!(dedup.tracked(), 1);
    }

    #[test]
    fn test_refreshed_entry_survives_sweep_of_stale_queue_slot() {
        let (clock, dedup) = setup(100);
        let e = error("E", "u");

        assert!(dedup.should_report(&e));
        clock.set(100);
        assert!(dedup.should_report(&e));
        clock.set(150);
        // The stale (t=0) queue slot is swept here; the t=100 acceptance must stay.
        assert!(!dedup.should_report(&e));
        assert_eq!(dedup.tracked(), 1);
    }
}
