//! A generic sliding-window counter, the shared primitive behind both the
//! connection-admission and per-session message limiters (§4.3).
//!
//! Grounded in the teacher's `RestartBackoff` sliding window (a `VecDeque`
//! of timestamps, pruned lazily on access) — the same eviction shape,
//! generalized from restart-counting into an admission check.

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};

/// A FIFO of event timestamps within a sliding window, used to decide
/// whether one more event may be admitted right now.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    window: Duration,
    cap: u32,
    events: VecDeque<DateTime<Utc>>,
}

impl SlidingWindow {
    /// Build a window of length `window` admitting at most `cap` events
    /// within any `window`-long span.
    pub fn new(window: Duration, cap: u32) -> Self {
        Self {
            window,
            cap,
            events: VecDeque::new(),
        }
    }

    /// Evict events older than the window, then try to admit one more.
    /// Returns `true` and records the event if under `cap`; `false`
    /// (without recording) if at capacity.
    pub fn try_admit(&mut self) -> bool {
        self.evict_expired();
        if self.events.len() >= self.cap as usize {
            return false;
        }
        self.events.push_back(Utc::now());
        true
    }

    /// Number of events currently counted within the window.
    pub fn count(&mut self) -> usize {
        self.evict_expired();
        self.events.len()
    }

    fn evict_expired(&mut self) {
        let Ok(window) = chrono::Duration::from_std(self.window) else {
            return;
        };
        let cutoff = Utc::now() - window;
        while let Some(front) = self.events.front() {
            if *front < cutoff {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admits_up_to_cap() {
        let mut w = SlidingWindow::new(Duration::from_secs(60), 2);
        assert!(w.try_admit());
        assert!(w.try_admit());
        assert!(!w.try_admit());
    }

    #[test]
    fn count_reflects_admitted_events() {
        let mut w = SlidingWindow::new(Duration::from_secs(60), 5);
        w.try_admit();
        w.try_admit();
        assert_eq!(w.count(), 2);
    }

    #[test]
    fn expired_events_are_evicted() {
        let mut w = SlidingWindow::new(Duration::from_millis(1), 1);
        assert!(w.try_admit());
        std::thread::sleep(Duration::from_millis(5));
        assert!(w.try_admit());
    }

    #[test]
    fn zero_cap_never_admits() {
        let mut w = SlidingWindow::new(Duration::from_secs(60), 0);
        assert!(!w.try_admit());
    }
}
