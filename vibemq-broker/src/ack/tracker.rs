//! [`AckTracker`]: tracks in-flight deliveries and drives retry/DLQ
//! escalation (§4.8).
//!
//! Event coupling to the queue manager is the explicit-interface form
//! called out in §9's redesign notes: the tracker holds an
//! `Arc<dyn AckEventSink>` it invokes on expiry/retry, rather than the
//! original's two callback properties. Background task lifecycle (spawn
//! on `start`, `JoinHandle` stored for `dispose`) follows the teacher's
//! `ActorSystem` router-task pattern.

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::warn;

// Layer 3: Internal module imports
use super::backoff::{retry_delay, DEFAULT_BASE_RETRY_DELAY, DEFAULT_MAX_RETRY_DELAY};
use super::pending::PendingDelivery;
use crate::message::BrokerMessage;

/// Timer loop cadence (§4.8: "~1 s cadence; 250 ms-2 s is acceptable").
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Explicit interface the queue manager implements and injects into the
/// tracker, replacing the original's callback-property coupling (§9).
pub trait AckEventSink: Send + Sync {
    /// A pending delivery exhausted its retry budget.
    fn on_message_expired(&self, message: BrokerMessage);
    /// A pending delivery's retry is due; the sink re-sends or re-enqueues.
    fn on_retry_required(&self, pending: PendingDelivery);
}

/// Tracks every delivery that requires acknowledgment (§4.8).
pub struct AckTracker {
    pending: DashMap<String, PendingDelivery>,
    sink: Arc<dyn AckEventSink>,
    base_delay: Duration,
    max_delay: Duration,
    disposed: AtomicBool,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AckTracker {
    /// Build a tracker that reports expiry/retry events to `sink`, using
    /// the default backoff bounds (§4.8).
    pub fn new(sink: Arc<dyn AckEventSink>) -> Arc<Self> {
        Self::with_delays(sink, DEFAULT_BASE_RETRY_DELAY, DEFAULT_MAX_RETRY_DELAY)
    }

    /// Build a tracker with explicit backoff bounds.
    pub fn with_delays(sink: Arc<dyn AckEventSink>, base_delay: Duration, max_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            pending: DashMap::new(),
            sink,
            base_delay,
            max_delay,
            disposed: AtomicBool::new(false),
            handle: Mutex::new(None),
        })
    }

    /// Begin tracking `message` as delivered to `client_id`. A duplicate id
    /// is a no-op (§4.8).
    pub fn track(&self, message: BrokerMessage, client_id: impl Into<String>) {
        let id = message.id.clone();
        self.pending
            .entry(id)
            .or_insert_with(|| PendingDelivery::new(message, client_id));
    }

    /// Clear tracking for `id`. Returns `false` if it was not tracked.
    pub fn acknowledge(&self, id: &str) -> bool {
        self.pending.remove(id).is_some()
    }

    /// Whether `id` is currently tracked.
    pub fn is_tracked(&self, id: &str) -> bool {
        self.pending.contains_key(id)
    }

    /// Number of deliveries currently awaiting acknowledgment.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Spawn the background timer loop. Calling `start` more than once
    /// replaces the previous task handle without stopping the old task —
    /// callers should only call this once per tracker instance.
    pub fn start(self: &Arc<Self>) {
        let tracker = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            loop {
                interval.tick().await;
                if tracker.disposed.load(Ordering::Acquire) {
                    break;
                }
                tracker.sweep();
            }
        });
        *self.handle.lock() = Some(handle);
    }

    /// Examine every pending delivery whose retry is due, escalating to DLQ
    /// or firing a retry per §4.8. Fire-and-forget: sink errors are not
    /// possible by construction (the trait methods do not return `Result`),
    /// so there is nothing to log here beyond the sink's own responsibility.
    fn sweep(&self) {
        let now = Utc::now();
        let due: Vec<String> = self
            .pending
            .iter()
            .filter(|entry| entry.next_retry_at <= now)
            .map(|entry| entry.key().clone())
            .collect();

        for id in due {
            let Some((_, mut pending)) = self.pending.remove(&id) else {
                continue;
            };

            if pending.attempts >= pending.message.max_attempts {
                self.sink.on_message_expired(pending.message);
                continue;
            }

            pending.attempts += 1;
            pending.next_retry_at = now
                + chrono::Duration::from_std(retry_delay(pending.attempts, self.base_delay, self.max_delay))
                    .unwrap_or_else(|_| chrono::Duration::zero());
            self.pending.insert(id, pending.clone());
            self.sink.on_retry_required(pending);
        }
    }

    /// Stop the background timer loop and drop all pending entries. The
    /// join handle is not awaited — shutdown callers poll `pending_count`
    /// themselves (§4.10) rather than blocking on this task's exit.
    pub fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        if let Some(handle) = self.handle.lock().take() {
            handle.abort();
        }
        self.pending.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    struct RecordingSink {
        expired: Mutex<Vec<String>>,
        retried: AtomicUsize,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                expired: Mutex::new(Vec::new()),
                retried: AtomicUsize::new(0),
            })
        }
    }

    impl AckEventSink for RecordingSink {
        fn on_message_expired(&self, message: BrokerMessage) {
            self.expired.lock().push(message.id);
        }

        fn on_retry_required(&self, _pending: PendingDelivery) {
            self.retried.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn msg(id: &str, max_attempts: u32) -> BrokerMessage {
        BrokerMessage::new(id, "q", None, HashMap::new(), max_attempts)
    }

    #[test]
    fn track_is_idempotent_for_duplicate_ids() {
        let sink = RecordingSink::new();
        let tracker = AckTracker::new(sink);
        tracker.track(msg("a", 3), "client-1");
        tracker.track(msg("a", 3), "client-1");
        assert_eq!(tracker.pending_count(), 1);
    }

    #[test]
    fn acknowledge_unknown_id_returns_false() {
        let sink = RecordingSink::new();
        let tracker = AckTracker::new(sink);
        assert!(!tracker.acknowledge("missing"));
    }

    #[test]
    fn acknowledge_removes_tracking() {
        let sink = RecordingSink::new();
        let tracker = AckTracker::new(sink);
        tracker.track(msg("a", 3), "client-1");
        assert!(tracker.acknowledge("a"));
        assert!(!tracker.is_tracked("a"));
        assert!(!tracker.acknowledge("a"));
    }

    #[test]
    fn with_delays_uses_configured_bounds_instead_of_defaults() {
        let sink = RecordingSink::new();
        let tracker = AckTracker::with_delays(sink, Duration::from_secs(30), Duration::from_secs(60));
        let mut pending = PendingDelivery::new(msg("a", 3), "client-1");
        pending.next_retry_at = Utc::now() - chrono::Duration::seconds(1);
        tracker.pending.insert("a".to_string(), pending);
        let before = Utc::now();
        tracker.sweep();
        let entry = tracker.pending.get("a").expect("still tracked after first retry");
        let wait = entry.next_retry_at - before;
        assert!(wait >= chrono::Duration::seconds(29) && wait <= chrono::Duration::seconds(30));
    }

    #[test]
    fn sweep_fires_retry_when_not_yet_at_max_attempts() {
        let sink = RecordingSink::new();
        let tracker = AckTracker::new(Arc::clone(&sink) as Arc<dyn AckEventSink>);
        let mut pending = PendingDelivery::new(msg("a", 3), "client-1");
        pending.next_retry_at = Utc::now() - chrono::Duration::seconds(1);
        tracker.pending.insert("a".to_string(), pending);
        tracker.sweep();
        assert_eq!(sink.retried.load(Ordering::Relaxed), 1);
        assert!(tracker.is_tracked("a"));
    }

    #[test]
    fn sweep_expires_to_dlq_at_max_attempts() {
        let sink = RecordingSink::new();
        let tracker = AckTracker::new(Arc::clone(&sink) as Arc<dyn AckEventSink>);
        let mut pending = PendingDelivery::new(msg("a", 1), "client-1");
        pending.attempts = 1;
        pending.next_retry_at = Utc::now() - chrono::Duration::seconds(1);
        tracker.pending.insert("a".to_string(), pending);
        tracker.sweep();
        assert_eq!(sink.expired.lock().as_slice(), ["a".to_string()]);
        assert!(!tracker.is_tracked("a"));
    }

    #[test]
    fn dispose_clears_pending_entries() {
        let sink = RecordingSink::new();
        let tracker = AckTracker::new(sink);
        tracker.track(msg("a", 3), "client-1");
        tracker.dispose();
        assert_eq!(tracker.pending_count(), 0);
    }
}
