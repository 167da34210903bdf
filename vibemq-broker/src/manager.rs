//! [`QueueManager`]: the top-level orchestrator owning every queue, the
//! dead-letter buffer, and the ack tracker wiring (§4.9).

// Layer 1: Standard library imports
use std::sync::{Arc, Weak};
use std::time::Duration;

// Layer 2: Third-party crate imports
use bytes::Bytes;
use dashmap::DashMap;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use crate::ack::{AckEventSink, AckTracker, PendingDelivery};
#[cfg(test)]
use crate::ack::{DEFAULT_BASE_RETRY_DELAY, DEFAULT_MAX_RETRY_DELAY};
use crate::dlq::{DeadLetterBuffer, DeadLetterReason};
use crate::message::BrokerMessage;
use crate::monitoring::Monitor;
use crate::protocol::{CommandType, Frame};
use crate::queue::{DeliveryMode, EnqueueOutcome, Queue, QueueError, QueueOptions};
use crate::registry::ConnectionRegistry;

/// Bridges the ack tracker's callbacks back into a [`QueueManager`] it does
/// not own, avoiding a reference cycle (§9: tracker holds an injected
/// sink, the manager owns the tracker).
struct ManagerAckSink(Weak<QueueManager>);

impl AckEventSink for ManagerAckSink {
    fn on_message_expired(&self, message: BrokerMessage) {
        if let Some(manager) = self.0.upgrade() {
            manager.handle_message_expired(message);
        }
    }

    fn on_retry_required(&self, pending: PendingDelivery) {
        if let Some(manager) = self.0.upgrade() {
            manager.handle_retry_required(pending);
        }
    }
}

/// Top-level queue orchestrator (§4.9).
pub struct QueueManager {
    queues: DashMap<String, Arc<Queue>>,
    dlq: DeadLetterBuffer,
    ack_tracker: Arc<AckTracker>,
    registry: Arc<ConnectionRegistry>,
    monitor: Arc<Monitor>,
    auto_create: bool,
}

impl QueueManager {
    /// Build a manager and start its ack tracker's background timer loop.
    /// `auto_create` mirrors §4.9: when true, `publish`/`subscribe` against
    /// an unknown queue create it with broker defaults instead of erroring.
    /// `ack_retry_delays` is the `(base, max)` backoff bound pair the ack
    /// tracker computes `nextRetryAt` from (§4.8), threaded through from
    /// `BrokerConfig::ack_base_retry_delay`/`ack_max_retry_delay` rather
    /// than hardcoded, so a configured non-default value actually takes
    /// effect.
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        monitor: Arc<Monitor>,
        auto_create: bool,
        ack_retry_delays: (Duration, Duration),
    ) -> Arc<Self> {
        let (base_delay, max_delay) = ack_retry_delays;
        let manager = Arc::new_cyclic(|weak: &Weak<QueueManager>| {
            let sink = Arc::new(ManagerAckSink(weak.clone()));
            let ack_tracker = AckTracker::with_delays(sink, base_delay, max_delay);
            Self {
                queues: DashMap::new(),
                dlq: DeadLetterBuffer::new(),
                ack_tracker,
                registry,
                monitor,
                auto_create,
            }
        });
        manager.ack_tracker.start();
        manager
    }

    /// Idempotent queue creation (§4.9): the first call's options win.
    /// Returns the queue that now exists under `name`, new or pre-existing.
    pub fn create_queue(&self, name: &str, options: Option<QueueOptions>) -> Arc<Queue> {
        let queue = Arc::clone(
            self.queues
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Queue::new(name, options.unwrap_or_default())))
                .value(),
        );
        self.monitor.set_active_queues(self.queues.len());
        queue
    }

    /// Remove a queue and drop its buffered and unacknowledged messages
    /// (an operational action, not a delivery guarantee — §4.9).
    pub fn delete_queue(&self, name: &str) -> bool {
        let removed = self.queues.remove(name).is_some();
        self.monitor.set_active_queues(self.queues.len());
        removed
    }

    /// Look up a queue by name without creating it.
    pub fn get_queue(&self, name: &str) -> Option<Arc<Queue>> {
        self.queues.get(name).map(|entry| Arc::clone(entry.value()))
    }

    /// Snapshot of every queue name, for `ListQueues`.
    pub fn queue_names(&self) -> Vec<String> {
        self.queues.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Current number of queues.
    pub fn queue_count(&self) -> usize {
        self.queues.len()
    }

    /// The shared dead-letter buffer.
    pub fn dead_letters(&self) -> &DeadLetterBuffer {
        &self.dlq
    }

    /// The shared ack tracker, for shutdown's pending-count poll (§4.10).
    pub fn ack_tracker(&self) -> &Arc<AckTracker> {
        &self.ack_tracker
    }

    /// Publish `message` (§4.9): look up or auto-create the target queue,
    /// copy `maxRetryAttempts` into the message, enqueue, and deliver.
    pub fn publish(&self, mut message: BrokerMessage) -> Result<(), QueueError> {
        let queue = match self.get_queue(&message.queue) {
            Some(q) => q,
            None if self.auto_create => self.create_queue(&message.queue, None),
            None => return Err(QueueError::NotFound(message.queue.clone())),
        };

        message.max_attempts = queue.options.max_retry_attempts;

        match queue.enqueue(message) {
            EnqueueOutcome::Accepted => {
                self.monitor.record_publish();
                self.deliver(&queue);
                Ok(())
            }
            EnqueueOutcome::Rejected => {
                debug!(queue = %queue.name, "publish rejected by overflow strategy");
                Ok(())
            }
            EnqueueOutcome::RedirectToDlq(rejected) => {
                if queue.options.enable_dead_letter_queue {
                    self.dlq.append(rejected, DeadLetterReason::MaxRetriesExceeded);
                    self.monitor.record_dead_lettered();
                }
                Ok(())
            }
        }
    }

    /// Dispatch buffered messages by delivery mode, using a snapshot of
    /// current subscribers (§4.9).
    pub fn deliver(&self, queue: &Arc<Queue>) {
        let subscribers = self.registry.subscribers_of(&queue.name);
        if subscribers.is_empty() {
            return;
        }

        match queue.options.mode {
            DeliveryMode::RoundRobin | DeliveryMode::PriorityBased => {
                let Some(message) = queue.dequeue() else {
                    return;
                };
                let idx = queue.round_robin_index(subscribers.len());
                let target = &subscribers[idx];
                if self.send_deliver(target, &message).is_ok() {
                    self.ack_tracker.track(message, target.id.clone());
                } else {
                    queue.enqueue(message);
                }
            }
            DeliveryMode::FanOutWithAck => {
                let Some(message) = queue.dequeue() else {
                    return;
                };
                for target in &subscribers {
                    if self.send_deliver(target, &message).is_err() {
                        warn!(session = %target.id, "fan-out send failed");
                    }
                    self.ack_tracker.track(message.clone(), target.id.clone());
                }
            }
            DeliveryMode::FanOutWithoutAck => {
                let Some(message) = queue.dequeue() else {
                    return;
                };
                for target in &subscribers {
                    if self.send_deliver(target, &message).is_err() {
                        warn!(session = %target.id, "fan-out send failed");
                    }
                }
            }
        }
    }

    fn send_deliver(
        &self,
        target: &Arc<crate::registry::ClientSession>,
        message: &BrokerMessage,
    ) -> Result<(), ()> {
        let mut frame = Frame::new(CommandType::Deliver, message.id.clone())
            .with_queue(message.queue.clone())
            .with_headers(message.headers.clone());
        if let Some(payload) = &message.payload {
            frame = frame.with_payload(Bytes::clone(payload));
        }
        target.try_send(frame).map_err(|_| ())?;
        let latency_ms = (chrono::Utc::now() - message.timestamp).num_milliseconds().max(0) as u64;
        self.monitor.record_delivery(latency_ms);
        Ok(())
    }

    /// Acknowledge a message id: first the ack tracker, then every queue's
    /// local unacknowledged index as a fallback (§4.9).
    pub fn acknowledge(&self, message_id: &str) -> bool {
        if self.ack_tracker.acknowledge(message_id) {
            return true;
        }
        self.queues
            .iter()
            .any(|entry| entry.value().acknowledge(message_id))
    }

    /// Sweep every queue for messages that have exceeded their configured
    /// TTL, dead-lettering them with reason `MessageExpired` (§9's resolved
    /// open question). Invoked periodically by the broker's gauge-refresh
    /// loop (§4.10), not on a timer of its own.
    pub fn sweep_expired_messages(&self) {
        for entry in self.queues.iter() {
            let queue = entry.value();
            let Some(ttl) = queue.options.message_ttl else {
                continue;
            };
            for expired in queue.remove_expired(ttl) {
                if queue.options.enable_dead_letter_queue {
                    self.dlq.append(expired, DeadLetterReason::MessageExpired);
                    self.monitor.record_dead_lettered();
                }
            }
        }
    }

    fn handle_message_expired(&self, message: BrokerMessage) {
        let Some(queue) = self.get_queue(&message.queue) else {
            return;
        };
        if queue.options.enable_dead_letter_queue {
            self.dlq.append(message, DeadLetterReason::MaxRetriesExceeded);
            self.monitor.record_dead_lettered();
        }
    }

    fn handle_retry_required(&self, pending: PendingDelivery) {
        let Some(target) = self.registry.get(&pending.client_id) else {
            if let Some(queue) = self.get_queue(&pending.message.queue) {
                queue.enqueue(pending.message);
            }
            return;
        };

        if self.send_deliver(&target, &pending.message).is_err() {
            if let Some(queue) = self.get_queue(&pending.message.queue) {
                queue.enqueue(pending.message);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::queue::OverflowStrategy;
    use std::collections::HashMap;
    use std::net::SocketAddr;

    fn addr() -> SocketAddr {
        "127.0.0.1:9999".parse().unwrap()
    }

    fn setup() -> (Arc<QueueManager>, Arc<ConnectionRegistry>) {
        let registry = Arc::new(ConnectionRegistry::new(10));
        let monitor = Arc::new(Monitor::new());
        let manager = QueueManager::new(
            Arc::clone(&registry),
            monitor,
            true,
            (DEFAULT_BASE_RETRY_DELAY, DEFAULT_MAX_RETRY_DELAY),
        );
        (manager, registry)
    }

    fn publish_msg(manager: &QueueManager, id: &str, queue: &str) {
        manager
            .publish(BrokerMessage::new(id, queue, None, HashMap::new(), 3))
            .unwrap();
    }

    #[test]
    fn publish_auto_creates_queue_and_delivers_to_subscriber() {
        let (manager, registry) = setup();
        let (session, mut rx) = crate::registry::ClientSession::new("s1".to_string(), addr());
        registry.admit(session).unwrap();
        registry.subscribe("orders", "s1");

        publish_msg(&manager, "m1", "orders");

        let frame = rx.try_recv().expect("a deliver frame is queued");
        assert_eq!(frame.command, CommandType::Deliver);
        assert_eq!(frame.id, "m1");
    }

    #[test]
    fn publish_without_subscriber_leaves_message_buffered() {
        let (manager, _registry) = setup();
        publish_msg(&manager, "m1", "orders");
        let queue = manager.get_queue("orders").unwrap();
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn publish_to_missing_queue_without_auto_create_errors() {
        let registry = Arc::new(ConnectionRegistry::new(10));
        let monitor = Arc::new(Monitor::new());
        let manager = QueueManager::new(
            registry,
            monitor,
            false,
            (DEFAULT_BASE_RETRY_DELAY, DEFAULT_MAX_RETRY_DELAY),
        );
        let result = manager.publish(BrokerMessage::new("m1", "orders", None, HashMap::new(), 3));
        assert!(result.is_err());
    }

    #[test]
    fn create_queue_is_idempotent_keeping_first_options() {
        let (manager, _registry) = setup();
        let mut opts = QueueOptions::default();
        opts.max_queue_size = 5;
        manager.create_queue("orders", Some(opts));
        let mut other = QueueOptions::default();
        other.max_queue_size = 99;
        manager.create_queue("orders", Some(other));
        assert_eq!(manager.get_queue("orders").unwrap().options.max_queue_size, 5);
    }

    #[test]
    fn acknowledge_falls_back_to_queue_local_index() {
        let (manager, _registry) = setup();
        manager.create_queue("orders", None);
        let queue = manager.get_queue("orders").unwrap();
        queue.track_unacknowledged(BrokerMessage::new("m1", "orders", None, HashMap::new(), 3));
        assert!(manager.acknowledge("m1"));
    }

    #[test]
    fn redirect_to_dlq_overflow_appends_to_dead_letters() {
        let (manager, _registry) = setup();
        let mut opts = QueueOptions::default();
        opts.max_queue_size = 1;
        opts.overflow_strategy = OverflowStrategy::RedirectToDlq;
        opts.enable_dead_letter_queue = true;
        manager.create_queue("orders", Some(opts));
        publish_msg(&manager, "a", "orders");
        publish_msg(&manager, "b", "orders");
        assert_eq!(manager.dead_letters().len(), 1);
    }

    #[test]
    fn round_robin_delivery_rotates_across_subscribers() {
        let (manager, registry) = setup();
        for i in 0..3 {
            let (session, _rx) = crate::registry::ClientSession::new(format!("s{i}"), addr());
            registry.admit(session).unwrap();
            registry.subscribe("rr", &format!("s{i}"));
        }
        for i in 0..3 {
            publish_msg(&manager, &format!("m{i}"), "rr");
        }
        assert_eq!(manager.get_queue("rr").unwrap().len(), 0);
    }

    #[test]
    fn fan_out_without_ack_does_not_track_delivery() {
        let (manager, registry) = setup();
        let mut opts = QueueOptions::default();
        opts.mode = DeliveryMode::FanOutWithoutAck;
        manager.create_queue("broadcast", Some(opts));
        let (session, _rx) = crate::registry::ClientSession::new("s1".to_string(), addr());
        registry.admit(session).unwrap();
        registry.subscribe("broadcast", "s1");
        publish_msg(&manager, "m1", "broadcast");
        assert!(!manager.ack_tracker().is_tracked("m1"));
    }

    #[test]
    fn sweep_expired_messages_dead_letters_stale_entries() {
        let (manager, _registry) = setup();
        let mut opts = QueueOptions::default();
        opts.message_ttl = Some(std::time::Duration::from_secs(1));
        opts.enable_dead_letter_queue = true;
        manager.create_queue("orders", Some(opts));
        let queue = manager.get_queue("orders").unwrap();

        let mut stale = BrokerMessage::new("stale", "orders", None, HashMap::new(), 3);
        stale.timestamp = chrono::Utc::now() - chrono::Duration::seconds(10);
        queue.enqueue(stale);
        queue.enqueue(BrokerMessage::new("fresh", "orders", None, HashMap::new(), 3));

        manager.sweep_expired_messages();

        assert_eq!(manager.dead_letters().len(), 1);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn sweep_expired_messages_without_ttl_leaves_queue_untouched() {
        let (manager, _registry) = setup();
        manager.create_queue("orders", None);
        publish_msg(&manager, "m1", "orders");
        manager.sweep_expired_messages();
        assert_eq!(manager.get_queue("orders").unwrap().len(), 1);
        assert!(manager.dead_letters().is_empty());
    }

    #[test]
    fn delete_queue_removes_it() {
        let (manager, _registry) = setup();
        manager.create_queue("orders", None);
        assert!(manager.delete_queue("orders"));
        assert!(manager.get_queue("orders").is_none());
    }
}
