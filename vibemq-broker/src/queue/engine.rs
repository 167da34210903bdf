//! [`Queue`]: a named, bounded buffer with a delivery policy (§3, §4.7).

// Layer 1: Standard library imports
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;

// Layer 3: Internal module imports
use super::options::{DeliveryMode, QueueOptions};
use crate::message::BrokerMessage;

/// Result of an [`Queue::enqueue`] call.
#[derive(Debug)]
pub enum EnqueueOutcome {
    /// The message was appended (possibly after evicting the oldest entry
    /// under `DropOldest`).
    Accepted,
    /// The message was rejected; the buffer is unchanged.
    Rejected,
    /// The message was rejected under `RedirectToDlq`; the caller (the
    /// queue manager) is responsible for writing it to the dead-letter
    /// buffer. The rejected message is handed back so no clone is wasted
    /// on the accept path.
    RedirectToDlq(BrokerMessage),
}

/// A named, bounded buffer with a delivery policy (§3).
pub struct Queue {
    /// Queue name.
    pub name: String,
    /// When this queue was created.
    pub created_at: DateTime<Utc>,
    /// Delivery and overflow configuration.
    pub options: QueueOptions,
    buffer: Mutex<VecDeque<BrokerMessage>>,
    unacknowledged: DashMap<String, BrokerMessage>,
    round_robin_cursor: AtomicU64,
}

impl Queue {
    /// Create a new, empty queue with the given options.
    pub fn new(name: impl Into<String>, options: QueueOptions) -> Self {
        Self {
            name: name.into(),
            created_at: Utc::now(),
            options,
            buffer: Mutex::new(VecDeque::new()),
            unacknowledged: DashMap::new(),
            round_robin_cursor: AtomicU64::new(0),
        }
    }

    /// Current number of buffered (undelivered) messages.
    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Whether the buffer currently holds no messages.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `message` to the buffer, applying the configured overflow
    /// strategy if the queue is already at `max_queue_size` (§4.7).
    pub fn enqueue(&self, message: BrokerMessage) -> EnqueueOutcome {
        use super::options::OverflowStrategy::*;

        let mut buffer = self.buffer.lock();
        if buffer.len() < self.options.max_queue_size as usize {
            buffer.push_back(message);
            return EnqueueOutcome::Accepted;
        }

        match self.options.overflow_strategy {
            DropOldest => {
                buffer.pop_front();
                buffer.push_back(message);
                EnqueueOutcome::Accepted
            }
            DropNewest | BlockPublisher => EnqueueOutcome::Rejected,
            RedirectToDlq => EnqueueOutcome::RedirectToDlq(message),
        }
    }

    /// Remove and return one message per the queue's delivery mode (§4.7).
    ///
    /// For every mode but `PriorityBased`, this is a plain FIFO pop. For
    /// `PriorityBased`, the highest-priority message in the buffer is
    /// selected (ties broken by original FIFO order) and the rest are left
    /// in place, in their original relative order.
    pub fn dequeue(&self) -> Option<BrokerMessage> {
        let mut buffer = self.buffer.lock();
        if self.options.mode != DeliveryMode::PriorityBased {
            return buffer.pop_front();
        }

        let best_index = buffer
            .iter()
            .enumerate()
            .max_by_key(|(idx, msg)| (msg.priority, std::cmp::Reverse(*idx)))
            .map(|(idx, _)| idx)?;
        buffer.remove(best_index)
    }

    /// Return `increment(cursor) mod n`, or 0 when there are no subscribers
    /// to index into (§4.7).
    pub fn round_robin_index(&self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        let next = self.round_robin_cursor.fetch_add(1, Ordering::AcqRel);
        (next % n as u64) as usize
    }

    /// Record `message` as delivered but not yet acknowledged, keyed by its
    /// id — a fallback index used alongside the central ack tracker (§4.7).
    pub fn track_unacknowledged(&self, message: BrokerMessage) {
        self.unacknowledged.insert(message.id.clone(), message);
    }

    /// Clear the fallback unacknowledged entry for `id`. Returns `true` if
    /// one was present.
    pub fn acknowledge(&self, id: &str) -> bool {
        self.unacknowledged.remove(id).is_some()
    }

    /// Snapshot of buffered messages, for TTL sweeps and diagnostics.
    /// Messages whose ids are in `expired` are removed from the buffer.
    pub fn remove_expired(&self, ttl: std::time::Duration) -> Vec<BrokerMessage> {
        let mut buffer = self.buffer.lock();
        let mut expired = Vec::new();
        let mut kept = VecDeque::with_capacity(buffer.len());
        for msg in buffer.drain(..) {
            if msg.is_expired(Some(ttl)) {
                expired.push(msg);
            } else {
                kept.push_back(msg);
            }
        }
        *buffer = kept;
        expired
    }
}
