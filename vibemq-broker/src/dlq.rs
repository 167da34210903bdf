//! The dead-letter buffer: an append-only store of messages that failed
//! delivery (§3).

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicUsize, Ordering};

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

// Layer 3: Internal module imports
use crate::message::BrokerMessage;

/// Why a message was dead-lettered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeadLetterReason {
    /// The ack tracker exhausted retries, or the message was never
    /// delivered at all (the queue manager reuses this tag for both —
    /// see §4.9).
    MaxRetriesExceeded,
    /// The message exceeded its queue's configured TTL before delivery.
    MessageExpired,
    /// The message body could not be deserialized (reserved for future
    /// use; the broker currently treats payload as opaque bytes).
    DeserializationError,
    /// A handler raised while processing the message (reserved for future
    /// use; no in-process handler exists in this broker).
    HandlerException,
}

/// A message that failed delivery, with its reason and failure time (§3).
#[derive(Debug, Clone)]
pub struct DeadLetteredMessage {
    /// The message as it stood when dead-lettered.
    pub original_message: BrokerMessage,
    /// Why it was dead-lettered.
    pub reason: DeadLetterReason,
    /// When it was dead-lettered.
    pub failed_at: DateTime<Utc>,
}

/// Append-only FIFO of dead-lettered messages, drainable by operators.
pub struct DeadLetterBuffer {
    entries: Mutex<Vec<DeadLetteredMessage>>,
    total_appended: AtomicUsize,
}

impl DeadLetterBuffer {
    /// Build an empty buffer.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            total_appended: AtomicUsize::new(0),
        }
    }

    /// Append a dead-lettered entry.
    pub fn append(&self, original_message: BrokerMessage, reason: DeadLetterReason) {
        self.entries.lock().push(DeadLetteredMessage {
            original_message,
            reason,
            failed_at: Utc::now(),
        });
        self.total_appended.fetch_add(1, Ordering::Relaxed);
    }

    /// Snapshot every currently held entry without draining it.
    pub fn snapshot(&self) -> Vec<DeadLetteredMessage> {
        self.entries.lock().clone()
    }

    /// Remove and return every currently held entry.
    pub fn drain(&self) -> Vec<DeadLetteredMessage> {
        std::mem::take(&mut *self.entries.lock())
    }

    /// Current number of held entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the buffer currently holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total entries ever appended, including already-drained ones — used
    /// for the lifetime dead-letter counter in metrics.
    pub fn total_appended(&self) -> usize {
        self.total_appended.load(Ordering::Relaxed)
    }
}

impl Default for DeadLetterBuffer {
    fn default() -> Self {
        Self::new()
    }
}
