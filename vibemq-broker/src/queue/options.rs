//! Queue configuration: [`DeliveryMode`], [`OverflowStrategy`], [`QueueOptions`],
//! and the wire JSON schema used by the `CreateQueue` control payload (§6).

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use serde::{Deserialize, Serialize};

/// Default maximum queue size (§4.9).
pub const DEFAULT_MAX_QUEUE_SIZE: u32 = 10_000;
/// Default maximum delivery attempts before DLQ escalation (§4.9).
pub const DEFAULT_MAX_RETRY_ATTEMPTS: u32 = 3;

/// Delivery policy, chosen per queue (§4.7, §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeliveryMode {
    /// Successive messages go to successive subscribers, cycling through them.
    RoundRobin,
    /// Every current subscriber receives each message; an ack from any one
    /// of them clears tracking for the whole fan-out (see §9 open question;
    /// resolved in favor of this behavior — see `DESIGN.md`).
    FanOutWithAck,
    /// Every current subscriber receives each message; delivery is untracked.
    FanOutWithoutAck,
    /// Among buffered messages, the highest-priority one is dequeued first,
    /// with FIFO as the tie-break among equal priorities.
    PriorityBased,
}

impl Default for DeliveryMode {
    fn default() -> Self {
        Self::RoundRobin
    }
}

/// The action taken when a queue is full at enqueue time (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverflowStrategy {
    /// Pop the oldest buffered message to make room for the new one.
    DropOldest,
    /// Reject the new message, leaving the buffer unchanged.
    DropNewest,
    /// Reject the new message. §4.7/§9: this behaves identically to
    /// `DropNewest` at the engine level today; it is reserved for a future
    /// asynchronous `enqueue` that would give the publisher real backpressure.
    BlockPublisher,
    /// Reject the new message and mark it for dead-letter redirection,
    /// which the queue manager (not the engine) performs.
    RedirectToDlq,
}

impl Default for OverflowStrategy {
    fn default() -> Self {
        Self::DropOldest
    }
}

/// Per-queue configuration (§3, §4.9).
#[derive(Debug, Clone, PartialEq)]
pub struct QueueOptions {
    /// Delivery discipline for this queue.
    pub mode: DeliveryMode,
    /// Maximum number of buffered messages.
    pub max_queue_size: u32,
    /// Optional time-to-live after which an undelivered message is expired
    /// (see §9 open question; this implementation runs a periodic sweep —
    /// see `DESIGN.md`).
    pub message_ttl: Option<Duration>,
    /// Whether exhausted or rejected messages are dead-lettered.
    pub enable_dead_letter_queue: bool,
    /// Name recorded against dead-lettered entries from this queue.
    pub dead_letter_queue_name: Option<String>,
    /// Action taken when the buffer is full at enqueue time.
    pub overflow_strategy: OverflowStrategy,
    /// Maximum delivery attempts before DLQ escalation.
    pub max_retry_attempts: u32,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::default(),
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            message_ttl: None,
            enable_dead_letter_queue: false,
            dead_letter_queue_name: None,
            overflow_strategy: OverflowStrategy::default(),
            max_retry_attempts: DEFAULT_MAX_RETRY_ATTEMPTS,
        }
    }
}

impl From<QueueOptionsWire> for QueueOptions {
    fn from(wire: QueueOptionsWire) -> Self {
        let defaults = Self::default();
        Self {
            mode: wire.mode.unwrap_or(defaults.mode),
            max_queue_size: wire.max_queue_size.unwrap_or(defaults.max_queue_size),
            message_ttl: wire.message_ttl_seconds.map(Duration::from_secs),
            enable_dead_letter_queue: wire
                .enable_dead_letter_queue
                .unwrap_or(defaults.enable_dead_letter_queue),
            dead_letter_queue_name: wire.dead_letter_queue_name,
            overflow_strategy: wire.overflow_strategy.unwrap_or(defaults.overflow_strategy),
            max_retry_attempts: wire.max_retry_attempts.unwrap_or(defaults.max_retry_attempts),
        }
    }
}

/// The strict JSON schema for the `CreateQueue` control payload (§6, §9:
/// "a small fixed schema that can be parsed with a strict decoder").
/// Every field is optional on the wire; absent fields fall back to
/// [`QueueOptions::default`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct QueueOptionsWire {
    /// Delivery mode, see [`DeliveryMode`].
    pub mode: Option<DeliveryMode>,
    /// Maximum buffered messages.
    pub max_queue_size: Option<u32>,
    /// Message time-to-live, expressed in whole seconds.
    pub message_ttl_seconds: Option<u64>,
    /// Whether to dead-letter exhausted or rejected messages.
    pub enable_dead_letter_queue: Option<bool>,
    /// Dead-letter queue name to record against entries from this queue.
    pub dead_letter_queue_name: Option<String>,
    /// Overflow strategy, see [`OverflowStrategy`].
    pub overflow_strategy: Option<OverflowStrategy>,
    /// Maximum delivery attempts before DLQ escalation.
    pub max_retry_attempts: Option<u32>,
}

impl QueueOptionsWire {
    /// Parse a `CreateQueue` control payload. Unknown fields are rejected
    /// by `deny_unknown_fields` rather than silently ignored.
    pub fn parse(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}
