//! [`PendingDelivery`]: an ack-tracker entry (§3).

use chrono::{DateTime, Utc};

use crate::message::BrokerMessage;

/// An in-flight delivery awaiting acknowledgment.
#[derive(Debug, Clone)]
pub struct PendingDelivery {
    /// The delivered message.
    pub message: BrokerMessage,
    /// The session it was delivered to.
    pub client_id: String,
    /// When it was first delivered.
    pub delivered_at: DateTime<Utc>,
    /// Local retry counter (distinct from `message.attempts`, which the
    /// queue manager owns; this one drives the tracker's own backoff).
    pub attempts: u32,
    /// Earliest time the tracker's timer loop should retry this delivery.
    pub next_retry_at: DateTime<Utc>,
}

impl PendingDelivery {
    /// Start tracking a freshly delivered message with zero retries so far.
    pub fn new(message: BrokerMessage, client_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            message,
            client_id: client_id.into(),
            delivered_at: now,
            attempts: 0,
            next_retry_at: now,
        }
    }
}
