//! The broker's internal unit of work: [`BrokerMessage`] and its [`Priority`].
//!
//! A `BrokerMessage` is what lives inside a queue buffer, the ack tracker's
//! pending map, and the dead-letter buffer. It is distinct from the wire
//! [`crate::protocol::Frame`] that carried it in: the frame is transport:
//! commands, queue options payloads, error fields. The message is the
//! payload those commands move around once it's inside the broker.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::fmt;

// Layer 2: Third-party crate imports
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recognized header key carrying the message's delivery priority.
pub const HEADER_PRIORITY: &str = "priority";
/// Recognized header key carrying a client-chosen correlation id.
pub const HEADER_CORRELATION_ID: &str = "correlationId";
/// Recognized header key carrying the bearer token on `Connect`.
pub const HEADER_AUTH_TOKEN: &str = "authToken";
/// Recognized header key carrying the reason for a server-initiated `Disconnect`.
pub const HEADER_REASON: &str = "reason";

/// Maximum number of headers a message may carry (§4.2).
pub const MAX_HEADER_COUNT: usize = 50;
/// Maximum length, in bytes, of a single header value (§4.2).
pub const MAX_HEADER_VALUE_LEN: usize = 4096;
/// Maximum length, in bytes, of a queue name (§3).
pub const MAX_QUEUE_NAME_LEN: usize = 256;

/// Message priority, used by `PriorityBased` queues and derived from the
/// `priority` header (defaulting to [`Priority::Normal`]).
///
/// # Ordering
///
/// `Critical > High > Normal > Low`, matching §8's priority-ordering
/// scenario (Critical, Normal, Low delivered in that order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Priority {
    /// Lowest priority; delivered last under `PriorityBased` mode.
    Low,
    /// Default priority when no `priority` header is present.
    Normal,
    /// Delivered ahead of `Normal` and `Low`.
    High,
    /// Delivered ahead of every other priority.
    Critical,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Normal
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "Low",
            Self::Normal => "Normal",
            Self::High => "High",
            Self::Critical => "Critical",
        };
        write!(f, "{s}")
    }
}

impl Priority {
    /// Parse a `priority` header value. Unrecognized values fall back to
    /// [`Priority::Normal`] rather than rejecting the message — only the
    /// validator (§4.2) rejects messages outright.
    pub fn from_header(value: &str) -> Self {
        match value {
            "Low" => Self::Low,
            "High" => Self::High,
            "Critical" => Self::Critical,
            _ => Self::Normal,
        }
    }

    /// Derive the priority of a message from its headers, defaulting to
    /// [`Priority::Normal`] when the `priority` header is absent.
    pub fn from_headers(headers: &HashMap<String, String>) -> Self {
        headers
            .get(HEADER_PRIORITY)
            .map(|v| Self::from_header(v))
            .unwrap_or_default()
    }
}

/// The broker's internal unit of work (§3).
///
/// Invariants upheld by callers: `id` is immutable once the message is
/// enqueued; `attempts <= max_attempts`; `priority` is preserved across
/// retries (it is computed once at enqueue time and never recomputed).
#[derive(Debug, Clone)]
pub struct BrokerMessage {
    /// Publisher-assigned id, used for ack correlation. Immutable after enqueue.
    pub id: String,

    /// Target queue name.
    pub queue: String,

    /// Opaque JSON payload bytes. The broker never inspects this.
    pub payload: Option<Bytes>,

    /// Headers carried with the message (`priority`, `correlationId`, ...).
    pub headers: HashMap<String, String>,

    /// Delivery priority, derived once from headers at enqueue time.
    pub priority: Priority,

    /// UTC creation time, used to derive delivery latency and TTL expiry.
    pub timestamp: DateTime<Utc>,

    /// Maximum delivery attempts, copied from the owning queue's options
    /// at enqueue time.
    pub max_attempts: u32,

    /// Delivery-attempt counter. Starts at 0, incremented on each retry.
    pub attempts: u32,
}

impl BrokerMessage {
    /// Construct a new message ready for enqueue. `attempts` starts at 0;
    /// `priority` is derived from `headers` once, here, and never recomputed.
    pub fn new(
        id: impl Into<String>,
        queue: impl Into<String>,
        payload: Option<Bytes>,
        headers: HashMap<String, String>,
        max_attempts: u32,
    ) -> Self {
        let priority = Priority::from_headers(&headers);
        Self {
            id: id.into(),
            queue: queue.into(),
            payload,
            headers,
            priority,
            timestamp: Utc::now(),
            max_attempts,
            attempts: 0,
        }
    }

    /// Whether this message has exceeded the queue's TTL, if one was
    /// configured (see `QueueOptions::message_ttl`).
    pub fn is_expired(&self, ttl: Option<std::time::Duration>) -> bool {
        match ttl {
            Some(ttl) => {
                let Ok(ttl) = chrono::Duration::from_std(ttl) else {
                    return false;
                };
                Utc::now().signed_duration_since(self.timestamp) > ttl
            }
            None => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn priority_ordering() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }

    #[test]
    fn priority_default_is_normal() {
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn priority_from_header_unrecognized_is_normal() {
        assert_eq!(Priority::from_header("bogus"), Priority::Normal);
    }

    #[test]
    fn priority_from_headers_present() {
        let mut headers = HashMap::new();
        headers.insert(HEADER_PRIORITY.to_string(), "Critical".to_string());
        assert_eq!(Priority::from_headers(&headers), Priority::Critical);
    }

    #[test]
    fn message_new_sets_defaults() {
        let msg = BrokerMessage::new("id-1", "orders", None, HashMap::new(), 3);
        assert_eq!(msg.attempts, 0);
        assert_eq!(msg.max_attempts, 3);
        assert_eq!(msg.priority, Priority::Normal);
        assert_eq!(msg.id, "id-1");
        assert_eq!(msg.queue, "orders");
    }

    #[test]
    fn message_priority_preserved_from_headers() {
        let mut headers = HashMap::new();
        headers.insert(HEADER_PRIORITY.to_string(), "High".to_string());
        let msg = BrokerMessage::new("id-2", "orders", None, headers, 3);
        assert_eq!(msg.priority, Priority::High);
    }

    #[test]
    fn message_not_expired_without_ttl() {
        let msg = BrokerMessage::new("id-3", "orders", None, HashMap::new(), 3);
        assert!(!msg.is_expired(None));
    }

    #[test]
    fn message_expired_with_past_timestamp() {
        let mut msg = BrokerMessage::new("id-4", "orders", None, HashMap::new(), 3);
        msg.timestamp = Utc::now() - chrono::Duration::seconds(10);
        assert!(msg.is_expired(Some(std::time::Duration::from_secs(1))));
    }

    #[test]
    fn message_not_expired_within_ttl() {
        let msg = BrokerMessage::new("id-5", "orders", None, HashMap::new(), 3);
        assert!(!msg.is_expired(Some(std::time::Duration::from_secs(60))));
    }
}
