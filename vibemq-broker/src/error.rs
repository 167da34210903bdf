//! Broker-wide error taxonomy (§7).
//!
//! Internally every failure is a concrete, typed variant; only at the
//! protocol boundary (`command` as it's about to become an `Error` frame)
//! does a variant collapse to one of the documented string error codes.
//! Follows the teacher's `SystemError` pattern: a flat `thiserror` enum
//! wrapping component errors via `#[from]`, plus `is_transient`/`is_fatal`
//! helpers.

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
use crate::ack::AckError;
use crate::protocol::ProtocolError;
use crate::queue::QueueError;
use crate::registry::RegistryError;

/// The stable, documented wire error code for an `Error` frame (§6).
pub type ErrorCode = &'static str;

/// `AUTH_REQUIRED`: `Connect` omitted `authToken` while one is configured.
pub const CODE_AUTH_REQUIRED: ErrorCode = "AUTH_REQUIRED";
/// `AUTH_FAILED`: `Connect` presented a token that did not match.
pub const CODE_AUTH_FAILED: ErrorCode = "AUTH_FAILED";
/// `NOT_AUTHENTICATED`: a command other than `Connect`/`Ping` arrived
/// before authentication completed.
pub const CODE_NOT_AUTHENTICATED: ErrorCode = "NOT_AUTHENTICATED";
/// `INVALID_MESSAGE`: the validator rejected the decoded frame.
pub const CODE_INVALID_MESSAGE: ErrorCode = "INVALID_MESSAGE";
/// `INVALID_QUEUE`: the named queue does not exist and auto-create is off.
pub const CODE_INVALID_QUEUE: ErrorCode = "INVALID_QUEUE";
/// `UNKNOWN_COMMAND`: the dispatcher has no handler for the command type.
pub const CODE_UNKNOWN_COMMAND: ErrorCode = "UNKNOWN_COMMAND";
/// `CONNECTION_LIMIT`: the registry or the connection limiter rejected admission.
pub const CODE_CONNECTION_LIMIT: ErrorCode = "CONNECTION_LIMIT";
/// `RATE_LIMITED`: the per-session message limiter rejected a message.
pub const CODE_RATE_LIMITED: ErrorCode = "RATE_LIMITED";

/// Broker-wide error type, aggregating every component's error via `#[from]`.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// Frame decode failure (§4.1). The connection is closed.
    #[error("frame decode failed: {0}")]
    FrameFormat(#[from] ProtocolError),

    /// Validator rejection (§4.2). The connection continues.
    #[error("message invalid: {0}")]
    MessageInvalid(String),

    /// `Connect` omitted a required token.
    #[error("authentication required")]
    AuthRequired,

    /// `Connect` presented a token that did not match the configured one.
    #[error("authentication failed")]
    AuthFailed,

    /// A command arrived before `Connect` succeeded.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Connection or message-rate admission was rejected.
    #[error("rate or connection limit exceeded: {0}")]
    Limit(String),

    /// Publish target queue does not exist and auto-create is disabled.
    #[error("queue missing: {0}")]
    QueueMissing(String),

    /// A per-send transport error during delivery.
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    /// Ack-tracker escalation: retries exhausted.
    #[error("max retries exceeded for message {0}")]
    MaxRetries(String),

    /// Queue-engine error.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Ack-tracker error.
    #[error(transparent)]
    Ack(#[from] AckError),

    /// Connection-registry error.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl BrokerError {
    /// The stable wire error code this error maps to, when it is one the
    /// protocol surfaces to the peer. Errors with no wire representation
    /// (e.g. a delivery-failure logged internally) return `None`.
    pub fn wire_code(&self) -> Option<ErrorCode> {
        match self {
            Self::FrameFormat(_) => None,
            Self::MessageInvalid(_) => Some(CODE_INVALID_MESSAGE),
            Self::AuthRequired => Some(CODE_AUTH_REQUIRED),
            Self::AuthFailed => Some(CODE_AUTH_FAILED),
            Self::NotAuthenticated => Some(CODE_NOT_AUTHENTICATED),
            Self::Limit(_) => Some(CODE_RATE_LIMITED),
            Self::QueueMissing(_) => Some(CODE_INVALID_QUEUE),
            Self::DeliveryFailed(_) => None,
            Self::MaxRetries(_) => None,
            Self::Queue(_) => Some(CODE_INVALID_QUEUE),
            Self::Ack(_) => None,
            Self::Registry(_) => Some(CODE_CONNECTION_LIMIT),
        }
    }

    /// Whether this error should close the connection outright (as opposed
    /// to being reported as an `Error` frame while the session continues).
    /// Matches §7: only frame-decode failures and unrecoverable connection
    /// admission failures close the connection.
    pub fn is_fatal_to_connection(&self) -> bool {
        matches!(self, Self::FrameFormat(_))
    }

    /// Whether this error is expected to resolve itself without operator
    /// intervention (transient backpressure or a momentarily-missing peer).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::DeliveryFailed(_) | Self::Limit(_))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn frame_format_has_no_wire_code() {
        let err = BrokerError::FrameFormat(ProtocolError::EmptyId);
        assert_eq!(err.wire_code(), None);
        assert!(err.is_fatal_to_connection());
    }

    #[test]
    fn auth_failed_maps_to_documented_code() {
        let err = BrokerError::AuthFailed;
        assert_eq!(err.wire_code(), Some(CODE_AUTH_FAILED));
        assert!(!err.is_fatal_to_connection());
    }

    #[test]
    fn not_authenticated_maps_to_documented_code() {
        let err = BrokerError::NotAuthenticated;
        assert_eq!(err.wire_code(), Some(CODE_NOT_AUTHENTICATED));
    }

    #[test]
    fn delivery_failed_is_transient_with_no_wire_code() {
        let err = BrokerError::DeliveryFailed("peer gone".to_string());
        assert!(err.is_transient());
        assert_eq!(err.wire_code(), None);
    }

    #[test]
    fn queue_missing_maps_to_invalid_queue() {
        let err = BrokerError::QueueMissing("orders".to_string());
        assert_eq!(err.wire_code(), Some(CODE_INVALID_QUEUE));
    }
}
