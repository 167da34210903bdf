//! The 1-byte command discriminant (§4.1).

use super::error::ProtocolError;

/// A wire command's 1-byte discriminant.
///
/// Mirrors the teacher's `MessageType` style of pairing a fixed-width wire
/// tag with a `TryFrom<u8>` conversion instead of relying on serde for the
/// outer envelope — the length-prefixed binary framing is hand-rolled, only
/// the queue-options and error payloads go through `serde_json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandType {
    /// Client announces itself and authenticates.
    Connect = 0,
    /// Server accepts a `Connect`.
    ConnectAck = 1,
    /// Either side announces a graceful close.
    Disconnect = 2,
    /// Client liveness probe.
    Ping = 10,
    /// Server reply to `Ping`.
    Pong = 11,
    /// Client publishes a message to a queue.
    Publish = 20,
    /// Server acknowledges a `Publish` was accepted.
    PublishAck = 21,
    /// Client subscribes to a queue.
    Subscribe = 22,
    /// Server acknowledges a `Subscribe`.
    SubscribeAck = 23,
    /// Client unsubscribes from a queue.
    Unsubscribe = 24,
    /// Server acknowledges an `Unsubscribe`.
    UnsubscribeAck = 25,
    /// Server delivers a queued message to a subscriber.
    Deliver = 26,
    /// Client acknowledges a delivered message.
    Ack = 30,
    /// Client requests creation of a queue.
    CreateQueue = 40,
    /// Client requests deletion of a queue.
    DeleteQueue = 41,
    /// Client requests queue metadata.
    QueueInfo = 42,
    /// Client requests the full queue listing.
    ListQueues = 43,
    /// Server reports a failure against a prior command.
    Error = 99,
}

impl CommandType {
    /// Recover a `CommandType` from its wire discriminant.
    pub fn from_u8(byte: u8) -> Result<Self, ProtocolError> {
        let cmd = match byte {
            0 => Self::Connect,
            1 => Self::ConnectAck,
            2 => Self::Disconnect,
            10 => Self::Ping,
            11 => Self::Pong,
            20 => Self::Publish,
            21 => Self::PublishAck,
            22 => Self::Subscribe,
            23 => Self::SubscribeAck,
            24 => Self::Unsubscribe,
            25 => Self::UnsubscribeAck,
            26 => Self::Deliver,
            30 => Self::Ack,
            40 => Self::CreateQueue,
            41 => Self::DeleteQueue,
            42 => Self::QueueInfo,
            43 => Self::ListQueues,
            99 => Self::Error,
            other => return Err(ProtocolError::UnknownCommand(other)),
        };
        Ok(cmd)
    }

    /// The wire discriminant for this command.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether this command may be sent before a session has completed
    /// `Connect` (§4.3): only `Connect` itself and `Ping`/`Pong`.
    pub fn allowed_before_auth(self) -> bool {
        matches!(self, Self::Connect | Self::Ping | Self::Pong)
    }
}
