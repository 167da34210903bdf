//! Wire-level decode/encode failures.

use thiserror::Error;

/// Errors raised while decoding or encoding a [`super::Frame`] off the wire.
///
/// These are transport-layer failures distinct from [`crate::error::BrokerError`]:
/// a `ProtocolError` means the bytes themselves are malformed, not that a
/// well-formed command was semantically invalid.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// The declared frame length exceeds `max_frame_size`.
    #[error("frame of {size} bytes exceeds the {limit} byte limit")]
    FrameTooLarge {
        /// Declared frame size in bytes.
        size: u32,
        /// Configured maximum.
        limit: u32,
    },

    /// The 1-byte command discriminant did not match a known [`super::CommandType`].
    #[error("unrecognized command discriminant {0}")]
    UnknownCommand(u8),

    /// The queue-options control payload failed to parse.
    #[error("malformed frame body: {0}")]
    MalformedBody(#[from] serde_json::Error),

    /// A length-prefixed string field contained non-UTF-8 bytes.
    #[error("frame field is not valid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    /// The frame's `id` field was present but empty, which §4.1 forbids.
    #[error("frame id must not be empty")]
    EmptyId,

    /// The frame ended before its declared length was reached.
    #[error("frame truncated: declared {declared} bytes, connection closed")]
    Truncated {
        /// Declared length in bytes.
        declared: u32,
    },

    /// Underlying I/O failure while reading or writing the socket.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Whether this error should be reported back to the peer as an `Error`
    /// frame (as opposed to silently closing the connection). Truncation
    /// and I/O errors mean the connection is already unusable.
    pub fn is_reportable(&self) -> bool {
        !matches!(self, Self::Truncated { .. } | Self::Io(_))
    }
}
