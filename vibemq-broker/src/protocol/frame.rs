//! The decoded wire frame (§4.1) and its pure encode/decode functions.
//!
//! Framing is hand-rolled rather than routed through `serde`: a 4-byte
//! big-endian length prefix followed by a fixed field order (version, type,
//! length-prefixed id/queue/payload, length-prefixed header pairs, and an
//! optional error tail). Only the queue-options control payload and the
//! opaque user payload ever go through JSON, and the broker never parses
//! the latter.

// Layer 1: Standard library imports
use std::collections::HashMap;

// Layer 2: Third-party crate imports
use bytes::{Buf, BufMut, Bytes, BytesMut};

// Layer 3: Internal module imports
use super::command::CommandType;
use super::error::ProtocolError;

/// Current wire protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Default maximum frame body size: 1 MiB (§6).
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 1_048_576;

/// A fully decoded wire frame.
///
/// `queue`, `payload`, `error_code`, and `error_message` use length-0 to
/// mean "absent" on the wire; [`Frame`] represents that with `Option`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Protocol version this frame was built for.
    pub version: u8,
    /// The command this frame carries.
    pub command: CommandType,
    /// Caller-assigned correlation id. Never empty.
    pub id: String,
    /// Target or source queue name, when the command carries one.
    pub queue: Option<String>,
    /// Opaque payload bytes (JSON, never parsed by the broker itself).
    pub payload: Option<Bytes>,
    /// Header key/value pairs.
    pub headers: HashMap<String, String>,
    /// Present only on `Error` frames.
    pub error_code: Option<String>,
    /// Present only on `Error` frames.
    pub error_message: Option<String>,
}

impl Frame {
    /// Build a minimal frame with no queue, payload, headers, or error tail.
    pub fn new(command: CommandType, id: impl Into<String>) -> Self {
        Self {
            version: PROTOCOL_VERSION,
            command,
            id: id.into(),
            queue: None,
            payload: None,
            headers: HashMap::new(),
            error_code: None,
            error_message: None,
        }
    }

    /// Build an `Error` frame carrying `code` and `message`, correlated to
    /// the id of the offending command (or a fresh id if there was none).
    pub fn error(id: impl Into<String>, code: impl Into<String>, message: impl Into<String>) -> Self {
        let mut frame = Self::new(CommandType::Error, id);
        frame.error_code = Some(code.into());
        frame.error_message = Some(message.into());
        frame
    }

    /// Attach a queue name, builder-style.
    pub fn with_queue(mut self, queue: impl Into<String>) -> Self {
        self.queue = Some(queue.into());
        self
    }

    /// Attach a payload, builder-style.
    pub fn with_payload(mut self, payload: Bytes) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Attach headers, builder-style.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers = headers;
        self
    }

    /// Encode this frame's body (everything after the 4-byte length prefix)
    /// into `dst`. Does not write the length prefix itself — see
    /// [`super::codec::VibeMqCodec`], which coalesces both into one write.
    pub fn encode_body(&self, dst: &mut BytesMut) {
        dst.put_u8(self.version);
        dst.put_u8(self.command.as_u8());

        put_string16(dst, &self.id);
        put_opt_string16(dst, self.queue.as_deref());
        put_opt_bytes32(dst, self.payload.as_deref());

        dst.put_u16(self.headers.len() as u16);
        for (k, v) in &self.headers {
            put_string16(dst, k);
            put_string16(dst, v);
        }

        if self.command == CommandType::Error {
            put_string16(dst, self.error_code.as_deref().unwrap_or_default());
            put_string16(dst, self.error_message.as_deref().unwrap_or_default());
        }
    }

    /// Decode a frame body (the bytes after the length prefix, exactly
    /// `len` of them) that the codec has already buffered in full.
    pub fn decode_body(mut src: Bytes) -> Result<Self, ProtocolError> {
        let version = get_u8(&mut src)?;
        let command_byte = get_u8(&mut src)?;
        let command = CommandType::from_u8(command_byte)?;

        let id = get_string16(&mut src)?;
        if id.is_empty() {
            return Err(ProtocolError::EmptyId);
        }
        let queue = get_opt_string16(&mut src)?;
        let payload = get_opt_bytes32(&mut src)?;

        let header_count = get_u16(&mut src)? as usize;
        let mut headers = HashMap::with_capacity(header_count);
        for _ in 0..header_count {
            let key = get_string16(&mut src)?;
            let value = get_string16(&mut src)?;
            headers.insert(key, value);
        }

        let (error_code, error_message) = if command == CommandType::Error {
            let code = get_string16(&mut src)?;
            let message = get_string16(&mut src)?;
            (Some(code), Some(message))
        } else {
            (None, None)
        };

        Ok(Self {
            version,
            command,
            id,
            queue,
            payload,
            headers,
            error_code,
            error_message,
        })
    }
}

fn truncated() -> ProtocolError {
    ProtocolError::Truncated { declared: 0 }
}

fn get_u8(src: &mut Bytes) -> Result<u8, ProtocolError> {
    if src.remaining() < 1 {
        return Err(truncated());
    }
    Ok(src.get_u8())
}

fn get_u16(src: &mut Bytes) -> Result<u16, ProtocolError> {
    if src.remaining() < 2 {
        return Err(truncated());
    }
    Ok(src.get_u16())
}

fn get_u32(src: &mut Bytes) -> Result<u32, ProtocolError> {
    if src.remaining() < 4 {
        return Err(truncated());
    }
    Ok(src.get_u32())
}

fn get_string16(src: &mut Bytes) -> Result<String, ProtocolError> {
    let len = get_u16(src)? as usize;
    if src.remaining() < len {
        return Err(truncated());
    }
    let bytes = src.split_to(len);
    Ok(String::from_utf8(bytes.to_vec())?)
}

fn get_opt_string16(src: &mut Bytes) -> Result<Option<String>, ProtocolError> {
    let s = get_string16(src)?;
    Ok(if s.is_empty() { None } else { Some(s) })
}

fn get_opt_bytes32(src: &mut Bytes) -> Result<Option<Bytes>, ProtocolError> {
    let len = get_u32(src)? as usize;
    if src.remaining() < len {
        return Err(truncated());
    }
    let bytes = src.split_to(len);
    Ok(if bytes.is_empty() { None } else { Some(bytes) })
}

fn put_string16(dst: &mut BytesMut, s: &str) {
    dst.put_u16(s.len() as u16);
    dst.put_slice(s.as_bytes());
}

fn put_opt_string16(dst: &mut BytesMut, s: Option<&str>) {
    put_string16(dst, s.unwrap_or_default());
}

fn put_opt_bytes32(dst: &mut BytesMut, b: Option<&[u8]>) {
    let b = b.unwrap_or_default();
    dst.put_u32(b.len() as u32);
    dst.put_slice(b);
}
