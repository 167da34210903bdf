//! [`VibeMqCodec`]: the `tokio_util::codec::{Encoder, Decoder}` pair that
//! turns a byte stream into a stream of [`Frame`]s, for use with
//! `tokio_util::codec::Framed`.
//!
//! Grounded in the `other_examples` pithecene connection module's framed
//! codec, generalized from its fixed command set to VibeMQ's frame shape.

// Layer 2: Third-party crate imports
use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

// Layer 3: Internal module imports
use super::error::ProtocolError;
use super::frame::{Frame, DEFAULT_MAX_FRAME_SIZE};

const LENGTH_PREFIX_BYTES: usize = 4;

/// Length-prefixed frame codec (§4.1): a 4-byte big-endian body length
/// followed by that many body bytes.
#[derive(Debug, Clone)]
pub struct VibeMqCodec {
    max_frame_size: u32,
}

impl VibeMqCodec {
    /// Build a codec enforcing `max_frame_size` as the largest acceptable
    /// declared body length.
    pub fn new(max_frame_size: u32) -> Self {
        Self { max_frame_size }
    }
}

impl Default for VibeMqCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl Decoder for VibeMqCodec {
    type Item = Frame;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
        if src.len() < LENGTH_PREFIX_BYTES {
            return Ok(None);
        }

        let declared = u32::from_be_bytes(src[..LENGTH_PREFIX_BYTES].try_into().unwrap_or([0; 4]));
        if declared == 0 || declared > self.max_frame_size {
            return Err(ProtocolError::FrameTooLarge {
                size: declared,
                limit: self.max_frame_size,
            });
        }
        let total_len = LENGTH_PREFIX_BYTES + declared as usize;

        if src.len() < total_len {
            src.reserve(total_len - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_BYTES);
        let body = src.split_to(declared as usize).freeze();
        Frame::decode_body(body).map(Some)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
        if src.is_empty() {
            return Ok(None);
        }
        Err(ProtocolError::Truncated {
            declared: src.len() as u32,
        })
    }
}

impl Encoder<Frame> for VibeMqCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let mut body = BytesMut::new();
        item.encode_body(&mut body);

        if body.len() as u64 > self.max_frame_size as u64 {
            return Err(ProtocolError::FrameTooLarge {
                size: body.len() as u32,
                limit: self.max_frame_size,
            });
        }

        dst.reserve(LENGTH_PREFIX_BYTES + body.len());
        dst.extend_from_slice(&(body.len() as u32).to_be_bytes());
        dst.extend_from_slice(&body);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::protocol::command::CommandType;

    #[test]
    fn encode_then_decode_yields_original_frame() {
        let mut codec = VibeMqCodec::default();
        let frame = Frame::new(CommandType::Ping, "ping-1");
        let mut buf = BytesMut::new();
        codec.encode(frame.clone(), &mut buf).expect("encodes");
        let decoded = codec.decode(&mut buf).expect("decodes").expect("frame ready");
        assert_eq!(decoded, frame);
    }

    #[test]
    fn decode_returns_none_on_partial_length_prefix() {
        let mut codec = VibeMqCodec::default();
        let mut buf = BytesMut::from(&[0u8, 0][..]);
        assert!(codec.decode(&mut buf).expect("no error").is_none());
    }

    #[test]
    fn decode_returns_none_on_partial_body() {
        let mut codec = VibeMqCodec::default();
        let frame = Frame::new(CommandType::Ping, "ping-1");
        let mut full = BytesMut::new();
        codec.encode(frame, &mut full).expect("encodes");
        let mut partial = BytesMut::from(&full[..full.len() - 1]);
        assert!(codec.decode(&mut partial).expect("no error").is_none());
    }

    #[test]
    fn decode_rejects_oversized_declared_length() {
        let mut codec = VibeMqCodec::new(16);
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&100u32.to_be_bytes());
        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[test]
    fn decode_rejects_zero_length_frame() {
        let mut codec = VibeMqCodec::default();
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&0u32.to_be_bytes());
        let result = codec.decode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[test]
    fn decode_eof_on_trailing_bytes_is_truncated() {
        let mut codec = VibeMqCodec::default();
        let mut buf = BytesMut::from(&b"\x00\x00"[..]);
        let result = codec.decode_eof(&mut buf);
        assert!(matches!(result, Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn decode_eof_on_empty_buffer_is_clean_end() {
        let mut codec = VibeMqCodec::default();
        let mut buf = BytesMut::new();
        assert!(codec.decode_eof(&mut buf).expect("no error").is_none());
    }

    #[test]
    fn decodes_two_frames_delivered_in_one_chunk() {
        let mut codec = VibeMqCodec::default();
        let a = Frame::new(CommandType::Ping, "a");
        let b = Frame::new(CommandType::Pong, "b");
        let mut buf = BytesMut::new();
        codec.encode(a.clone(), &mut buf).expect("encodes");
        codec.encode(b.clone(), &mut buf).expect("encodes");
        let first = codec.decode(&mut buf).expect("ok").expect("frame");
        let second = codec.decode(&mut buf).expect("ok").expect("frame");
        assert_eq!(first, a);
        assert_eq!(second, b);
    }
}
