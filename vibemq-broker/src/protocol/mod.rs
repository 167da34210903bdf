//! The framed wire protocol: command discriminants, the [`Frame`] shape,
//! and the [`VibeMqCodec`] that turns bytes into frames and back (§4.1, §6).

mod codec;
mod command;
mod error;
mod frame;

pub use codec::VibeMqCodec;
pub use command::CommandType;
pub use error::ProtocolError;
pub use frame::{Frame, DEFAULT_MAX_FRAME_SIZE, PROTOCOL_VERSION};
