//! Sliding-window rate limiting: connection admission and per-session
//! message throughput (§4.3).

mod connection;
mod message;
mod window;

pub use connection::{ConnectionLimiter, DEFAULT_CAP as DEFAULT_CONNECTION_CAP, DEFAULT_WINDOW as DEFAULT_CONNECTION_WINDOW};
pub use message::{MessageLimiter, DEFAULT_MESSAGE_CAP, MESSAGE_WINDOW};
pub use window::SlidingWindow;
