//! The queue engine: per-queue FIFO/priority buffers with overflow
//! policies and a round-robin index (§3, §4.7, §4.9).

mod engine;
mod error;
mod options;

pub use engine::{EnqueueOutcome, Queue};
pub use error::QueueError;
pub use options::{
    DeliveryMode, OverflowStrategy, QueueOptions, QueueOptionsWire, DEFAULT_MAX_QUEUE_SIZE,
    DEFAULT_MAX_RETRY_ATTEMPTS,
};
