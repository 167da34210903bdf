//! The acknowledgment tracker: in-flight delivery tracking, retry backoff,
//! and DLQ escalation (§4.8).

mod backoff;
mod error;
mod pending;
mod tracker;

pub use backoff::{retry_delay, DEFAULT_BASE_RETRY_DELAY, DEFAULT_MAX_RETRY_DELAY};
pub use error::AckError;
pub use pending::PendingDelivery;
pub use tracker::{AckEventSink, AckTracker, TICK_INTERVAL};
