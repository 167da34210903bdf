//! Queue-engine and queue-manager errors.

use thiserror::Error;

/// Errors surfaced by queue lookups and engine operations.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The named queue does not exist and auto-create is disabled.
    #[error("queue '{0}' does not exist")]
    NotFound(String),
}
