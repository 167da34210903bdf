//! Connection registry errors.

use thiserror::Error;

/// Errors raised by [`super::ConnectionRegistry`] operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// `admit` was called while the registry was already at capacity (§4.5).
    #[error("connection limit of {limit} reached")]
    ConnectionLimit {
        /// The configured maximum concurrent sessions.
        limit: usize,
    },
}
