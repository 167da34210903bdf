//! Ack-tracker errors.

use thiserror::Error;

/// Errors surfaced by [`super::AckTracker`] operations. Currently there are
/// none the tracker raises to its caller — `track`/`acknowledge` encode
/// their outcomes as no-ops or booleans per §4.8 — but the type exists so
/// [`crate::error::BrokerError`] has a stable `#[from]` target if that
/// changes.
#[derive(Debug, Error)]
pub enum AckError {
    /// The tracker's background timer task has already been disposed.
    #[error("ack tracker has been disposed")]
    Disposed,
}
