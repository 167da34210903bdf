//! Shared bearer-token authentication (§4.4).

use crate::message::HEADER_AUTH_TOKEN;
use crate::protocol::{CommandType, Frame};

/// The outcome of checking a `Connect` frame against the configured token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// No token is configured, or the presented token matched.
    Authenticated,
    /// A token is configured and `Connect` omitted `authToken`.
    Required,
    /// A token is configured and the presented token did not match.
    Failed,
}

/// Check a `Connect` frame's `authToken` header against `expected_token`.
/// When `expected_token` is `None`, `Connect` always succeeds (§4.4: "When
/// no token is configured the Connect command still must be the first
/// frame but is always accepted").
pub fn authenticate(frame: &Frame, expected_token: Option<&str>) -> AuthOutcome {
    debug_assert_eq!(frame.command, CommandType::Connect);

    let Some(expected) = expected_token else {
        return AuthOutcome::Authenticated;
    };

    match frame.headers.get(HEADER_AUTH_TOKEN) {
        None => AuthOutcome::Required,
        Some(presented) if presented == expected => AuthOutcome::Authenticated,
        Some(_) => AuthOutcome::Failed,
    }
}

/// Whether `command` may be sent before a session has authenticated
/// (§4.4: only `Connect` and `Ping`/`Pong`).
pub fn allowed_before_auth(command: CommandType) -> bool {
    command.allowed_before_auth()
}
