//! Per-session message admission limiting (§4.3).

// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use parking_lot::Mutex;

// Layer 3: Internal module imports
use super::window::SlidingWindow;

/// Fixed window for per-session message admission (§4.3): always 1 s.
pub const MESSAGE_WINDOW: Duration = Duration::from_secs(1);
/// Default per-session message cap (§4.3).
pub const DEFAULT_MESSAGE_CAP: u32 = 1000;

/// Tracks one sliding window per session id for message-rate limiting.
/// Unlike [`super::connection::ConnectionLimiter`], entries here must be
/// removed explicitly on disconnect (§4.3: "a disconnection removes the
/// per-session window entry") since session ids are not reused.
pub struct MessageLimiter {
    cap: u32,
    windows: DashMap<String, Mutex<SlidingWindow>>,
}

impl MessageLimiter {
    /// Build a limiter admitting at most `cap` messages per session per
    /// second.
    pub fn new(cap: u32) -> Self {
        Self {
            cap,
            windows: DashMap::new(),
        }
    }

    /// Whether `session_id` may send one more message right now.
    pub fn try_admit(&self, session_id: &str) -> bool {
        let entry = self
            .windows
            .entry(session_id.to_string())
            .or_insert_with(|| Mutex::new(SlidingWindow::new(MESSAGE_WINDOW, self.cap)));
        entry.lock().try_admit()
    }

    /// Drop the tracked window for a disconnected session.
    pub fn remove(&self, session_id: &str) {
        self.windows.remove(session_id);
    }
}

impl Default for MessageLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGE_CAP)
    }
}
