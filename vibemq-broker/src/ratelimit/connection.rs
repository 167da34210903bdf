//! Per-remote-address connection admission limiting (§4.3).

// Layer 1: Standard library imports
use std::net::IpAddr;
use std::time::Duration;

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use parking_lot::Mutex;

// Layer 3: Internal module imports
use super::window::SlidingWindow;

/// Default connection-admission window (§4.3).
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
/// Default connection-admission cap per remote address (§4.3).
pub const DEFAULT_CAP: u32 = 20;

/// Tracks one sliding window per remote address, guarding new-connection
/// admission. Each entry's critical section covers the evict-and-record
/// sequence, per §5's shared-resource policy.
pub struct ConnectionLimiter {
    window: Duration,
    cap: u32,
    windows: DashMap<IpAddr, Mutex<SlidingWindow>>,
}

impl ConnectionLimiter {
    /// Build a limiter admitting at most `cap` new connections per
    /// remote address within any `window`-long span.
    pub fn new(window: Duration, cap: u32) -> Self {
        Self {
            window,
            cap,
            windows: DashMap::new(),
        }
    }

    /// Whether a new connection from `addr` may be admitted right now.
    /// Records the attempt regardless of outcome.
    pub fn try_admit(&self, addr: IpAddr) -> bool {
        let entry = self
            .windows
            .entry(addr)
            .or_insert_with(|| Mutex::new(SlidingWindow::new(self.window, self.cap)));
        entry.lock().try_admit()
    }

    /// Drop the tracked window for `addr`. Safe to skip — unused entries
    /// simply age out — but keeps the map from growing unboundedly under
    /// churn from many distinct addresses.
    pub fn forget(&self, addr: &IpAddr) {
        self.windows.remove(addr);
    }
}

impl Default for ConnectionLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW, DEFAULT_CAP)
    }
}
