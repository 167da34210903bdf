//! The connection registry: live sessions indexed by id, plus a
//! `queueName -> set<sessionId>` subscriber index (§4.5, §9).
//!
//! Grounded in the teacher's `ActorRegistry<M, S>`: a `DashMap`-backed
//! concurrent registry with an auxiliary index kept in sync on insert and
//! remove, generalized here from actor pools to subscriber sets. The
//! subscriber index is maintained incrementally rather than recomputed
//! from session state on every query, per §4.5's "consistent concurrent
//! structure" requirement; `subscribers_of` returns an owned snapshot so
//! delivery can iterate without racing admission/removal/subscription
//! changes.

mod error;
mod session;

pub use error::RegistryError;
pub use session::{ClientSession, OUTBOUND_CHANNEL_CAPACITY};

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use dashmap::{DashMap, DashSet};

/// Default maximum number of concurrently live sessions (§4.5).
pub const DEFAULT_MAX_CONNECTIONS: usize = 1000;

/// The connection registry.
pub struct ConnectionRegistry {
    max_connections: usize,
    sessions: DashMap<String, Arc<ClientSession>>,
    subscribers: DashMap<String, DashSet<String>>,
    count: AtomicUsize,
}

impl ConnectionRegistry {
    /// Build a registry admitting at most `max_connections` concurrent sessions.
    pub fn new(max_connections: usize) -> Self {
        Self {
            max_connections,
            sessions: DashMap::new(),
            subscribers: DashMap::new(),
            count: AtomicUsize::new(0),
        }
    }

    /// Admit `session`, failing with [`RegistryError::ConnectionLimit`] if
    /// the registry is already at capacity.
    pub fn admit(&self, session: Arc<ClientSession>) -> Result<(), RegistryError> {
        if self.count.load(Ordering::Acquire) >= self.max_connections {
            return Err(RegistryError::ConnectionLimit {
                limit: self.max_connections,
            });
        }
        self.sessions.insert(session.id.clone(), session);
        self.count.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    /// Remove a session by id, cleaning up its entries in the subscriber
    /// index for every queue it subscribed to. Idempotent.
    pub fn remove(&self, id: &str) {
        let Some((_, session)) = self.sessions.remove(id) else {
            return;
        };
        self.count.fetch_sub(1, Ordering::AcqRel);
        for queue in session.subscriptions() {
            self.unsubscribe(&queue, id);
        }
    }

    /// Look up a live session by id.
    pub fn get(&self, id: &str) -> Option<Arc<ClientSession>> {
        self.sessions.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Record that `session_id` subscribes to `queue`, updating both the
    /// session's own subscription set and the shared subscriber index.
    pub fn subscribe(&self, queue: &str, session_id: &str) {
        if let Some(session) = self.get(session_id) {
            session.subscribe(queue);
        }
        self.subscribers
            .entry(queue.to_string())
            .or_default()
            .insert(session_id.to_string());
    }

    /// Remove `session_id` from `queue`'s subscriber set, in both places.
    pub fn unsubscribe(&self, queue: &str, session_id: &str) {
        if let Some(session) = self.get(session_id) {
            session.unsubscribe(queue);
        }
        if let Some(set) = self.subscribers.get(queue) {
            set.remove(session_id);
        }
    }

    /// A snapshot of live sessions currently subscribed to `queue`, safe to
    /// iterate while admission, removal, or subscription changes proceed
    /// concurrently (§4.5).
    pub fn subscribers_of(&self, queue: &str) -> Vec<Arc<ClientSession>> {
        let Some(ids) = self.subscribers.get(queue) else {
            return Vec::new();
        };
        ids.iter()
            .filter_map(|id| self.get(id.key()))
            .collect()
    }

    /// A snapshot of every live session, used during shutdown (§4.5).
    pub fn get_all(&self) -> Vec<Arc<ClientSession>> {
        self.sessions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect()
    }

    /// Current number of live sessions.
    pub fn len(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Whether the registry currently holds no live sessions.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CONNECTIONS)
    }
}
