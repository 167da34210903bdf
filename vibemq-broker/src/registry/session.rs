//! [`ClientSession`]: a live client connection (§3).
//!
//! Per §9's redesign note, a session does not expose a shared mutex for
//! writes. It owns an `mpsc` sender; the connection's write task owns the
//! matching receiver and is the sole writer to the socket. Sending a frame
//! is just enqueueing it — shutdown is closing the channel.

// Layer 1: Standard library imports
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use parking_lot::Mutex;
use tokio::sync::mpsc;

// Layer 3: Internal module imports
use crate::protocol::Frame;

/// Outbound-frame channel the write task drains. Bounded to apply
/// backpressure to a session whose peer reads too slowly.
pub const OUTBOUND_CHANNEL_CAPACITY: usize = 1024;

/// A live client connection (§3).
pub struct ClientSession {
    /// Broker-assigned session id.
    pub id: String,
    /// Peer socket address, used for rate limiting and diagnostics.
    pub remote_address: SocketAddr,
    /// When the session was admitted.
    pub connected_at: DateTime<Utc>,
    last_activity_at: Mutex<DateTime<Utc>>,
    authenticated: AtomicBool,
    subscriptions: DashSet<String>,
    outbound: mpsc::Sender<Frame>,
}

impl ClientSession {
    /// Construct a new, unauthenticated session and its outbound channel.
    /// The returned receiver must be handed to the connection's write task.
    pub fn new(id: String, remote_address: SocketAddr) -> (Arc<Self>, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
        let now = Utc::now();
        let session = Self {
            id,
            remote_address,
            connected_at: now,
            last_activity_at: Mutex::new(now),
            authenticated: AtomicBool::new(false),
            subscriptions: DashSet::new(),
            outbound: tx,
        };
        (Arc::new(session), rx)
    }

    /// Whether this session completed authentication.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    /// Mark this session authenticated. Idempotent.
    pub fn set_authenticated(&self) {
        self.authenticated.store(true, Ordering::Release);
    }

    /// Record that a frame was seen from this session, for idle tracking.
    pub fn touch(&self) {
        *self.last_activity_at.lock() = Utc::now();
    }

    /// Time this session last sent a frame.
    pub fn last_activity_at(&self) -> DateTime<Utc> {
        *self.last_activity_at.lock()
    }

    /// Add `queue` to this session's subscription set. Returns `true` if
    /// it was newly added.
    pub fn subscribe(&self, queue: &str) -> bool {
        self.subscriptions.insert(queue.to_string())
    }

    /// Remove `queue` from this session's subscription set. Returns `true`
    /// if it was present.
    pub fn unsubscribe(&self, queue: &str) -> bool {
        self.subscriptions.remove(queue).is_some()
    }

    /// Snapshot of the queues this session currently subscribes to.
    pub fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.iter().map(|q| q.clone()).collect()
    }

    /// Enqueue a frame for delivery to this session's peer. Fails silently
    /// (the caller treats this as a delivery failure) once the write task
    /// has shut down or the outbound channel is full.
    pub fn try_send(&self, frame: Frame) -> Result<(), mpsc::error::TrySendError<Frame>> {
        self.outbound.try_send(frame)
    }

    /// Enqueue a frame, waiting for outbound channel capacity. Used for
    /// best-effort shutdown notices where a dropped send is acceptable but
    /// an immediate full channel shouldn't be.
    pub async fn send(&self, frame: Frame) -> Result<(), mpsc::error::SendError<Frame>> {
        self.outbound.send(frame).await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:9999".parse().unwrap()
    }

    #[test]
    fn starts_unauthenticated() {
        let (session, _rx) = ClientSession::new("s1".to_string(), addr());
        assert!(!session.is_authenticated());
    }

    #[test]
    fn set_authenticated_is_observable() {
        let (session, _rx) = ClientSession::new("s1".to_string(), addr());
        session.set_authenticated();
        assert!(session.is_authenticated());
    }

    #[test]
    fn subscribe_and_unsubscribe_round_trip() {
        let (session, _rx) = ClientSession::new("s1".to_string(), addr());
        assert!(session.subscribe("orders"));
        assert!(!session.subscribe("orders"));
        assert_eq!(session.subscriptions(), vec!["orders".to_string()]);
        assert!(session.unsubscribe("orders"));
        assert!(session.subscriptions().is_empty());
    }

    #[tokio::test]
    async fn try_send_delivers_to_receiver() {
        let (session, mut rx) = ClientSession::new("s1".to_string(), addr());
        let frame = Frame::new(crate::protocol::CommandType::Ping, "p1");
        session.try_send(frame.clone()).unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received, frame);
    }

    #[test]
    fn touch_updates_last_activity() {
        let (session, _rx) = ClientSession::new("s1".to_string(), addr());
        let before = session.last_activity_at();
        std::thread::sleep(std::time::Duration::from_millis(2));
        session.touch();
        assert!(session.last_activity_at() >= before);
    }
}
