//! [`Broker`]: the TCP/TLS accept loop and per-connection lifecycle that
//! ties the protocol, queue, ack, and rate-limiting layers together
//! (§4.10).
//!
//! Grounded in the teacher's `ActorSystem`: a `new` that spawns its
//! background loops immediately and returns a ready-to-use handle, an
//! atomic shutdown flag checked by every loop, and a `shutdown` that
//! stops accepting, notifies live sessions, and bounds its wait with a
//! timeout rather than blocking forever.

// Layer 1: Standard library imports
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};

// Layer 2: Third-party crate imports
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio_native_tls::{TlsAcceptor, TlsStream};
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

// Layer 3: Internal module imports
use crate::auth::{self, AuthOutcome};
use crate::config::BrokerConfig;
use crate::dispatcher::{self, DispatchContext};
use crate::error::{CODE_AUTH_FAILED, CODE_AUTH_REQUIRED, CODE_CONNECTION_LIMIT, CODE_INVALID_MESSAGE};
use crate::manager::QueueManager;
use crate::message::HEADER_REASON;
use crate::monitoring::Monitor;
use crate::protocol::{CommandType, Frame, ProtocolError, VibeMqCodec};
use crate::ratelimit::{ConnectionLimiter, MessageLimiter};
use crate::registry::{ClientSession, ConnectionRegistry};
use crate::validator;

/// Failure building or starting a [`Broker`].
#[derive(Debug, Error)]
pub enum BrokerStartError {
    /// The listen socket could not be bound.
    #[error("failed to bind listener: {0}")]
    Bind(#[source] io::Error),
    /// The configured PKCS#12 identity could not be read from disk.
    #[error("failed to read TLS identity file: {0}")]
    TlsIdentityFile(#[source] io::Error),
    /// The PKCS#12 bundle could not be parsed, or the acceptor could not be built.
    #[error("failed to build TLS acceptor: {0}")]
    Tls(#[from] native_tls::Error),
}

/// Either side of an accepted connection: plain TCP or a TLS-wrapped
/// stream. Both halves are `Unpin`, so delegating poll methods by
/// matching on `self` (rather than reaching for `pin-project`) is sound.
enum Connection {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for Connection {
    fn poll_read(self: Pin<&mut Self>, cx: &mut TaskContext<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Connection::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(self: Pin<&mut Self>, cx: &mut TaskContext<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Connection::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Connection::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Plain(s) => Pin::new(s).poll_flush(cx),
            Connection::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Connection::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Connection::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// The broker: owns the listener, the queue manager, and every
/// per-connection collaborator (§4.5, §4.9, §4.10).
pub struct Broker {
    config: BrokerConfig,
    manager: Arc<QueueManager>,
    registry: Arc<ConnectionRegistry>,
    monitor: Arc<Monitor>,
    connection_limiter: Arc<ConnectionLimiter>,
    message_limiter: Arc<MessageLimiter>,
    tls_acceptor: Option<TlsAcceptor>,
    shutdown_notify: Notify,
    shutting_down: AtomicBool,
}

impl Broker {
    /// Build a broker from a validated configuration. Does not bind the
    /// listener or spawn any task yet; call [`Broker::run`] to do that.
    pub fn new(config: BrokerConfig) -> Result<Arc<Self>, BrokerStartError> {
        let registry = Arc::new(ConnectionRegistry::new(config.max_connections));
        let monitor = Arc::new(Monitor::new());
        let manager = QueueManager::new(
            Arc::clone(&registry),
            Arc::clone(&monitor),
            config.auto_create_queues,
            (config.ack_base_retry_delay, config.ack_max_retry_delay),
        );
        let connection_limiter = Arc::new(ConnectionLimiter::new(
            config.connection_rate_window,
            config.connection_rate_cap,
        ));
        let message_limiter = Arc::new(MessageLimiter::new(config.message_rate_cap));

        let tls_acceptor = match &config.tls {
            Some(tls) => Some(build_tls_acceptor(tls)?),
            None => None,
        };

        Ok(Arc::new(Self {
            config,
            manager,
            registry,
            monitor,
            connection_limiter,
            message_limiter,
            tls_acceptor,
            shutdown_notify: Notify::new(),
            shutting_down: AtomicBool::new(false),
        }))
    }

    /// The broker's shared monitor, for the `vibemq-server` HTTP sidecar.
    pub fn monitor(&self) -> &Arc<Monitor> {
        &self.monitor
    }

    /// Bind the listener and run the accept loop and gauge-refresh loop
    /// until [`Broker::shutdown`] is called. Resolves once both have
    /// stopped.
    pub async fn run(self: &Arc<Self>) -> Result<(), BrokerStartError> {
        let listener = TcpListener::bind(("0.0.0.0", self.config.port))
            .await
            .map_err(BrokerStartError::Bind)?;
        info!(port = self.config.port, tls = self.tls_acceptor.is_some(), "broker listening");

        let gauge_task = {
            let broker = Arc::clone(self);
            tokio::spawn(async move { broker.gauge_refresh_loop().await })
        };

        loop {
            tokio::select! {
                _ = self.shutdown_notify.notified() => break,
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => self.handle_incoming(stream, addr),
                        Err(e) => warn!(error = %e, "accept failed"),
                    }
                }
            }
        }

        let _ = gauge_task.await;
        Ok(())
    }

    fn handle_incoming(self: &Arc<Self>, stream: TcpStream, addr: SocketAddr) {
        let broker = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = broker.serve_connection(stream, addr).await {
                debug!(peer = %addr, error = %e, "connection ended");
            }
        });
    }

    async fn serve_connection(self: Arc<Self>, stream: TcpStream, addr: SocketAddr) -> Result<(), ProtocolError> {
        if !self.connection_limiter.try_admit(addr.ip()) {
            self.monitor.record_connection_rejected();
            let mut framed = Framed::new(Connection::Plain(stream), VibeMqCodec::new(self.config.max_frame_size));
            let _ = framed
                .send(Frame::error("", CODE_CONNECTION_LIMIT, "connection rate limit exceeded"))
                .await;
            return Ok(());
        }

        let stream = match &self.tls_acceptor {
            Some(acceptor) => match acceptor.accept(stream).await {
                Ok(tls) => Connection::Tls(Box::new(tls)),
                Err(e) => {
                    warn!(peer = %addr, error = %e, "TLS handshake failed");
                    return Ok(());
                }
            },
            None => Connection::Plain(stream),
        };

        let framed = Framed::new(stream, VibeMqCodec::new(self.config.max_frame_size));
        let (mut sink, mut stream) = framed.split();

        let session_id = uuid::Uuid::new_v4().to_string();
        let (session, mut outbound_rx) = ClientSession::new(session_id.clone(), addr);

        if self.registry.admit(Arc::clone(&session)).is_err() {
            self.monitor.record_connection_rejected();
            let _ = sink
                .send(Frame::error("", CODE_CONNECTION_LIMIT, "server connection limit reached"))
                .await;
            return Ok(());
        }
        self.monitor.set_active_connections(self.registry.len());

        let writer = tokio::spawn(async move {
            while let Some(frame) = outbound_rx.recv().await {
                if sink.send(frame).await.is_err() {
                    break;
                }
            }
        });

        let ctx = DispatchContext {
            manager: Arc::clone(&self.manager),
            registry: Arc::clone(&self.registry),
            message_limiter: Arc::clone(&self.message_limiter),
            monitor: Arc::clone(&self.monitor),
        };

        while let Some(decoded) = stream.next().await {
            let frame = match decoded {
                Ok(frame) => frame,
                Err(e) if e.is_reportable() => {
                    warn!(peer = %addr, error = %e, "frame decode failed");
                    break;
                }
                Err(_) => break,
            };

            session.touch();

            if frame.command == CommandType::Connect {
                let response = match auth::authenticate(&frame, self.config.auth_token.as_deref()) {
                    AuthOutcome::Authenticated => {
                        session.set_authenticated();
                        Frame::new(CommandType::ConnectAck, frame.id)
                    }
                    AuthOutcome::Required => Frame::error(frame.id, CODE_AUTH_REQUIRED, "authToken is required"),
                    AuthOutcome::Failed => Frame::error(frame.id, CODE_AUTH_FAILED, "authToken did not match"),
                };
                let close_after = response.command == CommandType::Error;
                let _ = session.try_send(response);
                if close_after {
                    break;
                }
                continue;
            }

            if !session.is_authenticated() && !auth::allowed_before_auth(frame.command) {
                let _ = session.try_send(dispatcher::not_authenticated_error(frame.id));
                continue;
            }

            if let Err(reason) = validator::validate(&frame) {
                let _ = session.try_send(Frame::error(frame.id, CODE_INVALID_MESSAGE, reason));
                continue;
            }

            if let Some(response) = dispatcher::dispatch(&session, frame, &ctx) {
                let _ = session.try_send(response);
            }
        }

        self.registry.remove(&session_id);
        self.message_limiter.remove(&session_id);
        self.connection_limiter.forget(&addr.ip());
        self.monitor.set_active_connections(self.registry.len());

        // Dropping `session` here drops its outbound sender; the write task
        // drains whatever was already queued and exits on its own once
        // `recv` sees every sender gone, rather than being aborted mid-flush.
        drop(session);
        let _ = writer.await;
        Ok(())
    }

    async fn gauge_refresh_loop(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.config.gauge_refresh_interval);
        loop {
            interval.tick().await;
            if self.shutting_down.load(Ordering::Acquire) {
                break;
            }
            self.monitor.set_active_connections(self.registry.len());
            self.monitor.set_active_queues(self.manager.queue_count());
            self.monitor.set_in_flight_messages(self.manager.ack_tracker().pending_count());
            self.manager.sweep_expired_messages();
        }
    }

    /// Gracefully shut the broker down (§4.10): stop accepting new
    /// connections, notify every live session with a `Disconnect`, then
    /// wait up to `shutdown_grace_period` for in-flight acknowledgments to
    /// drain before disposing the ack tracker.
    pub async fn shutdown(&self) {
        self.shutting_down.store(true, Ordering::Release);
        self.shutdown_notify.notify_one();

        for session in self.registry.get_all() {
            let mut headers = std::collections::HashMap::new();
            headers.insert(HEADER_REASON.to_string(), "server_shutdown".to_string());
            let notice = Frame::new(CommandType::Disconnect, uuid::Uuid::new_v4().to_string()).with_headers(headers);
            let _ = session.send(notice).await;
        }

        let deadline = tokio::time::Instant::now() + self.config.shutdown_grace_period;
        while tokio::time::Instant::now() < deadline {
            if self.manager.ack_tracker().pending_count() == 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }

        self.manager.ack_tracker().dispose();
        info!("broker shutdown complete");
    }
}

fn build_tls_acceptor(tls: &crate::config::TlsConfig) -> Result<TlsAcceptor, BrokerStartError> {
    let bytes = std::fs::read(&tls.pkcs12_path).map_err(BrokerStartError::TlsIdentityFile)?;
    let identity = native_tls::Identity::from_pkcs12(&bytes, &tls.pkcs12_password)?;
    let acceptor = native_tls::TlsAcceptor::builder(identity).build()?;
    Ok(TlsAcceptor::from(acceptor))
}
