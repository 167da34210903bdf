//! Atomic counters and gauges, and the health/metrics snapshots the
//! `vibemq-server` sidecar serves over HTTP (§6 Observability).

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Counters and gauges the broker updates as it runs. All fields use
/// atomic add/compare operations per §5's shared-resource policy; gauges
/// are republished by the broker's 5-second refresh loop (§4.10) rather
/// than recomputed on every read.
pub struct Monitor {
    started_at: DateTime<Utc>,
    active_connections: AtomicUsize,
    active_queues: AtomicUsize,
    in_flight_messages: AtomicUsize,
    total_messages_published: AtomicU64,
    total_messages_delivered: AtomicU64,
    total_connections_rejected: AtomicU64,
    total_messages_rate_limited: AtomicU64,
    total_dead_lettered: AtomicU64,
    total_delivery_latency_ms: AtomicU64,
    total_delivery_samples: AtomicU64,
}

impl Monitor {
    /// Build a fresh monitor, stamped with the current time as the
    /// broker's start time.
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            active_connections: AtomicUsize::new(0),
            active_queues: AtomicUsize::new(0),
            in_flight_messages: AtomicUsize::new(0),
            total_messages_published: AtomicU64::new(0),
            total_messages_delivered: AtomicU64::new(0),
            total_connections_rejected: AtomicU64::new(0),
            total_messages_rate_limited: AtomicU64::new(0),
            total_dead_lettered: AtomicU64::new(0),
            total_delivery_latency_ms: AtomicU64::new(0),
            total_delivery_samples: AtomicU64::new(0),
        }
    }

    /// Republish the `active_connections` gauge.
    pub fn set_active_connections(&self, n: usize) {
        self.active_connections.store(n, Ordering::Relaxed);
    }

    /// Republish the `active_queues` gauge.
    pub fn set_active_queues(&self, n: usize) {
        self.active_queues.store(n, Ordering::Relaxed);
    }

    /// Republish the `in_flight_messages` gauge (ack tracker pending count).
    pub fn set_in_flight_messages(&self, n: usize) {
        self.in_flight_messages.store(n, Ordering::Relaxed);
    }

    /// Record an accepted publish.
    pub fn record_publish(&self) {
        self.total_messages_published.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a successful delivery, with its latency since enqueue.
    pub fn record_delivery(&self, latency_ms: u64) {
        self.total_messages_delivered.fetch_add(1, Ordering::Relaxed);
        self.total_delivery_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.total_delivery_samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a connection admission rejection (`CONNECTION_LIMIT`).
    pub fn record_connection_rejected(&self) {
        self.total_connections_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message-rate rejection (`RATE_LIMITED`).
    pub fn record_rate_limited(&self) {
        self.total_messages_rate_limited.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a dead-letter escalation.
    pub fn record_dead_lettered(&self) {
        self.total_dead_lettered.fetch_add(1, Ordering::Relaxed);
    }

    /// Build the `/health/` response body (§6).
    pub fn health_snapshot(&self, is_healthy: bool) -> HealthSnapshot {
        HealthSnapshot {
            is_healthy,
            status: if is_healthy { "ok" } else { "unhealthy" }.to_string(),
            active_connections: self.active_connections.load(Ordering::Relaxed),
            queue_count: self.active_queues.load(Ordering::Relaxed),
            in_flight_messages: self.in_flight_messages.load(Ordering::Relaxed),
            total_messages_published: self.total_messages_published.load(Ordering::Relaxed),
            total_messages_delivered: self.total_messages_delivered.load(Ordering::Relaxed),
            memory_usage_mb: current_process_memory_mb(),
            timestamp: Utc::now(),
        }
    }

    /// Build the `/metrics/` response body (§6).
    pub fn metrics_snapshot(&self) -> MetricsSnapshot {
        let samples = self.total_delivery_samples.load(Ordering::Relaxed);
        let total_latency = self.total_delivery_latency_ms.load(Ordering::Relaxed);
        let average_delivery_latency_ms = if samples == 0 {
            0.0
        } else {
            total_latency as f64 / samples as f64
        };

        MetricsSnapshot {
            active_connections: self.active_connections.load(Ordering::Relaxed),
            active_queues: self.active_queues.load(Ordering::Relaxed),
            in_flight_messages: self.in_flight_messages.load(Ordering::Relaxed),
            total_messages_published: self.total_messages_published.load(Ordering::Relaxed),
            total_messages_delivered: self.total_messages_delivered.load(Ordering::Relaxed),
            total_connections_rejected: self.total_connections_rejected.load(Ordering::Relaxed),
            total_messages_rate_limited: self.total_messages_rate_limited.load(Ordering::Relaxed),
            total_dead_lettered: self.total_dead_lettered.load(Ordering::Relaxed),
            average_delivery_latency_ms,
            uptime_seconds: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }
}

impl Default for Monitor {
    fn default() -> Self {
        Self::new()
    }
}

/// Best-effort resident memory usage, in megabytes. Returns `0.0` on
/// platforms where `/proc/self/statm` is unavailable rather than failing
/// the health check over a cosmetic field.
fn current_process_memory_mb() -> f64 {
    let Ok(statm) = std::fs::read_to_string("/proc/self/statm") else {
        return 0.0;
    };
    let Some(resident_pages) = statm.split_whitespace().nth(1) else {
        return 0.0;
    };
    let Ok(pages) = resident_pages.parse::<f64>() else {
        return 0.0;
    };
    (pages * 4096.0) / (1024.0 * 1024.0)
}

/// `/health/` response body (§6).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    /// Whether the broker considers itself healthy.
    pub is_healthy: bool,
    /// Human-readable status string.
    pub status: String,
    /// Current number of live sessions.
    pub active_connections: usize,
    /// Current number of queues.
    pub queue_count: usize,
    /// Current number of deliveries awaiting acknowledgment.
    pub in_flight_messages: usize,
    /// Lifetime count of accepted publishes.
    pub total_messages_published: u64,
    /// Lifetime count of completed deliveries.
    pub total_messages_delivered: u64,
    /// Best-effort resident memory usage, in megabytes.
    pub memory_usage_mb: f64,
    /// When this snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

/// `/metrics/` response body (§6).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    /// Current number of live sessions.
    pub active_connections: usize,
    /// Current number of queues.
    pub active_queues: usize,
    /// Current number of deliveries awaiting acknowledgment.
    pub in_flight_messages: usize,
    /// Lifetime count of accepted publishes.
    pub total_messages_published: u64,
    /// Lifetime count of completed deliveries.
    pub total_messages_delivered: u64,
    /// Lifetime count of rejected connection attempts.
    pub total_connections_rejected: u64,
    /// Lifetime count of rate-limited messages.
    pub total_messages_rate_limited: u64,
    /// Lifetime count of dead-lettered messages.
    pub total_dead_lettered: u64,
    /// Mean delivery latency across every recorded delivery, in milliseconds.
    pub average_delivery_latency_ms: f64,
    /// Seconds since the broker started.
    pub uptime_seconds: u64,
}
