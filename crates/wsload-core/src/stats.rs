//! The statistics aggregate and its lock-protected owner.
//!
//! [`StatsAggregator`] is the single writer of [`Stats`]. The connection
//! manager feeds it lifecycle and frame events; the display reads cloned
//! [`StatsSnapshot`]s. Every operation takes the lock exactly once and
//! never holds it across an `.await`.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Local};
use serde::Serialize;
use tokio::time::Instant;

use wsload_api::Frame;

use crate::registry::SubscriptionRegistry;
use crate::report::{FinalReport, LiveReport};

// ── Stats ────────────────────────────────────────────────────────────

/// Counters and timers for the whole process lifetime.
#[derive(Debug, Clone)]
pub struct Stats {
    pub connection_attempts: u64,
    pub total_connections: u64,
    pub reconnections: u64,
    pub events_received: u64,
    pub subscription_events: u64,
    pub confirmation_events: u64,
    pub error_events: u64,

    /// Monotonic start of the current (or most recent) connection.
    pub current_conn_start: Option<Instant>,
    /// Wall-clock start of the current (or most recent) connection.
    pub current_conn_started_at: Option<DateTime<Local>>,
    /// Frames received since `current_conn_start`.
    pub current_conn_messages: u64,

    /// Advances only when a connection ends, plus the final flush.
    pub total_uptime: Duration,
    pub longest_connection: Option<Duration>,
    pub shortest_connection: Option<Duration>,

    pub client_start: Instant,
    pub last_event: Option<Instant>,
}

impl Stats {
    fn new(now: Instant) -> Self {
        Self {
            connection_attempts: 0,
            total_connections: 0,
            reconnections: 0,
            events_received: 0,
            subscription_events: 0,
            confirmation_events: 0,
            error_events: 0,
            current_conn_start: None,
            current_conn_started_at: None,
            current_conn_messages: 0,
            total_uptime: Duration::ZERO,
            longest_connection: None,
            shortest_connection: None,
            client_start: now,
            last_event: None,
        }
    }
}

/// One finished connection epoch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionRecord {
    /// 1-based, monotonic for the process.
    pub number: u64,
    pub started_at: DateTime<Local>,
    pub ended_at: DateTime<Local>,
    #[serde(rename = "duration_secs", serialize_with = "crate::report::serialize_secs")]
    pub duration: Duration,
    pub messages: u64,
}

/// Read-only copy of the aggregate at one instant.
#[derive(Debug, Clone)]
pub struct StatsSnapshot {
    pub stats: Stats,
    pub history: Vec<ConnectionRecord>,
    pub messages_by_type: BTreeMap<String, u64>,
    pub connection_open: bool,
    pub last_message: Option<String>,
    pub taken_at: Instant,
}

// ── StatsAggregator ──────────────────────────────────────────────────

#[derive(Debug)]
struct Inner {
    stats: Stats,
    history: Vec<ConnectionRecord>,
    registry: SubscriptionRegistry,
    messages_by_type: BTreeMap<String, u64>,
    connection_open: bool,
    last_message: Option<String>,
}

/// Lock-protected owner of the process-wide [`Stats`].
///
/// Shared as `Arc<StatsAggregator>` between the connection manager
/// (writes) and the display (reads).
#[derive(Debug)]
pub struct StatsAggregator {
    inner: Mutex<Inner>,
}

impl Default for StatsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsAggregator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                stats: Stats::new(Instant::now()),
                history: Vec::new(),
                registry: SubscriptionRegistry::new(),
                messages_by_type: BTreeMap::new(),
                connection_open: false,
                last_message: None,
            }),
        }
    }

    // A panic while holding the lock cannot leave a counter half-written,
    // so a poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Called before every dial, successful or not.
    pub fn record_connection_attempt(&self) {
        self.lock().stats.connection_attempts += 1;
    }

    /// Called after a successful dial and handshake.
    pub fn begin_connection(&self) {
        let mut inner = self.lock();
        inner.stats.total_connections += 1;
        inner.stats.current_conn_start = Some(Instant::now());
        inner.stats.current_conn_started_at = Some(Local::now());
        inner.stats.current_conn_messages = 0;
        inner.connection_open = true;
    }

    /// Counts a reconnection, but only once a connection has ever begun.
    pub fn record_reconnection(&self) {
        let mut inner = self.lock();
        if inner.stats.total_connections > 0 {
            inner.stats.reconnections += 1;
        }
    }

    /// Close the current connection epoch: uptime, history, extrema.
    /// No-op when no connection is open.
    pub fn end_connection(&self) {
        let mut inner = self.lock();
        if inner.stats.total_connections == 0 || !inner.connection_open {
            return;
        }
        let Some(start) = inner.stats.current_conn_start else {
            return;
        };

        let duration = start.elapsed();
        let record = ConnectionRecord {
            number: inner.stats.total_connections,
            started_at: inner.stats.current_conn_started_at.unwrap_or_else(Local::now),
            ended_at: Local::now(),
            duration,
            messages: inner.stats.current_conn_messages,
        };

        let stats = &mut inner.stats;
        stats.total_uptime += duration;
        stats.longest_connection = Some(match stats.longest_connection {
            Some(longest) if duration <= longest => longest,
            _ => duration,
        });
        stats.shortest_connection = Some(match stats.shortest_connection {
            Some(shortest) if duration >= shortest => shortest,
            _ => duration,
        });

        inner.history.push(record);
        inner.connection_open = false;
    }

    // ── Frames ───────────────────────────────────────────────────────

    /// Count one decoded frame, then bump exactly one category counter
    /// (or none, for unrecognized frames).
    pub fn handle_event(&self, frame: &Frame) {
        let mut guard = self.lock();
        let inner = &mut *guard;
        inner.stats.events_received += 1;
        inner.stats.current_conn_messages += 1;
        inner.stats.last_event = Some(Instant::now());

        match frame {
            Frame::Notification { handle } => {
                inner.stats.subscription_events += 1;
                if let Some(handle) = handle {
                    let logical_type = inner.registry.type_or_unknown(handle).to_owned();
                    *inner.messages_by_type.entry(logical_type).or_default() += 1;
                }
            }
            Frame::Confirmation { .. } => inner.stats.confirmation_events += 1,
            Frame::Error { .. } => inner.stats.error_events += 1,
            Frame::Unrecognized => {}
        }
    }

    /// Remember which logical type a server handle belongs to.
    pub fn map_subscription(&self, handle: &str, logical_type: &str) {
        self.lock().registry.register(handle, logical_type);
    }

    /// Keep the latest raw frame for display.
    pub fn capture_message(&self, message: String) {
        self.lock().last_message = Some(message);
    }

    // ── Reads ────────────────────────────────────────────────────────

    pub fn snapshot(&self) -> StatsSnapshot {
        let inner = self.lock();
        StatsSnapshot {
            stats: inner.stats.clone(),
            history: inner.history.clone(),
            messages_by_type: inner.messages_by_type.clone(),
            connection_open: inner.connection_open,
            last_message: inner.last_message.clone(),
            taken_at: Instant::now(),
        }
    }

    pub fn total_connections(&self) -> u64 {
        self.lock().stats.total_connections
    }

    pub fn lookup_type(&self, handle: &str) -> Option<String> {
        self.lock().registry.lookup(handle).map(str::to_owned)
    }

    /// Derived metrics for the live dashboard.
    pub fn live_report(&self, total_subscriptions: u64) -> LiveReport {
        LiveReport::from_snapshot(&self.snapshot(), total_subscriptions)
    }

    /// Derived metrics for the end-of-run summary.
    ///
    /// A still-open connection has its elapsed time added to uptime first;
    /// it is then considered closed, so a second call does not add it again.
    pub fn final_report(&self, total_subscriptions: u64) -> FinalReport {
        {
            let mut inner = self.lock();
            if inner.connection_open {
                if let Some(start) = inner.stats.current_conn_start {
                    inner.stats.total_uptime += start.elapsed();
                }
                inner.connection_open = false;
            }
        }
        FinalReport::from_snapshot(&self.snapshot(), total_subscriptions)
    }
}
