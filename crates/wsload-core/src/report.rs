//! Derived metrics computed from a [`StatsSnapshot`].
//!
//! Reports carry numbers only. Rendering them (colors, layout, clearing the
//! screen) is the display's job.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Serialize, Serializer};

use crate::stats::{ConnectionRecord, StatsSnapshot};

/// Connections shown in the live history section.
pub const LIVE_HISTORY_LEN: usize = 5;

// ── Metric helpers ───────────────────────────────────────────────────

/// `count / elapsed` in events per second; 0 when no time has passed.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn rate(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { count as f64 / secs } else { 0.0 }
}

/// `100 × (received − errors) / received`; 0 when nothing was received.
/// The ratio is over every frame received, not only classifiable ones.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn success_rate(received: u64, errors: u64) -> f64 {
    if received == 0 {
        return 0.0;
    }
    received.saturating_sub(errors) as f64 / received as f64 * 100.0
}

/// Notifications per issued subscription; 0 with no subscriptions.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn per_subscription(events: u64, subscriptions: u64) -> f64 {
    if subscriptions == 0 {
        0.0
    } else {
        events as f64 / subscriptions as f64
    }
}

fn average(total: Duration, count: usize) -> Option<Duration> {
    let count = u32::try_from(count).ok().filter(|c| *c > 0)?;
    Some(total / count)
}

pub(crate) fn serialize_secs<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

fn serialize_opt_secs<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_some(&d.as_secs_f64()),
        None => s.serialize_none(),
    }
}

// ── LiveReport ───────────────────────────────────────────────────────

/// Everything the live dashboard shows.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveReport {
    pub total_connections: u64,
    pub reconnections: u64,
    pub connection_attempts: u64,
    pub current_conn_duration: Duration,
    pub total_runtime: Duration,
    /// Mean over finished connections; `None` before the first one ends.
    pub average_connection: Option<Duration>,

    pub total_subscriptions: u64,
    pub confirmation_events: u64,
    pub subscription_events: u64,
    pub error_events: u64,
    pub messages_by_type: BTreeMap<String, u64>,

    pub events_received: u64,
    pub current_conn_messages: u64,
    pub current_rate: f64,
    pub overall_rate: f64,
    /// `None` until the first frame arrives.
    pub since_last_event: Option<Duration>,

    pub success_rate: f64,
    pub events_per_subscription: f64,
    pub longest_connection: Option<Duration>,
    pub shortest_connection: Option<Duration>,

    /// The last [`LIVE_HISTORY_LEN`] finished connections, oldest first.
    pub recent_history: Vec<ConnectionRecord>,
    pub last_message: Option<String>,
}

impl LiveReport {
    pub fn from_snapshot(snap: &StatsSnapshot, total_subscriptions: u64) -> Self {
        let s = &snap.stats;
        let now = snap.taken_at;

        let current_conn_duration = s
            .current_conn_start
            .map_or(Duration::ZERO, |start| now.saturating_duration_since(start));
        let total_runtime = now.saturating_duration_since(s.client_start);
        let history_total: Duration = snap.history.iter().map(|r| r.duration).sum();
        let skip = snap.history.len().saturating_sub(LIVE_HISTORY_LEN);

        Self {
            total_connections: s.total_connections,
            reconnections: s.reconnections,
            connection_attempts: s.connection_attempts,
            current_conn_duration,
            total_runtime,
            average_connection: average(history_total, snap.history.len()),

            total_subscriptions,
            confirmation_events: s.confirmation_events,
            subscription_events: s.subscription_events,
            error_events: s.error_events,
            messages_by_type: snap.messages_by_type.clone(),

            events_received: s.events_received,
            current_conn_messages: s.current_conn_messages,
            current_rate: rate(s.current_conn_messages, current_conn_duration),
            overall_rate: rate(s.events_received, total_runtime),
            since_last_event: s.last_event.map(|t| now.saturating_duration_since(t)),

            success_rate: success_rate(s.events_received, s.error_events),
            events_per_subscription: per_subscription(s.subscription_events, total_subscriptions),
            longest_connection: s.longest_connection,
            shortest_connection: s.shortest_connection,

            recent_history: snap.history.iter().skip(skip).cloned().collect(),
            last_message: snap.last_message.clone(),
        }
    }
}

// ── FinalReport ──────────────────────────────────────────────────────

/// End-of-run summary. Serializable for `--output json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinalReport {
    pub total_connections: u64,
    pub reconnections: u64,
    pub connection_attempts: u64,
    pub total_subscriptions: u64,
    #[serde(rename = "total_uptime_secs", serialize_with = "serialize_secs")]
    pub total_uptime: Duration,
    #[serde(rename = "total_runtime_secs", serialize_with = "serialize_secs")]
    pub total_runtime: Duration,

    pub events_received: u64,
    pub subscription_events: u64,
    pub confirmation_events: u64,
    pub error_events: u64,
    pub messages_by_type: BTreeMap<String, u64>,

    /// Events per second of connected time; `None` without events or uptime.
    pub connection_event_rate: Option<f64>,
    /// Events per second of process runtime; `None` without events.
    pub overall_event_rate: Option<f64>,
    /// Percentage of runtime spent connected.
    pub reliability: f64,
    pub success_rate: f64,
    pub events_per_subscription: f64,
    /// Uptime divided by connections, once there has been more than one.
    #[serde(rename = "average_connection_secs", serialize_with = "serialize_opt_secs")]
    pub average_connection: Option<Duration>,
    #[serde(rename = "longest_connection_secs", serialize_with = "serialize_opt_secs")]
    pub longest_connection: Option<Duration>,
    #[serde(rename = "shortest_connection_secs", serialize_with = "serialize_opt_secs")]
    pub shortest_connection: Option<Duration>,

    pub history: Vec<ConnectionRecord>,
}

impl FinalReport {
    #[allow(clippy::cast_possible_truncation, clippy::as_conversions)]
    pub fn from_snapshot(snap: &StatsSnapshot, total_subscriptions: u64) -> Self {
        let s = &snap.stats;
        let total_runtime = snap.taken_at.saturating_duration_since(s.client_start);
        let uptime = s.total_uptime;

        let connection_event_rate = (s.events_received > 0 && !uptime.is_zero())
            .then(|| rate(s.events_received, uptime));
        let overall_event_rate = (s.events_received > 0 && !total_runtime.is_zero())
            .then(|| rate(s.events_received, total_runtime));
        let reliability = if total_runtime.is_zero() {
            0.0
        } else {
            uptime.as_secs_f64() / total_runtime.as_secs_f64() * 100.0
        };
        let average_connection = (s.total_connections > 1)
            .then(|| uptime.div_f64(s.total_connections as f64));

        Self {
            total_connections: s.total_connections,
            reconnections: s.reconnections,
            connection_attempts: s.connection_attempts,
            total_subscriptions,
            total_uptime: uptime,
            total_runtime,

            events_received: s.events_received,
            subscription_events: s.subscription_events,
            confirmation_events: s.confirmation_events,
            error_events: s.error_events,
            messages_by_type: snap.messages_by_type.clone(),

            connection_event_rate,
            overall_event_rate,
            reliability,
            success_rate: success_rate(s.events_received, s.error_events),
            events_per_subscription: per_subscription(s.subscription_events, total_subscriptions),
            average_connection,
            longest_connection: s.longest_connection,
            shortest_connection: s.shortest_connection,

            history: snap.history.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatsAggregator;
    use wsload_api::Frame;

    #[test]
    fn success_rate_is_zero_without_events() {
        assert!(success_rate(0, 0).abs() < f64::EPSILON);
    }

    #[test]
    fn success_rate_is_hundred_without_errors() {
        assert!((success_rate(12, 0) - 100.0).abs() < f64::EPSILON);
        assert!((success_rate(4, 1) - 75.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rates_guard_division_by_zero() {
        assert!(rate(10, Duration::ZERO).abs() < f64::EPSILON);
        assert!(per_subscription(10, 0).abs() < f64::EPSILON);
        assert!((per_subscription(10, 4) - 2.5).abs() < f64::EPSILON);
    }

    #[test]
    fn final_success_rate_from_aggregator() {
        let stats = StatsAggregator::new();
        assert!(stats.final_report(0).success_rate.abs() < f64::EPSILON);

        stats.handle_event(&Frame::Confirmation { id: Some(1), handle: None });
        stats.handle_event(&Frame::Notification { handle: None });
        assert!((stats.final_report(1).success_rate - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test(start_paused = true)]
    async fn live_report_rates_and_history_window() {
        let stats = StatsAggregator::new();
        for _ in 0..7 {
            stats.begin_connection();
            tokio::time::advance(Duration::from_secs(2)).await;
            stats.end_connection();
        }
        stats.begin_connection();
        for _ in 0..10 {
            stats.handle_event(&Frame::Notification { handle: None });
        }
        tokio::time::advance(Duration::from_secs(5)).await;

        let live = stats.live_report(5);
        assert_eq!(live.recent_history.len(), LIVE_HISTORY_LEN);
        assert_eq!(live.recent_history[0].number, 3);
        assert_eq!(live.recent_history[4].number, 7);
        assert_eq!(live.average_connection, Some(Duration::from_secs(2)));
        assert_eq!(live.current_conn_duration, Duration::from_secs(5));
        assert!((live.current_rate - 2.0).abs() < 1e-9);
        assert!((live.events_per_subscription - 2.0).abs() < 1e-9);
        assert_eq!(live.since_last_event, Some(Duration::from_secs(5)));
    }

    #[tokio::test(start_paused = true)]
    async fn final_report_reliability_and_average() {
        let stats = StatsAggregator::new();
        stats.begin_connection();
        tokio::time::advance(Duration::from_secs(6)).await;
        stats.end_connection();
        tokio::time::advance(Duration::from_secs(4)).await;
        stats.begin_connection();
        tokio::time::advance(Duration::from_secs(10)).await;

        let report = stats.final_report(0);
        assert_eq!(report.total_uptime, Duration::from_secs(16));
        assert_eq!(report.total_runtime, Duration::from_secs(20));
        assert!((report.reliability - 80.0).abs() < 1e-9);
        assert_eq!(report.average_connection, Some(Duration::from_secs(8)));
        assert_eq!(report.connection_event_rate, None);
    }

    #[test]
    fn final_report_serializes_durations_as_seconds() {
        let stats = StatsAggregator::new();
        let json = serde_json::to_value(stats.final_report(0)).unwrap();
        assert!(json["total_uptime_secs"].is_number());
        assert!(json["average_connection_secs"].is_null());
        assert!(json["history"].as_array().unwrap().is_empty());
    }
}
