//! Explicit connection state machine.
//!
//! The manager never decides "what next" inline: it reports a
//! [`Transition`] and [`ConnectionState::next`] picks the following state,
//! including which fixed backoff applies. Observers watch the published
//! state through a `tokio::sync::watch` channel.

use std::fmt;
use std::time::Duration;

use crate::config::RetryPolicy;

/// Where one connection attempt currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Dialing,
    /// Handshake complete, no subscriptions sent yet.
    Connected,
    SubscriptionsSent,
    Listening,
    /// Waiting out a fixed delay before returning to `Idle`.
    Backoff { delay: Duration, reason: String },
    /// Cancellation observed; the loop has exited.
    Stopped,
}

/// Something that happened while in a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    Start,
    DialSucceeded,
    DialFailed(String),
    SubscriptionsSent,
    ListenStarted,
    ReadFailed(String),
    BackoffElapsed,
    Cancelled,
}

impl ConnectionState {
    /// Transition table. Pairs not listed leave the state unchanged.
    pub fn next(&self, transition: Transition, retry: &RetryPolicy) -> Self {
        match (self, transition) {
            (Self::Stopped, _) | (_, Transition::Cancelled) => Self::Stopped,
            (Self::Idle, Transition::Start) => Self::Dialing,
            (Self::Dialing, Transition::DialSucceeded) => Self::Connected,
            (Self::Dialing, Transition::DialFailed(reason)) => Self::Backoff {
                delay: retry.dial_backoff,
                reason,
            },
            (Self::Connected, Transition::SubscriptionsSent) => Self::SubscriptionsSent,
            (Self::SubscriptionsSent, Transition::ListenStarted) => Self::Listening,
            (Self::Listening, Transition::ReadFailed(reason)) => Self::Backoff {
                delay: retry.read_backoff,
                reason,
            },
            (Self::Backoff { .. }, Transition::BackoffElapsed) => Self::Idle,
            (state, _) => state.clone(),
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Dialing => f.write_str("dialing"),
            Self::Connected => f.write_str("connected"),
            Self::SubscriptionsSent => f.write_str("subscribed"),
            Self::Listening => f.write_str("listening"),
            Self::Backoff { delay, .. } => write!(f, "retrying in {}s", delay.as_secs()),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn retry() -> RetryPolicy {
        RetryPolicy::default()
    }

    #[test]
    fn happy_path_reaches_listening() {
        let r = retry();
        let state = ConnectionState::Idle
            .next(Transition::Start, &r)
            .next(Transition::DialSucceeded, &r)
            .next(Transition::SubscriptionsSent, &r)
            .next(Transition::ListenStarted, &r);
        assert_eq!(state, ConnectionState::Listening);
    }

    #[test]
    fn dial_failure_uses_dial_backoff() {
        let r = retry();
        let state = ConnectionState::Dialing.next(Transition::DialFailed("refused".into()), &r);
        assert_eq!(
            state,
            ConnectionState::Backoff { delay: Duration::from_secs(5), reason: "refused".into() }
        );
        assert_eq!(state.next(Transition::BackoffElapsed, &r), ConnectionState::Idle);
    }

    #[test]
    fn read_failure_uses_read_backoff() {
        let state = ConnectionState::Listening.next(Transition::ReadFailed("eof".into()), &retry());
        assert!(matches!(state, ConnectionState::Backoff { delay, .. } if delay == Duration::from_secs(2)));
    }

    #[test]
    fn cancellation_stops_from_any_state() {
        let r = retry();
        for state in [
            ConnectionState::Idle,
            ConnectionState::Dialing,
            ConnectionState::Listening,
            ConnectionState::Backoff { delay: Duration::from_secs(1), reason: String::new() },
        ] {
            assert_eq!(state.next(Transition::Cancelled, &r), ConnectionState::Stopped);
        }
        assert_eq!(ConnectionState::Stopped.next(Transition::Start, &r), ConnectionState::Stopped);
    }

    #[test]
    fn unlisted_transition_is_ignored() {
        let r = retry();
        assert_eq!(ConnectionState::Idle.next(Transition::ListenStarted, &r), ConnectionState::Idle);
        assert_eq!(
            ConnectionState::Connected.next(Transition::ReadFailed("x".into()), &r),
            ConnectionState::Connected
        );
    }
}
