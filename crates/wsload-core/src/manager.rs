// ── Connection manager ──
//
// Owns the socket and drives the dial → subscribe → listen → backoff
// cycle until cancelled. All counting goes through `StatsAggregator`;
// every state change goes through `ConnectionState::next` and is published
// on a watch channel.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use wsload_api::{Dialer, Frame, FrameStream, RpcResponse, SubscribeRequest};

use crate::config::LoadTestConfig;
use crate::registry::PendingRequests;
use crate::state::{ConnectionState, Transition};
use crate::stats::StatsAggregator;

/// Upper bound on the close handshake once cancelled.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

/// Drives one long-lived connection with fixed-backoff reconnects.
///
/// Share it as `Arc<ConnectionManager<D>>`: one task calls
/// [`run`](Self::run), others read [`total_subscriptions`](Self::total_subscriptions)
/// and [`state`](Self::state).
pub struct ConnectionManager<D: Dialer> {
    config: Arc<LoadTestConfig>,
    stats: Arc<StatsAggregator>,
    dialer: D,
    cancel: CancellationToken,
    state: watch::Sender<ConnectionState>,
    /// Subscribe requests sent successfully, across all connections.
    total_subscriptions: AtomicU64,
}

/// How a listen phase ended.
enum ListenOutcome {
    Failed(String),
    Cancelled,
}

impl<D: Dialer> ConnectionManager<D> {
    pub fn new(
        config: Arc<LoadTestConfig>,
        stats: Arc<StatsAggregator>,
        dialer: D,
        cancel: CancellationToken,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            config,
            stats,
            dialer,
            cancel,
            state,
            total_subscriptions: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> &Arc<StatsAggregator> {
        &self.stats
    }

    pub fn total_subscriptions(&self) -> u64 {
        self.total_subscriptions.load(Ordering::Relaxed)
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Watch state changes (e.g. to render as soon as a connection opens).
    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn apply(&self, current: &ConnectionState, transition: Transition) -> ConnectionState {
        let next = current.next(transition, &self.config.retry);
        if next != *current {
            trace!(from = %current, to = %next, "connection state");
            self.state.send_replace(next.clone());
        }
        next
    }

    // ── Main loop ────────────────────────────────────────────────────

    /// Run until the cancellation token fires. Never returns an error:
    /// every failure is counted and retried.
    pub async fn run(&self) {
        let target = self.config.dial_target();
        let mut state = self.state();

        loop {
            if self.cancel.is_cancelled() {
                state = self.apply(&state, Transition::Cancelled);
            }

            state = match state {
                ConnectionState::Stopped => break,

                ConnectionState::Idle => self.apply(&state, Transition::Start),

                ConnectionState::Dialing => {
                    self.stats.record_connection_attempt();
                    let dialed = tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => None,
                        result = self.dialer.dial(&target) => Some(result),
                    };
                    match dialed {
                        None => self.apply(&state, Transition::Cancelled),
                        Some(Ok(stream)) => {
                            self.stats.begin_connection();
                            let connected = self.apply(&state, Transition::DialSucceeded);
                            self.serve(stream, connected).await
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket dial failed");
                            self.stats.record_reconnection();
                            self.apply(&state, Transition::DialFailed(e.to_string()))
                        }
                    }
                }

                ConnectionState::Backoff { delay, .. } => {
                    info!(delay = ?delay, "waiting before reconnect");
                    tokio::select! {
                        biased;
                        () = self.cancel.cancelled() => self.apply(&state, Transition::Cancelled),
                        () = tokio::time::sleep(delay) => self.apply(&state, Transition::BackoffElapsed),
                    }
                }

                // The connected states are handled inside `serve`, which
                // always leaves with Backoff or Stopped.
                other => self.apply(&other, Transition::Cancelled),
            };
        }

        debug!("connection loop exiting");
    }

    // ── Single connection epoch ──────────────────────────────────────

    /// Subscribe and listen on one open stream. Returns the state after
    /// the connection is gone.
    async fn serve(&self, mut stream: D::Stream, connected: ConnectionState) -> ConnectionState {
        let mut pending = PendingRequests::new();

        if !self.send_subscriptions(&mut stream, &mut pending).await {
            Self::close(&mut stream).await;
            return self.apply(&connected, Transition::Cancelled);
        }
        if pending.is_empty() {
            warn!("no subscription request could be sent on this connection");
        } else {
            info!(count = pending.len(), "subscriptions sent");
        }
        let sent = self.apply(&connected, Transition::SubscriptionsSent);
        let listening = self.apply(&sent, Transition::ListenStarted);

        match self.listen(&mut stream, &pending).await {
            ListenOutcome::Cancelled => {
                Self::close(&mut stream).await;
                self.apply(&listening, Transition::Cancelled)
            }
            ListenOutcome::Failed(reason) => {
                warn!(reason = %reason, "WebSocket connection lost");
                self.stats.end_connection();
                self.stats.record_reconnection();
                self.apply(&listening, Transition::ReadFailed(reason))
            }
        }
    }

    async fn close(stream: &mut D::Stream) {
        if tokio::time::timeout(CLOSE_TIMEOUT, stream.close()).await.is_err() {
            warn!(timeout = ?CLOSE_TIMEOUT, "WebSocket close timed out");
        }
    }

    /// Send `instances` subscribe requests per configured type, spaced by
    /// `send_spacing`. A failed send is logged and its id abandoned.
    /// Returns `false` if cancelled mid-batch.
    async fn send_subscriptions(&self, stream: &mut D::Stream, pending: &mut PendingRequests) -> bool {
        let kinds = self.config.subscription_kinds();
        if kinds.is_empty() {
            warn!(subscriptions = %self.config.subscriptions, "no subscription types configured");
        }

        for kind in kinds {
            for instance in 1..=self.config.instances {
                let id = pending.next_id();
                let request = SubscribeRequest::new(id, &kind);

                let sent = match request.to_json() {
                    Ok(text) => stream.send_text(text).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = sent {
                    warn!(subscription = %kind, instance, id, error = %e, "failed to send subscription");
                    continue;
                }

                debug!(subscription = %kind, instance, id, "subscription sent");
                pending.track(id, kind.clone());
                self.total_subscriptions.fetch_add(1, Ordering::Relaxed);

                tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => return false,
                    () = tokio::time::sleep(self.config.retry.send_spacing) => {}
                }
            }
        }
        true
    }

    /// Read frames until the stream fails or cancellation fires.
    async fn listen(&self, stream: &mut D::Stream, pending: &PendingRequests) -> ListenOutcome {
        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return ListenOutcome::Cancelled,
                next = stream.next_text() => next,
            };

            let text = match next {
                Ok(text) => text,
                Err(e) => return ListenOutcome::Failed(e.to_string()),
            };
            let response = match RpcResponse::parse(&text) {
                Ok(response) => response,
                Err(e) => return ListenOutcome::Failed(e.to_string()),
            };

            self.handle_response(&response, &text, pending);
        }
    }

    fn handle_response(&self, response: &RpcResponse, raw: &str, pending: &PendingRequests) {
        let frame = Frame::classify(response);
        trace!(?frame, "frame received");
        self.stats.handle_event(&frame);

        if let Frame::Confirmation {
            id: Some(id),
            handle: Some(handle),
        } = &frame
        {
            if let Some(kind) = pending.type_of(*id) {
                debug!(id, handle = %handle, subscription = %kind, "subscription confirmed");
                self.stats.map_subscription(handle, kind.as_str());
            }
        }

        if self.config.capture_messages {
            let pretty = serde_json::to_string_pretty(response).unwrap_or_else(|_| raw.to_owned());
            self.stats.capture_message(pretty);
        }
    }
}
