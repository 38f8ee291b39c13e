// ── Runtime load-test configuration ──
//
// These types describe *what* to subscribe to and *how* to retry.
// They never touch disk: the CLI resolves files, env and flags, then
// hands a finished `LoadTestConfig` in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use wsload_api::rpc::parse_subscription_list;
use wsload_api::{DialTarget, SubscriptionKind};

use crate::error::CoreError;

/// Fixed retry delays. No exponential growth, no jitter, no retry limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Sleep after a failed dial. Default: 5s.
    pub dial_backoff: Duration,
    /// Sleep after a read or decode failure on an open connection. Default: 2s.
    pub read_backoff: Duration,
    /// Pause between consecutive subscribe requests. Default: 100ms.
    pub send_spacing: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            dial_backoff: Duration::from_secs(5),
            read_backoff: Duration::from_secs(2),
            send_spacing: Duration::from_millis(100),
        }
    }
}

/// Everything the connection manager needs for one run.
#[derive(Debug, Clone)]
pub struct LoadTestConfig {
    /// Endpoint; `http(s)` is normalized to `ws(s)` at dial time.
    pub url: Url,
    /// Sent as the `Target-Service-Id` handshake header.
    pub service_id: String,
    /// Raw `Authorization` header value, if any.
    pub auth: Option<SecretString>,
    /// Comma-separated subscription types, e.g. `"newHeads,logs"`.
    pub subscriptions: String,
    /// Subscribe requests issued per type on every connection.
    pub instances: u32,
    pub retry: RetryPolicy,
    /// Keep the latest inbound frame for display.
    pub capture_messages: bool,
}

impl LoadTestConfig {
    pub fn new(url: Url, service_id: impl Into<String>) -> Self {
        Self {
            url,
            service_id: service_id.into(),
            auth: None,
            subscriptions: "newHeads".into(),
            instances: 1,
            retry: RetryPolicy::default(),
            capture_messages: false,
        }
    }

    /// Startup checks: a dialable URL and at least one
    /// instance per type.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.url.host_str().is_none_or(str::is_empty) {
            return Err(CoreError::InvalidConfig {
                field: "url".into(),
                reason: format!("'{}' has no host", self.url),
            });
        }
        self.dial_target()
            .websocket_url()
            .map_err(|e| CoreError::InvalidConfig {
                field: "url".into(),
                reason: e.to_string(),
            })?;
        if self.instances == 0 {
            return Err(CoreError::InvalidConfig {
                field: "count".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }

    /// Configured types, trimmed, empty entries dropped.
    pub fn subscription_kinds(&self) -> Vec<SubscriptionKind> {
        parse_subscription_list(&self.subscriptions)
    }

    /// Subscribe requests issued per connection.
    pub fn planned_subscriptions(&self) -> u64 {
        let kinds = u64::try_from(self.subscription_kinds().len()).unwrap_or(u64::MAX);
        kinds.saturating_mul(u64::from(self.instances))
    }

    pub fn dial_target(&self) -> DialTarget {
        DialTarget {
            url: self.url.clone(),
            service_id: self.service_id.clone(),
            authorization: self.auth.clone(),
        }
    }
}
