//! JSON-RPC 2.0 envelopes for `eth_subscribe` load generation.
//!
//! Outbound traffic is a single request shape ([`SubscribeRequest`]).
//! Inbound traffic is decoded leniently into [`RpcResponse`], whose fields
//! are all optional; [`Frame::classify`](crate::Frame::classify) decides
//! what the frame actually is.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum::EnumString;

use crate::error::Error;

pub const JSONRPC_VERSION: &str = "2.0";
pub const SUBSCRIBE_METHOD: &str = "eth_subscribe";

// ── SubscriptionKind ─────────────────────────────────────────────────

/// Logical subscription type as configured by the operator.
///
/// Three kinds have well-known parameter shapes; any other name is sent
/// through verbatim as [`SubscriptionKind::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString)]
pub enum SubscriptionKind {
    #[strum(serialize = "newHeads")]
    NewHeads,
    #[strum(serialize = "newPendingTransactions")]
    NewPendingTransactions,
    #[strum(serialize = "logs")]
    Logs,
    #[strum(default)]
    Other(String),
}

impl SubscriptionKind {
    /// Parse a configured name. Never fails: unknown names become `Other`.
    pub fn from_name(name: &str) -> Self {
        name.parse()
            .unwrap_or_else(|_| Self::Other(name.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::NewHeads => "newHeads",
            Self::NewPendingTransactions => "newPendingTransactions",
            Self::Logs => "logs",
            Self::Other(name) => name,
        }
    }

    /// `params` value for an `eth_subscribe` call of this kind.
    pub fn params(&self) -> Value {
        match self {
            Self::Logs => json!(["logs", { "topics": [null] }]),
            other => json!([other.as_str()]),
        }
    }
}

impl fmt::Display for SubscriptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split a comma-separated subscription list, trimming whitespace and
/// skipping empty entries.
pub fn parse_subscription_list(list: &str) -> Vec<SubscriptionKind> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(SubscriptionKind::from_name)
        .collect()
}

// ── Outbound ─────────────────────────────────────────────────────────

/// A single `eth_subscribe` request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscribeRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'static str,
    pub params: Value,
}

impl SubscribeRequest {
    pub fn new(id: u64, kind: &SubscriptionKind) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method: SUBSCRIBE_METHOD,
            params: kind.params(),
        }
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

// ── Inbound ──────────────────────────────────────────────────────────

/// Any frame the server may send. JSON `null` fields decode as `None`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RpcResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jsonrpc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcResponse {
    /// Decode a text frame.
    pub fn parse(text: &str) -> Result<Self, Error> {
        serde_json::from_str(text).map_err(|e| Error::Decode {
            message: e.to_string(),
            body: text.to_owned(),
        })
    }
}
