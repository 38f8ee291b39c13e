//! Event classification: one decision per inbound frame.
//!
//! The server reuses a single loose envelope for notifications,
//! confirmations and errors. [`Frame::classify`] inspects the envelope once
//! and everything downstream matches on the resulting variant.

use serde_json::{Number, Value};

use crate::rpc::RpcResponse;

/// `method` value carried by every subscription notification.
pub const NOTIFICATION_METHOD: &str = "eth_subscription";

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Subscription push. `handle` is `params.subscription` as a string,
    /// when the params object carries one.
    Notification { handle: Option<String> },

    /// Reply to one of our requests: numeric `id` plus a `result`.
    /// `id` is `None` when the number is not a non-negative integral value
    /// (`1.0` counts as 1);
    /// `handle` is the result when it is a string.
    Confirmation {
        id: Option<u64>,
        handle: Option<String>,
    },

    /// Error reply.
    Error {
        code: Option<i64>,
        message: Option<String>,
    },

    /// Decoded, but matches none of the shapes above.
    Unrecognized,
}

impl Frame {
    /// Classify a decoded response.
    ///
    /// Order matters: notification, then result, then error. A frame with a
    /// `result` but a non-numeric `id` is `Unrecognized` even when it also
    /// carries an `error`.
    pub fn classify(response: &RpcResponse) -> Self {
        if response.method.as_deref() == Some(NOTIFICATION_METHOD) {
            let handle = response
                .params
                .as_ref()
                .and_then(Value::as_object)
                .and_then(|params| params.get("subscription"))
                .map(stringify);
            return Self::Notification { handle };
        }

        if let Some(result) = &response.result {
            return match &response.id {
                Some(Value::Number(n)) => Self::Confirmation {
                    id: integral_id(n),
                    handle: result.as_str().map(str::to_owned),
                },
                _ => Self::Unrecognized,
            };
        }

        if let Some(error) = &response.error {
            return Self::Error {
                code: error.get("code").and_then(Value::as_i64),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_owned),
            };
        }

        Self::Unrecognized
    }
}

/// Non-negative integers, including ones written as floats (`3.0`).
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn integral_id(n: &Number) -> Option<u64> {
    n.as_u64().or_else(|| {
        n.as_f64()
            .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f < u64::MAX as f64)
            .map(|f| f as u64)
    })
}

/// Strings verbatim, everything else as its JSON text.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
