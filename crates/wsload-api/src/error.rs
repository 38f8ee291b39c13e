use thiserror::Error;

/// Top-level error type for the `wsload-api` crate.
///
/// Every variant here is a transient failure from the connection manager's
/// point of view: it ends the current connection epoch and triggers a
/// fixed-backoff retry. Nothing in this enum is fatal once the run loop has
/// started.
#[derive(Debug, Error)]
pub enum Error {
    // ── Endpoint ────────────────────────────────────────────────────
    /// The URL scheme cannot be mapped onto a WebSocket scheme.
    #[error("Unsupported URL scheme '{0}' (expected ws, wss, http, or https)")]
    UnsupportedScheme(String),

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket dial or handshake failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed by the peer, or the stream ended.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    /// Reading from the socket failed.
    #[error("WebSocket receive failed: {0}")]
    Receive(String),

    /// Writing a frame to the socket failed.
    #[error("WebSocket send failed: {0}")]
    Send(String),

    // ── Data ────────────────────────────────────────────────────────
    /// An inbound frame was not a JSON object we could decode.
    #[error("Could not decode frame: {message}")]
    Decode { message: String, body: String },

    /// An outbound request could not be serialized.
    #[error("Could not serialize request: {0}")]
    Serialize(#[from] serde_json::Error),
}
