//! WebSocket transport: endpoint normalization, handshake headers, and
//! frame I/O.
//!
//! The connection manager only sees the [`Dialer`] and [`FrameStream`]
//! traits. [`WsDialer`] is the tokio-tungstenite implementation; tests
//! substitute scripted dialers to exercise retry behavior without sockets.

use std::future::Future;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::error::Error;

/// Header identifying the target service on every handshake.
pub const SERVICE_ID_HEADER: &str = "Target-Service-Id";
/// Header carrying the raw credential, sent only when one is configured.
pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Close code reported when the stream ends without a close frame.
const ABNORMAL_CLOSURE: u16 = 1006;

// ── DialTarget ───────────────────────────────────────────────────────

/// Everything needed to open one connection.
#[derive(Debug, Clone)]
pub struct DialTarget {
    pub url: Url,
    pub service_id: String,
    pub authorization: Option<SecretString>,
}

impl DialTarget {
    /// The endpoint with `http` mapped to `ws` and `https` to `wss`.
    pub fn websocket_url(&self) -> Result<Url, Error> {
        let mut url = self.url.clone();
        let scheme = match url.scheme() {
            "http" => "ws",
            "https" => "wss",
            "ws" | "wss" => return Ok(url),
            other => return Err(Error::UnsupportedScheme(other.to_owned())),
        };
        url.set_scheme(scheme)
            .map_err(|()| Error::UnsupportedScheme(url.scheme().to_owned()))?;
        Ok(url)
    }

    /// Handshake headers in the order they are sent.
    pub fn headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![(SERVICE_ID_HEADER, self.service_id.clone())];
        if let Some(auth) = &self.authorization {
            let raw = auth.expose_secret();
            if !raw.is_empty() {
                headers.push((AUTHORIZATION_HEADER, raw.to_owned()));
            }
        }
        headers
    }
}

// ── Seams ────────────────────────────────────────────────────────────

/// Opens connections.
pub trait Dialer: Send + Sync {
    type Stream: FrameStream;

    fn dial(&self, target: &DialTarget) -> impl Future<Output = Result<Self::Stream, Error>> + Send;
}

/// One open, full-duplex message stream.
pub trait FrameStream: Send {
    /// Send one text frame.
    fn send_text(&mut self, text: String) -> impl Future<Output = Result<(), Error>> + Send;

    /// Wait for the next frame carrying data. Control frames are skipped;
    /// close frames, stream end and transport errors are all `Err`.
    fn next_text(&mut self) -> impl Future<Output = Result<String, Error>> + Send;

    /// Best-effort close handshake.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

// ── tokio-tungstenite implementation ─────────────────────────────────

/// Dials real WebSocket endpoints (plain or TLS).
#[derive(Debug, Clone, Default)]
pub struct WsDialer;

impl WsDialer {
    pub fn new() -> Self {
        // Errors only when a provider is already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();
        Self
    }
}

impl Dialer for WsDialer {
    type Stream = WsStream;

    async fn dial(&self, target: &DialTarget) -> Result<WsStream, Error> {
        let url = target.websocket_url()?;
        tracing::info!(url = %url, service = %target.service_id, "Connecting to WebSocket");

        let uri: tungstenite::http::Uri = url
            .as_str()
            .parse()
            .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

        let mut request = ClientRequestBuilder::new(uri);
        for (name, value) in target.headers() {
            request = request.with_header(name, value);
        }

        let (inner, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        tracing::info!("WebSocket connected");
        Ok(WsStream { inner })
    }
}

/// An established tokio-tungstenite connection.
pub struct WsStream {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl FrameStream for WsStream {
    async fn send_text(&mut self, text: String) -> Result<(), Error> {
        self.inner
            .send(Message::text(text))
            .await
            .map_err(|e| Error::Send(e.to_string()))
    }

    async fn next_text(&mut self) -> Result<String, Error> {
        loop {
            match self.inner.next().await {
                Some(Ok(Message::Text(text))) => return Ok(text.as_str().to_owned()),
                Some(Ok(Message::Binary(bytes))) => {
                    return String::from_utf8(bytes.to_vec()).map_err(|e| Error::Decode {
                        message: e.to_string(),
                        body: String::new(),
                    });
                }
                Some(Ok(Message::Close(frame))) => {
                    let (code, reason) = frame.map_or_else(
                        || (ABNORMAL_CLOSURE, String::new()),
                        |cf| (u16::from(cf.code), cf.reason.as_str().to_owned()),
                    );
                    tracing::info!(code, reason = %reason, "WebSocket close frame received");
                    return Err(Error::WebSocketClosed { code, reason });
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {
                    // tungstenite queues pong replies itself
                    tracing::trace!("WebSocket control frame");
                }
                Some(Err(e)) => return Err(Error::Receive(e.to_string())),
                None => {
                    tracing::info!("WebSocket stream ended");
                    return Err(Error::WebSocketClosed {
                        code: ABNORMAL_CLOSURE,
                        reason: "stream ended".into(),
                    });
                }
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.inner.close(None).await;
    }
}
