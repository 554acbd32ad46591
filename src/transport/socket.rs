//! Physical transport primitive.
//!
//! A [`Connector`] opens one duplex socket and hands back its two halves:
//! a sink of [`WireMessage`]s and a stream of inbound ones. The channel
//! layer never sees the concrete socket type, so the in-process doubles
//! used in tests and the production WebSocket share one event loop.
//!
//! # Connection Flow
//!
//! 1. `Connector::open(url)` performs the WebSocket handshake
//! 2. The socket is split into [`SocketParts`]
//! 3. The event loop owns both halves until shutdown

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::pin::Pin;

use async_trait::async_trait;
use futures_util::future;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, info};

use crate::error::{Error, Result};

// ============================================================================
// WireMessage
// ============================================================================

/// One message on the physical socket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireMessage {
    /// UTF-8 text message.
    Text(String),
    /// Binary message.
    Binary(Vec<u8>),
    /// Close handshake, with the peer's reason if any.
    Close(Option<CloseReason>),
}

impl WireMessage {
    fn into_ws(self) -> Message {
        match self {
            Self::Text(text) => Message::Text(text.into()),
            Self::Binary(data) => Message::Binary(data.into()),
            Self::Close(reason) => Message::Close(reason.map(|reason| CloseFrame {
                code: CloseCode::from(reason.code.unwrap_or(NORMAL_CLOSURE)),
                reason: reason.reason.into(),
            })),
        }
    }

    fn from_ws(message: Message) -> Option<Self> {
        match message {
            Message::Text(text) => Some(Self::Text(text.as_str().to_owned())),
            Message::Binary(data) => Some(Self::Binary(data.to_vec())),
            Message::Close(frame) => Some(Self::Close(frame.map(|frame| {
                CloseReason::new(Some(u16::from(frame.code)), frame.reason.as_str())
            }))),
            // Ping/Pong are answered by tungstenite itself
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => None,
        }
    }
}

// ============================================================================
// CloseReason
// ============================================================================

/// RFC 6455 normal closure.
const NORMAL_CLOSURE: u16 = 1000;

/// Why a connection ended.
///
/// Published on the close-reason stream when the connection fails to open
/// or is dropped by the remote end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    /// WebSocket close code, if the peer sent one.
    pub code: Option<u16>,
    /// Human-readable reason.
    pub reason: String,
}

impl CloseReason {
    /// Creates a close reason.
    #[inline]
    #[must_use]
    pub fn new(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }

    /// Close reason for a socket error.
    #[inline]
    #[must_use]
    pub fn from_error(error: &Error) -> Self {
        Self::new(None, error.to_string())
    }

    /// Close reason for a stream that ended without a close frame.
    #[inline]
    #[must_use]
    pub fn stream_ended() -> Self {
        Self::new(None, "Connection ended")
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{} ({code})", self.reason),
            None => f.write_str(&self.reason),
        }
    }
}

// ============================================================================
// SocketParts
// ============================================================================

/// Outbound half of a socket.
pub type WireSink = Pin<Box<dyn Sink<WireMessage, Error = Error> + Send>>;

/// Inbound half of a socket.
pub type WireStream = Pin<Box<dyn Stream<Item = Result<WireMessage>> + Send>>;

/// Both halves of one open socket.
pub struct SocketParts {
    /// Outbound messages.
    pub sink: WireSink,
    /// Inbound messages.
    pub stream: WireStream,
}

impl fmt::Debug for SocketParts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketParts").finish_non_exhaustive()
    }
}

// ============================================================================
// Connector
// ============================================================================

/// Opens physical connections.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a socket to `url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the handshake fails.
    async fn open(&self, url: &str) -> Result<SocketParts>;
}

// ============================================================================
// TungsteniteConnector
// ============================================================================

/// WebSocket connector over `tokio-tungstenite`.
///
/// `wss://` URLs require the `tls` cargo feature, which is on by default.
#[derive(Debug, Default, Clone, Copy)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn open(&self, url: &str) -> Result<SocketParts> {
        debug!(url, "Opening WebSocket");

        let (ws_stream, response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| Error::connection(format!("WebSocket handshake failed: {e}")))?;

        info!(url, status = %response.status(), "WebSocket connection established");

        let (ws_write, ws_read) = ws_stream.split();

        let sink = ws_write
            .sink_map_err(Error::from)
            .with(|message: WireMessage| future::ready(Ok::<_, Error>(message.into_ws())));

        let stream = ws_read.filter_map(|message| {
            future::ready(match message {
                Ok(message) => WireMessage::from_ws(message).map(Ok),
                Err(e) => Some(Err(Error::from(e))),
            })
        });

        Ok(SocketParts {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
