//! Error types for the live session transport.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use agent_live::{LiveSession, Result, SessionIdentity};
//!
//! async fn example(session: &mut LiveSession) -> Result<()> {
//!     let identity = SessionIdentity::new("weather_agent", "user", "s-1");
//!     session.connect(&identity).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Configuration | [`Error::Config`] |
//! | Connection | [`Error::Connection`], [`Error::ConnectionClosed`] |
//! | Media | [`Error::Capture`], [`Error::Playback`], [`Error::Decode`] |
//! | External | [`Error::Json`], [`Error::WebSocket`], [`Error::Base64`], [`Error::Url`] |

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio_tungstenite::tungstenite::Error as WsError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when the session builder or config is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// WebSocket connection failed.
    ///
    /// Returned when the physical connection cannot be established.
    #[error("Connection failed: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// Connection closed while an operation needed it.
    #[error("Connection closed")]
    ConnectionClosed,

    // ========================================================================
    // Media Errors
    // ========================================================================
    /// Capture device failure (microphone or camera unavailable).
    #[error("Capture error ({device}): {message}")]
    Capture {
        /// Device kind, `"audio"` or `"video"`.
        device: &'static str,
        /// Description of the failure.
        message: String,
    },

    /// Audio output device could not be opened or driven.
    #[error("Playback error: {message}")]
    Playback {
        /// Description of the failure.
        message: String,
    },

    /// Inbound audio payload could not be decoded.
    #[error("Decode error: {message}")]
    Decode {
        /// Description of the decode failure.
        message: String,
    },

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] WsError),

    /// Base64 decode error.
    #[error("Base64 error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a connection error.
    #[inline]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates an audio capture error.
    #[inline]
    pub fn audio_capture(message: impl Into<String>) -> Self {
        Self::Capture {
            device: "audio",
            message: message.into(),
        }
    }

    /// Creates a video capture error.
    #[inline]
    pub fn video_capture(message: impl Into<String>) -> Self {
        Self::Capture {
            device: "video",
            message: message.into(),
        }
    }

    /// Creates a playback device error.
    #[inline]
    pub fn playback(message: impl Into<String>) -> Self {
        Self::Playback {
            message: message.into(),
        }
    }

    /// Creates a decode error.
    #[inline]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a connection error.
    #[inline]
    #[must_use]
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. } | Self::ConnectionClosed | Self::WebSocket(_)
        )
    }

    /// Returns `true` if this is a capture device error.
    #[inline]
    #[must_use]
    pub fn is_capture_error(&self) -> bool {
        matches!(self, Self::Capture { .. })
    }
}

// ============================================================================
// Tests
// ============================================================================
