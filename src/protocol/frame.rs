//! Outbound frame types.
//!
//! A frame is one discrete unit of outbound data. Each frame is written
//! to the socket as a single JSON text message.
//!
//! # Format
//!
//! Content (text turns):
//! ```json
//! { "content": { "role": "user", "parts": [{ "text": "hello" }] } }
//! ```
//!
//! Blob (realtime media):
//! ```json
//! { "blob": { "mime_type": "audio/pcm", "data": "<base64>" } }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;
use crate::session::SessionIdentity;

use super::encoding::{deserialize_base64, serialize_base64};

// ============================================================================
// Constants
// ============================================================================

/// MIME type of captured microphone audio.
pub const AUDIO_PCM_MIME: &str = "audio/pcm";

/// MIME type of captured camera frames.
pub const IMAGE_JPEG_MIME: &str = "image/jpeg";

// ============================================================================
// Blob
// ============================================================================

/// Binary payload tagged with a MIME type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Blob {
    /// MIME type of `data`.
    #[serde(alias = "mimeType")]
    pub mime_type: String,

    /// Raw bytes; base64 on the wire.
    #[serde(
        serialize_with = "serialize_base64",
        deserialize_with = "deserialize_base64"
    )]
    pub data: Vec<u8>,
}

impl Blob {
    /// Creates a blob.
    #[inline]
    #[must_use]
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    /// Creates an `audio/pcm` blob.
    #[inline]
    #[must_use]
    pub fn audio_pcm(data: Vec<u8>) -> Self {
        Self::new(AUDIO_PCM_MIME, data)
    }

    /// Creates an `image/jpeg` blob.
    #[inline]
    #[must_use]
    pub fn image_jpeg(data: Vec<u8>) -> Self {
        Self::new(IMAGE_JPEG_MIME, data)
    }
}

// ============================================================================
// Content
// ============================================================================

/// One part of a content turn.
///
/// Fields this crate does not model (function calls, file data, ...) are
/// preserved in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    /// Plain text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Inline binary data.
    #[serde(
        default,
        alias = "inlineData",
        skip_serializing_if = "Option::is_none"
    )]
    pub inline_data: Option<Blob>,

    /// Unmodelled fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Part {
    /// Creates a text part.
    #[inline]
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Creates an inline data part.
    #[inline]
    #[must_use]
    pub fn inline(blob: Blob) -> Self {
        Self {
            inline_data: Some(blob),
            ..Self::default()
        }
    }
}

/// A content turn: a role plus ordered parts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Content {
    /// Author role, usually `"user"` or `"model"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    /// Ordered parts.
    #[serde(default)]
    pub parts: Vec<Part>,
}

impl Content {
    /// Creates a user turn with a single text part.
    #[must_use]
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: Some("user".to_owned()),
            parts: vec![Part::text(text)],
        }
    }
}

// ============================================================================
// OutboundFrame
// ============================================================================

/// One outbound unit: a content turn or a realtime blob.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboundFrame {
    /// A content turn (text messages).
    Content(Content),
    /// A realtime media blob.
    Blob(Blob),
}

impl OutboundFrame {
    /// Creates a user text frame.
    #[inline]
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self::Content(Content::user_text(text))
    }

    /// Creates an `audio/pcm` blob frame.
    #[inline]
    #[must_use]
    pub fn audio(data: Vec<u8>) -> Self {
        Self::Blob(Blob::audio_pcm(data))
    }

    /// Creates an `image/jpeg` blob frame.
    #[inline]
    #[must_use]
    pub fn video(data: Vec<u8>) -> Self {
        Self::Blob(Blob::image_jpeg(data))
    }

    /// Serializes the frame to its wire JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Json`](crate::Error::Json) if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Short label for logging.
    #[must_use]
    pub fn kind(&self) -> &str {
        match self {
            Self::Content(_) => "content",
            Self::Blob(blob) => &blob.mime_type,
        }
    }
}

// ============================================================================
// AgentRunRequest
// ============================================================================

/// A run request as issued by the console for a text turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRunRequest {
    /// Agent application name.
    pub app_name: String,
    /// User ID.
    pub user_id: String,
    /// Session ID.
    pub session_id: String,
    /// The new message to send.
    pub new_message: Content,
    /// Whether the caller asked for streaming output.
    #[serde(default)]
    pub streaming: bool,
}

impl AgentRunRequest {
    /// Creates a request for a message in a session.
    #[must_use]
    pub fn new(identity: &SessionIdentity, new_message: Content) -> Self {
        Self {
            app_name: identity.app_name().to_owned(),
            user_id: identity.user_id().to_owned(),
            session_id: identity.session_id().to_owned(),
            new_message,
            streaming: false,
        }
    }

    /// Returns the session identity this request targets.
    #[must_use]
    pub fn identity(&self) -> SessionIdentity {
        SessionIdentity::new(&self.app_name, &self.user_id, &self.session_id)
    }
}

// ============================================================================
// Tests
// ============================================================================
