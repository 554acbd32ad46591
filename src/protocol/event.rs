//! Inbound event types.
//!
//! Events are the JSON messages the agent runtime streams back over the
//! live connection. Only the fields the transport itself acts on are
//! modelled; everything else is kept in `extra` and reaches consumers of
//! [`LiveSession::get_messages`](crate::LiveSession::get_messages) as raw JSON.
//!
//! # Format
//!
//! ```json
//! {
//!   "author": "weather_agent",
//!   "content": {
//!     "role": "model",
//!     "parts": [{ "inlineData": { "mimeType": "audio/pcm;rate=24000", "data": "..." } }]
//!   },
//!   "partial": true
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use serde::Deserialize;
use serde_json::{Map, Value};

use super::frame::AUDIO_PCM_MIME;

// ============================================================================
// Raw Audio Part
// ============================================================================

/// Audio payload still in its base64 wire form.
///
/// Decoding is deferred to the playback scheduler so a malformed chunk
/// fails there, is logged, and is dropped without touching the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedAudio {
    /// Full MIME type, including parameters.
    pub mime_type: String,
    /// Standard base64 PCM data.
    pub data: String,
}

impl EncodedAudio {
    /// Sample rate from a `;rate=N` MIME parameter, if present.
    #[must_use]
    pub fn sample_rate(&self) -> Option<u32> {
        self.mime_type
            .split(';')
            .skip(1)
            .filter_map(|param| param.trim().split_once('='))
            .find(|(key, _)| key.trim().eq_ignore_ascii_case("rate"))
            .and_then(|(_, value)| value.trim().parse().ok())
    }
}

// ============================================================================
// LiveEvent
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
struct RawInlineData {
    #[serde(default, alias = "mimeType")]
    mime_type: String,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawPart {
    #[serde(default, alias = "inlineData")]
    inline_data: Option<RawInlineData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct RawContent {
    #[serde(default)]
    parts: Vec<RawPart>,
}

/// An inbound event from the agent runtime.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LiveEvent {
    /// Event author, usually the agent name.
    #[serde(default)]
    pub author: Option<String>,

    /// `true` for streaming fragments.
    #[serde(default)]
    pub partial: Option<bool>,

    /// `true` when the model finished its turn.
    #[serde(default, alias = "turn_complete", rename = "turnComplete")]
    pub turn_complete: Option<bool>,

    /// `true` when the user interrupted the model.
    #[serde(default)]
    pub interrupted: Option<bool>,

    #[serde(default)]
    content: Option<RawContent>,

    /// Remaining fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LiveEvent {
    /// Parses an event from a raw payload.
    ///
    /// Returns `None` for payloads that are not JSON objects.
    #[must_use]
    pub fn parse(payload: &str) -> Option<Self> {
        serde_json::from_str(payload).ok()
    }

    /// Returns the audio parts of this event in order.
    #[must_use]
    pub fn audio_parts(&self) -> Vec<EncodedAudio> {
        self.content
            .iter()
            .flat_map(|content| content.parts.iter())
            .filter_map(|part| part.inline_data.as_ref())
            .filter(|inline| inline.mime_type.starts_with(AUDIO_PCM_MIME))
            .map(|inline| EncodedAudio {
                mime_type: inline.mime_type.clone(),
                data: inline.data.clone(),
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
