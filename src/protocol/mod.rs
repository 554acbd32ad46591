//! Live protocol message types.
//!
//! This module defines the JSON messages exchanged with the agent
//! runtime's `/run_live` endpoint.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | `OutboundFrame::Content` | Local → Remote | Text turn |
//! | `OutboundFrame::Blob` | Local → Remote | Realtime audio/video |
//! | `LiveEvent` | Remote → Local | Agent output, including audio |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `encoding` | base64url canonicalization |
//! | `event` | Inbound event types |
//! | `frame` | Outbound frame and content types |

// ============================================================================
// Submodules
// ============================================================================

/// Binary field encoding.
pub mod encoding;

/// Inbound event types.
pub mod event;

/// Outbound frame types.
pub mod frame;

// ============================================================================
// Re-exports
// ============================================================================

pub use encoding::{decode_standard, normalize_binary_fields, normalize_payload, url_safe_to_standard};
pub use event::{EncodedAudio, LiveEvent};
pub use frame::{
    AUDIO_PCM_MIME, AgentRunRequest, Blob, Content, IMAGE_JPEG_MIME, OutboundFrame, Part,
};
