//! Agent Live - Streaming session transport for agent runtimes.
//!
//! This library connects to the `/run_live` endpoint of an agent runtime
//! over a single WebSocket and multiplexes text, microphone audio and camera
//! frames onto it, while scheduling the agent's spoken replies for gapless
//! playback.
//!
//! # Architecture
//!
//! ```text
//!                     ┌──────────────────────────────┐
//!  send_message ─────►│         LiveSession          │
//!  start_*_chat ─────►│                              │
//!                     │  MediaMultiplexer            │
//!                     │   ├ audio flush (250 ms)     │
//!                     │   └ video flush (1000 ms)    │
//!                     │            │ frames          │
//!                     │            ▼                 │
//!                     │  TransportChannel ───────────┼──► agent runtime
//!                     │   └ ConnectionHandle         │◄──
//!                     │      ├ event loop            │
//!                     │      └ PlaybackScheduler     │
//!                     └──────────────┬───────────────┘
//!                                    ▼
//!                    get_messages / on_stream_close
//! ```
//!
//! Key design principles:
//!
//! - Everything derived from a connection (timers, playback device,
//!   cursor) lives in one handle and is torn down as a unit
//! - Reconnecting tears the old handle down before opening a new one
//! - Capture devices, playback devices and the socket are traits, so the
//!   platform layer plugs in its own
//!
//! # Quick Start
//!
//! ```no_run
//! use agent_live::{AgentRunRequest, Content, LiveSession, Result, SessionIdentity};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let mut session = LiveSession::builder()
//!         .server("localhost:8000")
//!         .build()?;
//!
//!     let identity = SessionIdentity::new("weather_agent", "user", "session-1");
//!     let request = AgentRunRequest::new(&identity, Content::user_text("Hello"));
//!     session.send_message(&request).await?;
//!
//!     session.close_stream().await;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`media`] | Capture traits and outbound flush timers |
//! | [`playback`] | Inbound audio decoding and scheduling |
//! | [`protocol`] | Wire message types |
//! | [`session`] | [`LiveSession`] orchestrator and builder |
//! | [`transport`] | WebSocket transport layer |
//!
//! # Features
//!
//! - `tls` (default): enables `wss://` connections through native TLS.
//!   Without it a secure [`SessionConfig`] fails validation.
//! - `speaker`: plays agent audio on the default output device through
//!   `cpal` (`playback::SpeakerFactory`). Without it playback runs on the
//!   silent [`ClockDeviceFactory`](playback::ClockDeviceFactory).

// ============================================================================
// Modules
// ============================================================================

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Capture traits and outbound flush timers.
pub mod media;

/// Inbound audio decoding and gapless scheduling.
pub mod playback;

/// Wire message types.
///
/// Outbound frames, inbound events and base64 canonicalization.
pub mod protocol;

/// Session orchestration.
///
/// Use [`LiveSession::builder()`] to create a configured session.
pub mod session;

/// WebSocket transport layer.
///
/// Connection lifecycle, event loop and inbound fan-out.
pub mod transport;

#[cfg(test)]
pub(crate) mod test_utils;

// ============================================================================
// Re-exports
// ============================================================================

// Session types
pub use session::{LiveSession, LiveSessionBuilder, SessionConfig, SessionIdentity};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{ConnectionId, VideoSink};

// Media types
pub use media::{AudioCapture, FlushIntervals, VideoCapture};

// Playback types
pub use playback::{AudioFormat, PlaybackDevice, PlaybackDeviceFactory};

// Protocol types
pub use protocol::{AgentRunRequest, Blob, Content, OutboundFrame, Part};

// Transport types
pub use transport::{CloseReason, Connector};
