//! Builder pattern for session configuration.
//!
//! Provides a fluent API for configuring and creating [`LiveSession`]
//! instances.
//!
//! # Example
//!
//! ```no_run
//! use agent_live::LiveSession;
//!
//! # fn example() -> agent_live::Result<()> {
//! let session = LiveSession::builder()
//!     .server("localhost:8000")
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::media::{AudioCapture, UnavailableCapture, VideoCapture};
use crate::playback::{AudioFormat, ClockDeviceFactory, PlaybackDeviceFactory};
use crate::transport::{Connector, TungsteniteConnector};

use super::config::SessionConfig;
use super::core::LiveSession;

// ============================================================================
// LiveSessionBuilder
// ============================================================================

/// Builder for configuring a [`LiveSession`].
///
/// Unset collaborators fall back to working stand-ins: a real WebSocket
/// connector, a silent clock-only playback device, and capture devices
/// that refuse to start.
#[derive(Default, Clone)]
pub struct LiveSessionBuilder {
    config: SessionConfig,
    connector: Option<Arc<dyn Connector>>,
    playback: Option<Arc<dyn PlaybackDeviceFactory>>,
    audio_capture: Option<Arc<dyn AudioCapture>>,
    video_capture: Option<Arc<dyn VideoCapture>>,
}

impl fmt::Debug for LiveSessionBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSessionBuilder")
            .field("config", &self.config)
            .field("custom_connector", &self.connector.is_some())
            .field("audio_capture", &self.audio_capture.is_some())
            .field("video_capture", &self.video_capture.is_some())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// LiveSessionBuilder Implementation
// ============================================================================

impl LiveSessionBuilder {
    /// Creates a builder with default settings and no server.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every setting with `config`.
    #[must_use]
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the agent server, e.g. `localhost:8000` or `host/api`.
    #[inline]
    #[must_use]
    pub fn server(mut self, server: impl Into<String>) -> Self {
        self.config.server = server.into();
        self
    }

    /// Connects over `wss://`.
    #[inline]
    #[must_use]
    pub fn secure(mut self, secure: bool) -> Self {
        self.config.secure = secure;
        self
    }

    /// Sets the microphone flush period.
    #[inline]
    #[must_use]
    pub fn audio_interval(mut self, period: Duration) -> Self {
        self.config.intervals.audio = period;
        self
    }

    /// Sets the camera capture period.
    #[inline]
    #[must_use]
    pub fn video_interval(mut self, period: Duration) -> Self {
        self.config.intervals.video = period;
        self
    }

    /// Sets the format of inbound PCM audio.
    #[inline]
    #[must_use]
    pub fn audio_format(mut self, format: AudioFormat) -> Self {
        self.config.audio_format = format;
        self
    }

    /// Sets how far a message subscriber may lag before skipping.
    #[inline]
    #[must_use]
    pub fn message_capacity(mut self, capacity: usize) -> Self {
        self.config.message_capacity = capacity;
        self
    }

    /// Uses a custom connector instead of the WebSocket one.
    #[must_use]
    pub fn connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Uses a real playback device.
    #[must_use]
    pub fn playback(mut self, factory: Arc<dyn PlaybackDeviceFactory>) -> Self {
        self.playback = Some(factory);
        self
    }

    /// Sets the microphone.
    #[must_use]
    pub fn audio_capture(mut self, capture: Arc<dyn AudioCapture>) -> Self {
        self.audio_capture = Some(capture);
        self
    }

    /// Sets the camera.
    #[must_use]
    pub fn video_capture(mut self, capture: Arc<dyn VideoCapture>) -> Self {
        self.video_capture = Some(capture);
        self
    }

    /// Builds the session with validation.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`](crate::Error::Config) if the server is
    /// missing or an interval, format or capacity is zero.
    pub fn build(self) -> Result<LiveSession> {
        self.config.validate()?;

        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(TungsteniteConnector));
        let playback = self
            .playback
            .unwrap_or_else(|| Arc::new(ClockDeviceFactory));
        let audio_capture = self
            .audio_capture
            .unwrap_or_else(|| Arc::new(UnavailableCapture));
        let video_capture = self
            .video_capture
            .unwrap_or_else(|| Arc::new(UnavailableCapture));

        Ok(LiveSession::new(
            self.config,
            connector,
            playback,
            audio_capture,
            video_capture,
        ))
    }
}

// ============================================================================
// Tests
// ============================================================================
