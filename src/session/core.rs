//! Live session orchestrator.
//!
//! [`LiveSession`] binds a [`SessionIdentity`] to the live endpoint URL and
//! drives the transport channel and media multiplexer through the
//! connect, stream and teardown lifecycle.
//!
//! # Example
//!
//! ```no_run
//! use agent_live::{LiveSession, SessionIdentity};
//! use futures_util::StreamExt;
//!
//! # async fn example() -> agent_live::Result<()> {
//! let mut session = LiveSession::builder()
//!     .server("localhost:8000")
//!     .build()?;
//!
//! let identity = SessionIdentity::new("weather_agent", "user", "session-1");
//! let mut messages = Box::pin(session.get_messages());
//!
//! session.connect(&identity).await?;
//! while let Some(event) = messages.next().await {
//!     println!("{event}");
//! }
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use futures_util::future;
use futures_util::{Stream, StreamExt};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::identifiers::VideoSink;
use crate::media::{AudioCapture, MediaMultiplexer, VideoCapture};
use crate::playback::PlaybackDeviceFactory;
use crate::protocol::{AgentRunRequest, OutboundFrame};
use crate::transport::{CloseReason, ConnectionScope, Connector, TransportChannel};

use super::builder::LiveSessionBuilder;
use super::config::SessionConfig;
use super::identity::SessionIdentity;

// ============================================================================
// LiveSession
// ============================================================================

/// Client side of one live streaming session.
///
/// Holds at most one connection at a time. Lifecycle operations take
/// `&mut self`, so reconnects and teardowns never interleave.
pub struct LiveSession {
    config: SessionConfig,
    channel: TransportChannel,
    media: MediaMultiplexer,
}

impl fmt::Debug for LiveSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveSession")
            .field("url", &self.current_url())
            .field("connected", &self.is_connected())
            .field("media", &self.media)
            .finish_non_exhaustive()
    }
}

impl LiveSession {
    /// Creates a configuration builder for the session.
    #[inline]
    #[must_use]
    pub fn builder() -> LiveSessionBuilder {
        LiveSessionBuilder::new()
    }

    pub(crate) fn new(
        config: SessionConfig,
        connector: Arc<dyn Connector>,
        playback: Arc<dyn PlaybackDeviceFactory>,
        audio_capture: Arc<dyn AudioCapture>,
        video_capture: Arc<dyn VideoCapture>,
    ) -> Self {
        let channel = TransportChannel::new(
            connector,
            playback,
            config.audio_format,
            config.message_capacity,
        );
        let media = MediaMultiplexer::new(audio_capture, video_capture, config.intervals);

        Self {
            config,
            channel,
            media,
        }
    }

    /// Returns the session configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Connects to the live endpoint of `identity`.
    ///
    /// No-op while already connected to the same URL. Switching to another
    /// URL stops every capture stream and discards captured audio before
    /// the old connection is torn down.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`] if the socket cannot be opened, or a
    /// URL error if the configured server is unusable.
    pub async fn connect(&mut self, identity: &SessionIdentity) -> Result<()> {
        let url = identity.live_url(&self.config.server, self.config.secure)?;
        if self.channel.is_connected_to(&url) {
            return Ok(());
        }

        self.media.stop_all();
        self.channel.connect(&url).await
    }

    /// Closes the connection and everything bound to it.
    ///
    /// Stops both capture streams, releases the playback device and resets
    /// the playback cursor. Publishes no close reason.
    pub async fn close_stream(&mut self) {
        self.media.stop_all();
        self.channel.close().await;
    }

    // ========================================================================
    // Messaging
    // ========================================================================

    /// Sends the new message of `request` as a content frame.
    ///
    /// Connects to the request's session first.
    ///
    /// # Errors
    ///
    /// Returns an error if connecting fails. The frame itself is not
    /// retried or buffered.
    pub async fn send_message(&mut self, request: &AgentRunRequest) -> Result<()> {
        self.connect(&request.identity()).await?;
        self.channel
            .send(OutboundFrame::Content(request.new_message.clone()));
        Ok(())
    }

    /// Streams every inbound event as JSON.
    ///
    /// Empty payloads are skipped; malformed ones are logged and skipped.
    /// The stream spans reconnects.
    pub fn get_messages(&self) -> impl Stream<Item = Value> + Send + use<> {
        self.channel.messages().filter_map(|payload| {
            future::ready({
                if payload.trim().is_empty() {
                    None
                } else {
                    match serde_json::from_str::<Value>(&payload) {
                        Ok(value) => Some(value),
                        Err(e) => {
                            warn!(error = %e, len = payload.len(), "Dropping malformed message");
                            None
                        }
                    }
                }
            })
        })
    }

    /// Streams the reason of every connection that ended without
    /// [`close_stream`](Self::close_stream), including failed connects.
    pub fn on_stream_close(&self) -> impl Stream<Item = CloseReason> + Send + use<> {
        self.channel.close_reasons()
    }

    // ========================================================================
    // Media
    // ========================================================================

    /// Connects, then streams the microphone every audio interval.
    ///
    /// # Errors
    ///
    /// Returns a connection error, or [`Error::Capture`] if the microphone
    /// cannot be opened.
    pub async fn start_audio_chat(&mut self, identity: &SessionIdentity) -> Result<()> {
        self.connect(identity).await?;
        let scope = self.live_scope()?;
        self.media.start_audio(scope).await
    }

    /// Stops microphone streaming.
    pub fn stop_audio_chat(&mut self) {
        self.media.stop_audio();
    }

    /// Connects, then streams the camera every video interval plus audio.
    ///
    /// # Errors
    ///
    /// Returns a connection error, or [`Error::Capture`] if the camera
    /// cannot be opened. A microphone failure is only logged.
    pub async fn start_video_chat(
        &mut self,
        identity: &SessionIdentity,
        sink: &VideoSink,
    ) -> Result<()> {
        self.connect(identity).await?;
        let scope = self.live_scope()?;
        self.media.start_video(scope, sink).await
    }

    /// Stops camera streaming, and audio if it was only started for video.
    pub fn stop_video_chat(&mut self, sink: &VideoSink) {
        self.media.stop_video(sink);
    }

    fn live_scope(&self) -> Result<ConnectionScope> {
        self.channel.scope().ok_or_else(|| {
            debug!("Connection ended before streaming could start");
            Error::ConnectionClosed
        })
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Returns `true` while a live connection exists.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.channel.is_connected()
    }

    /// URL of the current connection, live or dead.
    #[inline]
    #[must_use]
    pub fn current_url(&self) -> Option<&str> {
        self.channel.url()
    }

    /// Returns `true` while the audio flush timer is running.
    #[inline]
    #[must_use]
    pub fn is_audio_active(&self) -> bool {
        self.media.is_audio_active()
    }

    /// Returns `true` while the video flush timer is running.
    #[inline]
    #[must_use]
    pub fn is_video_active(&self) -> bool {
        self.media.is_video_active()
    }

    /// End of the last scheduled playback chunk, in device seconds.
    #[inline]
    #[must_use]
    pub fn last_scheduled_time(&self) -> f64 {
        self.channel.last_scheduled_time()
    }
}

impl Drop for LiveSession {
    fn drop(&mut self) {
        if self.channel.is_connected() {
            info!(url = ?self.channel.url(), "Session dropped while connected");
        }
        self.media.stop_all();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use base64::Engine;
    use serde_json::json;
    use tokio::time::sleep;

    use crate::protocol::Content;
    use crate::test_utils::{
        MockAudioCapture, MockConnector, MockPlaybackFactory, MockServer, MockVideoCapture, settle,
    };

    struct Harness {
        session: LiveSession,
        connector: Arc<MockConnector>,
        playback: Arc<MockPlaybackFactory>,
        audio: Arc<MockAudioCapture>,
        video: Arc<MockVideoCapture>,
    }

    fn harness() -> Harness {
        let connector = MockConnector::new();
        let playback = MockPlaybackFactory::new();
        let audio = MockAudioCapture::new();
        let video = MockVideoCapture::new();

        let session = LiveSession::builder()
            .server("localhost:8000")
            .connector(connector.clone())
            .playback(playback.clone())
            .audio_capture(audio.clone())
            .video_capture(video.clone())
            .build()
            .unwrap();

        Harness {
            session,
            connector,
            playback,
            audio,
            video,
        }
    }

    fn identity(session_id: &str) -> SessionIdentity {
        SessionIdentity::new("app", "user", session_id)
    }

    fn blobs(server: &mut MockServer, mime_type: &str) -> Vec<Vec<u8>> {
        server
            .drain_json()
            .into_iter()
            .filter(|frame| frame["blob"]["mime_type"] == mime_type)
            .map(|frame| {
                let data = frame["blob"]["data"].as_str().unwrap().to_owned();
                base64::engine::general_purpose::STANDARD.decode(data).unwrap()
            })
            .collect()
    }

    /// Sleeps on the paused clock, then lets woken tasks finish.
    async fn elapse(millis: u64) {
        sleep(Duration::from_millis(millis)).await;
        settle().await;
    }

    #[tokio::test]
    async fn test_connect_builds_live_url() {
        let mut h = harness();

        h.session.connect(&identity("s1")).await.unwrap();

        assert!(h.session.is_connected());
        assert_eq!(
            h.session.current_url(),
            Some("ws://localhost:8000/run_live?app_name=app&user_id=user&session_id=s1")
        );
        assert_eq!(h.connector.opened().len(), 1);
    }

    #[tokio::test]
    async fn test_send_message_connects_and_sends_content() {
        let mut h = harness();
        let request = AgentRunRequest::new(&identity("s1"), Content::user_text("hello"));

        h.session.send_message(&request).await.unwrap();
        let mut server = h.connector.take_server();
        let frame = server.next_json().await;

        assert_eq!(
            frame,
            json!({ "content": { "role": "user", "parts": [{ "text": "hello" }] } })
        );
    }

    #[tokio::test]
    async fn test_send_message_failure_reports_close_reason() {
        let mut h = harness();
        let mut closes = Box::pin(h.session.on_stream_close());
        h.connector.fail_next("refused");

        let request = AgentRunRequest::new(&identity("s1"), Content::user_text("hello"));
        let err = h.session.send_message(&request).await.unwrap_err();

        assert!(err.is_connection_error());
        assert!(!h.session.is_connected());
        assert!(closes.next().await.unwrap().reason.contains("refused"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_audio_flushes_every_interval() {
        let mut h = harness();
        h.session.start_audio_chat(&identity("s1")).await.unwrap();
        let mut server = h.connector.take_server();

        h.audio.push(&[1, 2]);
        elapse(260).await;
        h.audio.push(&[3]);
        elapse(250).await;
        // Nothing captured, nothing sent
        elapse(250).await;

        assert_eq!(blobs(&mut server, "audio/pcm"), vec![vec![1, 2], vec![3]]);
        assert_eq!(h.audio.buffered(), 0);
        assert!(h.session.is_audio_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_video_keeps_independent_audio() {
        let mut h = harness();
        let sink = VideoSink::new("preview");
        h.video.set_frame(Some(vec![0xFF, 0xD8, 0xFF, 0xD9]));

        h.session.start_audio_chat(&identity("s1")).await.unwrap();
        h.session.start_video_chat(&identity("s1"), &sink).await.unwrap();
        let mut server = h.connector.take_server();

        h.audio.push(&[7]);
        elapse(1010).await;
        assert_eq!(blobs(&mut server, "image/jpeg").len(), 1);

        h.session.stop_video_chat(&sink);
        assert_eq!(h.video.stops(), 1);
        assert!(!h.video.is_recording());
        assert!(h.audio.is_recording());

        h.audio.push(&[8]);
        elapse(1010).await;

        assert_eq!(blobs(&mut server, "audio/pcm"), vec![vec![8]]);
        assert!(blobs(&mut server, "image/jpeg").is_empty());
        assert!(h.session.is_audio_active());
        assert!(!h.session.is_video_active());
        assert_eq!(h.audio.starts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_video_stops_implicit_audio() {
        let mut h = harness();
        let sink = VideoSink::new("preview");

        h.session.start_video_chat(&identity("s1"), &sink).await.unwrap();
        assert!(h.session.is_audio_active());

        h.session.stop_video_chat(&sink);

        assert!(!h.session.is_audio_active());
        assert!(!h.audio.is_recording());
        assert_eq!(h.audio.stops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_pending_flush() {
        let mut h = harness();
        h.session.start_audio_chat(&identity("s1")).await.unwrap();
        let mut server = h.connector.take_server();

        h.audio.push(&[1, 2, 3]);
        elapse(100).await;
        h.session.close_stream().await;
        elapse(1000).await;

        assert!(blobs(&mut server, "audio/pcm").is_empty());
        assert!(!h.session.is_connected());
        assert!(!h.audio.is_recording());
        assert_eq!(h.audio.buffered(), 0);
        assert_eq!(h.session.last_scheduled_time(), 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capture_failure_is_isolated() {
        let mut h = harness();
        let sink = VideoSink::new("preview");
        h.audio.set_fail_start(true);

        let err = h.session.start_audio_chat(&identity("s1")).await.unwrap_err();
        assert!(err.is_capture_error());

        h.session.start_video_chat(&identity("s1"), &sink).await.unwrap();
        assert!(h.session.is_video_active());
        assert!(!h.session.is_audio_active());

        let request = AgentRunRequest::new(&identity("s1"), Content::user_text("still here"));
        h.session.send_message(&request).await.unwrap();
        let mut server = h.connector.take_server();
        assert_eq!(server.next_json().await["content"]["parts"][0]["text"], "still here");
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_message_keeps_streams_running() {
        let mut h = harness();
        h.session.start_audio_chat(&identity("s1")).await.unwrap();
        let _server = h.connector.take_server();

        let request = AgentRunRequest::new(&identity("s1"), Content::user_text("hi"));
        h.session.send_message(&request).await.unwrap();

        assert!(h.session.is_audio_active());
        assert_eq!(h.connector.opened().len(), 1);
    }

    #[tokio::test]
    async fn test_get_messages_skips_malformed_and_empty() {
        let mut h = harness();
        let mut messages = Box::pin(h.session.get_messages());

        h.session.connect(&identity("s1")).await.unwrap();
        let server = h.connector.take_server();
        server.push_text("{not json");
        server.push_text("");
        server.push_text(r#"{"author":"agent","partial":true}"#);
        server.push_text(r#"{"turnComplete":true}"#);

        assert_eq!(messages.next().await.unwrap(), json!({ "author": "agent", "partial": true }));
        assert_eq!(messages.next().await.unwrap(), json!({ "turnComplete": true }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_switching_session_resets_connection_state() {
        let mut h = harness();
        h.session.start_audio_chat(&identity("s1")).await.unwrap();
        let first = h.connector.take_server();

        let data = base64::engine::general_purpose::STANDARD.encode(vec![0u8; 48_000]);
        first.push_text(
            &json!({ "content": { "parts": [{ "inlineData": { "mimeType": "audio/pcm", "data": data } }] } })
                .to_string(),
        );
        settle().await;
        assert_eq!(h.session.last_scheduled_time(), 1.0);
        h.audio.push(&[1, 2, 3]);

        h.session.connect(&identity("s2")).await.unwrap();
        settle().await;

        assert_eq!(h.connector.live(), 1);
        assert_eq!(h.audio.buffered(), 0);
        assert!(!h.audio.is_recording());
        assert!(!h.session.is_audio_active());
        assert_eq!(h.session.last_scheduled_time(), 0.0);
        assert_eq!(h.playback.closed(), 1);
        assert!(h.session.current_url().unwrap().ends_with("session_id=s2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_drop_publishes_reason_and_stops_streams() {
        let mut h = harness();
        let mut closes = Box::pin(h.session.on_stream_close());

        h.session.start_audio_chat(&identity("s1")).await.unwrap();
        let mut server = h.connector.take_server();
        server.hang_up();

        let reason = closes.next().await.unwrap();
        settle().await;

        assert_eq!(reason, CloseReason::stream_ended());
        assert!(!h.session.is_connected());
        assert!(!h.session.is_audio_active());
        assert!(!h.audio.is_recording());

        // Same identity reconnects once the connection is gone
        h.session.connect(&identity("s1")).await.unwrap();
        assert_eq!(h.connector.opened().len(), 2);
        assert!(h.session.is_connected());
    }
}
