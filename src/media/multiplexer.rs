//! Outbound media multiplexer.
//!
//! Turns the two capture collaborators into two independently clocked
//! frame streams on the current connection.
//!
//! # Streams
//!
//! | Stream | Period | Frame |
//! |--------|--------|-------|
//! | Audio | 250 ms | `audio/pcm` blob of everything captured since the last flush |
//! | Video | 1000 ms | `image/jpeg` blob of the current frame |
//!
//! Each stream is a repeating task bound to two cancellation tokens: its
//! own (stopped by the caller) and the connection scope (stopped by
//! teardown). Whichever fires first ends the task, and the capture device
//! is released exactly once.
//!
//! Video chat implies audio chat. Audio that was only started as part of a
//! video chat is stopped with it; audio started on its own keeps running.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::error::Result;
use crate::identifiers::VideoSink;
use crate::protocol::OutboundFrame;
use crate::transport::ConnectionScope;

use super::capture::{AudioCapture, VideoCapture};

// ============================================================================
// FlushIntervals
// ============================================================================

/// Flush cadence of the two outbound streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushIntervals {
    /// Audio buffer flush period.
    pub audio: Duration,
    /// Video frame capture period.
    pub video: Duration,
}

impl Default for FlushIntervals {
    fn default() -> Self {
        Self {
            audio: Duration::from_millis(250),
            video: Duration::from_millis(1000),
        }
    }
}

// ============================================================================
// Release
// ============================================================================

/// Idempotent device release shared by a task and its owner.
struct Release {
    done: AtomicBool,
    action: Box<dyn Fn() + Send + Sync>,
}

impl Release {
    fn new(action: impl Fn() + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            done: AtomicBool::new(false),
            action: Box::new(action),
        })
    }

    fn run(&self) {
        if !self.done.swap(true, Ordering::AcqRel) {
            (self.action)();
        }
    }
}

// ============================================================================
// StreamTask
// ============================================================================

/// One running flush timer.
struct StreamTask {
    own: CancellationToken,
    scope: ConnectionScope,
    release: Arc<Release>,
    handle: JoinHandle<()>,
}

impl StreamTask {
    /// `false` once stopped or once the connection went away.
    fn is_active(&self) -> bool {
        !self.own.is_cancelled() && !self.scope.is_cancelled()
    }

    /// Cancels the timer and releases the device.
    fn stop(self) {
        self.own.cancel();
        self.handle.abort();
        self.release.run();
    }
}

/// Why audio capture is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AudioOrigin {
    /// Requested by `start_audio`.
    Independent,
    /// Started implicitly by `start_video`.
    WithVideo,
}

struct AudioStream {
    task: StreamTask,
    origin: AudioOrigin,
}

struct VideoStream {
    task: StreamTask,
    sink: VideoSink,
}

// ============================================================================
// MediaMultiplexer
// ============================================================================

/// Owns the audio and video flush timers.
pub struct MediaMultiplexer {
    audio_capture: Arc<dyn AudioCapture>,
    video_capture: Arc<dyn VideoCapture>,
    intervals: FlushIntervals,
    audio: Option<AudioStream>,
    video: Option<VideoStream>,
}

impl fmt::Debug for MediaMultiplexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaMultiplexer")
            .field("intervals", &self.intervals)
            .field("audio_active", &self.is_audio_active())
            .field("video_active", &self.is_video_active())
            .finish_non_exhaustive()
    }
}

impl MediaMultiplexer {
    /// Creates a multiplexer with no running streams.
    #[must_use]
    pub fn new(
        audio_capture: Arc<dyn AudioCapture>,
        video_capture: Arc<dyn VideoCapture>,
        intervals: FlushIntervals,
    ) -> Self {
        Self {
            audio_capture,
            video_capture,
            intervals,
            audio: None,
            video: None,
        }
    }

    /// Returns `true` while the audio timer runs.
    #[must_use]
    pub fn is_audio_active(&self) -> bool {
        self.audio.as_ref().is_some_and(|stream| stream.task.is_active())
    }

    /// Returns `true` while the video timer runs.
    #[must_use]
    pub fn is_video_active(&self) -> bool {
        self.video.as_ref().is_some_and(|stream| stream.task.is_active())
    }

    /// Starts microphone capture and the audio flush timer.
    ///
    /// No-op if audio is already streaming on this connection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capture`](crate::Error::Capture) if the microphone
    /// cannot be opened. The error is also logged.
    pub async fn start_audio(&mut self, scope: ConnectionScope) -> Result<()> {
        self.start_audio_stream(scope, AudioOrigin::Independent)
            .await
    }

    /// Starts camera capture plus audio, each with its own timer.
    ///
    /// A microphone failure is logged and does not prevent video.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capture`](crate::Error::Capture) if the camera
    /// cannot be opened.
    pub async fn start_video(&mut self, scope: ConnectionScope, sink: &VideoSink) -> Result<()> {
        if let Err(e) = self
            .start_audio_stream(scope.clone(), AudioOrigin::WithVideo)
            .await
        {
            warn!(error = %e, "Video chat continuing without audio");
        }

        if let Some(stream) = &self.video
            && stream.task.is_active()
            && stream.sink == *sink
        {
            trace!(%sink, "Video already streaming");
            return Ok(());
        }
        if let Some(stale) = self.video.take() {
            stale.task.stop();
        }

        if let Err(e) = self.video_capture.start_recording(sink).await {
            warn!(error = %e, "Error accessing camera");
            return Err(e);
        }

        let own = CancellationToken::new();
        let release = {
            let capture = Arc::clone(&self.video_capture);
            let sink = sink.clone();
            Release::new(move || capture.stop_recording(&sink))
        };
        let handle = tokio::spawn(run_video_flush(
            scope.clone(),
            own.clone(),
            Arc::clone(&self.video_capture),
            self.intervals.video,
            Arc::clone(&release),
        ));

        info!(connection = %scope.id(), %sink, "Video streaming started");

        self.video = Some(VideoStream {
            task: StreamTask {
                own,
                scope,
                release,
                handle,
            },
            sink: sink.clone(),
        });
        Ok(())
    }

    /// Stops the audio timer and releases the microphone.
    pub fn stop_audio(&mut self) {
        if let Some(stream) = self.audio.take() {
            stream.task.stop();
            debug!("Audio streaming stopped");
        }
    }

    /// Stops the video timer and releases the camera.
    ///
    /// Audio keeps running if it was started on its own.
    pub fn stop_video(&mut self, sink: &VideoSink) {
        if let Some(stream) = self.video.take() {
            if stream.sink != *sink {
                warn!(active = %stream.sink, requested = %sink, "Stopping video for a different sink");
            }
            stream.task.stop();
            debug!("Video streaming stopped");
        }

        if self
            .audio
            .as_ref()
            .is_some_and(|stream| stream.origin == AudioOrigin::WithVideo)
        {
            self.stop_audio();
        }
    }

    /// Stops both streams and discards any captured audio not yet sent.
    pub fn stop_all(&mut self) {
        if let Some(stream) = self.video.take() {
            stream.task.stop();
        }
        self.stop_audio();
        self.audio_capture.clear_buffer();
    }

    async fn start_audio_stream(&mut self, scope: ConnectionScope, origin: AudioOrigin) -> Result<()> {
        if let Some(stream) = &mut self.audio
            && stream.task.is_active()
        {
            if origin == AudioOrigin::Independent {
                stream.origin = AudioOrigin::Independent;
            }
            trace!("Audio already streaming");
            return Ok(());
        }
        if let Some(stale) = self.audio.take() {
            stale.task.stop();
        }

        if let Err(e) = self.audio_capture.start_recording().await {
            warn!(error = %e, "Error accessing microphone");
            return Err(e);
        }

        let own = CancellationToken::new();
        let release = {
            let capture = Arc::clone(&self.audio_capture);
            Release::new(move || capture.stop_recording())
        };
        let handle = tokio::spawn(run_audio_flush(
            scope.clone(),
            own.clone(),
            Arc::clone(&self.audio_capture),
            self.intervals.audio,
            Arc::clone(&release),
        ));

        info!(connection = %scope.id(), ?origin, "Audio streaming started");

        self.audio = Some(AudioStream {
            task: StreamTask {
                own,
                scope,
                release,
                handle,
            },
            origin,
        });
        Ok(())
    }
}

impl Drop for MediaMultiplexer {
    fn drop(&mut self) {
        if let Some(stream) = self.video.take() {
            stream.task.stop();
        }
        if let Some(stream) = self.audio.take() {
            stream.task.stop();
        }
    }
}

// ============================================================================
// Flush Tasks
// ============================================================================

/// Periodic ticker whose first tick is one period from now.
fn ticker(period: Duration) -> tokio::time::Interval {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

async fn run_audio_flush(
    scope: ConnectionScope,
    own: CancellationToken,
    capture: Arc<dyn AudioCapture>,
    period: Duration,
    release: Arc<Release>,
) {
    let mut ticker = ticker(period);

    loop {
        tokio::select! {
            biased;

            () = own.cancelled() => break,

            () = scope.token().cancelled() => {
                debug!(connection = %scope.id(), "Connection gone, stopping audio capture");
                release.run();
                break;
            }

            _ = ticker.tick() => {
                // Drained atomically; an empty buffer sends nothing
                if let Some(buffer) = capture.take_buffer()
                    && !buffer.is_empty()
                {
                    trace!(connection = %scope.id(), bytes = buffer.len(), "Flushing audio");
                    scope.send(OutboundFrame::audio(buffer));
                }
            }
        }
    }
}

async fn run_video_flush(
    scope: ConnectionScope,
    own: CancellationToken,
    capture: Arc<dyn VideoCapture>,
    period: Duration,
    release: Arc<Release>,
) {
    let mut ticker = ticker(period);

    loop {
        tokio::select! {
            biased;

            () = own.cancelled() => break,

            () = scope.token().cancelled() => {
                debug!(connection = %scope.id(), "Connection gone, stopping video capture");
                release.run();
                break;
            }

            _ = ticker.tick() => {
                match capture.captured_frame().await {
                    Ok(Some(frame)) => {
                        // Capture is async; the stream may have stopped meanwhile
                        if own.is_cancelled() || scope.is_cancelled() {
                            continue;
                        }
                        trace!(connection = %scope.id(), bytes = frame.len(), "Sending video frame");
                        scope.send(OutboundFrame::video(frame));
                    }
                    Ok(None) => trace!("No video frame ready"),
                    Err(e) => warn!(error = %e, "Frame capture failed, skipping"),
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::time::sleep;

    use crate::playback::AudioFormat;
    use crate::test_utils::{
        MockAudioCapture, MockConnector, MockPlaybackFactory, MockVideoCapture, settle,
    };
    use crate::transport::{DEFAULT_MESSAGE_CAPACITY, TransportChannel};

    struct Harness {
        channel: TransportChannel,
        connector: Arc<MockConnector>,
        audio: Arc<MockAudioCapture>,
        video: Arc<MockVideoCapture>,
        media: MediaMultiplexer,
    }

    async fn harness() -> Harness {
        let connector = MockConnector::new();
        let mut channel = TransportChannel::new(
            connector.clone(),
            MockPlaybackFactory::new(),
            AudioFormat::default(),
            DEFAULT_MESSAGE_CAPACITY,
        );
        channel.connect("ws://host/run_live").await.unwrap();

        let audio = MockAudioCapture::new();
        let video = MockVideoCapture::new();
        let media = MediaMultiplexer::new(audio.clone(), video.clone(), FlushIntervals::default());

        Harness {
            channel,
            connector,
            audio,
            video,
            media,
        }
    }

    fn scope(h: &Harness) -> ConnectionScope {
        h.channel.scope().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_audio_twice_is_noop() {
        let mut h = harness().await;

        h.media.start_audio(scope(&h)).await.unwrap();
        h.media.start_audio(scope(&h)).await.unwrap();

        assert_eq!(h.audio.starts(), 1);
        assert!(h.media.is_audio_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_explicit_audio_survives_stop_video() {
        let mut h = harness().await;
        let sink = VideoSink::new("cam");

        // Implicit audio becomes independent once requested directly
        h.media.start_video(scope(&h), &sink).await.unwrap();
        h.media.start_audio(scope(&h)).await.unwrap();
        h.media.stop_video(&sink);

        assert!(h.media.is_audio_active());
        assert!(!h.media.is_video_active());
        assert_eq!(h.audio.starts(), 1);
        assert_eq!(h.audio.stops(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connection_teardown_releases_once() {
        let mut h = harness().await;
        let sink = VideoSink::new("cam");
        h.media.start_video(scope(&h), &sink).await.unwrap();

        h.channel.close().await;
        settle().await;

        assert!(!h.media.is_audio_active());
        assert!(!h.media.is_video_active());
        assert!(!h.audio.is_recording());
        assert!(!h.video.is_recording());

        h.media.stop_video(&sink);
        h.media.stop_audio();

        assert_eq!(h.audio.stops(), 1);
        assert_eq!(h.video.stops(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_teardown() {
        let mut h = harness().await;
        h.media.start_audio(scope(&h)).await.unwrap();

        h.channel.connect("ws://host/other").await.unwrap();
        settle().await;
        assert!(!h.media.is_audio_active());

        h.media.start_audio(scope(&h)).await.unwrap();

        assert!(h.media.is_audio_active());
        assert_eq!(h.audio.starts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_frame_capture_skips_tick() {
        let mut h = harness().await;
        let mut server = h.connector.take_server();
        let sink = VideoSink::new("cam");
        h.video.set_frame(Some(vec![1, 2, 3]));
        h.video.set_fail_capture(true);

        h.media.start_video(scope(&h), &sink).await.unwrap();
        sleep(Duration::from_millis(1010)).await;
        settle().await;
        assert!(server.drain_json().is_empty());

        h.video.set_fail_capture(false);
        sleep(Duration::from_millis(1000)).await;
        settle().await;

        let frames = server.drain_json();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0]["blob"]["mime_type"], "image/jpeg");
        assert!(h.media.is_video_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_all_clears_buffer() {
        let mut h = harness().await;
        h.media.start_audio(scope(&h)).await.unwrap();
        h.audio.push(&[1, 2, 3, 4]);

        h.media.stop_all();

        assert_eq!(h.audio.buffered(), 0);
        assert!(!h.media.is_audio_active());
        assert_eq!(h.audio.stops(), 1);
    }
}
