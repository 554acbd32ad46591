//! In-memory collaborators for tests.
//!
//! Doubles for every external interface of the crate: a connector whose
//! sockets are futures channels, capture devices backed by in-memory buffers,
//! and a playback device with a settable clock.

#![cfg(test)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::identifiers::VideoSink;
use crate::media::{AudioCapture, PcmBuffer, VideoCapture};
use crate::playback::{AudioFormat, PlaybackDevice, PlaybackDeviceFactory, SampleBuffer};
use crate::transport::{Connector, SocketParts, WireMessage};

/// Lets every spawned task run until it blocks again.
///
/// Does not advance a paused clock.
pub(crate) async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// MockConnector
// ============================================================================

/// Decrements the live socket count when the client drops its stream half.
struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct ConnectorState {
    opened: Vec<String>,
    servers: VecDeque<MockServer>,
    fail_next: Option<String>,
}

/// Connector producing in-memory sockets.
#[derive(Default)]
pub(crate) struct MockConnector {
    state: Mutex<ConnectorState>,
    live: Arc<AtomicUsize>,
}

impl MockConnector {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes the next `open` fail with a connection error.
    pub(crate) fn fail_next(&self, message: &str) {
        self.state.lock().fail_next = Some(message.to_owned());
    }

    /// URLs opened so far, in order.
    pub(crate) fn opened(&self) -> Vec<String> {
        self.state.lock().opened.clone()
    }

    /// Sockets whose client half is still held.
    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Server end of the oldest socket not yet taken.
    pub(crate) fn take_server(&self) -> MockServer {
        self.state
            .lock()
            .servers
            .pop_front()
            .expect("no socket was opened")
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn open(&self, url: &str) -> Result<SocketParts> {
        let mut state = self.state.lock();
        if let Some(message) = state.fail_next.take() {
            return Err(Error::connection(message));
        }

        let (outbound_tx, outbound_rx) = unbounded::<WireMessage>();
        let (inbound_tx, inbound_rx) = unbounded::<Result<WireMessage>>();

        self.live.fetch_add(1, Ordering::SeqCst);
        let guard = LiveGuard(Arc::clone(&self.live));

        state.opened.push(url.to_owned());
        state.servers.push_back(MockServer {
            url: url.to_owned(),
            outbound: outbound_rx,
            inbound: Some(inbound_tx),
        });

        let sink = outbound_tx.sink_map_err(|e| Error::connection(e.to_string()));
        let stream = inbound_rx.map(move |message| {
            let _held = &guard;
            message
        });

        Ok(SocketParts {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

/// The remote end of a mock socket.
pub(crate) struct MockServer {
    pub(crate) url: String,
    outbound: UnboundedReceiver<WireMessage>,
    inbound: Option<UnboundedSender<Result<WireMessage>>>,
}

impl MockServer {
    /// Delivers a message to the client.
    pub(crate) fn push(&self, message: WireMessage) {
        if let Some(inbound) = &self.inbound {
            let _ = inbound.unbounded_send(Ok(message));
        }
    }

    /// Delivers a text message to the client.
    pub(crate) fn push_text(&self, text: &str) {
        self.push(WireMessage::Text(text.to_owned()));
    }

    /// Ends the inbound stream without a close frame.
    pub(crate) fn hang_up(&mut self) {
        self.inbound = None;
    }

    /// Next message written by the client, `None` once it closed.
    pub(crate) async fn next_outbound(&mut self) -> Option<WireMessage> {
        self.outbound.next().await
    }

    /// Next client message parsed as JSON.
    pub(crate) async fn next_json(&mut self) -> Value {
        match self.next_outbound().await {
            Some(WireMessage::Text(text)) => serde_json::from_str(&text).expect("valid JSON frame"),
            other => panic!("expected text frame, got {other:?}"),
        }
    }

    /// Every client message already written, parsed as JSON.
    pub(crate) fn drain_json(&mut self) -> Vec<Value> {
        let mut frames = Vec::new();
        while let Ok(Some(message)) = self.outbound.try_next() {
            if let WireMessage::Text(text) = message {
                frames.push(serde_json::from_str(&text).expect("valid JSON frame"));
            }
        }
        frames
    }
}

// ============================================================================
// MockAudioCapture
// ============================================================================

/// Microphone double with a directly writable buffer.
#[derive(Default)]
pub(crate) struct MockAudioCapture {
    buffer: PcmBuffer,
    recording: AtomicBool,
    fail_start: AtomicBool,
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl MockAudioCapture {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Simulates captured PCM arriving.
    pub(crate) fn push(&self, bytes: &[u8]) {
        self.buffer.append(bytes);
    }

    pub(crate) fn buffered(&self) -> usize {
        self.buffer.len()
    }

    pub(crate) fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub(crate) fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioCapture for MockAudioCapture {
    async fn start_recording(&self) -> Result<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(Error::audio_capture("microphone unavailable"));
        }
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.recording.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_recording(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.recording.store(false, Ordering::SeqCst);
    }

    fn combined_buffer(&self) -> Option<Vec<u8>> {
        self.buffer.snapshot()
    }

    fn clear_buffer(&self) {
        self.buffer.clear();
    }

    fn take_buffer(&self) -> Option<Vec<u8>> {
        self.buffer.take()
    }
}

// ============================================================================
// MockVideoCapture
// ============================================================================

/// Camera double returning a fixed frame.
#[derive(Default)]
pub(crate) struct MockVideoCapture {
    frame: Mutex<Option<Vec<u8>>>,
    recording: AtomicBool,
    fail_start: AtomicBool,
    fail_capture: AtomicBool,
    stops: AtomicUsize,
}

impl MockVideoCapture {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_frame(&self, frame: Option<Vec<u8>>) {
        *self.frame.lock() = frame;
    }

    pub(crate) fn set_fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_capture(&self, fail: bool) {
        self.fail_capture.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub(crate) fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VideoCapture for MockVideoCapture {
    async fn start_recording(&self, _sink: &VideoSink) -> Result<()> {
        if self.fail_start.load(Ordering::SeqCst) {
            return Err(Error::video_capture("camera unavailable"));
        }
        self.recording.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn stop_recording(&self, _sink: &VideoSink) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.recording.store(false, Ordering::SeqCst);
    }

    async fn captured_frame(&self) -> Result<Option<Vec<u8>>> {
        if self.fail_capture.load(Ordering::SeqCst) {
            return Err(Error::video_capture("frame grab failed"));
        }
        Ok(self.frame.lock().clone())
    }
}

// ============================================================================
// MockPlaybackFactory
// ============================================================================

#[derive(Default)]
struct PlaybackLog {
    clock: f64,
    created: usize,
    closed: usize,
    starts: Vec<f64>,
}

/// Playback factory whose devices share one settable clock and one log.
#[derive(Default)]
pub(crate) struct MockPlaybackFactory {
    log: Arc<Mutex<PlaybackLog>>,
}

impl MockPlaybackFactory {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_clock(&self, now: f64) {
        self.log.lock().clock = now;
    }

    pub(crate) fn created(&self) -> usize {
        self.log.lock().created
    }

    pub(crate) fn closed(&self) -> usize {
        self.log.lock().closed
    }

    /// Start times of every buffer scheduled on any device.
    pub(crate) fn scheduled_starts(&self) -> Vec<f64> {
        self.log.lock().starts.clone()
    }
}

impl PlaybackDeviceFactory for MockPlaybackFactory {
    fn create(&self, _format: AudioFormat) -> Result<Box<dyn PlaybackDevice>> {
        self.log.lock().created += 1;
        Ok(Box::new(MockPlaybackDevice {
            log: Arc::clone(&self.log),
        }))
    }
}

struct MockPlaybackDevice {
    log: Arc<Mutex<PlaybackLog>>,
}

impl PlaybackDevice for MockPlaybackDevice {
    fn current_time(&self) -> f64 {
        self.log.lock().clock
    }

    fn schedule(&mut self, _buffer: &SampleBuffer, start_time: f64) -> Result<()> {
        self.log.lock().starts.push(start_time);
        Ok(())
    }

    fn close(&mut self) {
        self.log.lock().closed += 1;
    }
}
