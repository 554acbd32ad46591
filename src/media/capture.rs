//! Capture device collaborators.
//!
//! The multiplexer does not own microphones or cameras. It drives these
//! traits, implemented by whatever platform layer embeds the crate.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::identifiers::VideoSink;

// ============================================================================
// AudioCapture
// ============================================================================

/// Microphone capture accumulating raw PCM between flushes.
#[async_trait]
pub trait AudioCapture: Send + Sync {
    /// Opens the microphone and starts accumulating.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capture`](crate::Error::Capture) if the device is unavailable.
    async fn start_recording(&self) -> Result<()>;

    /// Stops recording and releases the microphone.
    fn stop_recording(&self);

    /// Returns everything accumulated since the last clear, or `None` if empty.
    fn combined_buffer(&self) -> Option<Vec<u8>>;

    /// Discards the accumulated buffer.
    fn clear_buffer(&self);

    /// Drains the accumulated buffer, `None` if empty.
    ///
    /// Must read and clear under one lock, so PCM appended by the capture
    /// thread during the drain lands in exactly one flush.
    /// [`PcmBuffer::take`] does this.
    fn take_buffer(&self) -> Option<Vec<u8>>;
}

// ============================================================================
// PcmBuffer
// ============================================================================

/// Accumulator for captured PCM shared between a capture thread and the
/// flush timer.
///
/// Every operation holds the same lock, so [`take`](Self::take) hands out
/// exactly the bytes appended before it and nothing appended after.
#[derive(Debug, Default)]
pub struct PcmBuffer {
    bytes: Mutex<Vec<u8>>,
}

impl PcmBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends captured bytes.
    pub fn append(&self, chunk: &[u8]) {
        self.bytes.lock().extend_from_slice(chunk);
    }

    /// Copy of the accumulated bytes, `None` if empty.
    #[must_use]
    pub fn snapshot(&self) -> Option<Vec<u8>> {
        let bytes = self.bytes.lock();
        (!bytes.is_empty()).then(|| bytes.clone())
    }

    /// Swaps the accumulated bytes out, `None` if empty.
    #[must_use]
    pub fn take(&self) -> Option<Vec<u8>> {
        let taken = std::mem::take(&mut *self.bytes.lock());
        (!taken.is_empty()).then_some(taken)
    }

    /// Discards the accumulated bytes.
    pub fn clear(&self) {
        self.bytes.lock().clear();
    }

    /// Number of accumulated bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.lock().len()
    }

    /// Returns `true` if nothing is accumulated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.lock().is_empty()
    }
}

// ============================================================================
// VideoCapture
// ============================================================================

/// Camera capture producing one encoded frame on demand.
#[async_trait]
pub trait VideoCapture: Send + Sync {
    /// Opens the camera, previewing into `sink`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Capture`](crate::Error::Capture) if the device is unavailable.
    async fn start_recording(&self, sink: &VideoSink) -> Result<()>;

    /// Stops recording and releases the camera.
    fn stop_recording(&self, sink: &VideoSink);

    /// Captures the current frame as JPEG bytes, `None` if none is ready.
    ///
    /// # Errors
    ///
    /// Implementation-defined capture failures; the tick is skipped.
    async fn captured_frame(&self) -> Result<Option<Vec<u8>>>;
}

// ============================================================================
// UnavailableCapture
// ============================================================================

/// Stand-in for sessions built without capture devices.
///
/// Every start fails with a capture error, so text-only sessions work
/// and audio/video chat report the missing device instead of panicking.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableCapture;

#[async_trait]
impl AudioCapture for UnavailableCapture {
    async fn start_recording(&self) -> Result<()> {
        Err(Error::audio_capture("no audio capture configured"))
    }

    fn stop_recording(&self) {}

    fn combined_buffer(&self) -> Option<Vec<u8>> {
        None
    }

    fn clear_buffer(&self) {}

    fn take_buffer(&self) -> Option<Vec<u8>> {
        None
    }
}

#[async_trait]
impl VideoCapture for UnavailableCapture {
    async fn start_recording(&self, _sink: &VideoSink) -> Result<()> {
        Err(Error::video_capture("no video capture configured"))
    }

    fn stop_recording(&self, _sink: &VideoSink) {}

    async fn captured_frame(&self) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

// ============================================================================
// Tests
// ============================================================================
