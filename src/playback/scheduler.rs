//! Gapless audio scheduling.
//!
//! Each decoded chunk starts exactly where the previous one ends, or now
//! if the device clock has already passed that point:
//!
//! ```text
//! start  = max(cursor, device.now)
//! cursor = start + duration
//! ```
//!
//! Bursty delivery therefore queues chunks back to back instead of
//! overlapping or dropping them.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::Result;
use crate::protocol::EncodedAudio;

use super::decode::decode_pcm16;
use super::device::{AudioFormat, PlaybackDevice, PlaybackDeviceFactory, SampleBuffer};

// ============================================================================
// PlaybackCursor
// ============================================================================

/// Device-clock time at which the next chunk must begin.
///
/// Never moves backwards while a connection is open; only [`reset`]
/// returns it to zero.
///
/// [`reset`]: PlaybackCursor::reset
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlaybackCursor {
    last_scheduled_time: f64,
}

impl PlaybackCursor {
    /// Returns the time the next chunk will start at the earliest.
    #[inline]
    #[must_use]
    pub const fn last_scheduled_time(&self) -> f64 {
        self.last_scheduled_time
    }

    /// Computes the start time for a chunk of `duration` and advances.
    pub fn advance(&mut self, now: f64, duration: f64) -> f64 {
        let start = self.last_scheduled_time.max(now);
        self.last_scheduled_time = start + duration;
        start
    }

    /// Returns the cursor to zero.
    #[inline]
    pub fn reset(&mut self) {
        self.last_scheduled_time = 0.0;
    }
}

// ============================================================================
// PlaybackScheduler
// ============================================================================

/// Connection-scoped scheduler owning at most one playback device.
///
/// The device is opened lazily on the first chunk so text-only sessions
/// never hold audio hardware.
pub struct PlaybackScheduler {
    factory: Arc<dyn PlaybackDeviceFactory>,
    format: AudioFormat,
    device: Option<Box<dyn PlaybackDevice>>,
    cursor: PlaybackCursor,
}

impl PlaybackScheduler {
    /// Creates a scheduler with no device and a zero cursor.
    #[must_use]
    pub fn new(factory: Arc<dyn PlaybackDeviceFactory>, format: AudioFormat) -> Self {
        Self {
            factory,
            format,
            device: None,
            cursor: PlaybackCursor::default(),
        }
    }

    /// Returns the playback cursor.
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> PlaybackCursor {
        self.cursor
    }

    /// Returns `true` while a device is open.
    #[inline]
    #[must_use]
    pub fn has_device(&self) -> bool {
        self.device.is_some()
    }

    /// Decodes and schedules one inbound audio part.
    ///
    /// Returns the scheduled start time. On failure nothing is scheduled
    /// and the cursor does not move.
    ///
    /// # Errors
    ///
    /// - [`Error::Base64`](crate::Error::Base64) / [`Error::Decode`](crate::Error::Decode) for malformed data
    /// - Device creation or scheduling errors
    pub fn schedule_encoded(&mut self, audio: &EncodedAudio) -> Result<f64> {
        let format = AudioFormat {
            sample_rate: audio.sample_rate().unwrap_or(self.format.sample_rate),
            channels: self.format.channels,
        };
        let buffer = decode_pcm16(&audio.data, format)?;
        self.schedule(&buffer)
    }

    /// Schedules an already decoded buffer.
    ///
    /// # Errors
    ///
    /// Device creation or scheduling errors. The cursor only advances
    /// once the device accepted the buffer.
    pub fn schedule(&mut self, buffer: &SampleBuffer) -> Result<f64> {
        let mut device = match self.device.take() {
            Some(device) => device,
            None => {
                debug!(sample_rate = self.format.sample_rate, "Opening playback device");
                self.factory.create(self.format)?
            }
        };

        let mut cursor = self.cursor;
        let start = cursor.advance(device.current_time(), buffer.duration_secs());
        let scheduled = device.schedule(buffer, start);
        self.device = Some(device);

        scheduled?;
        self.cursor = cursor;
        Ok(start)
    }

    /// Schedules a chunk, logging and dropping it on failure.
    pub fn play(&mut self, audio: &EncodedAudio) {
        if let Err(e) = self.schedule_encoded(audio) {
            warn!(error = %e, mime_type = %audio.mime_type, "Dropping audio chunk");
        }
    }

    /// Closes the device (stopping in-flight buffers) and resets the cursor.
    ///
    /// Safe to call repeatedly.
    pub fn release(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.close();
            debug!("Playback device released");
        }
        self.cursor.reset();
    }
}

impl Drop for PlaybackScheduler {
    fn drop(&mut self) {
        self.release();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    use crate::test_utils::MockPlaybackFactory;

    fn chunk(frames: usize) -> EncodedAudio {
        EncodedAudio {
            mime_type: "audio/pcm".into(),
            data: STANDARD.encode(vec![0u8; frames * 2]),
        }
    }

    #[test]
    fn test_cursor_advance() {
        let mut cursor = PlaybackCursor::default();
        assert_eq!(cursor.advance(0.0, 1.0), 0.0);
        assert_eq!(cursor.advance(0.5, 1.0), 1.0);
        // Device clock ran past the cursor
        assert_eq!(cursor.advance(5.0, 1.0), 5.0);
        assert_eq!(cursor.last_scheduled_time(), 6.0);
    }

    #[test]
    fn test_consecutive_chunks_play_back_to_back() {
        let factory = MockPlaybackFactory::new();
        let mut scheduler = PlaybackScheduler::new(factory.clone(), AudioFormat::default());

        // 0.25s each at 24 kHz
        for _ in 0..4 {
            scheduler.schedule_encoded(&chunk(6_000)).unwrap();
        }

        assert_eq!(factory.scheduled_starts(), vec![0.0, 0.25, 0.5, 0.75]);
        assert_eq!(scheduler.cursor().last_scheduled_time(), 1.0);
    }

    #[test]
    fn test_start_clamped_to_device_clock() {
        let factory = MockPlaybackFactory::new();
        let mut scheduler = PlaybackScheduler::new(factory.clone(), AudioFormat::default());

        scheduler.schedule_encoded(&chunk(24_000)).unwrap();
        factory.set_clock(3.0);
        let start = scheduler.schedule_encoded(&chunk(24_000)).unwrap();

        assert_eq!(start, 3.0);
        assert_eq!(scheduler.cursor().last_scheduled_time(), 4.0);
    }

    #[test]
    fn test_device_created_lazily() {
        let factory = MockPlaybackFactory::new();
        let mut scheduler = PlaybackScheduler::new(factory.clone(), AudioFormat::default());

        assert!(!scheduler.has_device());
        assert_eq!(factory.created(), 0);

        scheduler.schedule_encoded(&chunk(10)).unwrap();
        scheduler.schedule_encoded(&chunk(10)).unwrap();

        assert!(scheduler.has_device());
        assert_eq!(factory.created(), 1);
    }

    #[test]
    fn test_decode_failure_does_not_advance_cursor() {
        let factory = MockPlaybackFactory::new();
        let mut scheduler = PlaybackScheduler::new(factory.clone(), AudioFormat::default());

        scheduler.schedule_encoded(&chunk(24_000)).unwrap();
        scheduler.play(&EncodedAudio {
            mime_type: "audio/pcm".into(),
            data: "%%%not base64".into(),
        });

        assert_eq!(scheduler.cursor().last_scheduled_time(), 1.0);
        assert_eq!(factory.scheduled_starts(), vec![0.0]);
    }

    #[test]
    fn test_release_closes_device_and_resets_cursor() {
        let factory = MockPlaybackFactory::new();
        let mut scheduler = PlaybackScheduler::new(factory.clone(), AudioFormat::default());

        scheduler.schedule_encoded(&chunk(24_000)).unwrap();
        scheduler.release();
        scheduler.release();

        assert!(!scheduler.has_device());
        assert_eq!(factory.closed(), 1);
        assert_eq!(scheduler.cursor().last_scheduled_time(), 0.0);

        // A later chunk opens a fresh device
        scheduler.schedule_encoded(&chunk(10)).unwrap();
        assert_eq!(factory.created(), 2);
    }

    #[test]
    fn test_rate_parameter_changes_duration() {
        let factory = MockPlaybackFactory::new();
        let mut scheduler = PlaybackScheduler::new(factory.clone(), AudioFormat::default());

        let audio = EncodedAudio {
            mime_type: "audio/pcm;rate=16000".into(),
            data: STANDARD.encode(vec![0u8; 16_000 * 2]),
        };
        scheduler.schedule_encoded(&audio).unwrap();

        assert_eq!(scheduler.cursor().last_scheduled_time(), 1.0);
    }
}
