//! Playback device primitive.
//!
//! The scheduler never talks to audio hardware directly. It asks a
//! [`PlaybackDeviceFactory`] for a device when the first audio chunk of a
//! connection arrives, and closes it when the connection goes away.

// ============================================================================
// Imports
// ============================================================================

use std::time::Instant;

use tracing::trace;

use crate::error::Result;

// ============================================================================
// AudioFormat
// ============================================================================

/// PCM output format of the agent runtime.
///
/// Not negotiated per message; a `;rate=N` MIME parameter may override the
/// sample rate of an individual chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    /// Samples per second, per channel.
    pub sample_rate: u32,
    /// Interleaved channel count.
    pub channels: u16,
}

impl AudioFormat {
    /// 24 kHz mono, the runtime's default speech output.
    pub const SPEECH_24K_MONO: Self = Self {
        sample_rate: 24_000,
        channels: 1,
    };
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::SPEECH_24K_MONO
    }
}

// ============================================================================
// SampleBuffer
// ============================================================================

/// Decoded audio ready to be scheduled.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    /// Interleaved samples in `[-1.0, 1.0)`.
    pub samples: Vec<f32>,
    /// Format of `samples`.
    pub format: AudioFormat,
}

impl SampleBuffer {
    /// Number of frames (samples per channel).
    #[inline]
    #[must_use]
    pub fn frames(&self) -> usize {
        self.samples.len() / usize::from(self.format.channels.max(1))
    }

    /// Playback duration in seconds.
    #[must_use]
    pub fn duration_secs(&self) -> f64 {
        if self.format.sample_rate == 0 {
            return 0.0;
        }
        self.frames() as f64 / f64::from(self.format.sample_rate)
    }
}

// ============================================================================
// Traits
// ============================================================================

/// An open audio output with its own clock.
pub trait PlaybackDevice: Send {
    /// Current device-clock time in seconds.
    fn current_time(&self) -> f64;

    /// Schedules `buffer` to start playing at `start_time` (device clock).
    ///
    /// # Errors
    ///
    /// Implementation-defined device failures.
    fn schedule(&mut self, buffer: &SampleBuffer, start_time: f64) -> Result<()>;

    /// Stops all scheduled buffers and releases the hardware.
    fn close(&mut self);
}

/// Creates playback devices on demand.
pub trait PlaybackDeviceFactory: Send + Sync {
    /// Opens a new device for `format`.
    ///
    /// # Errors
    ///
    /// Returns an error if no output device is available.
    fn create(&self, format: AudioFormat) -> Result<Box<dyn PlaybackDevice>>;
}

// ============================================================================
// ClockDevice
// ============================================================================

/// A device that keeps time but produces no sound.
///
/// Useful for headless consumers that only need the message stream, and
/// as the default when no real output is configured.
#[derive(Debug)]
pub struct ClockDevice {
    origin: Instant,
    scheduled: usize,
}

impl ClockDevice {
    /// Creates a device whose clock starts at zero now.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            scheduled: 0,
        }
    }

    /// Number of buffers scheduled so far.
    #[inline]
    #[must_use]
    pub fn scheduled(&self) -> usize {
        self.scheduled
    }
}

impl Default for ClockDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackDevice for ClockDevice {
    fn current_time(&self) -> f64 {
        self.origin.elapsed().as_secs_f64()
    }

    fn schedule(&mut self, buffer: &SampleBuffer, start_time: f64) -> Result<()> {
        self.scheduled += 1;
        trace!(
            start_time,
            duration = buffer.duration_secs(),
            "Buffer scheduled on clock device"
        );
        Ok(())
    }

    fn close(&mut self) {}
}

/// Factory for [`ClockDevice`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ClockDeviceFactory;

impl PlaybackDeviceFactory for ClockDeviceFactory {
    fn create(&self, _format: AudioFormat) -> Result<Box<dyn PlaybackDevice>> {
        Ok(Box::new(ClockDevice::new()))
    }
}

// ============================================================================
// Tests
// ============================================================================
