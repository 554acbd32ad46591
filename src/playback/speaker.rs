//! Speaker output through `cpal`.
//!
//! A cpal stream is not `Send`, so it lives on a dedicated thread for as
//! long as the device is open. The [`SpeakerDevice`] handed to the
//! scheduler only shares a [`Timeline`] with the output callback.
//!
//! The device clock is the number of frames the callback has rendered,
//! so `current_time()` advances exactly as fast as the hardware consumes
//! audio and scheduled start times line up with what is heard.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, StreamConfig};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::error::{Error, Result};

use super::device::{AudioFormat, PlaybackDevice, PlaybackDeviceFactory, SampleBuffer};

// ============================================================================
// Timeline
// ============================================================================

/// Interleaved samples waiting to be rendered, indexed from the playhead.
#[derive(Debug)]
struct Timeline {
    channels: usize,
    played_frames: u64,
    pending: VecDeque<f32>,
}

impl Timeline {
    fn new(channels: u16) -> Self {
        Self {
            channels: usize::from(channels.max(1)),
            played_frames: 0,
            pending: VecDeque::new(),
        }
    }

    /// Mixes `samples` in from absolute frame `start_frame`.
    ///
    /// Whatever falls before the playhead is already late and is cut.
    fn mix(&mut self, samples: &[f32], start_frame: u64) {
        let late_frames = self.played_frames.saturating_sub(start_frame);
        let skip = usize::try_from(late_frames)
            .unwrap_or(usize::MAX)
            .saturating_mul(self.channels)
            .min(samples.len());
        let samples = &samples[skip..];

        let lead_frames = start_frame.saturating_sub(self.played_frames);
        let offset = usize::try_from(lead_frames)
            .unwrap_or(usize::MAX)
            .saturating_mul(self.channels);
        let end = offset.saturating_add(samples.len());

        if self.pending.len() < end {
            self.pending.resize(end, 0.0);
        }
        for (slot, sample) in self.pending.range_mut(offset..end).zip(samples) {
            *slot += sample;
        }
    }

    /// Fills one output period, silence where nothing is scheduled.
    fn render(&mut self, out: &mut [f32]) {
        for slot in out.iter_mut() {
            *slot = self.pending.pop_front().unwrap_or(0.0);
        }
        self.played_frames += (out.len() / self.channels) as u64;
    }

    fn clear(&mut self) {
        self.pending.clear();
    }
}

// ============================================================================
// SpeakerDevice
// ============================================================================

/// Playback on the host's default output device.
pub struct SpeakerDevice {
    format: AudioFormat,
    timeline: Arc<Mutex<Timeline>>,
    stop_tx: Option<mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl fmt::Debug for SpeakerDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpeakerDevice")
            .field("format", &self.format)
            .field("open", &self.stop_tx.is_some())
            .finish_non_exhaustive()
    }
}

impl SpeakerDevice {
    /// Opens the default output device and starts rendering silence.
    ///
    /// Blocks until the output stream is running.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Playback`] if there is no output device or it does
    /// not support `f32` samples in `format`.
    pub fn open(format: AudioFormat) -> Result<Self> {
        let timeline = Arc::new(Mutex::new(Timeline::new(format.channels)));
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let shared = Arc::clone(&timeline);
        let thread = thread::Builder::new()
            .name("agent-live-speaker".to_owned())
            .spawn(move || {
                let stream = match build_stream(format, shared) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));

                // Until close() or drop
                let _ = stop_rx.recv();
                drop(stream);
                debug!("Output stream stopped");
            })
            .map_err(|e| Error::playback(format!("Failed to spawn output thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(
                    sample_rate = format.sample_rate,
                    channels = format.channels,
                    "Speaker opened"
                );
                Ok(Self {
                    format,
                    timeline,
                    stop_tx: Some(stop_tx),
                    thread: Some(thread),
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(Error::playback("Output thread exited during setup")),
        }
    }

    fn sample_rate(&self) -> f64 {
        f64::from(self.format.sample_rate)
    }
}

impl PlaybackDevice for SpeakerDevice {
    fn current_time(&self) -> f64 {
        self.timeline.lock().played_frames as f64 / self.sample_rate()
    }

    fn schedule(&mut self, buffer: &SampleBuffer, start_time: f64) -> Result<()> {
        if self.stop_tx.is_none() {
            return Err(Error::playback("Speaker is closed"));
        }
        if buffer.format != self.format {
            return Err(Error::playback(format!(
                "Buffer is {} Hz/{} ch, speaker plays {} Hz/{} ch",
                buffer.format.sample_rate,
                buffer.format.channels,
                self.format.sample_rate,
                self.format.channels
            )));
        }

        let start_frame = (start_time.max(0.0) * self.sample_rate()).round() as u64;
        self.timeline.lock().mix(&buffer.samples, start_frame);
        Ok(())
    }

    fn close(&mut self) {
        // Dropping the sender wakes the output thread
        if self.stop_tx.take().is_none() {
            return;
        }
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            error!("Output thread panicked");
        }
        self.timeline.lock().clear();
    }
}

impl Drop for SpeakerDevice {
    fn drop(&mut self) {
        self.close();
    }
}

fn build_stream(format: AudioFormat, timeline: Arc<Mutex<Timeline>>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| Error::playback("No output device available"))?;

    let rate = SampleRate(format.sample_rate);
    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::playback(e.to_string()))?
        .find(|c| {
            c.channels() == format.channels
                && c.sample_format() == SampleFormat::F32
                && c.min_sample_rate() <= rate
                && rate <= c.max_sample_rate()
        })
        .ok_or_else(|| {
            Error::playback(format!(
                "No f32 output config for {} Hz, {} channel(s)",
                format.sample_rate, format.channels
            ))
        })?
        .with_sample_rate(rate);
    let config: StreamConfig = supported.into();

    let stream = device
        .build_output_stream(
            &config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| timeline.lock().render(data),
            |err| error!(error = %err, "Audio output stream error"),
            None,
        )
        .map_err(|e| Error::playback(e.to_string()))?;
    stream.play().map_err(|e| Error::playback(e.to_string()))?;

    Ok(stream)
}

// ============================================================================
// SpeakerFactory
// ============================================================================

/// Factory for [`SpeakerDevice`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SpeakerFactory;

impl PlaybackDeviceFactory for SpeakerFactory {
    fn create(&self, format: AudioFormat) -> Result<Box<dyn PlaybackDevice>> {
        Ok(Box::new(SpeakerDevice::open(format)?))
    }
}

// ============================================================================
// Tests
// ============================================================================
