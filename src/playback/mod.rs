//! Audio playback scheduling.
//!
//! Inbound audio chunks are decoded and queued on a playback device so
//! they play back to back with no gap and no overlap.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `decode` | PCM16 decoding |
//! | `device` | Playback device primitive and formats |
//! | `scheduler` | Cursor-based gapless scheduler |
//! | `speaker` | Host speaker output (`speaker` feature) |

// ============================================================================
// Submodules
// ============================================================================

/// PCM decoding.
pub mod decode;

/// Playback device primitive.
pub mod device;

/// Gapless scheduler.
pub mod scheduler;

/// Host speaker output.
#[cfg(feature = "speaker")]
pub mod speaker;

// ============================================================================
// Re-exports
// ============================================================================

pub use decode::decode_pcm16;
pub use device::{
    AudioFormat, ClockDevice, ClockDeviceFactory, PlaybackDevice, PlaybackDeviceFactory,
    SampleBuffer,
};
pub use scheduler::{PlaybackCursor, PlaybackScheduler};
#[cfg(feature = "speaker")]
pub use speaker::{SpeakerDevice, SpeakerFactory};
