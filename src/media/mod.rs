//! Outbound media.
//!
//! Capture collaborators and the multiplexer that flushes them onto the
//! live connection on fixed intervals.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `capture` | Audio/video capture traits |
//! | `multiplexer` | Periodic flush timers |

// ============================================================================
// Submodules
// ============================================================================

/// Capture device collaborators.
pub mod capture;

/// Periodic flush timers.
pub mod multiplexer;

// ============================================================================
// Re-exports
// ============================================================================

pub use capture::{AudioCapture, PcmBuffer, UnavailableCapture, VideoCapture};
pub use multiplexer::{FlushIntervals, MediaMultiplexer};
