//! Type-safe identifiers.
//!
//! Newtype wrappers keep connection IDs and video sink handles from being
//! mixed with plain strings.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use uuid::Uuid;

// ============================================================================
// ConnectionId
// ============================================================================

/// Identifies one physical connection (one `ConnectionHandle`).
///
/// A fresh ID is generated on every successful connect, so log lines from
/// a torn-down connection are distinguishable from its successor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generates a new random connection ID.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// VideoSink
// ============================================================================

/// Opaque handle of the render target a video capture previews into.
///
/// The crate never interprets it; it is passed back to the
/// [`VideoCapture`](crate::media::VideoCapture) collaborator on start/stop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoSink(String);

impl VideoSink {
    /// Creates a sink handle.
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the handle as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VideoSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        assert_ne!(ConnectionId::generate(), ConnectionId::generate());
    }

    #[test]
    fn test_video_sink_display() {
        let sink = VideoSink::new("preview-0");
        assert_eq!(sink.to_string(), "preview-0");
        assert_eq!(sink.as_str(), "preview-0");
    }
}
