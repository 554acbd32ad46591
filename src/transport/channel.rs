//! Transport channel.
//!
//! Presents one physical connection at a time as an always-available
//! sender plus a continuous inbound message sequence.
//!
//! # Reconnect Protocol
//!
//! `connect(url)`:
//!
//! 1. Same URL and the connection is still live: nothing to do
//! 2. Otherwise tear the current handle down completely (timers cancelled,
//!    playback released, socket closed and its event loop joined)
//! 3. Open the new socket and start a fresh handle with a zero cursor
//!
//! Step 2 always finishes before step 3 starts, so two connections never
//! run side by side.
//!
//! # Fan-out
//!
//! Inbound payloads go to a broadcast owned by the channel, not by a
//! connection, so message subscribers survive reconnects. Close reasons
//! use a second broadcast.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use futures_util::future;
use futures_util::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::playback::{AudioFormat, PlaybackDeviceFactory, PlaybackScheduler};
use crate::protocol::OutboundFrame;

use super::connection::{ConnectionHandle, ConnectionScope, Payload};
use super::socket::{CloseReason, Connector};

// ============================================================================
// Constants
// ============================================================================

/// Default inbound broadcast capacity.
pub const DEFAULT_MESSAGE_CAPACITY: usize = 256;

/// Close reasons are rare; a small buffer is enough.
const CLOSE_REASON_CAPACITY: usize = 16;

// ============================================================================
// TransportChannel
// ============================================================================

/// Owner of at most one live connection.
pub struct TransportChannel {
    connector: Arc<dyn Connector>,
    playback_factory: Arc<dyn PlaybackDeviceFactory>,
    audio_format: AudioFormat,
    inbound_tx: broadcast::Sender<Payload>,
    close_tx: broadcast::Sender<CloseReason>,
    handle: Option<ConnectionHandle>,
}

impl fmt::Debug for TransportChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportChannel")
            .field("url", &self.url())
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

impl TransportChannel {
    /// Creates a disconnected channel.
    ///
    /// `message_capacity` bounds how far a slow message subscriber may
    /// fall behind before it starts skipping payloads.
    #[must_use]
    pub fn new(
        connector: Arc<dyn Connector>,
        playback_factory: Arc<dyn PlaybackDeviceFactory>,
        audio_format: AudioFormat,
        message_capacity: usize,
    ) -> Self {
        let (inbound_tx, _) = broadcast::channel(message_capacity.max(1));
        let (close_tx, _) = broadcast::channel(CLOSE_REASON_CAPACITY);

        Self {
            connector,
            playback_factory,
            audio_format,
            inbound_tx,
            close_tx,
            handle: None,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Connects to `url`, tearing down any previous connection first.
    ///
    /// Calling again with the URL of the live connection is a no-op. After
    /// the connection has died, the same URL reconnects.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Connection`](crate::Error::Connection) if the socket
    /// cannot be opened. The failure is also published as a close reason
    /// and the channel is left disconnected.
    pub async fn connect(&mut self, url: &str) -> Result<()> {
        if self.is_connected_to(url) {
            debug!(url, "Already connected");
            return Ok(());
        }

        self.close().await;

        let parts = match self.connector.open(url).await {
            Ok(parts) => parts,
            Err(e) => {
                warn!(url, error = %e, "Failed to open connection");
                let _ = self.close_tx.send(CloseReason::from_error(&e));
                return Err(e);
            }
        };

        let scheduler = PlaybackScheduler::new(Arc::clone(&self.playback_factory), self.audio_format);
        let handle = ConnectionHandle::start(
            url.to_owned(),
            parts,
            self.inbound_tx.clone(),
            self.close_tx.clone(),
            scheduler,
        );

        info!(url, connection = %handle.scope().id(), "Connected");
        self.handle = Some(handle);
        Ok(())
    }

    /// Closes the connection and releases everything bound to it.
    ///
    /// No-op when already closed. Publishes no close reason.
    pub async fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            let url = handle.url().to_owned();
            handle.shutdown().await;
            info!(url = %url, "Disconnected");
        }
    }

    /// Sends a frame on the current connection.
    ///
    /// Dropped with a debug log when not connected; there is no buffering
    /// or retry.
    pub fn send(&self, frame: OutboundFrame) {
        match &self.handle {
            Some(handle) => handle.send(frame),
            None => debug!(kind = frame.kind(), "Not connected, frame dropped"),
        }
    }

    // ========================================================================
    // State
    // ========================================================================

    /// Returns `true` while a live connection exists.
    #[inline]
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.handle.as_ref().is_some_and(ConnectionHandle::is_live)
    }

    /// Returns `true` if the live connection goes to `url`.
    #[must_use]
    pub fn is_connected_to(&self, url: &str) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| handle.is_live() && handle.url() == url)
    }

    /// URL of the current connection, live or dead.
    #[inline]
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        self.handle.as_ref().map(ConnectionHandle::url)
    }

    /// Scope of the live connection, for connection-bound producers.
    #[must_use]
    pub fn scope(&self) -> Option<ConnectionScope> {
        self.handle
            .as_ref()
            .filter(|handle| handle.is_live())
            .map(ConnectionHandle::scope)
    }

    /// Playback cursor of the current connection; zero when disconnected.
    #[must_use]
    pub fn last_scheduled_time(&self) -> f64 {
        self.handle.as_ref().map_or(0.0, |handle| {
            handle.playback().lock().cursor().last_scheduled_time()
        })
    }

    /// Returns `true` while a playback device is open.
    #[must_use]
    pub fn has_playback_device(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| handle.playback().lock().has_device())
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Subscribes to canonicalized inbound payloads.
    ///
    /// The stream spans reconnects and only ends when the channel is
    /// dropped. A subscriber that lags skips payloads with a warning.
    pub fn messages(&self) -> impl Stream<Item = Payload> + Send + use<> {
        BroadcastStream::new(self.inbound_tx.subscribe()).filter_map(|item| {
            future::ready(match item {
                Ok(payload) => Some(payload),
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Message subscriber lagged");
                    None
                }
            })
        })
    }

    /// Subscribes to close reasons.
    pub fn close_reasons(&self) -> impl Stream<Item = CloseReason> + Send + use<> {
        BroadcastStream::new(self.close_tx.subscribe())
            .filter_map(|item| future::ready(item.ok()))
    }
}

impl Drop for TransportChannel {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.shutdown_detached();
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
