//! Connection handle and event loop.
//!
//! A [`ConnectionHandle`] bundles everything that lives exactly as long as
//! one physical connection:
//!
//! - the socket, driven by a spawned event loop task
//! - the cancellation scope every connection-bound timer listens on
//! - the playback scheduler and its subscriber task
//!
//! # Event Loop
//!
//! The loop multiplexes two sources:
//!
//! - Inbound socket messages: canonicalized and broadcast to subscribers
//! - Outbound commands: frames serialized and written, or shutdown
//!
//! When the socket ends for any reason other than a local shutdown, the
//! loop cancels the scope, releases playback, and publishes a
//! [`CloseReason`].

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::identifiers::ConnectionId;
use crate::playback::PlaybackScheduler;
use crate::protocol::{LiveEvent, OutboundFrame, normalize_payload};

use super::socket::{CloseReason, SocketParts, WireMessage};

// ============================================================================
// Constants
// ============================================================================

/// Maximum time to wait for the event loop to finish the close handshake.
pub(crate) const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Types
// ============================================================================

/// Inbound payload as broadcast to subscribers.
pub type Payload = Arc<str>;

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Serialize and write a frame.
    Send(OutboundFrame),
    /// Close the socket and stop.
    Shutdown,
}

// ============================================================================
// ConnectionScope
// ============================================================================

/// Cheap, cloneable view of a live connection for background producers.
///
/// Timers hold a scope instead of the handle: they can send frames and
/// observe cancellation, but cannot outlive or reopen the connection.
#[derive(Clone)]
pub struct ConnectionScope {
    id: ConnectionId,
    token: CancellationToken,
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
}

impl ConnectionScope {
    /// Returns the connection ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the cancellation token of the connection.
    #[inline]
    #[must_use]
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns `true` once the connection has been torn down.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Queues a frame for sending.
    ///
    /// Dropped silently once the connection is torn down.
    pub fn send(&self, frame: OutboundFrame) {
        if self.token.is_cancelled() {
            trace!(connection = %self.id, kind = frame.kind(), "Frame dropped, connection closed");
            return;
        }
        if self.command_tx.send(ConnectionCommand::Send(frame)).is_err() {
            trace!(connection = %self.id, "Frame dropped, event loop gone");
        }
    }
}

// ============================================================================
// ConnectionHandle
// ============================================================================

/// Owning unit of one physical connection and its derived resources.
pub(crate) struct ConnectionHandle {
    url: String,
    scope: ConnectionScope,
    playback: Arc<Mutex<PlaybackScheduler>>,
    event_loop: JoinHandle<()>,
    playback_task: JoinHandle<()>,
}

impl ConnectionHandle {
    /// Starts the event loop and playback subscriber for an open socket.
    ///
    /// The playback subscriber is registered before the event loop runs,
    /// so no inbound audio of this connection can be missed.
    pub(crate) fn start(
        url: String,
        parts: SocketParts,
        inbound_tx: broadcast::Sender<Payload>,
        close_tx: broadcast::Sender<CloseReason>,
        playback: PlaybackScheduler,
    ) -> Self {
        let id = ConnectionId::generate();
        let token = CancellationToken::new();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let playback = Arc::new(Mutex::new(playback));

        let playback_task = tokio::spawn(run_playback(
            id,
            inbound_tx.subscribe(),
            token.clone(),
            Arc::clone(&playback),
        ));

        let event_loop = tokio::spawn(run_event_loop(
            id,
            parts,
            command_rx,
            inbound_tx,
            close_tx,
            token.clone(),
            Arc::clone(&playback),
        ));

        debug!(connection = %id, url = %url, "Connection handle started");

        Self {
            url,
            scope: ConnectionScope {
                id,
                token,
                command_tx,
            },
            playback,
            event_loop,
            playback_task,
        }
    }

    /// Returns the URL this connection was opened to.
    #[inline]
    pub(crate) fn url(&self) -> &str {
        &self.url
    }

    /// Returns a scope for connection-bound producers.
    #[inline]
    pub(crate) fn scope(&self) -> ConnectionScope {
        self.scope.clone()
    }

    /// Returns `true` while the socket is open.
    #[inline]
    pub(crate) fn is_live(&self) -> bool {
        !self.scope.is_cancelled()
    }

    /// Returns the shared playback scheduler.
    #[inline]
    pub(crate) fn playback(&self) -> &Arc<Mutex<PlaybackScheduler>> {
        &self.playback
    }

    /// Queues a frame on this connection.
    #[inline]
    pub(crate) fn send(&self, frame: OutboundFrame) {
        self.scope.send(frame);
    }

    /// Tears the connection down.
    ///
    /// Cancels the scope (stopping every bound timer), releases the playback
    /// device, then waits for the event loop to close the socket.
    pub(crate) async fn shutdown(self) {
        let id = self.scope.id;
        self.begin_shutdown();

        let mut event_loop = self.event_loop;
        match timeout(CLOSE_TIMEOUT, &mut event_loop).await {
            Ok(Ok(())) => debug!(connection = %id, "Connection closed"),
            Ok(Err(e)) => warn!(connection = %id, error = %e, "Event loop task failed"),
            Err(_) => {
                warn!(
                    connection = %id,
                    timeout_ms = CLOSE_TIMEOUT.as_millis() as u64,
                    "Close handshake timed out, aborting event loop"
                );
                event_loop.abort();
            }
        }
    }

    /// Tears the connection down without waiting for the socket to close.
    ///
    /// Used from `Drop`, where awaiting is impossible.
    pub(crate) fn shutdown_detached(self) {
        self.begin_shutdown();
        debug!(connection = %self.scope.id, "Connection detached for shutdown");
    }

    fn begin_shutdown(&self) {
        self.scope.token.cancel();
        self.playback.lock().release();
        self.playback_task.abort();
        let _ = self.scope.command_tx.send(ConnectionCommand::Shutdown);
    }
}

// ============================================================================
// Event Loop
// ============================================================================

/// Drives one socket until shutdown or remote close.
async fn run_event_loop(
    id: ConnectionId,
    parts: SocketParts,
    mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
    inbound_tx: broadcast::Sender<Payload>,
    close_tx: broadcast::Sender<CloseReason>,
    token: CancellationToken,
    playback: Arc<Mutex<PlaybackScheduler>>,
) {
    let SocketParts {
        mut sink,
        mut stream,
    } = parts;

    // None = closed locally; nothing to report
    let close_reason = loop {
        tokio::select! {
            message = stream.next() => {
                match message {
                    Some(Ok(WireMessage::Text(text))) => {
                        dispatch_inbound(id, &text, &inbound_tx);
                    }

                    Some(Ok(WireMessage::Binary(data))) => match String::from_utf8(data) {
                        Ok(text) => dispatch_inbound(id, &text, &inbound_tx),
                        Err(_) => warn!(connection = %id, "Ignoring non UTF-8 binary message"),
                    },

                    Some(Ok(WireMessage::Close(reason))) => {
                        debug!(connection = %id, ?reason, "WebSocket closed by remote");
                        break Some(reason.unwrap_or_else(CloseReason::stream_ended));
                    }

                    Some(Err(e)) => {
                        error!(connection = %id, error = %e, "WebSocket error");
                        break Some(CloseReason::from_error(&e));
                    }

                    None => {
                        debug!(connection = %id, "WebSocket stream ended");
                        break Some(CloseReason::stream_ended());
                    }
                }
            }

            command = command_rx.recv() => {
                match command {
                    Some(ConnectionCommand::Send(frame)) => {
                        let kind = frame.kind().to_owned();
                        match frame.to_json() {
                            Ok(json) => {
                                if let Err(e) = sink.send(WireMessage::Text(json)).await {
                                    warn!(connection = %id, error = %e, kind = %kind, "Failed to send frame");
                                } else {
                                    trace!(connection = %id, kind = %kind, "Frame sent");
                                }
                            }
                            Err(e) => warn!(connection = %id, error = %e, kind = %kind, "Failed to serialize frame"),
                        }
                    }

                    Some(ConnectionCommand::Shutdown) | None => {
                        debug!(connection = %id, "Shutdown command received");
                        let _ = sink.close().await;
                        break None;
                    }
                }
            }
        }
    };

    // Same teardown as an explicit close
    token.cancel();
    playback.lock().release();

    if let Some(reason) = close_reason {
        let _ = close_tx.send(reason);
    }

    debug!(connection = %id, "Event loop terminated");
}

/// Canonicalizes an inbound payload and broadcasts it.
fn dispatch_inbound(id: ConnectionId, text: &str, inbound_tx: &broadcast::Sender<Payload>) {
    let payload: Payload = normalize_payload(text).into();
    // No subscribers is fine; messages are not retained
    let _ = inbound_tx.send(payload);
    trace!(connection = %id, len = text.len(), "Inbound message dispatched");
}

// ============================================================================
// Playback Subscriber
// ============================================================================

/// Feeds inbound audio parts to the scheduler until the scope is cancelled.
async fn run_playback(
    id: ConnectionId,
    mut inbound_rx: broadcast::Receiver<Payload>,
    token: CancellationToken,
    playback: Arc<Mutex<PlaybackScheduler>>,
) {
    loop {
        tokio::select! {
            biased;

            () = token.cancelled() => break,

            payload = inbound_rx.recv() => match payload {
                Ok(payload) => {
                    let Some(event) = LiveEvent::parse(&payload) else {
                        continue;
                    };
                    let parts = event.audio_parts();
                    if parts.is_empty() {
                        continue;
                    }
                    let mut scheduler = playback.lock();
                    for audio in &parts {
                        scheduler.play(audio);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(connection = %id, skipped, "Playback lagged, audio chunks skipped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    trace!(connection = %id, "Playback subscriber stopped");
}
