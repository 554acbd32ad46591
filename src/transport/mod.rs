//! WebSocket transport layer.
//!
//! This module owns the physical connection to the agent runtime and the
//! per-connection resources derived from it.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐                          ┌─────────────────┐
//! │  TransportChannel    │                          │  Agent runtime  │
//! │                      │        WebSocket         │                 │
//! │  ConnectionHandle ───┼─────────────────────────►│  /run_live      │
//! │   ├ event loop       │◄─────────────────────────┤                 │
//! │   ├ playback task    │                          └─────────────────┘
//! │   └ scope (timers)   │
//! └──────────┬───────────┘
//!            │ broadcast
//!            ▼
//!     message subscribers
//! ```
//!
//! # Connection Lifecycle
//!
//! 1. `TransportChannel::connect` - Tear down the old handle, open a socket
//! 2. `ConnectionHandle::start` - Spawn event loop and playback subscriber
//! 3. `ConnectionScope::send` - Producers queue frames
//! 4. `TransportChannel::close` - Cancel scope, release playback, close socket
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `channel` | Reconnect protocol and fan-out |
//! | `connection` | Connection handle and event loop |
//! | `socket` | Physical transport primitive |

// ============================================================================
// Submodules
// ============================================================================

/// Reconnect protocol and fan-out.
pub mod channel;

/// Connection handle and event loop.
pub mod connection;

/// Physical transport primitive.
pub mod socket;

// ============================================================================
// Re-exports
// ============================================================================

pub use channel::{DEFAULT_MESSAGE_CAPACITY, TransportChannel};
pub use connection::{ConnectionScope, Payload};
pub use socket::{
    CloseReason, Connector, SocketParts, TungsteniteConnector, WireMessage, WireSink, WireStream,
};
