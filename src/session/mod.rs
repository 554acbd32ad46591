//! Session orchestration.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | Fluent [`LiveSession`] construction |
//! | `config` | [`SessionConfig`] settings |
//! | `core` | The [`LiveSession`] orchestrator |
//! | `identity` | [`SessionIdentity`] and endpoint URL |

// ============================================================================
// Submodules
// ============================================================================

/// Fluent session construction.
pub mod builder;

/// Session settings.
pub mod config;

/// Session orchestrator.
pub mod core;

/// Session identity.
pub mod identity;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::LiveSessionBuilder;
pub use config::SessionConfig;
pub use self::core::LiveSession;
pub use identity::{LIVE_PATH, SessionIdentity};
