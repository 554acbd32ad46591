//! Shared utilities for demos.
//!
//! Provides common functionality used across all demos:
//! - Command-line argument parsing
//! - Logging initialization
//! - Graceful exit handling
//! - Printing agent events

#![allow(dead_code)]

// ============================================================================
// Imports
// ============================================================================

use agent_live::SessionIdentity;
use serde_json::Value;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Constants
// ============================================================================

/// Agent runtime the demos talk to unless `--server` is given.
pub const DEFAULT_SERVER: &str = "http://localhost:8000";

/// Agent application the demos open sessions for.
pub const DEFAULT_APP: &str = "weather_agent";

// ============================================================================
// Types
// ============================================================================

/// Command-line arguments for demos.
#[derive(Debug, Clone)]
pub struct Args {
    pub debug: bool,
    pub no_wait: bool,
    pub server: String,
    pub app: String,
    pub session: String,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse() -> Self {
        let args: Vec<String> = std::env::args().collect();
        let value = |flag: &str| {
            args.iter()
                .position(|a| a == flag)
                .and_then(|i| args.get(i + 1))
                .cloned()
        };

        Self {
            debug: args.iter().any(|a| a == "--debug"),
            no_wait: args.iter().any(|a| a == "--no-wait"),
            server: value("--server").unwrap_or_else(|| DEFAULT_SERVER.to_owned()),
            app: value("--app").unwrap_or_else(|| DEFAULT_APP.to_owned()),
            session: value("--session").unwrap_or_else(|| "demo-session".to_owned()),
        }
    }

    /// Identity for the configured app and session.
    pub fn identity(&self) -> SessionIdentity {
        SessionIdentity::new(&self.app, "demo-user", &self.session)
    }
}

// ============================================================================
// Functions
// ============================================================================

/// Initialize tracing/logging.
pub fn init_logging(debug: bool) {
    let filter = if debug {
        "agent_live=debug"
    } else {
        "agent_live=info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .init();
}

/// Wait for Ctrl+C or skip if `--no-wait` flag is set.
pub async fn wait_for_exit(no_wait: bool) {
    if no_wait {
        println!("[--no-wait] Skipping wait");
        return;
    }

    println!("Press Ctrl+C to exit...");
    tokio::signal::ctrl_c().await.ok();
}

/// Print one agent event on a single line.
pub fn print_event(event: &Value) {
    let author = event.get("author").and_then(Value::as_str).unwrap_or("?");

    let parts = event
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    if parts.is_empty() {
        let flags: Vec<&str> = ["turn_complete", "interrupted"]
            .into_iter()
            .filter(|key| event.get(*key).and_then(Value::as_bool) == Some(true))
            .collect();
        println!("        [{author}] <{}>", flags.join(", "));
        return;
    }

    for part in parts {
        if let Some(text) = part.get("text").and_then(Value::as_str) {
            println!("        [{author}] {text}");
        } else if let Some(mime) = part
            .pointer("/inline_data/mime_type")
            .or_else(|| part.pointer("/inlineData/mimeType"))
            .and_then(Value::as_str)
        {
            println!("        [{author}] <{mime}>");
        }
    }
}
