//! Text conversation over a live session.
//!
//! Demonstrates:
//! - Building a session from an agent server base URL
//! - Connecting a session identity to `/run_live`
//! - Sending a text message and printing the agent's events
//! - Watching for close reasons
//!
//! Usage:
//!   cargo run --example 001_live_session
//!   cargo run --example 001_live_session -- --server http://localhost:8000 --app weather_agent
//!   cargo run --example 001_live_session -- --no-wait
//!   cargo run --example 001_live_session -- --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use agent_live::{AgentRunRequest, Content, LiveSession, Result, SessionConfig};
use common::Args;
use futures_util::StreamExt;

// ============================================================================
// Constants
// ============================================================================

const PROMPT: &str = "What is the weather like in New York?";

/// How long to print events after sending with `--no-wait`.
const REPLY_WINDOW: Duration = Duration::from_secs(10);

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    let args = Args::parse();
    common::init_logging(args.debug);

    if let Err(e) = run(args).await {
        eprintln!("\n[ERROR] {e}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    println!("=== 001: Live Session ===\n");

    // ========================================================================
    // Build Session
    // ========================================================================

    println!("[1] Building session...");
    println!("    Base URL: {}", args.server);

    let config = SessionConfig::from_base_url(&args.server)?;
    let mut session = LiveSession::builder().config(config).build()?;

    println!("    ✓ Session ready\n");

    // ========================================================================
    // Connect
    // ========================================================================

    println!("[2] Connecting...");

    let identity = args.identity();
    session.connect(&identity).await?;

    println!("    ✓ Connected");
    println!("    Identity: {identity}");
    println!("    URL:      {}\n", session.current_url().unwrap_or("-"));

    let mut events = session.get_messages();
    let mut closes = session.on_stream_close();

    // ========================================================================
    // Send Message
    // ========================================================================

    println!("[3] Sending message...");
    println!("    Text: {PROMPT}");

    let request = AgentRunRequest::new(&identity, Content::user_text(PROMPT));
    session.send_message(&request).await?;

    println!("    ✓ Sent\n");

    // ========================================================================
    // Receive Events
    // ========================================================================

    println!("[4] Agent events:");

    if !args.no_wait {
        println!("    (Press Ctrl+C to stop)");
    }

    let deadline = tokio::time::sleep(REPLY_WINDOW);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            Some(event) = events.next() => common::print_event(&event),
            Some(reason) = closes.next() => {
                println!("    ✗ Stream closed: {reason}");
                break;
            }
            () = &mut deadline, if args.no_wait => break,
            _ = tokio::signal::ctrl_c(), if !args.no_wait => break,
        }
    }

    println!("\n=== Conversation finished ===\n");

    // ========================================================================
    // Cleanup
    // ========================================================================

    println!("[Cleanup] Closing stream...");
    session.close_stream().await;
    println!("          ✓ Done");

    Ok(())
}
