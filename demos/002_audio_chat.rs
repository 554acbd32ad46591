//! Audio chat with a synthetic microphone.
//!
//! Demonstrates:
//! - Implementing `AudioCapture` on top of `PcmBuffer`
//! - Starting and stopping an audio chat
//! - Playing the agent's spoken reply (`--features speaker` for sound)
//!
//! The microphone is a 440 Hz tone generator, so no input device is needed.
//!
//! Usage:
//!   cargo run --example 002_audio_chat
//!   cargo run --example 002_audio_chat --features speaker
//!   cargo run --example 002_audio_chat -- --no-wait
//!   cargo run --example 002_audio_chat -- --debug

mod common;

// ============================================================================
// Imports
// ============================================================================

use std::f32::consts::TAU;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use agent_live::media::PcmBuffer;
use agent_live::playback::PlaybackDeviceFactory;
use agent_live::{AudioCapture, LiveSession, Result, SessionConfig};
use async_trait::async_trait;
use common::Args;
use futures_util::StreamExt;
use parking_lot::Mutex;

// ============================================================================
// Constants
// ============================================================================

const SAMPLE_RATE: u32 = 16_000;
const TONE_HZ: f32 = 440.0;
const CHUNK: Duration = Duration::from_millis(20);

/// How long the chat runs with `--no-wait`.
const CHAT_WINDOW: Duration = Duration::from_secs(5);

// ============================================================================
// ToneCapture
// ============================================================================

/// Microphone stand-in writing a sine tone from its own thread.
#[derive(Default)]
struct ToneCapture {
    buffer: Arc<PcmBuffer>,
    running: Arc<AtomicBool>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl ToneCapture {
    fn generate(buffer: &PcmBuffer, running: &AtomicBool) {
        let samples_per_chunk = (SAMPLE_RATE as usize * CHUNK.as_millis() as usize) / 1000;
        let mut n: u64 = 0;

        while running.load(Ordering::SeqCst) {
            let chunk: Vec<u8> = (0..samples_per_chunk)
                .flat_map(|_| {
                    let t = n as f32 / SAMPLE_RATE as f32;
                    n += 1;
                    let sample = (TAU * TONE_HZ * t).sin() * 0.2;
                    ((sample * f32::from(i16::MAX)) as i16).to_le_bytes()
                })
                .collect();
            buffer.append(&chunk);
            thread::sleep(CHUNK);
        }
    }
}

#[async_trait]
impl AudioCapture for ToneCapture {
    async fn start_recording(&self) -> Result<()> {
        let mut thread = self.thread.lock();
        if thread.is_some() {
            return Ok(());
        }

        self.running.store(true, Ordering::SeqCst);
        let buffer = Arc::clone(&self.buffer);
        let running = Arc::clone(&self.running);
        *thread = Some(thread::spawn(move || Self::generate(&buffer, &running)));
        Ok(())
    }

    fn stop_recording(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread.lock().take() {
            handle.join().ok();
        }
    }

    fn combined_buffer(&self) -> Option<Vec<u8>> {
        self.buffer.snapshot()
    }

    fn clear_buffer(&self) {
        self.buffer.clear();
    }

    fn take_buffer(&self) -> Option<Vec<u8>> {
        self.buffer.take()
    }
}

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
    println!("=== 002: Audio Chat ===\n");

    // ========================================================================
    // Build Session
    // ========================================================================

    println!("[1] Building session...");
    println!("    Base URL: {}", args.server);
    println!("    Output:   {}", output_name());

    let config = SessionConfig::from_base_url(&args.server)?;
    let mut session = LiveSession::builder()
        .config(config)
        .audio_capture(Arc::new(ToneCapture::default()))
        .playback(playback())
        .build()?;

    println!("    ✓ Session ready\n");

    // ========================================================================
    // Start Audio Chat
    // ========================================================================

    println!("[2] Starting audio chat...");

    let identity = args.identity();
    session.start_audio_chat(&identity).await?;

    println!("    ✓ Streaming {SAMPLE_RATE} Hz PCM every 250 ms");
    println!("    Identity: {identity}\n");

    let mut events = session.get_messages();
    let mut closes = session.on_stream_close();

    // ========================================================================
    // Receive Events
    // ========================================================================

    println!("[3] Agent events:");
    if !args.no_wait {
        println!("    (Press Ctrl+C to stop)");
    }

    let deadline = tokio::time::sleep(CHAT_WINDOW);
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

    println!();
    println!("    Audio active: {}", session.is_audio_active());
    println!("    Playback end: {:.2}s\n", session.last_scheduled_time());

    // ========================================================================
    // Cleanup
    // ========================================================================

    println!("[Cleanup] Stopping audio chat...");
    session.stop_audio_chat();
    session.close_stream().await;
    println!("          ✓ Done");

    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

#[cfg(feature = "speaker")]
fn playback() -> Arc<dyn PlaybackDeviceFactory> {
    Arc::new(agent_live::playback::SpeakerFactory)
}

#[cfg(not(feature = "speaker"))]
fn playback() -> Arc<dyn PlaybackDeviceFactory> {
    Arc::new(agent_live::playback::ClockDeviceFactory)
}

fn output_name() -> &'static str {
    if cfg!(feature = "speaker") {
        "default speaker"
    } else {
        "silent clock (build with --features speaker for sound)"
    }
}
