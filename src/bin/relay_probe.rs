//! Relay probe - runs the relay once against the configured services and saves the audio
//!
//! Usage:
//!   cargo run --bin relay-probe -- translate "Доброе утро"            # writes probe.wav
//!   cargo run --bin relay-probe -- tts "Руьгьуьд хейр" greeting.wav
//!
//! Optional environment variables:
//! - TRANSLATOR_URL, TTS_URL, HF_TOKEN
//! - UPSTREAM_TIMEOUT_SECS, UPSTREAM_MAX_ATTEMPTS, UPSTREAM_RETRY_DELAY_MS
//! - TTS_SPEAKING_RATE, TTS_NOISE_SCALE, TTS_ADD_PAUSES
//!
//! RELAY_API_KEYS is not needed here.

use anyhow::{Context, Result};
use lezgi_speech_relay::{config::Config, relay::Relay};
use std::time::Instant;
use tracing::info;

enum Mode {
    Translate,
    Tts,
}

fn usage() -> ! {
    eprintln!("Usage: relay-probe <translate|tts> <text> [output.wav]");
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("lezgi_speech_relay=info".parse()?)
                .add_directive("relay_probe=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let mode = match args.first().map(String::as_str) {
        Some("translate") => Mode::Translate,
        Some("tts") => Mode::Tts,
        _ => usage(),
    };
    let text = args.get(1).cloned().unwrap_or_else(|| usage());
    let output = args.get(2).cloned().unwrap_or_else(|| "probe.wav".to_string());

    // The probe never serves HTTP, so no caller tokens are required
    let config = Config::from_lookup(|key| match key {
        "RELAY_API_KEYS" => Some("unused".to_string()),
        _ => std::env::var(key).ok(),
    })?;
    let relay = Relay::from_config(&config)?;

    let started = Instant::now();
    let result = match mode {
        Mode::Translate => relay.translate_and_synthesize(&text).await,
        Mode::Tts => relay.synthesize_only(&text).await,
    }?;

    if let Some(translation) = &result.translated_text {
        println!("Translation: {}", translation);
    }

    std::fs::write(&output, &result.audio_bytes)
        .with_context(|| format!("Failed to write {}", output))?;

    info!(
        "Wrote {} bytes of {} to {} in {:.1}s",
        result.audio_bytes.len(),
        result.audio_format,
        output,
        started.elapsed().as_secs_f64()
    );

    Ok(())
}
