use anyhow::{Context, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::retry::RetryConfig;
use crate::synthesis::SynthesisParams;

#[derive(Debug, Clone)]
pub struct Config {
    // Authentication
    pub api_keys: Vec<String>,

    // Upstream services
    pub translator_url: String,
    pub tts_url: String,
    pub hf_token: Option<String>,
    pub upstream_timeout_secs: u64,
    pub upstream_max_attempts: u32,
    pub upstream_retry_delay_ms: u64,

    // Synthesis parameters
    pub tts_speaking_rate: f32,
    pub tts_noise_scale: f32,
    pub tts_add_pauses: bool,

    // Input limits
    pub max_text_chars: usize,

    // Scratch area for staged audio (system temp dir when unset)
    pub scratch_dir: Option<PathBuf>,

    // Server
    pub port: u16,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from any key/value source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_keys: Vec<String> = lookup("RELAY_API_KEYS")
            .context("RELAY_API_KEYS not set")?
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if api_keys.is_empty() {
            anyhow::bail!("RELAY_API_KEYS must contain at least one token");
        }

        let upstream_max_attempts: u32 = parse_or(&lookup, "UPSTREAM_MAX_ATTEMPTS", 3)?;
        if upstream_max_attempts == 0 {
            anyhow::bail!("UPSTREAM_MAX_ATTEMPTS must be at least 1");
        }

        let max_text_chars: usize = parse_or(&lookup, "MAX_TEXT_CHARS", 1000)?;
        if max_text_chars == 0 {
            anyhow::bail!("MAX_TEXT_CHARS must be at least 1");
        }

        Ok(Self {
            api_keys,

            translator_url: lookup("TRANSLATOR_URL").unwrap_or_else(|| {
                "https://stazizov-lezghian-translator-v1.hf.space".to_string()
            }),
            tts_url: lookup("TTS_URL")
                .unwrap_or_else(|| "https://leks-forever-lez-tts.hf.space".to_string()),
            hf_token: lookup("HF_TOKEN").filter(|t| !t.trim().is_empty()),
            upstream_timeout_secs: parse_or(&lookup, "UPSTREAM_TIMEOUT_SECS", 60)?,
            upstream_max_attempts,
            upstream_retry_delay_ms: parse_or(&lookup, "UPSTREAM_RETRY_DELAY_MS", 500)?,

            tts_speaking_rate: parse_or(&lookup, "TTS_SPEAKING_RATE", 1.0)?,
            tts_noise_scale: parse_or(&lookup, "TTS_NOISE_SCALE", 0.0)?,
            tts_add_pauses: parse_or(&lookup, "TTS_ADD_PAUSES", true)?,

            max_text_chars,

            scratch_dir: lookup("SCRATCH_DIR")
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),

            port: parse_or(&lookup, "PORT", 8080)?,
        })
    }

    pub fn synthesis_params(&self) -> SynthesisParams {
        SynthesisParams {
            speaking_rate: self.tts_speaking_rate,
            noise_scale: self.tts_noise_scale,
            add_pauses: self.tts_add_pauses,
        }
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::upstream_call()
            .with_max_attempts(self.upstream_max_attempts)
            .with_initial_delay(Duration::from_millis(self.upstream_retry_delay_ms))
    }
}

/// Parse an optional variable, falling back to `default` when it is absent.
/// A present but unparsable value is an error.
fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        _ => Ok(default),
    }
}
