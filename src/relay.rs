//! Translation + speech-synthesis relay.
//!
//! `translate_and_synthesize` runs translate → synthesize → stage → read;
//! `synthesize_only` skips the first hop for callers that already have Lezgi
//! text. Each upstream attempt is bounded by a timeout and transient failures
//! are retried with backoff. The scratch area lives for exactly one call.

use anyhow::{anyhow, Context};
use base64::Engine;
use std::fmt::Display;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{RelayError, Stage, UpstreamError};
use crate::retry::{with_retry_if, RetryConfig};
use crate::staging::{stage_audio, FileCredentials, ScratchArea, StagingError};
use crate::synthesis::{GradioSynthesizer, SynthesisParams, SynthesisRequest, Synthesizer};
use crate::translation::{GradioTranslator, TranslationRequest, Translator};

pub const AUDIO_FORMAT_WAV: &str = "audio/wav";

/// Outcome of a successful relay call. Never holds partial results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResult {
    pub translated_text: Option<String>,
    pub audio_bytes: Vec<u8>,
    pub audio_format: &'static str,
}

impl RelayResult {
    pub fn audio_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.audio_bytes)
    }
}

#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub max_text_chars: usize,
    pub synthesis: SynthesisParams,
    pub upstream_timeout: Duration,
    pub retry: RetryConfig,
    pub scratch_root: Option<PathBuf>,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            max_text_chars: 1000,
            synthesis: SynthesisParams::default(),
            upstream_timeout: Duration::from_secs(60),
            retry: RetryConfig::upstream_call(),
            scratch_root: None,
        }
    }
}

impl RelaySettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_text_chars: config.max_text_chars,
            synthesis: config.synthesis_params(),
            upstream_timeout: config.upstream_timeout(),
            retry: config.retry_config(),
            scratch_root: config.scratch_dir.clone(),
        }
    }
}

pub struct Relay {
    translator: Arc<dyn Translator>,
    synthesizer: Arc<dyn Synthesizer>,
    http: reqwest::Client,
    download_credentials: Option<FileCredentials>,
    settings: RelaySettings,
}

impl Relay {
    pub fn new(
        translator: Arc<dyn Translator>,
        synthesizer: Arc<dyn Synthesizer>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            translator,
            synthesizer,
            http: reqwest::Client::new(),
            download_credentials: None,
            settings,
        }
    }

    /// Client and credentials used to download audio the speech engine hands back by URL
    pub fn with_download_client(
        mut self,
        http: reqwest::Client,
        credentials: Option<FileCredentials>,
    ) -> Self {
        self.http = http;
        self.download_credentials = credentials;
        self
    }

    /// Wire the hosted Gradio services from configuration
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.upstream_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let translator = GradioTranslator::new(
            http.clone(),
            config.translator_url.clone(),
            config.hf_token.clone(),
        );
        let synthesizer =
            GradioSynthesizer::new(http.clone(), config.tts_url.clone(), config.hf_token.clone());
        let credentials = config
            .hf_token
            .as_ref()
            .map(|token| FileCredentials::new(&config.tts_url, token.clone()))
            .transpose()?;

        Ok(Self::new(
            Arc::new(translator),
            Arc::new(synthesizer),
            RelaySettings::from_config(config),
        )
        .with_download_client(http, credentials))
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Translate Russian text to Lezgi, then voice the translation
    pub async fn translate_and_synthesize(&self, source_text: &str) -> Result<RelayResult, RelayError> {
        let request = TranslationRequest::new(source_text, self.settings.max_text_chars)?;

        info!(
            "Translating {} characters",
            request.source_text().chars().count()
        );
        let translated = self
            .call_upstream("Translation", UpstreamError::is_transient, || {
                self.translator.translate(request.source_text())
            })
            .await
            .map_err(|e| RelayError::upstream(Stage::Translation, e))?;

        let synthesis = SynthesisRequest::new(&translated, self.settings.synthesis).map_err(|_| {
            RelayError::upstream(
                Stage::Translation,
                UpstreamError::Malformed("translator returned an empty translation".to_string()),
            )
        })?;

        let audio_bytes = self.synthesize_audio(&synthesis).await?;

        Ok(RelayResult {
            translated_text: Some(translated),
            audio_bytes,
            audio_format: AUDIO_FORMAT_WAV,
        })
    }

    /// Voice Lezgi text directly
    pub async fn synthesize_only(&self, target_text: &str) -> Result<RelayResult, RelayError> {
        let synthesis = SynthesisRequest::new(target_text, self.settings.synthesis)?;

        let audio_bytes = self.synthesize_audio(&synthesis).await?;

        Ok(RelayResult {
            translated_text: None,
            audio_bytes,
            audio_format: AUDIO_FORMAT_WAV,
        })
    }

    async fn synthesize_audio(&self, request: &SynthesisRequest) -> Result<Vec<u8>, RelayError> {
        let scratch = ScratchArea::create(self.settings.scratch_root.as_deref())
            .context("Failed to create scratch directory for audio")?;
        debug!("Staging audio in {}", scratch.path().display());

        info!(
            "Synthesizing speech for {} characters",
            request.target_text.chars().count()
        );
        let resource = self
            .call_upstream("Speech synthesis", UpstreamError::is_transient, || {
                self.synthesizer.synthesize(request)
            })
            .await
            .map_err(|e| RelayError::upstream(Stage::Synthesis, e))?;

        let staged = self
            .call_upstream("Audio download", StagingError::is_transient, || {
                stage_audio(
                    &self.http,
                    self.download_credentials.as_ref(),
                    &resource,
                    &scratch,
                )
            })
            .await
            .map_err(|e| match e {
                StagingError::Download(source) => RelayError::upstream(Stage::Synthesis, source),
                StagingError::Io(io) => RelayError::Unexpected(
                    anyhow!(io).context("Failed to stage synthesized audio"),
                ),
            })?;

        let audio = tokio::fs::read(&staged)
            .await
            .context("Failed to read staged audio")?;
        check_wav(&audio).map_err(|e| RelayError::upstream(Stage::Synthesis, e))?;

        info!("Synthesized {} bytes of audio", audio.len());
        Ok(audio)
    }

    /// Run one upstream step with a per-attempt timeout and bounded retries
    async fn call_upstream<T, E, F, Fut, P>(
        &self,
        operation_name: &str,
        should_retry: P,
        mut operation: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display + From<UpstreamError>,
        P: Fn(&E) -> bool,
    {
        let timeout = self.settings.upstream_timeout;

        with_retry_if(
            &self.settings.retry,
            operation_name,
            || {
                let attempt = operation();
                async move {
                    match tokio::time::timeout(timeout, attempt).await {
                        Ok(result) => result,
                        Err(_) => {
                            debug!("{} exceeded {:?}", operation_name, timeout);
                            Err(E::from(UpstreamError::Timeout))
                        }
                    }
                }
            },
            should_retry,
        )
        .await
    }
}

/// Reject payloads that are not RIFF/WAVE audio
fn check_wav(audio: &[u8]) -> Result<(), UpstreamError> {
    if audio.len() < 12 || &audio[0..4] != b"RIFF" || &audio[8..12] != b"WAVE" {
        return Err(UpstreamError::Malformed(
            "speech engine output is not a WAV file".to_string(),
        ));
    }
    Ok(())
}
