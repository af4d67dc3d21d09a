use async_trait::async_trait;
use serde_json::Value;

use crate::error::{RelayError, UpstreamError};
use crate::gradio::{self, RunRequest};

/// Russian source text that passed input validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    source_text: String,
}

impl TranslationRequest {
    /// Validate raw input: non-empty after trimming, at most `max_chars` characters
    pub fn new(source_text: &str, max_chars: usize) -> Result<Self, RelayError> {
        if source_text.trim().is_empty() {
            return Err(RelayError::InvalidInput("Text is required".to_string()));
        }

        let length = source_text.chars().count();
        if length > max_chars {
            return Err(RelayError::InvalidInput(format!(
                "Text must be at most {} characters (got {})",
                max_chars, length
            )));
        }

        Ok(Self {
            source_text: source_text.to_string(),
        })
    }

    pub fn source_text(&self) -> &str {
        &self.source_text
    }
}

/// Text-to-text translation capability
#[async_trait]
pub trait Translator: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String, UpstreamError>;
}

/// Translator backed by the hosted Russian→Lezgi model
pub struct GradioTranslator {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GradioTranslator {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token,
        }
    }
}

#[async_trait]
impl Translator for GradioTranslator {
    async fn translate(&self, text: &str) -> Result<String, UpstreamError> {
        let request = RunRequest {
            data: vec![Value::String(text.to_string())],
            fn_index: None,
        };

        let data = gradio::run(
            &self.client,
            &self.base_url,
            "translate",
            self.token.as_deref(),
            &request,
        )
        .await?;

        match data.into_iter().next() {
            Some(Value::String(translated)) if !translated.trim().is_empty() => {
                Ok(translated.trim().to_string())
            }
            Some(Value::String(_)) => Err(UpstreamError::Malformed(
                "translator returned an empty translation".to_string(),
            )),
            Some(other) => Err(UpstreamError::Malformed(format!(
                "expected translated text, got {}",
                other
            ))),
            None => Err(UpstreamError::Malformed(
                "translator returned no output".to_string(),
            )),
        }
    }
}
