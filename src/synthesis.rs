use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::PathBuf;

use crate::error::{RelayError, UpstreamError};
use crate::gradio::{self, RunRequest};

/// Tuning knobs passed to the speech engine with every request
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisParams {
    pub speaking_rate: f32,
    pub noise_scale: f32,
    pub add_pauses: bool,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            speaking_rate: 1.0,
            noise_scale: 0.0,
            add_pauses: true,
        }
    }
}

/// Lezgi text ready to be spoken
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisRequest {
    pub target_text: String,
    pub params: SynthesisParams,
}

impl SynthesisRequest {
    pub fn new(target_text: &str, params: SynthesisParams) -> Result<Self, RelayError> {
        if target_text.trim().is_empty() {
            return Err(RelayError::InvalidInput("Text is required".to_string()));
        }

        Ok(Self {
            target_text: target_text.to_string(),
            params,
        })
    }
}

/// Where the speech engine left the generated WAV
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioResource {
    /// A file on this machine. Only in-process synthesizers produce these;
    /// paths reported by a remote engine are always fetched from its host.
    File(PathBuf),
    /// A URL to download the audio from
    Remote(String),
}

/// Text-to-speech capability
#[async_trait]
pub trait Synthesizer: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioResource, UpstreamError>;
}

/// Synthesizer backed by the hosted Lezgi TTS Space
pub struct GradioSynthesizer {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GradioSynthesizer {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token,
        }
    }
}

#[async_trait]
impl Synthesizer for GradioSynthesizer {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioResource, UpstreamError> {
        let run_request = RunRequest {
            data: vec![
                json!(request.target_text),
                json!(request.params.speaking_rate),
                json!(request.params.noise_scale),
                json!(request.params.add_pauses),
            ],
            fn_index: Some(0),
        };

        let data = gradio::run(
            &self.client,
            &self.base_url,
            "predict",
            self.token.as_deref(),
            &run_request,
        )
        .await?;

        let output = data
            .into_iter()
            .next()
            .ok_or_else(|| UpstreamError::Malformed("speech engine returned no output".to_string()))?;

        audio_resource_from_output(&output, &self.base_url)
    }
}

/// Interpret a Gradio file output.
///
/// Accepts a bare string (URL, `/file=` route, or server path) or a file object
/// carrying `url` and/or `path`/`name`.
pub fn audio_resource_from_output(output: &Value, base_url: &str) -> Result<AudioResource, UpstreamError> {
    match output {
        Value::String(reference) => resolve_reference(reference, base_url),
        Value::Object(fields) => {
            let url = fields.get("url").and_then(Value::as_str);
            let path = fields
                .get("path")
                .or_else(|| fields.get("name"))
                .and_then(Value::as_str);

            match (url, path) {
                (Some(url), _) if !url.trim().is_empty() => resolve_reference(url, base_url),
                (_, Some(path)) => resolve_reference(path, base_url),
                _ => Err(UpstreamError::Malformed(
                    "audio output has neither url nor path".to_string(),
                )),
            }
        }
        Value::Null => Err(UpstreamError::Malformed(
            "speech engine returned no audio".to_string(),
        )),
        other => Err(UpstreamError::Malformed(format!(
            "unexpected audio output: {}",
            other
        ))),
    }
}

fn resolve_reference(reference: &str, base_url: &str) -> Result<AudioResource, UpstreamError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(UpstreamError::Malformed("empty audio reference".to_string()));
    }

    let base = base_url.trim_end_matches('/');

    if reference.starts_with("http://") || reference.starts_with("https://") {
        return Ok(AudioResource::Remote(reference.to_string()));
    }
    if reference.starts_with("/file=") {
        return Ok(AudioResource::Remote(format!("{}{}", base, reference)));
    }

    // A path on the inference host, served through its file route
    Ok(AudioResource::Remote(format!("{}/file={}", base, reference)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;
    use wiremock::{
        matchers::{body_json, method, path},
        Mock, MockServer, ResponseTemplate,
    };

    const BASE: &str = "https://tts.example.com/";

    #[test]
    fn test_default_params() {
        let params = SynthesisParams::default();
        assert!((params.speaking_rate - 1.0).abs() < f32::EPSILON);
        assert!(params.noise_scale.abs() < f32::EPSILON);
        assert!(params.add_pauses);
    }

    #[test]
    fn test_request_rejects_blank_text() {
        assert!(SynthesisRequest::new("", SynthesisParams::default()).is_err());
        assert!(SynthesisRequest::new("   ", SynthesisParams::default()).is_err());
        assert!(SynthesisRequest::new("Са", SynthesisParams::default()).is_ok());
    }

    #[test]
    fn test_request_has_no_length_limit() {
        let long = "#".repeat(5000);
        assert!(SynthesisRequest::new(&long, SynthesisParams::default()).is_ok());
    }

    #[test]
    fn test_output_absolute_url() {
        let output = json!("https://cdn.example.com/audio.wav");
        assert_eq!(
            audio_resource_from_output(&output, BASE).unwrap(),
            AudioResource::Remote("https://cdn.example.com/audio.wav".to_string())
        );
    }

    #[test]
    fn test_output_file_route() {
        let output = json!("/file=/tmp/gradio/abc/audio.wav");
        assert_eq!(
            audio_resource_from_output(&output, BASE).unwrap(),
            AudioResource::Remote("https://tts.example.com/file=/tmp/gradio/abc/audio.wav".to_string())
        );
    }

    #[test]
    fn test_output_remote_server_path() {
        let output = json!("/tmp/gradio/does-not-exist-here/audio.wav");
        assert_eq!(
            audio_resource_from_output(&output, BASE).unwrap(),
            AudioResource::Remote(
                "https://tts.example.com/file=/tmp/gradio/does-not-exist-here/audio.wav".to_string()
            )
        );
    }

    #[test]
    fn test_output_path_existing_locally_is_still_fetched_remotely() {
        let file = NamedTempFile::new().expect("temp file");
        let local = file.path().to_str().unwrap().to_string();

        assert_eq!(
            audio_resource_from_output(&json!(local), BASE).unwrap(),
            AudioResource::Remote(format!("https://tts.example.com/file={}", local))
        );
        assert_eq!(
            audio_resource_from_output(&json!({"path": "/etc/passwd"}), BASE).unwrap(),
            AudioResource::Remote("https://tts.example.com/file=/etc/passwd".to_string())
        );
    }

    #[test]
    fn test_output_file_object_prefers_url() {
        let output = json!({
            "path": "/tmp/gradio/abc/audio.wav",
            "url": "https://tts.example.com/file=/tmp/gradio/abc/audio.wav",
            "orig_name": "audio.wav"
        });
        assert_eq!(
            audio_resource_from_output(&output, BASE).unwrap(),
            AudioResource::Remote("https://tts.example.com/file=/tmp/gradio/abc/audio.wav".to_string())
        );
    }

    #[test]
    fn test_output_file_object_with_name_only() {
        let output = json!({"name": "/tmp/gradio/xyz/audio.wav", "is_file": true});
        assert_eq!(
            audio_resource_from_output(&output, BASE).unwrap(),
            AudioResource::Remote("https://tts.example.com/file=/tmp/gradio/xyz/audio.wav".to_string())
        );
    }

    #[test]
    fn test_output_unusable_values() {
        assert!(audio_resource_from_output(&Value::Null, BASE).is_err());
        assert!(audio_resource_from_output(&json!(""), BASE).is_err());
        assert!(audio_resource_from_output(&json!(12), BASE).is_err());
        assert!(audio_resource_from_output(&json!({"orig_name": "a.wav"}), BASE).is_err());
    }

    #[tokio::test]
    async fn test_synthesize_sends_text_and_params() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/run/predict"))
            .and(body_json(json!({
                "data": ["Са", 1.0, 0.0, true],
                "fn_index": 0
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": [{"name": "/tmp/gradio/1/audio.wav"}]})),
            )
            .expect(1)
            .mount(&mock_server)
            .await;

        let synthesizer = GradioSynthesizer::new(reqwest::Client::new(), mock_server.uri(), None);
        let request = SynthesisRequest::new("Са", SynthesisParams::default()).unwrap();
        let resource = synthesizer.synthesize(&request).await.expect("synthesis");

        assert_eq!(
            resource,
            AudioResource::Remote(format!("{}/file=/tmp/gradio/1/audio.wav", mock_server.uri()))
        );
    }

    #[tokio::test]
    async fn test_synthesize_null_output_is_malformed() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/run/predict"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"error": null, "data": [null]})))
            .mount(&mock_server)
            .await;

        let synthesizer = GradioSynthesizer::new(reqwest::Client::new(), mock_server.uri(), None);
        let request = SynthesisRequest::new(&"#".repeat(1000), SynthesisParams::default()).unwrap();
        let err = synthesizer.synthesize(&request).await.unwrap_err();

        assert!(matches!(err, UpstreamError::Malformed(_)));
    }
}
