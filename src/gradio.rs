//! Minimal client for the Gradio "run" HTTP API exposed by hosted Spaces.
//!
//! Both inference services speak the same envelope:
//! request `{"data": [...], "fn_index": n}` and response `{"data": [...]}`,
//! or `{"error": "..."}` when the app itself raised.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::UpstreamError;

/// Longest upstream body echoed back in diagnostics
const MAX_BODY_IN_ERROR: usize = 200;

#[derive(Debug, Serialize)]
pub struct RunRequest {
    pub data: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fn_index: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    #[serde(default)]
    data: Option<Vec<Value>>,
    #[serde(default)]
    error: Option<Value>,
}

/// Build the URL for a named endpoint, e.g. `run_url("https://x.hf.space/", "translate")`
pub fn run_url(base_url: &str, api_name: &str) -> String {
    format!(
        "{}/run/{}",
        base_url.trim_end_matches('/'),
        api_name.trim_start_matches('/')
    )
}

/// Call a Gradio endpoint and return its output components
pub async fn run(
    client: &reqwest::Client,
    base_url: &str,
    api_name: &str,
    token: Option<&str>,
    request: &RunRequest,
) -> Result<Vec<Value>, UpstreamError> {
    let url = run_url(base_url, api_name);

    let mut builder = client.post(&url).json(request);
    if let Some(token) = token {
        builder = builder.bearer_auth(token);
    }

    let response = builder.send().await.map_err(UpstreamError::from_reqwest)?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|e| format!("<failed to read body: {}>", e));
        return Err(UpstreamError::Status {
            status: status.as_u16(),
            body: shorten(&body),
        });
    }

    let parsed: RunResponse = response.json().await.map_err(UpstreamError::from_reqwest)?;

    if let Some(error) = parsed.error.filter(|e| !e.is_null()) {
        let message = match error {
            Value::String(s) => s,
            other => other.to_string(),
        };
        return Err(UpstreamError::Rejected(shorten(&message)));
    }

    parsed
        .data
        .ok_or_else(|| UpstreamError::Malformed("response has no data field".to_string()))
}

/// Truncate to a short diagnostic on a char boundary
pub fn shorten(text: &str) -> String {
    let text = text.trim();
    match text.char_indices().nth(MAX_BODY_IN_ERROR) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}
