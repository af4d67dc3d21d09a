use axum::extract::rejection::JsonRejection;
use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::RelayError;
use crate::relay::{Relay, RelayResult};
use crate::security;

#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<Relay>,
    pub api_keys: Arc<Vec<String>>,
}

impl AppState {
    pub fn new(relay: Relay, api_keys: Vec<String>) -> Self {
        Self {
            relay: Arc::new(relay),
            api_keys: Arc::new(api_keys),
        }
    }
}

/// `POST /translate` body
#[derive(Debug, Deserialize)]
pub struct TranslateBody {
    #[serde(default)]
    pub text: Option<String>,
}

/// `POST /tts` body
#[derive(Debug, Deserialize)]
pub struct TtsBody {
    #[serde(default)]
    pub lezgin_text: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AudioResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
    /// Base64-encoded audio
    pub audio: String,
    pub audio_format: String,
}

impl From<RelayResult> for AudioResponse {
    fn from(result: RelayResult) -> Self {
        Self {
            audio: result.audio_base64(),
            audio_format: result.audio_format.to_string(),
            translation: result.translated_text,
        }
    }
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub fn router(state: AppState) -> Router {
    let relay_routes = Router::new()
        .route("/translate", post(translate))
        .route("/tts", post(tts))
        // Paths used by older mobile clients
        .route("/api/translator/app/", post(translate))
        .route("/api/translator/tts/", post(tts))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health))
        .merge(relay_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Reject requests without a valid bearer token before the body is read
async fn require_api_key(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let authorized = security::bearer_token(request.headers())
        .map(|token| security::is_authorized(token, &state.api_keys))
        .unwrap_or(false);

    if !authorized {
        warn!("Rejected unauthenticated request to {}", request.uri().path());
        return RelayError::Unauthorized.into_response();
    }

    next.run(request).await
}

async fn translate(
    State(state): State<AppState>,
    payload: Result<Json<TranslateBody>, JsonRejection>,
) -> Result<Json<AudioResponse>, RelayError> {
    let Json(body) = payload.map_err(invalid_body)?;
    let text = body.text.unwrap_or_default();

    let result = state.relay.translate_and_synthesize(&text).await?;
    info!("Translation and speech delivered");

    Ok(Json(result.into()))
}

async fn tts(
    State(state): State<AppState>,
    payload: Result<Json<TtsBody>, JsonRejection>,
) -> Result<Json<AudioResponse>, RelayError> {
    let Json(body) = payload.map_err(invalid_body)?;
    let text = body.lezgin_text.unwrap_or_default();

    let result = state.relay.synthesize_only(&text).await?;
    info!("Speech delivered");

    Ok(Json(result.into()))
}

fn invalid_body(rejection: JsonRejection) -> RelayError {
    RelayError::InvalidInput(format!("Invalid request body: {}", rejection.body_text()))
}
