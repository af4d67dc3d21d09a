use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing::{error, warn};

/// Which hop of the relay pipeline produced an upstream failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Translation,
    Synthesis,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Translation => write!(f, "Translation Error"),
            Stage::Synthesis => write!(f, "TTS Error"),
        }
    }
}

/// Failure talking to one of the remote inference services
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("request timed out")]
    Timeout,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("service responded with HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("service reported an error: {0}")]
    Rejected(String),
}

impl UpstreamError {
    /// Build from a reqwest failure, keeping timeouts and decode errors apart
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Timeout
        } else if err.is_decode() {
            UpstreamError::Malformed(err.to_string())
        } else {
            UpstreamError::Transport(err.to_string())
        }
    }

    /// Timeouts, connection failures, 429 and 5xx are worth another attempt.
    /// Other 4xx responses and unusable payloads are not.
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Timeout | UpstreamError::Transport(_) => true,
            UpstreamError::Status { status, .. } => *status == 429 || *status >= 500,
            UpstreamError::Malformed(_) | UpstreamError::Rejected(_) => false,
        }
    }
}

/// Caller-facing error of the relay. Every failure inside the pipeline ends up
/// as one of these before it leaves the orchestrator.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{stage}: {source}")]
    Upstream {
        stage: Stage,
        #[source]
        source: UpstreamError,
    },

    #[error("Processing Error: {0:#}")]
    Unexpected(#[from] anyhow::Error),

    #[error("Authentication credentials were not provided or are invalid")]
    Unauthorized,
}

impl RelayError {
    pub fn upstream(stage: Stage, source: UpstreamError) -> Self {
        RelayError::Upstream { stage, source }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            RelayError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            RelayError::Unauthorized => StatusCode::UNAUTHORIZED,
            RelayError::Upstream { .. } | RelayError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        match &self {
            RelayError::Unexpected(err) => error!("Relay fault: {:?}", err),
            RelayError::Upstream { stage, source } => warn!("{} ({:?})", stage, source),
            _ => {}
        }

        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
