//! Request-scoped scratch area used to bridge the speech engine's file-based
//! output to in-memory bytes.

use anyhow::Context;
use futures::StreamExt;
use reqwest::Url;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use crate::error::UpstreamError;
use crate::gradio::shorten;
use crate::synthesis::AudioResource;

const STAGED_FILE_NAME: &str = "audio.wav";

/// A uniquely named directory that is deleted when dropped, including when the
/// owning request future is cancelled.
#[derive(Debug)]
pub struct ScratchArea {
    dir: TempDir,
}

impl ScratchArea {
    /// Create under `root`, or the system temp dir when `None`
    pub fn create(root: Option<&Path>) -> io::Result<Self> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("lezgi-relay-");

        let dir = match root {
            Some(root) => builder.tempdir_in(root)?,
            None => builder.tempdir()?,
        };

        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn audio_path(&self) -> PathBuf {
        self.dir.path().join(STAGED_FILE_NAME)
    }
}

/// Failure while moving audio into the scratch area
#[derive(Debug, Error)]
pub enum StagingError {
    /// The speech engine's file could not be fetched
    #[error("audio download failed: {0}")]
    Download(#[from] UpstreamError),

    /// Local filesystem failure
    #[error("staging I/O failed: {0}")]
    Io(#[from] io::Error),
}

impl StagingError {
    pub fn is_transient(&self) -> bool {
        match self {
            StagingError::Download(err) => err.is_transient(),
            StagingError::Io(_) => false,
        }
    }
}

/// Token for files served by the speech engine's own host.
///
/// Audio URLs come from the engine's response, so the token only goes to
/// URLs sharing the origin of the configured base URL.
#[derive(Debug, Clone)]
pub struct FileCredentials {
    base: Url,
    token: String,
}

impl FileCredentials {
    pub fn new(base_url: &str, token: impl Into<String>) -> anyhow::Result<Self> {
        let base = Url::parse(base_url)
            .with_context(|| format!("Invalid speech engine URL: {}", base_url))?;

        Ok(Self {
            base,
            token: token.into(),
        })
    }

    pub fn token_for(&self, url: &str) -> Option<&str> {
        let url = Url::parse(url).ok()?;
        (url.origin() == self.base.origin()).then_some(self.token.as_str())
    }
}

/// Copy or download `resource` into the scratch area, returning the staged path
pub async fn stage_audio(
    client: &reqwest::Client,
    credentials: Option<&FileCredentials>,
    resource: &AudioResource,
    scratch: &ScratchArea,
) -> Result<PathBuf, StagingError> {
    let destination = scratch.audio_path();

    match resource {
        AudioResource::File(source) => {
            tokio::fs::copy(source, &destination).await?;
        }
        AudioResource::Remote(url) => {
            download(client, credentials, url, &destination).await?;
        }
    }

    Ok(destination)
}

async fn download(
    client: &reqwest::Client,
    credentials: Option<&FileCredentials>,
    url: &str,
    destination: &Path,
) -> Result<(), StagingError> {
    let mut builder = client.get(url);
    match credentials.map(|c| c.token_for(url)) {
        Some(Some(token)) => builder = builder.bearer_auth(token),
        Some(None) => warn!("Audio URL {} is off the speech engine host; sending no token", url),
        None => {}
    }

    let response = builder.send().await.map_err(UpstreamError::from_reqwest)?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(StagingError::Download(UpstreamError::Status {
            status: status.as_u16(),
            body: shorten(&body),
        }));
    }

    // Truncate so a retried download starts from an empty file
    let mut file = tokio::fs::File::create(destination).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(UpstreamError::from_reqwest)?;
        file.write_all(&chunk).await?;
    }
    file.flush().await?;

    Ok(())
}
