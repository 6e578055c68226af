use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_warn};
use futures_util::StreamExt;
use tempfile::NamedTempFile;
use tokio::io::{AsyncWriteExt, BufWriter};

use crate::{DownloadOutcome, FailureKind, FetchError};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64)";

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub user_agent: String,
    /// Extra attempts on top of the first two; see [`Downloader::max_attempts`].
    pub retries: u32,
    /// Size of the write buffer between the network stream and the file.
    pub chunk_size: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            retries: 2,
            chunk_size: 512 * 1024,
        }
    }
}

/// One attempt at saving a remote resource to `dest`.
#[async_trait::async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Returns the number of bytes written. On error nothing is left at `dest`.
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
    client: reqwest::Client,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .user_agent(settings.user_agent.clone())
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;
        Ok(Self { settings, client })
    }
}

#[async_trait::async_trait]
impl MediaFetcher for ReqwestFetcher {
    async fn fetch_to(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }

        // Stream into a temp file next to the target; it is removed on drop
        // unless persisted, so a failed attempt leaves nothing behind.
        let dir = dest.parent().unwrap_or_else(|| Path::new("."));
        let staging = NamedTempFile::new_in(dir).map_err(io_error)?;
        let file = tokio::fs::File::from_std(staging.as_file().try_clone().map_err(io_error)?);
        let mut writer = BufWriter::with_capacity(self.settings.chunk_size, file);

        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            writer.write_all(&chunk).await.map_err(io_error)?;
            written += chunk.len() as u64;
        }
        writer.flush().await.map_err(io_error)?;
        let file = writer.into_inner();
        file.sync_all().await.map_err(io_error)?;
        drop(file);

        staging
            .persist(dest)
            .map_err(|err| io_error(err.error))?;
        Ok(written)
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}

fn io_error(err: std::io::Error) -> FetchError {
    FetchError::new(FailureKind::Io, err.to_string())
}

/// Retry wrapper around a [`MediaFetcher`]. Attempts follow each other
/// immediately; any error is retried.
#[derive(Clone)]
pub struct Downloader {
    fetcher: Arc<dyn MediaFetcher>,
    retries: u32,
}

impl Downloader {
    pub fn new(fetcher: Arc<dyn MediaFetcher>, retries: u32) -> Self {
        Self { fetcher, retries }
    }

    /// Total attempts made against a source that keeps failing.
    pub fn max_attempts(&self) -> u32 {
        self.retries.saturating_add(2)
    }

    pub async fn download(&self, url: &str, dest: &Path) -> DownloadOutcome {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;
        loop {
            match self.fetcher.fetch_to(url, dest).await {
                Ok(bytes) => {
                    engine_debug!("Saved {} ({} bytes, attempt {})", url, bytes, attempt);
                    return DownloadOutcome::Saved {
                        path: PathBuf::from(dest),
                        bytes,
                        attempts: attempt,
                    };
                }
                Err(err) => {
                    engine_warn!(
                        "Download attempt {}/{} failed for {}: {}",
                        attempt,
                        max_attempts,
                        url,
                        err
                    );
                    if attempt >= max_attempts {
                        return DownloadOutcome::Failed {
                            attempts: attempt,
                            last_error: err,
                        };
                    }
                    attempt += 1;
                }
            }
        }
    }
}
