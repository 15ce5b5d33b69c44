//! Artifact fetching and the local archive cache.
//!
//! Downloads go through the [`ArchiveFetcher`] capability so tests can
//! substitute in-memory fakes for the network. The [`ArtifactCache`] in
//! front of it keys archives by filename inside a cache directory: a hit
//! returns without any network access, which is what makes offline reruns
//! deterministic.

use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::PackageError;

/// Failure while fetching a single archive.
#[derive(Error, Debug)]
pub enum FetchError {
    /// Network-level failure or non-success HTTP status.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Local storage failure while writing the downloaded bytes.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The downloaded bytes do not match the configured checksum.
    #[error("hash mismatch: expected {expected}, got {actual}")]
    HashMismatch {
        /// Checksum the configuration expects.
        expected: String,
        /// Checksum of the bytes actually received.
        actual: String,
    },
}

/// Capability for fetching a remote archive to a local path.
///
/// The only seam between the pipeline and the network.
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Fetch `url` into `dest`, overwriting whatever is there.
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), FetchError>;
}

/// Production fetcher: streaming HTTP download via `reqwest`.
#[derive(Debug)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher whose requests time out after `timeout`, so a stuck
    /// download cannot hang a packaging run indefinitely.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArchiveFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
            .send()
            .await?
            .error_for_status()?;

        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            file.write_all(&chunk?).await?;
        }
        file.flush().await?;
        Ok(())
    }
}

/// Filename-keyed archive cache in front of an [`ArchiveFetcher`].
pub struct ArtifactCache {
    fetcher: Arc<dyn ArchiveFetcher>,
    /// Optional `archive filename -> sha256` expectations, verified after
    /// download and before the archive becomes visible in the cache.
    checksums: HashMap<String, String>,
    /// One async lock per destination path: concurrent requests for the
    /// same archive coalesce onto a single download.
    locks: tokio::sync::Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl std::fmt::Debug for ArtifactCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactCache")
            .field("checksums", &self.checksums.len())
            .finish_non_exhaustive()
    }
}

impl ArtifactCache {
    /// Build a cache over the given fetcher.
    pub fn new(fetcher: Arc<dyn ArchiveFetcher>, checksums: HashMap<String, String>) -> Self {
        Self {
            fetcher,
            checksums,
            locks: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Return `cache_dir/filename`, downloading it from `url` first if it
    /// is not already present.
    ///
    /// The download lands in a temporary file in the same directory and is
    /// renamed into place only after it completes (and, when a checksum is
    /// configured, verifies), so a failed fetch never poisons the cache
    /// with a truncated archive.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Download`] on network, storage, or checksum
    /// failure.
    pub async fn fetch(
        &self,
        cache_dir: &Path,
        filename: &str,
        url: &str,
    ) -> Result<PathBuf, PackageError> {
        let dest = cache_dir.join(filename);

        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(dest.clone()).or_default().clone()
        };
        let _writer = lock.lock().await;

        if dest.exists() {
            info!(%filename, "using cached archive");
            return Ok(dest);
        }

        info!(%filename, %url, "downloading archive");
        tokio::fs::create_dir_all(cache_dir).await?;

        let tmp = tempfile::Builder::new()
            .prefix(".gridpack-")
            .tempfile_in(cache_dir)
            .map_err(|e| download_error(filename, e.into()))?
            .into_temp_path();

        self.fetcher
            .fetch(url, &tmp)
            .await
            .map_err(|e| download_error(filename, e))?;

        if let Some(expected) = self.checksums.get(filename) {
            let actual = sha256_file(&tmp)
                .await
                .map_err(|e| download_error(filename, e.into()))?;
            if actual != *expected {
                // TempPath removes the partial file on drop.
                return Err(download_error(
                    filename,
                    FetchError::HashMismatch {
                        expected: expected.clone(),
                        actual,
                    },
                ));
            }
        }

        tmp.persist(&dest)
            .map_err(|e| download_error(filename, e.error.into()))?;
        Ok(dest)
    }
}

fn download_error(filename: &str, source: FetchError) -> PackageError {
    PackageError::Download {
        filename: filename.to_string(),
        source,
    }
}

/// SHA-256 of a file's contents, hex encoded. Reads on a blocking thread.
async fn sha256_file(path: &Path) -> Result<String, std::io::Error> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut hasher = Sha256::new();
        let mut file = std::fs::File::open(&path)?;
        let mut buffer = [0u8; 8192];
        loop {
            let count = file.read(&mut buffer)?;
            if count == 0 {
                break;
            }
            hasher.update(&buffer[..count]);
        }
        Ok(hex::encode(hasher.finalize()))
    })
    .await
    .map_err(std::io::Error::other)?
}
