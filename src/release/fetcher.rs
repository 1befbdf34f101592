//! Release download and extraction.

use async_trait::async_trait;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::archive::{extract_tarball, read_release, sha256_hex};
use super::manager::ReleaseManager;
use super::types::Release;
use crate::config::ReleaseRef;
use crate::error::{DeployError, FetchError, Result};
use crate::stage::Stage;

/// Download timeout for remote release archives.
const DOWNLOAD_TIMEOUT_SECS: u64 = 600;

/// Fetches release archives and registers them once extracted.
#[async_trait]
pub trait ReleaseFetcher: Send + Sync {
    /// Downloads and extracts the release described by `release_ref`.
    ///
    /// Runs the stages `Downloading release '<name>'` and
    /// `Extracting release '<name>'`.
    ///
    /// # Errors
    ///
    /// Returns a fetch error if the source is unreachable, the checksum does
    /// not match or the archive is malformed.
    async fn download_and_extract(&self, release_ref: &ReleaseRef, stage: &Stage)
    -> Result<Release>;
}

/// [`ReleaseFetcher`] reading local files and `http(s)` URLs.
pub struct ArchiveReleaseFetcher {
    /// HTTP client for remote sources.
    http: Client,
    /// Directory releases are extracted under.
    work_dir: PathBuf,
    /// Receives every extracted release.
    release_manager: Arc<dyn ReleaseManager>,
}

impl ArchiveReleaseFetcher {
    /// Creates a fetcher extracting under `work_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(work_dir: impl Into<PathBuf>, release_manager: Arc<dyn ReleaseManager>) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| DeployError::internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            work_dir: work_dir.into(),
            release_manager,
        })
    }

    async fn download(&self, release_ref: &ReleaseRef) -> Result<Vec<u8>> {
        let url = release_ref.url.as_str();

        if url.starts_with("http://") || url.starts_with("https://") {
            info!("Downloading release '{}' from {url}", release_ref.name);
            let response = self.http.get(url).send().await.map_err(|e| {
                DeployError::Fetch(FetchError::Download {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            })?;

            let status = response.status();
            if !status.is_success() {
                return Err(DeployError::Fetch(FetchError::Http {
                    url: url.to_string(),
                    status: status.as_u16(),
                }));
            }

            let bytes = response.bytes().await.map_err(|e| {
                DeployError::Fetch(FetchError::Download {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            })?;
            return Ok(bytes.to_vec());
        }

        let path = match url.strip_prefix("file://") {
            Some(path) => path,
            None if url.contains("://") => {
                return Err(DeployError::Fetch(FetchError::UnsupportedSource {
                    url: url.to_string(),
                }));
            }
            None => url,
        };

        debug!("Reading release '{}' from {path}", release_ref.name);
        tokio::fs::read(path).await.map_err(|e| {
            DeployError::Fetch(FetchError::Download {
                url: url.to_string(),
                message: e.to_string(),
            })
        })
    }

    async fn extract(&self, data: Vec<u8>, release_ref: &ReleaseRef) -> Result<Release> {
        let dest = self.work_dir.join(format!("release-{}", Uuid::new_v4()));
        debug!("Extracting release '{}' into {}", release_ref.name, dest.display());

        let target = dest.clone();
        let extracted = tokio::task::spawn_blocking(move || {
            extract_tarball(&data, &target)?;
            read_release(&target)
        })
        .await
        .map_err(|e| DeployError::internal(format!("Extraction task failed: {e}")))?;

        let release = match extracted {
            Ok(release) => release,
            Err(e) => {
                remove_quietly(&dest);
                return Err(e);
            }
        };

        if release.name != release_ref.name || release.version != release_ref.version {
            remove_quietly(&dest);
            return Err(DeployError::Fetch(FetchError::ReleaseMismatch {
                expected: release_ref.id(),
                actual: release.id(),
            }));
        }

        Ok(release)
    }
}

#[async_trait]
impl ReleaseFetcher for ArchiveReleaseFetcher {
    async fn download_and_extract(
        &self,
        release_ref: &ReleaseRef,
        stage: &Stage,
    ) -> Result<Release> {
        let mut archive = None;
        let slot = &mut archive;
        stage
            .perform(&format!("Downloading release '{}'", release_ref.name), move || async move {
                let data = self.download(release_ref).await?;

                if let Some(expected) = &release_ref.sha256 {
                    let actual = sha256_hex(&data);
                    if !actual.eq_ignore_ascii_case(expected) {
                        return Err(DeployError::Fetch(FetchError::ChecksumMismatch {
                            name: release_ref.name.clone(),
                            expected: expected.clone(),
                            actual,
                        }));
                    }
                }

                *slot = Some(data);
                Ok(())
            })
            .await?;
        let data = archive.ok_or_else(|| DeployError::internal("Release archive was not downloaded"))?;

        let mut extracted = None;
        let slot = &mut extracted;
        stage
            .perform(&format!("Extracting release '{}'", release_ref.name), move || async move {
                let release = self.extract(data, release_ref).await?;
                self.release_manager.add(release.clone());
                *slot = Some(release);
                Ok(())
            })
            .await?;

        extracted.ok_or_else(|| DeployError::internal("Release was not extracted"))
    }
}

fn remove_quietly(path: &Path) {
    if let Err(e) = std::fs::remove_dir_all(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {e}", path.display());
        }
    }
}
