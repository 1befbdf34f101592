//! Installation sandbox layout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{Result, ResultExt};
use crate::state::DeploymentStateService;

/// Directory tree a CPI installation lives in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallationTarget {
    path: PathBuf,
}

impl InstallationTarget {
    /// Creates a target rooted at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Sandbox root.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rendered jobs.
    #[must_use]
    pub fn jobs_path(&self) -> PathBuf {
        self.path.join("jobs")
    }

    /// Installed packages.
    #[must_use]
    pub fn packages_path(&self) -> PathBuf {
        self.path.join("packages")
    }

    /// Local blob cache.
    #[must_use]
    pub fn blobstore_path(&self) -> PathBuf {
        self.path.join("blobs")
    }

    /// Scratch space handed to the CPI.
    #[must_use]
    pub fn temp_root(&self) -> PathBuf {
        self.path.join("tmp")
    }

    /// Every directory the sandbox needs.
    #[must_use]
    pub fn directories(&self) -> [PathBuf; 4] {
        [
            self.jobs_path(),
            self.packages_path(),
            self.blobstore_path(),
            self.temp_root(),
        ]
    }
}

/// Derives installation targets from the deployment state.
pub struct TargetProvider {
    installations_dir: PathBuf,
    state_service: Arc<dyn DeploymentStateService>,
}

impl TargetProvider {
    /// Creates a provider placing installations under `installations_dir`.
    #[must_use]
    pub fn new(
        installations_dir: impl Into<PathBuf>,
        state_service: Arc<dyn DeploymentStateService>,
    ) -> Self {
        Self {
            installations_dir: installations_dir.into(),
            state_service,
        }
    }

    /// Returns the target for the installation recorded in the state.
    ///
    /// # Errors
    ///
    /// Returns an error if the deployment state cannot be loaded.
    pub async fn new_target(&self) -> Result<InstallationTarget> {
        let state = self
            .state_service
            .load()
            .await
            .context("Loading installation id")?;
        Ok(InstallationTarget::new(
            self.installations_dir.join(state.installation_id),
        ))
    }
}
