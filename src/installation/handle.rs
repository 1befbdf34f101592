//! An installed CPI and its registry scope.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::target::InstallationTarget;
use crate::config::{InstallationManifest, RegistryConfig};
use crate::error::{DeployError, Result};
use crate::registry::{RegistryServer, RegistryServerManager};
use crate::release::{CPI_EXECUTABLE, Job};
use crate::stage::Stage;

/// A CPI rendered into a sandbox, plus the registry it may need.
///
/// The registry only runs inside [`Installation::with_running_registry`].
/// Dropping the installation while a registry is running cancels it.
pub struct Installation {
    target: InstallationTarget,
    job: Job,
    manifest: InstallationManifest,
    registry_manager: Arc<dyn RegistryServerManager>,
    registry: Mutex<Option<Box<dyn RegistryServer>>>,
}

impl Installation {
    /// Creates an installation of `job` inside `target`.
    #[must_use]
    pub fn new(
        target: InstallationTarget,
        job: Job,
        manifest: InstallationManifest,
        registry_manager: Arc<dyn RegistryServerManager>,
    ) -> Self {
        Self {
            target,
            job,
            manifest,
            registry_manager,
            registry: Mutex::new(None),
        }
    }

    /// Sandbox the CPI was rendered into.
    #[must_use]
    pub const fn target(&self) -> &InstallationTarget {
        &self.target
    }

    /// The installed CPI job.
    #[must_use]
    pub const fn job(&self) -> &Job {
        &self.job
    }

    /// Manifest the installation was built from.
    #[must_use]
    pub const fn manifest(&self) -> &InstallationManifest {
        &self.manifest
    }

    /// Path of the rendered CPI executable.
    #[must_use]
    pub fn cpi_executable(&self) -> PathBuf {
        self.target
            .jobs_path()
            .join(&self.job.name)
            .join(CPI_EXECUTABLE)
    }

    /// Returns true while the registry is running.
    pub async fn registry_running(&self) -> bool {
        self.registry.lock().await.is_some()
    }

    /// Runs `f` with the registry started, stopping it afterwards.
    ///
    /// Without a registry in the manifest, `f` simply runs. Otherwise the
    /// stage `Starting registry` runs first and `Stopping registry` runs
    /// after `f` regardless of its outcome.
    ///
    /// # Errors
    ///
    /// Returns the start error, `f`'s error if the registry stopped cleanly,
    /// the stop error if `f` succeeded, or [`DeployError::Combined`] when both
    /// `f` and the shutdown failed.
    pub async fn with_running_registry<F, Fut, T>(&self, stage: &Stage, f: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let Some(config) = self.manifest.registry.as_ref() else {
            debug!("No registry configured");
            return f().await;
        };

        self.start_registry(stage, config).await?;

        let result = f().await;
        let stopped = self.stop_registry(stage).await;

        match (result, stopped) {
            (Ok(value), Ok(())) => Ok(value),
            (Err(e), Ok(())) | (Ok(_), Err(e)) => Err(e),
            (Err(primary), Err(secondary)) => {
                warn!("Registry shutdown failed after an earlier error: {secondary}");
                Err(DeployError::Combined {
                    primary: Box::new(primary),
                    secondary: Box::new(secondary),
                })
            }
        }
    }

    async fn start_registry(&self, stage: &Stage, config: &RegistryConfig) -> Result<()> {
        stage
            .perform("Starting registry", || async {
                let mut registry = self.registry.lock().await;
                if registry.is_some() {
                    debug!("Registry already running");
                    return Ok(());
                }

                *registry = Some(self.registry_manager.start(config).await?);
                Ok(())
            })
            .await
    }

    async fn stop_registry(&self, stage: &Stage) -> Result<()> {
        stage
            .perform("Stopping registry", || async {
                let server = self.registry.lock().await.take();
                match server {
                    Some(server) => server.stop().await,
                    None => Ok(()),
                }
            })
            .await
    }
}

impl std::fmt::Debug for Installation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Installation")
            .field("target", &self.target)
            .field("job", &self.job.name)
            .finish_non_exhaustive()
    }
}
