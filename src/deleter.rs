//! Deployment deletion workflow.
//!
//! The deleter validates the manifest and its CPI release, installs the CPI,
//! and then, with the registry running, deletes the current deployment and
//! any orphaned disks or stemcells. Extracted releases are removed on every
//! exit path, including unwinding, by [`ReleaseCleanupGuard`].

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::agent::AgentClientFactory;
use crate::blobstore::BlobstoreFactory;
use crate::cloud::CloudFactory;
use crate::config::{
    InstallationManifest, InstallationValidator, ManifestParser, ReleaseSetValidator,
};
use crate::deployment::{Manager, ManagerFactory};
use crate::error::{DeployError, ResolutionError, Result, ResultExt};
use crate::installation::{CpiInstaller, Installation};
use crate::release::{ReleaseFetcher, ReleaseManager};
use crate::stage::Stage;
use crate::state::DeploymentStateService;
use crate::ui::Ui;

/// Deletes every extracted release when dropped.
///
/// Cleanup failures are logged, never returned, so they cannot mask the
/// outcome of the workflow.
pub struct ReleaseCleanupGuard {
    release_manager: Arc<dyn ReleaseManager>,
}

impl ReleaseCleanupGuard {
    /// Arms a guard over `release_manager`.
    #[must_use]
    pub fn new(release_manager: Arc<dyn ReleaseManager>) -> Self {
        Self { release_manager }
    }
}

impl Drop for ReleaseCleanupGuard {
    fn drop(&mut self) {
        debug!("Deleting all extracted releases");
        if let Err(err) = self.release_manager.delete_all() {
            warn!("Deleting all extracted releases: {err}");
        }
    }
}

/// Everything the deleter talks to.
pub struct DeleterCollaborators {
    /// User-facing messages.
    pub ui: Arc<dyn Ui>,
    /// Persisted deployment state.
    pub state_service: Arc<dyn DeploymentStateService>,
    /// Splits the deployment manifest into release set and installation.
    pub manifest_parser: Arc<dyn ManifestParser>,
    /// Downloads and extracts releases.
    pub release_fetcher: Arc<dyn ReleaseFetcher>,
    /// Tracks extracted releases for cleanup.
    pub release_manager: Arc<dyn ReleaseManager>,
    /// Validates and installs the CPI.
    pub cpi_installer: Arc<dyn CpiInstaller>,
    /// Builds the CPI-backed cloud.
    pub cloud_factory: Arc<dyn CloudFactory>,
    /// Builds the agent client.
    pub agent_client_factory: Arc<dyn AgentClientFactory>,
    /// Builds the blobstore client.
    pub blobstore_factory: Arc<dyn BlobstoreFactory>,
    /// Builds the deployment manager.
    pub manager_factory: Arc<dyn ManagerFactory>,
}

/// Orchestrates the deletion of a deployment.
pub struct DeploymentDeleter {
    deps: DeleterCollaborators,
    release_set_validator: ReleaseSetValidator,
    installation_validator: InstallationValidator,
}

impl DeploymentDeleter {
    /// Creates a deleter over `deps`.
    #[must_use]
    pub const fn new(deps: DeleterCollaborators) -> Self {
        Self {
            deps,
            release_set_validator: ReleaseSetValidator::new(),
            installation_validator: InstallationValidator::new(),
        }
    }

    /// Deletes the deployment described by `manifest_path`.
    ///
    /// A missing deployment state file is not an error: nothing is deployed,
    /// so nothing is installed or deleted.
    ///
    /// # Errors
    ///
    /// Returns the first failure, annotated with the action that failed.
    pub async fn delete_deployment(&self, manifest_path: &Path, stage: &Stage) -> Result<()> {
        let deps = &self.deps;
        deps.ui.print_line(&format!(
            "Deployment state: '{}'",
            deps.state_service.path().display()
        ));

        let _cleanup = ReleaseCleanupGuard::new(Arc::clone(&deps.release_manager));

        if !deps.state_service.exists().await {
            deps.ui.print_line("No deployment state file found.");
            return Ok(());
        }

        let state = deps
            .state_service
            .load()
            .await
            .context("Loading deployment state")?;

        let mut validated = None;
        let slot = &mut validated;
        stage
            .perform_complex("validating", move |stage| async move {
                *slot = Some(self.validate(manifest_path, &stage).await?);
                Ok(())
            })
            .await?;
        let manifest = validated
            .ok_or_else(|| DeployError::internal("Validation produced no installation manifest"))?;

        let installation = deps.cpi_installer.install_cpi_release(&manifest, stage).await?;

        installation
            .with_running_registry(stage, || {
                self.find_and_delete_deployment(&installation, &state.director_id, &manifest.mbus, stage)
            })
            .await
    }

    /// Parses the manifest, then fetches and validates its CPI release.
    async fn validate(&self, manifest_path: &Path, stage: &Stage) -> Result<InstallationManifest> {
        let deps = &self.deps;
        let (release_set, installation_manifest) = deps.manifest_parser.parse(manifest_path)?;
        self.release_set_validator.validate(&release_set)?;
        self.installation_validator.validate(&installation_manifest)?;

        let cpi_release_name = &installation_manifest.template.release;
        let cpi_release = release_set.find_by_name(cpi_release_name).ok_or_else(|| {
            DeployError::Resolution(ResolutionError::ReleaseNotFound {
                name: cpi_release_name.clone(),
            })
        })?;

        deps.release_fetcher
            .download_and_extract(cpi_release, stage)
            .await?;
        deps.cpi_installer
            .validate_cpi_release(&installation_manifest, stage)
            .await?;

        Ok(installation_manifest)
    }

    async fn find_and_delete_deployment(
        &self,
        installation: &Installation,
        director_id: &str,
        mbus_url: &str,
        stage: &Stage,
    ) -> Result<()> {
        let manager = self.deployment_manager(installation, director_id, mbus_url)?;

        self.find_current_deployment_and_delete(manager.as_ref(), stage)
            .await
            .context("Deleting deployment")?;

        manager.cleanup(stage).await
    }

    async fn find_current_deployment_and_delete(
        &self,
        manager: &dyn Manager,
        stage: &Stage,
    ) -> Result<()> {
        debug!("Finding current deployment");
        let deployment = manager
            .find_current()
            .await
            .context("Finding current deployment")?;

        stage
            .perform_complex("deleting deployment", |stage| async move {
                match deployment {
                    Some(deployment) => {
                        info!(instances = deployment.instance_count(), "Deleting current deployment");
                        deployment.delete(&stage).await
                    }
                    None => {
                        debug!("No current deployment found");
                        Ok(())
                    }
                }
            })
            .await
    }

    fn deployment_manager(
        &self,
        installation: &Installation,
        director_id: &str,
        mbus_url: &str,
    ) -> Result<Box<dyn Manager>> {
        let deps = &self.deps;

        debug!("Creating cloud client");
        let cloud = deps
            .cloud_factory
            .new_cloud(installation, director_id)
            .context("Creating CPI client from CPI installation")?;

        debug!("Creating agent client");
        let agent_client = deps
            .agent_client_factory
            .new_agent_client(director_id, mbus_url);

        debug!("Creating blobstore client");
        let blobstore = deps
            .blobstore_factory
            .create(mbus_url)
            .context("Creating blobstore client")?;

        debug!("Creating deployment manager");
        Ok(deps
            .manager_factory
            .new_manager(cloud, agent_client, blobstore))
    }
}
