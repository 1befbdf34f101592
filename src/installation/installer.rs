//! CPI release validation and installation.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

use super::handle::Installation;
use super::renderer::JobRenderer;
use super::target::{InstallationTarget, TargetProvider};
use crate::config::InstallationManifest;
use crate::error::{DeployError, InstallationError, ResolutionError, Result};
use crate::registry::RegistryServerManager;
use crate::release::{CpiReleaseValidator, Job, JobResolver, ReleaseManager};
use crate::stage::{Stage, StageNode};

/// Validates and installs CPI releases.
#[async_trait]
pub trait CpiInstaller: Send + Sync {
    /// Checks that the extracted CPI release can serve `manifest`.
    ///
    /// Runs the stage `Validating cpi release`.
    ///
    /// # Errors
    ///
    /// Returns a validation error enumerating every missing capability.
    async fn validate_cpi_release(&self, manifest: &InstallationManifest, stage: &Stage)
    -> Result<()>;

    /// Renders the CPI job into a sandbox.
    ///
    /// Runs the complex stage `installing CPI`.
    ///
    /// # Errors
    ///
    /// Returns the resolution error if the manifest's job cannot be found, or
    /// an installation error if the sandbox cannot be prepared or a template
    /// cannot be rendered.
    async fn install_cpi_release(
        &self,
        manifest: &InstallationManifest,
        stage: &Stage,
    ) -> Result<Installation>;
}

/// [`CpiInstaller`] rendering jobs from extracted releases.
pub struct ReleaseCpiInstaller {
    release_manager: Arc<dyn ReleaseManager>,
    job_resolver: JobResolver,
    validator: CpiReleaseValidator,
    renderer: Arc<JobRenderer>,
    target_provider: TargetProvider,
    registry_manager: Arc<dyn RegistryServerManager>,
}

impl ReleaseCpiInstaller {
    /// Creates an installer.
    #[must_use]
    pub fn new(
        release_manager: Arc<dyn ReleaseManager>,
        job_resolver: JobResolver,
        target_provider: TargetProvider,
        registry_manager: Arc<dyn RegistryServerManager>,
    ) -> Self {
        Self {
            release_manager,
            job_resolver,
            validator: CpiReleaseValidator::new(),
            renderer: Arc::new(JobRenderer::new()),
            target_provider,
            registry_manager,
        }
    }
}

#[async_trait]
impl CpiInstaller for ReleaseCpiInstaller {
    async fn validate_cpi_release(
        &self,
        manifest: &InstallationManifest,
        stage: &Stage,
    ) -> Result<()> {
        stage
            .perform("Validating cpi release", || async {
                let release_name = &manifest.template.release;
                let release = self.release_manager.find(release_name).ok_or_else(|| {
                    DeployError::Resolution(ResolutionError::ReleaseNotExtracted {
                        name: release_name.clone(),
                    })
                })?;

                self.validator.validate(&release, &manifest.template.name)
            })
            .await
    }

    async fn install_cpi_release(
        &self,
        manifest: &InstallationManifest,
        stage: &Stage,
    ) -> Result<Installation> {
        let mut installed = None;
        let slot = &mut installed;
        stage
            .perform_complex("installing CPI", move |stage| async move {
                let mut prepared = None;
                let prepared_slot = &mut prepared;
                stage
                    .perform("Preparing installation sandbox", || async move {
                        *prepared_slot = Some(self.prepare_sandbox(manifest).await?);
                        Ok(())
                    })
                    .await?;
                let (target, jobs) = prepared
                    .ok_or_else(|| DeployError::internal("Sandbox preparation produced no target"))?;
                let job = jobs
                    .first()
                    .cloned()
                    .ok_or_else(|| DeployError::internal("Installation manifest resolved to no jobs"))?;

                for job in jobs {
                    self.render_stage(job, manifest, &target).run(&stage).await?;
                }

                *slot = Some((target, job));
                Ok(())
            })
            .await?;
        let (target, job) = installed
            .ok_or_else(|| DeployError::internal("Installation produced no sandbox"))?;

        Ok(Installation::new(
            target,
            job,
            manifest.clone(),
            Arc::clone(&self.registry_manager),
        ))
    }
}

impl ReleaseCpiInstaller {
    /// Allocates the sandbox, resolves the jobs to render into it and creates
    /// its directories.
    async fn prepare_sandbox(
        &self,
        manifest: &InstallationManifest,
    ) -> Result<(InstallationTarget, Vec<Job>)> {
        let target = self.target_provider.new_target().await?;
        let jobs = self.job_resolver.from_manifest(manifest)?;

        info!(
            "Installing CPI job '{}' into {}",
            manifest.template.name,
            target.path().display()
        );

        for dir in target.directories() {
            debug!("Creating {}", dir.display());
            tokio::fs::create_dir_all(&dir).await.map_err(|e| {
                DeployError::Installation(InstallationError::Sandbox {
                    path: dir.clone(),
                    message: e.to_string(),
                })
            })?;
        }

        Ok((target, jobs))
    }

    fn render_stage(
        &self,
        job: Job,
        manifest: &InstallationManifest,
        target: &InstallationTarget,
    ) -> StageNode {
        let renderer = Arc::clone(&self.renderer);
        let properties = manifest.properties.clone();
        let target = target.clone();
        StageNode::leaf(
            format!("Rendering job templates for '{}'", job.name),
            move || async move {
                renderer.render(&job, &properties, &target).await?;
                Ok(())
            },
        )
    }
}
