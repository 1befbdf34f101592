//! Job resolution against extracted releases.

use std::sync::Arc;
use tracing::debug;

use super::manager::ReleaseManager;
use super::types::Job;
use crate::config::InstallationManifest;
use crate::error::{DeployError, ResolutionError, Result, ResultExt};

/// Resolves a job by name inside a named, already extracted release.
#[cfg_attr(test, mockall::automock)]
pub trait ReleaseJobResolver: Send + Sync {
    /// Returns the job `job_name` of release `release_name`.
    ///
    /// # Errors
    ///
    /// Returns a resolution error if the release or the job is unknown.
    fn resolve(&self, job_name: &str, release_name: &str) -> Result<Job>;
}

/// [`ReleaseJobResolver`] backed by a [`ReleaseManager`].
pub struct ManagedReleaseJobResolver {
    release_manager: Arc<dyn ReleaseManager>,
}

impl ManagedReleaseJobResolver {
    /// Creates a resolver over the releases registered with `release_manager`.
    #[must_use]
    pub fn new(release_manager: Arc<dyn ReleaseManager>) -> Self {
        Self { release_manager }
    }
}

impl ReleaseJobResolver for ManagedReleaseJobResolver {
    fn resolve(&self, job_name: &str, release_name: &str) -> Result<Job> {
        let release = self.release_manager.find(release_name).ok_or_else(|| {
            DeployError::Resolution(ResolutionError::ReleaseNotExtracted {
                name: release_name.to_string(),
            })
        })?;

        release.find_job(job_name).cloned().ok_or_else(|| {
            DeployError::Resolution(ResolutionError::JobNotFound {
                job: job_name.to_string(),
                release: release_name.to_string(),
            })
        })
    }
}

/// Resolves the jobs an installation manifest refers to.
pub struct JobResolver {
    release_job_resolver: Arc<dyn ReleaseJobResolver>,
}

impl JobResolver {
    /// Creates a resolver delegating to `release_job_resolver`.
    #[must_use]
    pub fn new(release_job_resolver: Arc<dyn ReleaseJobResolver>) -> Self {
        Self {
            release_job_resolver,
        }
    }

    /// Resolves every job of `manifest`.
    ///
    /// An installation always refers to exactly one job, the CPI.
    ///
    /// # Errors
    ///
    /// Returns the resolution error wrapped with the job and release names.
    pub fn from_manifest(&self, manifest: &InstallationManifest) -> Result<Vec<Job>> {
        let template = &manifest.template;
        debug!("Resolving job '{}' in release '{}'", template.name, template.release);

        let job = self
            .release_job_resolver
            .resolve(&template.name, &template.release)
            .with_context(|| {
                format!(
                    "Resolving job '{}' in release '{}'",
                    template.name, template.release
                )
            })?;

        Ok(vec![job])
    }
}
