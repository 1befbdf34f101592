//! CPI capability checks for releases.

use tracing::debug;

use super::types::Release;
use crate::error::{DeployError, Result, ValidationError};

/// Path, relative to the rendered job, of the CPI executable.
pub const CPI_EXECUTABLE: &str = "bin/cpi";

/// Checks that a release can act as a CPI.
#[derive(Debug, Default)]
pub struct CpiReleaseValidator;

impl CpiReleaseValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates that `release` ships a job `job_name` exposing the CPI
    /// executable, and that every package the job needs is in the release.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidCpiRelease`] listing every problem.
    pub fn validate(&self, release: &Release, job_name: &str) -> Result<()> {
        let mut problems = Vec::new();

        match release.find_job(job_name) {
            None => problems.push(format!(
                "job '{job_name}' is not part of release '{}'",
                release.id()
            )),
            Some(job) => {
                if !job.templates.values().any(|dst| dst == CPI_EXECUTABLE) {
                    problems.push(format!(
                        "job '{job_name}' does not render a '{CPI_EXECUTABLE}' template"
                    ));
                }

                for package in &job.packages {
                    if !release.has_package(package) {
                        problems.push(format!(
                            "job '{job_name}' requires package '{package}' which is missing from the release"
                        ));
                    }
                }
            }
        }

        if problems.is_empty() {
            debug!("Release '{}' is a valid CPI release", release.id());
            return Ok(());
        }

        Err(DeployError::Validation(ValidationError::InvalidCpiRelease {
            release: release.name.clone(),
            problems,
        }))
    }
}
