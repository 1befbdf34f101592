//! Manifest validation.
//!
//! Validation collects every problem it finds; the first error is returned
//! and warnings are kept on the [`ValidationReport`].

use crate::error::{DeployError, ManifestError, Result};
use reqwest::Url;
use std::collections::HashSet;
use tracing::{debug, warn};

use super::manifest::{InstallationManifest, ReleaseSetManifest};

/// Validation result containing all problems found.
#[derive(Debug, Default)]
pub struct ValidationReport {
    /// Validation errors.
    pub errors: Vec<FieldError>,
    /// Non-fatal issues.
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct FieldError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ValidationReport {
    fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError {
            field: field.into(),
            message: message.into(),
        });
    }

    fn into_result(self, what: &str) -> Result<Self> {
        for warning in &self.warnings {
            warn!("{what}: {warning}");
        }

        match self.errors.first() {
            None => {
                debug!("{what} validation passed");
                Ok(self)
            }
            Some(first) => Err(DeployError::Manifest(ManifestError::validation(
                first.message.clone(),
                first.field.clone(),
            ))),
        }
    }
}

/// Validates the release set of a manifest.
#[derive(Debug, Default)]
pub struct ReleaseSetValidator;

impl ReleaseSetValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates `manifest`.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate(&self, manifest: &ReleaseSetManifest) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();
        let mut seen = HashSet::new();

        for (i, release) in manifest.releases.iter().enumerate() {
            let field = format!("releases[{i}]");

            if release.name.is_empty() {
                report.error(format!("{field}.name"), "Release name cannot be empty");
            } else if !seen.insert(release.name.as_str()) {
                report.error(
                    format!("{field}.name"),
                    format!("Duplicate release name '{}'", release.name),
                );
            }

            if release.version.is_empty() {
                report.error(
                    format!("{field}.version"),
                    format!("Release '{}' must have a version", release.name),
                );
            }

            if release.url.is_empty() {
                report.error(
                    format!("{field}.url"),
                    format!("Release '{}' must have a url", release.name),
                );
            }

            if release.sha256.is_none() && release.url.starts_with("http") {
                report.warnings.push(format!(
                    "Release '{}' is downloaded without a sha256 checksum",
                    release.name
                ));
            }
        }

        report.into_result("Release set")
    }
}

/// Validates the installation section of a manifest.
#[derive(Debug, Default)]
pub struct InstallationValidator;

impl InstallationValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates `manifest`.
    ///
    /// # Errors
    ///
    /// Returns the first validation error found.
    pub fn validate(&self, manifest: &InstallationManifest) -> Result<ValidationReport> {
        let mut report = ValidationReport::default();

        if manifest.name.is_empty() {
            report.error("name", "Deployment name cannot be empty");
        }

        if manifest.template.name.is_empty() {
            report.error("cloud_provider.template.name", "CPI job name cannot be empty");
        }

        if manifest.template.release.is_empty() {
            report.error(
                "cloud_provider.template.release",
                "CPI release name cannot be empty",
            );
        }

        match Url::parse(&manifest.mbus) {
            Ok(url) if url.host_str().is_some() => {}
            Ok(_) => report.error("cloud_provider.mbus", "Message bus URL must have a host"),
            Err(e) => report.error(
                "cloud_provider.mbus",
                format!("Message bus URL is invalid: {e}"),
            ),
        }

        if let Some(registry) = &manifest.registry {
            if registry.port == 0 {
                report.error("cloud_provider.registry.port", "Registry port must be set");
            }
            if registry.username.is_empty() || registry.password.is_empty() {
                report.warnings.push(String::from(
                    "Registry is configured without credentials",
                ));
            }
        }

        if !manifest.properties.is_object() {
            report.error(
                "cloud_provider.properties",
                "Properties must be a mapping",
            );
        }

        report.into_result("Installation manifest")
    }
}
