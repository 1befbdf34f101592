//! Deployment manifest parser.
//!
//! Loads the YAML manifest, resolves relative release locations against the
//! manifest's directory and splits the result into the release set and the
//! installation manifest.

use crate::error::{DeployError, ManifestError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::manifest::{DeploymentManifest, InstallationManifest, ReleaseSetManifest};

/// Parses a deployment manifest into its release set and installation.
pub trait ManifestParser: Send + Sync {
    /// Parses the manifest at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or is not a valid manifest.
    fn parse(&self, path: &Path) -> Result<(ReleaseSetManifest, InstallationManifest)>;
}

/// YAML implementation of [`ManifestParser`].
#[derive(Debug, Default)]
pub struct YamlManifestParser;

impl YamlManifestParser {
    /// Creates a new parser.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Parses a manifest from a YAML string.
    ///
    /// Relative release locations are resolved against `base_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(
        &self,
        content: &str,
        base_dir: &Path,
        source: Option<&Path>,
    ) -> Result<DeploymentManifest> {
        debug!("Parsing deployment manifest");

        let mut manifest: DeploymentManifest = serde_yaml::from_str(content).map_err(|e| {
            DeployError::Manifest(ManifestError::ParseError {
                message: format!("YAML parse error: {e}"),
                location: source.map(|p| p.display().to_string()),
            })
        })?;

        for release in &mut manifest.releases {
            release.url = resolve_release_url(&release.url, base_dir);
        }

        debug!(
            "Parsed manifest '{}' with {} release(s)",
            manifest.name,
            manifest.releases.len()
        );
        Ok(manifest)
    }
}

impl ManifestParser for YamlManifestParser {
    fn parse(&self, path: &Path) -> Result<(ReleaseSetManifest, InstallationManifest)> {
        info!("Loading deployment manifest from: {}", path.display());

        if !path.exists() {
            return Err(DeployError::Manifest(ManifestError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            DeployError::Manifest(ManifestError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        let manifest = self.parse_yaml(&content, base_dir, Some(path))?;
        Ok(manifest.into_parts())
    }
}

/// Makes `file://` and bare relative locations absolute.
fn resolve_release_url(url: &str, base_dir: &Path) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }

    let raw = url.strip_prefix("file://").unwrap_or(url);
    let path = PathBuf::from(raw);
    if path.is_absolute() {
        return format!("file://{raw}");
    }

    format!("file://{}", base_dir.join(path).display())
}

/// Returns the default state file for a manifest:
/// `<manifest-dir>/<manifest-stem>-state.json`.
#[must_use]
pub fn default_state_path(manifest_path: &Path) -> PathBuf {
    let stem = manifest_path
        .file_stem()
        .map_or_else(|| String::from("deployment"), |s| s.to_string_lossy().into_owned());
    let dir = manifest_path.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!("{stem}-state.json"))
}
