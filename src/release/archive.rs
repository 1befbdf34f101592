//! Release archive handling.
//!
//! A release archive is a gzip tarball holding `release.MF` and one
//! `jobs/<job>.tgz` per job. Each job tarball holds `job.MF` and a
//! `templates/` directory. Job tarballs are unpacked into
//! `extracted_jobs/<job>` next to the release manifest.

use flate2::read::GzDecoder;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::debug;

use super::types::{Job, Package, PropertyDefinition, Release};
use crate::error::{DeployError, FetchError, Result};

/// Name of the release manifest inside a release archive.
pub const RELEASE_MANIFEST: &str = "release.MF";

/// Name of the job manifest inside a job archive.
pub const JOB_MANIFEST: &str = "job.MF";

/// Directory job archives are unpacked into.
const EXTRACTED_JOBS_DIR: &str = "extracted_jobs";

#[derive(Debug, Deserialize)]
struct ReleaseManifestFile {
    name: String,
    version: String,
    #[serde(default)]
    commit_hash: String,
    #[serde(default)]
    jobs: Vec<JobEntry>,
    #[serde(default)]
    packages: Vec<Package>,
}

#[derive(Debug, Deserialize)]
struct JobEntry {
    name: String,
    #[serde(default)]
    fingerprint: String,
}

#[derive(Debug, Deserialize)]
struct JobManifestFile {
    name: String,
    #[serde(default)]
    templates: BTreeMap<String, String>,
    #[serde(default)]
    packages: Vec<String>,
    #[serde(default)]
    properties: BTreeMap<String, PropertyDefinition>,
}

fn extract_error(path: &Path, message: impl Into<String>) -> DeployError {
    DeployError::Fetch(FetchError::Extract {
        path: path.to_path_buf(),
        message: message.into(),
    })
}

fn manifest_error(path: &Path, message: impl Into<String>) -> DeployError {
    DeployError::Fetch(FetchError::ReleaseManifest {
        path: path.to_path_buf(),
        message: message.into(),
    })
}

/// Returns the hex encoded SHA-256 of `data`.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Extracts a gzip tarball into `dest`.
///
/// # Errors
///
/// Returns an error if the data is not a gzip tarball or an entry would land
/// outside `dest`.
pub fn extract_tarball(data: &[u8], dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)
        .map_err(|e| extract_error(dest, format!("failed to create destination directory: {e}")))?;

    let mut archive = Archive::new(GzDecoder::new(Cursor::new(data)));
    let entries = archive
        .entries()
        .map_err(|e| extract_error(dest, format!("failed to read tarball entries: {e}")))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| extract_error(dest, format!("failed to read tarball entry: {e}")))?;
        let entry_path = entry
            .path()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        let unpacked = entry
            .unpack_in(dest)
            .map_err(|e| extract_error(dest, format!("failed to extract '{entry_path}': {e}")))?;
        if !unpacked {
            return Err(extract_error(
                dest,
                format!("tarball entry escapes destination directory: {entry_path}"),
            ));
        }
    }

    Ok(())
}

/// Reads an extracted release and unpacks its job archives.
///
/// # Errors
///
/// Returns an error if a manifest is missing or malformed, or a job archive
/// cannot be extracted.
pub fn read_release(release_dir: &Path) -> Result<Release> {
    let manifest_path = release_dir.join(RELEASE_MANIFEST);
    let content = std::fs::read_to_string(&manifest_path)
        .map_err(|e| manifest_error(&manifest_path, e.to_string()))?;
    let manifest: ReleaseManifestFile = serde_yaml::from_str(&content)
        .map_err(|e| manifest_error(&manifest_path, e.to_string()))?;

    let mut jobs = Vec::with_capacity(manifest.jobs.len());
    for entry in &manifest.jobs {
        let archive_path = release_dir.join("jobs").join(format!("{}.tgz", entry.name));
        let data = std::fs::read(&archive_path)
            .map_err(|e| extract_error(&archive_path, e.to_string()))?;

        let job_dir = release_dir.join(EXTRACTED_JOBS_DIR).join(&entry.name);
        extract_tarball(&data, &job_dir)?;

        let job = read_job(&job_dir, entry, &manifest)?;
        debug!("Extracted job '{}' of release '{}'", job.name, manifest.name);
        jobs.push(job);
    }

    Ok(Release {
        name: manifest.name,
        version: manifest.version,
        commit_hash: manifest.commit_hash,
        jobs,
        packages: manifest.packages,
        extracted_path: release_dir.to_path_buf(),
    })
}

fn read_job(job_dir: &Path, entry: &JobEntry, release: &ReleaseManifestFile) -> Result<Job> {
    let manifest_path = job_dir.join(JOB_MANIFEST);
    let content = std::fs::read_to_string(&manifest_path)
        .map_err(|e| manifest_error(&manifest_path, e.to_string()))?;
    let manifest: JobManifestFile = serde_yaml::from_str(&content)
        .map_err(|e| manifest_error(&manifest_path, e.to_string()))?;

    if manifest.name != entry.name {
        return Err(manifest_error(
            &manifest_path,
            format!(
                "job manifest names '{}' but the release lists '{}'",
                manifest.name, entry.name
            ),
        ));
    }

    Ok(Job {
        name: manifest.name,
        release_name: release.name.clone(),
        release_version: release.version.clone(),
        fingerprint: entry.fingerprint.clone(),
        templates: manifest.templates,
        packages: manifest.packages,
        properties: manifest.properties,
        extracted_path: PathBuf::from(job_dir),
    })
}
