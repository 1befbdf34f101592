//! Release and job definitions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// An extracted release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    /// Release name.
    pub name: String,
    /// Release version.
    pub version: String,
    /// Commit the release was built from.
    pub commit_hash: String,
    /// Jobs shipped by the release.
    pub jobs: Vec<Job>,
    /// Packages shipped by the release.
    pub packages: Vec<Package>,
    /// Directory the release was extracted into.
    pub extracted_path: PathBuf,
}

impl Release {
    /// Returns `name/version`.
    #[must_use]
    pub fn id(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }

    /// Looks up a job by name.
    #[must_use]
    pub fn find_job(&self, name: &str) -> Option<&Job> {
        self.jobs.iter().find(|job| job.name == name)
    }

    /// Returns true if the release ships a package named `name`.
    #[must_use]
    pub fn has_package(&self, name: &str) -> bool {
        self.packages.iter().any(|package| package.name == name)
    }
}

/// A job template bundle inside a release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Job name.
    pub name: String,
    /// Name of the owning release.
    pub release_name: String,
    /// Version of the owning release.
    pub release_version: String,
    /// Content fingerprint.
    pub fingerprint: String,
    /// Template source path (relative to `templates/`) mapped to its rendered path.
    pub templates: BTreeMap<String, String>,
    /// Packages the job depends on.
    pub packages: Vec<String>,
    /// Property definitions keyed by dotted name.
    pub properties: BTreeMap<String, PropertyDefinition>,
    /// Directory the job was extracted into.
    pub extracted_path: PathBuf,
}

impl Job {
    /// Directory holding the job's template sources.
    #[must_use]
    pub fn templates_dir(&self) -> PathBuf {
        self.extracted_path.join("templates")
    }
}

/// A property a job accepts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertyDefinition {
    /// Human readable description.
    #[serde(default)]
    pub description: Option<String>,
    /// Value used when the manifest does not set the property.
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

/// A compiled or source package inside a release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    /// Package name.
    pub name: String,
    /// Content fingerprint.
    #[serde(default)]
    pub fingerprint: String,
    /// Names of packages this one depends on.
    #[serde(default)]
    pub dependencies: Vec<String>,
}
