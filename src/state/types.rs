//! Deployment state types.
//!
//! The state records the identity of the director and installation and
//! every cloud resource the deployment owns, so that a later run can find
//! and delete them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The persisted deployment state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentState {
    /// Identity passed to the CPI and agents.
    pub director_id: String,
    /// Identity of the CPI installation sandbox.
    pub installation_id: String,
    /// SHA of the last deployed manifest.
    #[serde(default)]
    pub current_manifest_sha: Option<String>,
    /// Deployed instances.
    #[serde(default)]
    pub instances: Vec<InstanceRecord>,
    /// Persistent disks.
    #[serde(default)]
    pub disks: Vec<DiskRecord>,
    /// Uploaded stemcells.
    #[serde(default)]
    pub stemcells: Vec<StemcellRecord>,
    /// When the state was last saved.
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
}

/// A deployed instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    /// Job the instance runs.
    pub job_name: String,
    /// Index of the instance within its job.
    pub index: u32,
    /// VM cloud id.
    pub vm_cid: String,
    /// Stemcell the VM was created from.
    #[serde(default)]
    pub stemcell_cid: Option<String>,
    /// Disks attached to the VM.
    #[serde(default)]
    pub disk_cids: Vec<String>,
    /// Blobs uploaded for the instance, such as rendered job templates.
    #[serde(default)]
    pub blob_ids: Vec<String>,
}

impl InstanceRecord {
    /// Returns `job/index`.
    #[must_use]
    pub fn name(&self) -> String {
        format!("{}/{}", self.job_name, self.index)
    }
}

/// A persistent disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskRecord {
    /// Disk cloud id.
    pub cid: String,
    /// Size in megabytes.
    #[serde(default)]
    pub size_mb: u64,
}

/// An uploaded stemcell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StemcellRecord {
    /// Stemcell cloud id.
    pub cid: String,
    /// Stemcell name.
    pub name: String,
    /// Stemcell version.
    pub version: String,
}

impl DeploymentState {
    /// Creates an empty state with fresh director and installation ids.
    #[must_use]
    pub fn generate() -> Self {
        Self {
            director_id: Uuid::new_v4().to_string(),
            installation_id: Uuid::new_v4().to_string(),
            ..Self::default()
        }
    }

    /// Returns true when no cloud resource is recorded.
    #[must_use]
    pub fn has_no_resources(&self) -> bool {
        self.instances.is_empty() && self.disks.is_empty() && self.stemcells.is_empty()
    }

    /// Removes the instance `job/index`.
    pub fn remove_instance(&mut self, job_name: &str, index: u32) {
        self.instances
            .retain(|i| !(i.job_name == job_name && i.index == index));
    }

    /// Removes a disk record.
    pub fn remove_disk(&mut self, cid: &str) {
        self.disks.retain(|d| d.cid != cid);
        for instance in &mut self.instances {
            instance.disk_cids.retain(|d| d != cid);
        }
    }

    /// Removes a stemcell record.
    pub fn remove_stemcell(&mut self, cid: &str) {
        self.stemcells.retain(|s| s.cid != cid);
    }

    /// Disks not attached to any instance.
    #[must_use]
    pub fn unused_disks(&self) -> Vec<DiskRecord> {
        self.disks
            .iter()
            .filter(|d| !self.instances.iter().any(|i| i.disk_cids.contains(&d.cid)))
            .cloned()
            .collect()
    }

    /// Stemcells no instance was created from.
    #[must_use]
    pub fn unused_stemcells(&self) -> Vec<StemcellRecord> {
        self.stemcells
            .iter()
            .filter(|s| {
                !self
                    .instances
                    .iter()
                    .any(|i| i.stemcell_cid.as_deref() == Some(s.cid.as_str()))
            })
            .cloned()
            .collect()
    }
}
