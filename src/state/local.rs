//! JSON file backed deployment state.

use async_trait::async_trait;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{DeployError, Result, StateError};

use super::service::DeploymentStateService;
use super::types::DeploymentState;

/// Deployment state stored as a JSON file next to the manifest.
#[derive(Debug, Clone)]
pub struct FileDeploymentStateService {
    /// Path to the state file.
    state_path: PathBuf,
}

impl FileDeploymentStateService {
    /// Creates a service for the state file at `state_path`.
    #[must_use]
    pub fn new(state_path: impl Into<PathBuf>) -> Self {
        Self {
            state_path: state_path.into(),
        }
    }

    /// Ensures the state directory exists.
    async fn ensure_dir(&self) -> Result<()> {
        let Some(dir) = self.state_path.parent() else {
            return Ok(());
        };
        if dir.as_os_str().is_empty() || dir.exists() {
            return Ok(());
        }

        debug!("Creating state directory: {}", dir.display());
        fs::create_dir_all(dir).await.map_err(|e| {
            DeployError::State(StateError::WriteFailed {
                message: format!("Failed to create state directory: {e}"),
            })
        })
    }

    async fn read(&self) -> Result<DeploymentState> {
        info!("Loading state from: {}", self.state_path.display());

        let content = fs::read_to_string(&self.state_path).await.map_err(|e| {
            DeployError::State(StateError::Corrupted {
                message: format!("Failed to read state file: {e}"),
            })
        })?;

        serde_json::from_str(&content).map_err(|e| {
            DeployError::State(StateError::Corrupted {
                message: format!("Failed to parse state file: {e}"),
            })
        })
    }
}

#[async_trait]
impl DeploymentStateService for FileDeploymentStateService {
    fn path(&self) -> &Path {
        &self.state_path
    }

    async fn exists(&self) -> bool {
        match fs::try_exists(&self.state_path).await {
            Ok(exists) => exists,
            Err(e) => {
                // Only a confirmed absence counts as missing; `load` surfaces the error.
                warn!("Cannot check state file {}: {e}", self.state_path.display());
                true
            }
        }
    }

    async fn load(&self) -> Result<DeploymentState> {
        if self.exists().await {
            return self.read().await;
        }

        debug!(
            "State file does not exist, generating ids: {}",
            self.state_path.display()
        );
        let state = DeploymentState::generate();
        self.save(&state).await?;
        Ok(state)
    }

    async fn save(&self, state: &DeploymentState) -> Result<()> {
        self.ensure_dir().await?;

        debug!("Saving state to: {}", self.state_path.display());

        let mut stamped = state.clone();
        stamped.last_updated = Some(Utc::now());

        let content = serde_json::to_string_pretty(&stamped).map_err(|e| {
            DeployError::State(StateError::serialization(format!(
                "Failed to serialize state: {e}"
            )))
        })?;

        // Readers only ever see a complete file.
        let temp_path = self.state_path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await.map_err(|e| {
            DeployError::State(StateError::WriteFailed {
                message: format!("Failed to create temp state file: {e}"),
            })
        })?;

        file.write_all(content.as_bytes()).await.map_err(|e| {
            DeployError::State(StateError::WriteFailed {
                message: format!("Failed to write state file: {e}"),
            })
        })?;

        file.sync_all().await.map_err(|e| {
            DeployError::State(StateError::WriteFailed {
                message: format!("Failed to sync state file: {e}"),
            })
        })?;

        fs::rename(&temp_path, &self.state_path).await.map_err(|e| {
            DeployError::State(StateError::WriteFailed {
                message: format!("Failed to rename state file: {e}"),
            })
        })?;

        debug!("State saved successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::InstanceRecord;
    use tempfile::TempDir;

    fn create_test_service() -> (FileDeploymentStateService, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let service = FileDeploymentStateService::new(temp_dir.path().join("bosh-state.json"));
        (service, temp_dir)
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let (service, _temp) = create_test_service();

        let mut state = DeploymentState::generate();
        state.director_id = String::from("abc123");
        state.instances.push(InstanceRecord {
            job_name: String::from("bosh"),
            index: 0,
            vm_cid: String::from("vm-1"),
            stemcell_cid: None,
            disk_cids: Vec::new(),
            blob_ids: vec![String::from("blob-1")],
        });
        service.save(&state).await.expect("Failed to save state");

        let loaded = service.load().await.expect("Failed to load state");
        assert_eq!(loaded.director_id, "abc123");
        assert_eq!(loaded.instances, state.instances);
        assert!(loaded.last_updated.is_some());
    }

    #[tokio::test]
    async fn test_load_missing_generates_and_persists() {
        let (service, _temp) = create_test_service();
        assert!(!service.exists().await);

        let first = service.load().await.expect("Load should not fail");
        assert!(service.exists().await);

        let second = service.load().await.expect("Load should not fail");
        assert_eq!(first.director_id, second.director_id);
        assert_eq!(first.installation_id, second.installation_id);
    }

    #[tokio::test]
    async fn test_corrupted_state() {
        let (service, _temp) = create_test_service();
        std::fs::write(service.path(), "{not json").unwrap();

        let err = service.load().await.unwrap_err();
        assert!(matches!(err, DeployError::State(StateError::Corrupted { .. })));
    }

    #[tokio::test]
    async fn test_unreadable_location_is_not_missing() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("not-a-dir"), "").unwrap();
        let service = FileDeploymentStateService::new(temp.path().join("not-a-dir/state.json"));

        assert!(service.exists().await);

        let err = service.load().await.unwrap_err();
        assert!(matches!(err, DeployError::State(StateError::Corrupted { .. })));
        assert!(err.to_string().contains("Failed to read state file"));
    }

    #[tokio::test]
    async fn test_save_creates_parent_directory() {
        let temp = TempDir::new().unwrap();
        let service = FileDeploymentStateService::new(temp.path().join("nested/dir/state.json"));

        service.save(&DeploymentState::generate()).await.unwrap();
        assert!(service.exists().await);
    }
}
