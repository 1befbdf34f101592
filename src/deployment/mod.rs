//! Discovery and deletion of the currently deployed resources.
//!
//! A [`Manager`] reads the deployment state and the live cloud through the
//! clients it was built with. The [`Deployment`] it finds deletes its
//! instances last-to-first, then every recorded disk and stemcell, saving
//! the state after each removal so an interrupted run can resume.

mod instance;
mod manager;

pub use instance::{AgentWait, InstanceDeleter};
pub use manager::{StateDeployment, StateManager, StateManagerFactory};

use async_trait::async_trait;
use std::sync::Arc;

use crate::agent::AgentClient;
use crate::blobstore::Blobstore;
use crate::cloud::Cloud;
use crate::error::{DeployError, Result};
use crate::stage::Stage;

/// A deployment found in the current state.
#[async_trait]
pub trait Deployment: Send + Sync {
    /// Number of instances to delete.
    fn instance_count(&self) -> usize;

    /// Deletes every instance, disk and stemcell of the deployment.
    ///
    /// # Errors
    ///
    /// Returns the first failing stage's error; later deletions are not
    /// attempted.
    async fn delete(&self, stage: &Stage) -> Result<()>;
}

/// Finds and cleans up deployments.
#[async_trait]
pub trait Manager: Send + Sync {
    /// Returns the current deployment, or `None` when nothing is deployed.
    ///
    /// # Errors
    ///
    /// Returns an error if the deployment state cannot be read.
    async fn find_current(&self) -> Result<Option<Box<dyn Deployment>>>;

    /// Deletes disks and stemcells that no instance references.
    ///
    /// # Errors
    ///
    /// Returns the first failing stage's error.
    async fn cleanup(&self, stage: &Stage) -> Result<()>;
}

/// Composes runtime clients into a [`Manager`].
pub trait ManagerFactory: Send + Sync {
    /// Creates a manager using the given clients.
    fn new_manager(
        &self,
        cloud: Arc<dyn Cloud>,
        agent_client: Arc<dyn AgentClient>,
        blobstore: Arc<dyn Blobstore>,
    ) -> Box<dyn Manager>;
}

/// Turns a cloud "not found" error into a skip with `reason`.
fn skip_not_found(result: Result<()>, reason: &str) -> Result<()> {
    match result {
        Err(DeployError::Cloud(err)) if err.is_not_found() => {
            Err(DeployError::skip(reason, DeployError::Cloud(err)))
        }
        other => other,
    }
}
