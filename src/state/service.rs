//! Deployment state service trait definition.

use async_trait::async_trait;
use std::path::Path;

use super::types::DeploymentState;
use crate::error::Result;

/// Access to the persisted deployment state.
#[async_trait]
pub trait DeploymentStateService: Send + Sync {
    /// Location of the state file.
    fn path(&self) -> &Path;

    /// Checks if the state file exists.
    ///
    /// Only a confirmed absence yields `false`; a location that cannot be
    /// inspected counts as present so that `load` reports the failure.
    async fn exists(&self) -> bool;

    /// Loads the deployment state.
    ///
    /// A missing file yields a fresh state with generated ids, which is
    /// persisted before returning.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be read, parsed or created.
    async fn load(&self) -> Result<DeploymentState>;

    /// Saves the deployment state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state cannot be written.
    async fn save(&self, state: &DeploymentState) -> Result<()>;
}
