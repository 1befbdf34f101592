//! Cloud access through the installed CPI.

mod cpi;

pub use cpi::{CpiCloud, CpiCloudFactory, CpiCmdRunner};

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;
use crate::installation::Installation;

/// Cloud operations needed to tear a deployment down.
#[async_trait]
pub trait Cloud: Send + Sync {
    /// Checks whether a VM exists.
    async fn has_vm(&self, vm_cid: &str) -> Result<bool>;

    /// Deletes a VM.
    async fn delete_vm(&self, vm_cid: &str) -> Result<()>;

    /// Deletes a persistent disk.
    async fn delete_disk(&self, disk_cid: &str) -> Result<()>;

    /// Deletes a stemcell.
    async fn delete_stemcell(&self, stemcell_cid: &str) -> Result<()>;
}

/// Builds [`Cloud`] clients for an installation.
pub trait CloudFactory: Send + Sync {
    /// Creates a cloud bound to `installation`'s CPI and `director_id`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::CloudError::CpiNotInstalled`] if the CPI
    /// executable is missing.
    fn new_cloud(&self, installation: &Installation, director_id: &str) -> Result<Arc<dyn Cloud>>;
}
