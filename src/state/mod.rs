//! Deployment state module.
//!
//! This module provides persistent storage for the deployment's identity and
//! the cloud resources it owns: instances, disks and stemcells.

mod local;
mod service;
mod types;

pub use local::FileDeploymentStateService;
pub use service::DeploymentStateService;
pub use types::{DeploymentState, DiskRecord, InstanceRecord, StemcellRecord};
