//! Clients for the agent running on deployed VMs.

mod http;

pub use http::{HttpAgentClient, HttpAgentClientFactory, TaskPolling};

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::Result;

/// Agent operations needed to tear an instance down.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Checks that the agent is responsive.
    async fn ping(&self) -> Result<String>;

    /// Stops every job on the instance.
    async fn stop(&self) -> Result<()>;

    /// Lists the disks the agent has mounted.
    async fn list_disk(&self) -> Result<Vec<String>>;

    /// Unmounts a persistent disk.
    async fn unmount_disk(&self, disk_cid: &str) -> Result<()>;
}

/// Builds [`AgentClient`]s.
pub trait AgentClientFactory: Send + Sync {
    /// Creates a client addressed at `mbus_url`.
    ///
    /// Construction never fails; connection problems surface per call.
    fn new_agent_client(&self, director_id: &str, mbus_url: &str) -> Arc<dyn AgentClient>;
}
