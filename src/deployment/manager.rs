//! Deployment manager backed by the persisted deployment state.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use super::instance::{AgentWait, InstanceDeleter};
use super::{Deployment, Manager, ManagerFactory, skip_not_found};
use crate::agent::AgentClient;
use crate::blobstore::Blobstore;
use crate::cloud::Cloud;
use crate::error::Result;
use crate::stage::Stage;
use crate::state::{DeploymentState, DeploymentStateService};

/// Clients shared by the manager and the deployments it finds.
#[derive(Clone)]
struct Clients {
    state_service: Arc<dyn DeploymentStateService>,
    cloud: Arc<dyn Cloud>,
    agent: Arc<dyn AgentClient>,
    blobstore: Arc<dyn Blobstore>,
    wait: AgentWait,
}

impl Clients {
    async fn delete_disk(
        &self,
        state: &mut DeploymentState,
        cid: &str,
        stage_name: String,
        stage: &Stage,
    ) -> Result<()> {
        let cloud = &self.cloud;
        stage
            .perform(&stage_name, move || async move {
                skip_not_found(cloud.delete_disk(cid).await, "Disk not found")
            })
            .await?;

        state.remove_disk(cid);
        self.state_service.save(state).await
    }

    async fn delete_stemcell(
        &self,
        state: &mut DeploymentState,
        cid: &str,
        stage_name: String,
        stage: &Stage,
    ) -> Result<()> {
        let cloud = &self.cloud;
        stage
            .perform(&stage_name, move || async move {
                skip_not_found(cloud.delete_stemcell(cid).await, "Stemcell not found")
            })
            .await?;

        state.remove_stemcell(cid);
        self.state_service.save(state).await
    }
}

/// A deployment described by the state file.
pub struct StateDeployment {
    clients: Clients,
    instance_count: usize,
}

#[async_trait]
impl Deployment for StateDeployment {
    fn instance_count(&self) -> usize {
        self.instance_count
    }

    async fn delete(&self, stage: &Stage) -> Result<()> {
        let clients = &self.clients;
        let mut state = clients.state_service.load().await?;
        info!(
            instances = state.instances.len(),
            disks = state.disks.len(),
            stemcells = state.stemcells.len(),
            "Deleting deployment"
        );

        let deleter = InstanceDeleter::new(
            clients.cloud.as_ref(),
            clients.agent.as_ref(),
            clients.blobstore.as_ref(),
            clients.wait,
        );

        let instances: Vec<_> = state.instances.iter().rev().cloned().collect();
        for instance in instances {
            deleter.delete(&instance, stage).await?;
            state.remove_instance(&instance.job_name, instance.index);
            clients.state_service.save(&state).await?;
        }

        let disk_cids: Vec<_> = state.disks.iter().map(|d| d.cid.clone()).collect();
        for cid in disk_cids {
            let name = format!("Deleting disk '{cid}'");
            clients.delete_disk(&mut state, &cid, name, stage).await?;
        }

        let stemcell_cids: Vec<_> = state.stemcells.iter().map(|s| s.cid.clone()).collect();
        for cid in stemcell_cids {
            let name = format!("Deleting stemcell '{cid}'");
            clients.delete_stemcell(&mut state, &cid, name, stage).await?;
        }

        Ok(())
    }
}

/// [`Manager`] reading the deployment state file.
pub struct StateManager {
    clients: Clients,
}

#[async_trait]
impl Manager for StateManager {
    async fn find_current(&self) -> Result<Option<Box<dyn Deployment>>> {
        let state = self.clients.state_service.load().await?;
        if state.has_no_resources() {
            info!("No deployed resources recorded");
            return Ok(None);
        }

        Ok(Some(Box::new(StateDeployment {
            clients: self.clients.clone(),
            instance_count: state.instances.len(),
        })))
    }

    async fn cleanup(&self, stage: &Stage) -> Result<()> {
        let mut state = self.clients.state_service.load().await?;

        for disk in state.unused_disks() {
            let name = format!("Deleting unused disk '{}'", disk.cid);
            self.clients
                .delete_disk(&mut state, &disk.cid, name, stage)
                .await?;
        }

        for stemcell in state.unused_stemcells() {
            let name = format!("Deleting unused stemcell '{}'", stemcell.cid);
            self.clients
                .delete_stemcell(&mut state, &stemcell.cid, name, stage)
                .await?;
        }

        Ok(())
    }
}

/// [`ManagerFactory`] building [`StateManager`]s.
pub struct StateManagerFactory {
    state_service: Arc<dyn DeploymentStateService>,
    wait: AgentWait,
}

impl StateManagerFactory {
    /// Creates a factory whose managers read `state_service`.
    #[must_use]
    pub fn new(state_service: Arc<dyn DeploymentStateService>, wait: AgentWait) -> Self {
        Self {
            state_service,
            wait,
        }
    }
}

impl ManagerFactory for StateManagerFactory {
    fn new_manager(
        &self,
        cloud: Arc<dyn Cloud>,
        agent_client: Arc<dyn AgentClient>,
        blobstore: Arc<dyn Blobstore>,
    ) -> Box<dyn Manager> {
        Box::new(StateManager {
            clients: Clients {
                state_service: Arc::clone(&self.state_service),
                cloud,
                agent: agent_client,
                blobstore,
                wait: self.wait,
            },
        })
    }
}
