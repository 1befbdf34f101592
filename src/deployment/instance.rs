//! Per-instance teardown.

use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::skip_not_found;
use crate::agent::AgentClient;
use crate::blobstore::Blobstore;
use crate::cloud::Cloud;
use crate::config::Settings;
use crate::error::{DeployError, Result, ResultExt};
use crate::stage::Stage;
use crate::state::InstanceRecord;

/// How long to wait for an agent before giving up on a graceful shutdown.
#[derive(Debug, Clone, Copy)]
pub struct AgentWait {
    /// Total time allowed for the agent to answer `ping`.
    pub timeout: Duration,
    /// Delay between attempts.
    pub delay: Duration,
}

impl Default for AgentWait {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for AgentWait {
    fn from(settings: &Settings) -> Self {
        Self {
            timeout: settings.agent_ping_timeout,
            delay: settings.agent_ping_delay,
        }
    }
}

/// Deletes one instance: shuts its jobs down when the agent answers, deletes
/// the VM, then its blobs.
pub struct InstanceDeleter<'a> {
    cloud: &'a dyn Cloud,
    agent: &'a dyn AgentClient,
    blobstore: &'a dyn Blobstore,
    wait: AgentWait,
}

impl<'a> InstanceDeleter<'a> {
    /// Creates a deleter over the given clients.
    #[must_use]
    pub fn new(
        cloud: &'a dyn Cloud,
        agent: &'a dyn AgentClient,
        blobstore: &'a dyn Blobstore,
        wait: AgentWait,
    ) -> Self {
        Self {
            cloud,
            agent,
            blobstore,
            wait,
        }
    }

    /// Deletes `instance` under the complex stage `Deleting instance '<job>/<index>'`.
    ///
    /// # Errors
    ///
    /// Returns the error of the first failing nested stage. An unreachable
    /// agent or an already missing VM skips the corresponding stage instead,
    /// and the instance's blobs are still deleted.
    pub async fn delete(&self, instance: &InstanceRecord, stage: &Stage) -> Result<()> {
        let name = format!("Deleting instance '{}'", instance.name());

        stage
            .perform_complex(&name, move |stage| async move {
                let vm_cid = &instance.vm_cid;
                let exists = self
                    .cloud
                    .has_vm(vm_cid)
                    .await
                    .with_context(|| format!("Checking existence of VM '{vm_cid}'"))?;

                if exists {
                    self.shut_down(instance, &stage).await?;
                } else {
                    debug!(vm_cid = %vm_cid, "VM already gone, skipping shutdown");
                }

                stage
                    .perform(&format!("Deleting VM '{vm_cid}'"), move || async move {
                        skip_not_found(self.cloud.delete_vm(vm_cid).await, "VM not found")
                    })
                    .await?;

                self.delete_blobs(instance).await;
                Ok(())
            })
            .await
    }

    async fn shut_down(&self, instance: &InstanceRecord, stage: &Stage) -> Result<()> {
        let mut reachable = false;
        let slot = &mut reachable;
        stage
            .perform(
                &format!("Waiting for the agent on VM '{}'", instance.vm_cid),
                move || async move {
                    self.wait_for_agent()
                        .await
                        .map_err(|e| DeployError::skip("Agent unreachable", e))?;
                    *slot = true;
                    Ok(())
                },
            )
            .await?;

        if !reachable {
            return Ok(());
        }

        stage
            .perform(
                &format!("Stopping jobs on instance '{}'", instance.name()),
                move || async move { self.agent.stop().await },
            )
            .await?;

        let mounted = self
            .agent
            .list_disk()
            .await
            .context("Listing mounted disks")?;

        for disk_cid in instance.disk_cids.iter().filter(|cid| mounted.contains(*cid)) {
            stage
                .perform(&format!("Unmounting disk '{disk_cid}'"), move || async move {
                    self.agent.unmount_disk(disk_cid).await
                })
                .await?;
        }

        Ok(())
    }

    /// Pings the agent until it answers or the wait times out.
    async fn wait_for_agent(&self) -> Result<()> {
        let started = Instant::now();
        loop {
            match self.agent.ping().await {
                Ok(_) => return Ok(()),
                Err(err) if started.elapsed() >= self.wait.timeout => return Err(err),
                Err(err) => {
                    debug!(error = %err, "Agent not ready yet");
                    tokio::time::sleep(self.wait.delay).await;
                }
            }
        }
    }

    /// Deletes the instance's blobs. Failures are logged and never stop the
    /// teardown.
    async fn delete_blobs(&self, instance: &InstanceRecord) {
        for blob_id in &instance.blob_ids {
            if let Err(err) = self.blobstore.delete(blob_id).await {
                warn!(blob_id = %blob_id, error = %err, "Failed to delete instance blob");
            }
        }
    }
}
