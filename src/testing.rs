//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::agent::{AgentClient, AgentClientFactory};
use crate::blobstore::{Blobstore, BlobstoreFactory};
use crate::cloud::{Cloud, CloudFactory};
use crate::config::{InstallationManifest, ManifestParser, RegistryConfig, ReleaseRef, ReleaseSetManifest};
use crate::deployment::{Deployment, Manager, ManagerFactory};
use crate::error::{
    AgentError, BlobstoreError, CloudError, DeployError, FetchError, InstallationError, Result,
    ValidationError,
};
use crate::installation::{CpiInstaller, Installation, InstallationTarget};
use crate::registry::{RegistryServer, RegistryServerManager};
use crate::release::{Job, Release, ReleaseFetcher, ReleaseManager};
use crate::stage::{Stage, StageEvent, StageEventKind, StageObserver};
use crate::ui::Ui;

fn configured(slot: &Mutex<Option<String>>) -> Option<String> {
    slot.lock().unwrap().clone()
}

fn set(slot: &Mutex<Option<String>>, message: &str) {
    *slot.lock().unwrap() = Some(message.to_string());
}

/// Records every stage event.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<StageEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<StageEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Events rendered as `<kind> <outer > inner>`.
    pub fn lines(&self) -> Vec<String> {
        self.events()
            .iter()
            .map(|event| {
                let kind = match event.kind {
                    StageEventKind::Started => "start",
                    StageEventKind::Finished { .. } => "finish",
                    StageEventKind::Failed { .. } => "fail",
                    StageEventKind::Skipped { .. } => "skip",
                };
                format!("{kind} {}", event.path.join(" > "))
            })
            .collect()
    }
}

impl StageObserver for RecordingObserver {
    fn on_event(&self, event: &StageEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// In-memory writer whose clones share one buffer.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    data: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.data.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.data.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Collects printed lines.
#[derive(Default)]
pub struct FakeUi {
    lines: Mutex<Vec<String>>,
}

impl FakeUi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    fn push(&self, line: String) {
        self.lines.lock().unwrap().push(line);
    }
}

impl Ui for FakeUi {
    fn print_line(&self, message: &str) {
        self.push(message.to_string());
    }

    fn print_warning(&self, message: &str) {
        self.push(format!("warning: {message}"));
    }

    fn print_error(&self, message: &str) {
        self.push(format!("error: {message}"));
    }

    fn print_block(&self, block: &str) {
        self.push(block.to_string());
    }
}

/// Registry manager counting starts and stops.
#[derive(Default)]
pub struct FakeRegistryServerManager {
    start_calls: AtomicUsize,
    stop_calls: Arc<AtomicUsize>,
    start_failure: Mutex<Option<String>>,
    stop_failure: Mutex<Option<String>>,
}

impl FakeRegistryServerManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn start_calls(&self) -> usize {
        self.start_calls.load(Ordering::SeqCst)
    }

    pub fn stop_calls(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }

    pub fn fail_start(&self, message: &str) {
        set(&self.start_failure, message);
    }

    pub fn fail_stop(&self, message: &str) {
        set(&self.stop_failure, message);
    }
}

#[async_trait]
impl RegistryServerManager for FakeRegistryServerManager {
    async fn start(&self, config: &RegistryConfig) -> Result<Box<dyn RegistryServer>> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = configured(&self.start_failure) {
            return Err(InstallationError::Registry { message }.into());
        }
        Ok(Box::new(FakeRegistryServer {
            address: SocketAddr::from(([127, 0, 0, 1], config.port)),
            stop_calls: Arc::clone(&self.stop_calls),
            stop_failure: configured(&self.stop_failure),
        }))
    }
}

struct FakeRegistryServer {
    address: SocketAddr,
    stop_calls: Arc<AtomicUsize>,
    stop_failure: Option<String>,
}

#[async_trait]
impl RegistryServer for FakeRegistryServer {
    fn address(&self) -> SocketAddr {
        self.address
    }

    async fn stop(self: Box<Self>) -> Result<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        match self.stop_failure {
            Some(message) => Err(InstallationError::Registry { message }.into()),
            None => Ok(()),
        }
    }
}

/// Cloud recording calls as `<method> <cid>`.
#[derive(Default)]
pub struct FakeCloud {
    calls: Mutex<Vec<String>>,
    missing_vms: Mutex<HashSet<String>>,
    not_found: Mutex<HashSet<String>>,
    failures: Mutex<HashMap<String, String>>,
}

impl FakeCloud {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// `has_vm` answers false for `vm_cid`.
    pub fn set_vm_missing(&self, vm_cid: &str) {
        self.missing_vms.lock().unwrap().insert(vm_cid.to_string());
    }

    /// Deleting `cid` reports the resource as not found.
    pub fn set_not_found(&self, cid: &str) {
        self.not_found.lock().unwrap().insert(cid.to_string());
    }

    /// Deleting `cid` fails with `message`.
    pub fn set_failure(&self, cid: &str, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(cid.to_string(), message.to_string());
    }

    fn delete(&self, method: &str, cid: &str, not_found_type: &str) -> Result<()> {
        self.calls.lock().unwrap().push(format!("{method} {cid}"));
        if let Some(message) = self.failures.lock().unwrap().get(cid) {
            return Err(CloudError::Exec {
                method: method.to_string(),
                message: message.clone(),
            }
            .into());
        }
        if self.not_found.lock().unwrap().contains(cid) {
            return Err(CloudError::Cmd {
                method: method.to_string(),
                error_type: not_found_type.to_string(),
                message: format!("'{cid}' not found"),
                ok_to_retry: false,
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl Cloud for FakeCloud {
    async fn has_vm(&self, vm_cid: &str) -> Result<bool> {
        self.calls.lock().unwrap().push(format!("has_vm {vm_cid}"));
        Ok(!self.missing_vms.lock().unwrap().contains(vm_cid))
    }

    async fn delete_vm(&self, vm_cid: &str) -> Result<()> {
        self.delete("delete_vm", vm_cid, "Bosh::Clouds::VMNotFound")
    }

    async fn delete_disk(&self, disk_cid: &str) -> Result<()> {
        self.delete("delete_disk", disk_cid, "Bosh::Clouds::DiskNotFound")
    }

    async fn delete_stemcell(&self, stemcell_cid: &str) -> Result<()> {
        self.delete("delete_stemcell", stemcell_cid, "Bosh::Clouds::StemcellNotFound")
    }
}

/// Agent recording calls.
#[derive(Default)]
pub struct FakeAgentClient {
    calls: Mutex<Vec<String>>,
    unreachable: AtomicBool,
    mounted: Mutex<Vec<String>>,
    stop_failure: Mutex<Option<String>>,
}

impl FakeAgentClient {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_unreachable(&self) {
        self.unreachable.store(true, Ordering::SeqCst);
    }

    pub fn set_mounted(&self, disk_cids: &[&str]) {
        *self.mounted.lock().unwrap() = disk_cids.iter().map(ToString::to_string).collect();
    }

    pub fn set_stop_failure(&self, message: &str) {
        set(&self.stop_failure, message);
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl AgentClient for FakeAgentClient {
    async fn ping(&self) -> Result<String> {
        self.record(String::from("ping"));
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(AgentError::Network {
                method: String::from("ping"),
                message: String::from("connection refused"),
            }
            .into());
        }
        Ok(String::from("pong"))
    }

    async fn stop(&self) -> Result<()> {
        self.record(String::from("stop"));
        match configured(&self.stop_failure) {
            Some(message) => Err(AgentError::Exception {
                method: String::from("stop"),
                message,
            }
            .into()),
            None => Ok(()),
        }
    }

    async fn list_disk(&self) -> Result<Vec<String>> {
        self.record(String::from("list_disk"));
        Ok(self.mounted.lock().unwrap().clone())
    }

    async fn unmount_disk(&self, disk_cid: &str) -> Result<()> {
        self.record(format!("unmount_disk {disk_cid}"));
        Ok(())
    }
}

/// Blobstore recording calls.
#[derive(Default)]
pub struct FakeBlobstore {
    calls: Mutex<Vec<String>>,
    failure: Mutex<Option<String>>,
}

impl FakeBlobstore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn set_failure(&self, message: &str) {
        set(&self.failure, message);
    }

    fn record(&self, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        match configured(&self.failure) {
            Some(message) => Err(BlobstoreError::Request { message }.into()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Blobstore for FakeBlobstore {
    async fn get(&self, blob_id: &str, destination: &Path) -> Result<()> {
        self.record(format!("get {blob_id}"))?;
        std::fs::write(destination, blob_id.as_bytes())?;
        Ok(())
    }

    async fn add(&self, source: &Path) -> Result<String> {
        self.record(format!("add {}", source.display()))?;
        Ok(String::from("blob-added"))
    }

    async fn delete(&self, blob_id: &str) -> Result<()> {
        self.record(format!("delete {blob_id}"))
    }
}

/// Parser returning canned manifests.
pub struct FakeManifestParser {
    manifests: Mutex<(ReleaseSetManifest, InstallationManifest)>,
    calls: AtomicUsize,
}

impl FakeManifestParser {
    pub fn new(release_set: ReleaseSetManifest, installation: InstallationManifest) -> Arc<Self> {
        Arc::new(Self {
            manifests: Mutex::new((release_set, installation)),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn set_manifests(&self, release_set: ReleaseSetManifest, installation: InstallationManifest) {
        *self.manifests.lock().unwrap() = (release_set, installation);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ManifestParser for FakeManifestParser {
    fn parse(&self, _path: &Path) -> Result<(ReleaseSetManifest, InstallationManifest)> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.manifests.lock().unwrap().clone())
    }
}

/// Fetcher recording requested release ids.
#[derive(Default)]
pub struct FakeReleaseFetcher {
    calls: Mutex<Vec<String>>,
    failure: Mutex<Option<String>>,
}

impl FakeReleaseFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail(&self, message: &str) {
        set(&self.failure, message);
    }
}

#[async_trait]
impl ReleaseFetcher for FakeReleaseFetcher {
    async fn download_and_extract(&self, release_ref: &ReleaseRef, _stage: &Stage) -> Result<Release> {
        self.calls.lock().unwrap().push(release_ref.id());
        if let Some(message) = configured(&self.failure) {
            return Err(FetchError::Download {
                url: release_ref.url.clone(),
                message,
            }
            .into());
        }
        Ok(Release {
            name: release_ref.name.clone(),
            version: release_ref.version.clone(),
            commit_hash: String::new(),
            jobs: Vec::new(),
            packages: Vec::new(),
            extracted_path: PathBuf::new(),
        })
    }
}

/// Release manager counting `delete_all` calls.
#[derive(Default)]
pub struct FakeReleaseManager {
    releases: Mutex<Vec<Release>>,
    delete_all_calls: AtomicUsize,
    delete_all_failure: Mutex<Option<String>>,
}

impl FakeReleaseManager {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn delete_all_calls(&self) -> usize {
        self.delete_all_calls.load(Ordering::SeqCst)
    }

    pub fn fail_delete_all(&self, message: &str) {
        set(&self.delete_all_failure, message);
    }
}

impl ReleaseManager for FakeReleaseManager {
    fn add(&self, release: Release) {
        self.releases.lock().unwrap().push(release);
    }

    fn find(&self, name: &str) -> Option<Release> {
        self.releases
            .lock()
            .unwrap()
            .iter()
            .find(|release| release.name == name)
            .cloned()
    }

    fn list(&self) -> Vec<Release> {
        self.releases.lock().unwrap().clone()
    }

    fn delete_all(&self) -> Result<()> {
        self.delete_all_calls.fetch_add(1, Ordering::SeqCst);
        self.releases.lock().unwrap().clear();
        match configured(&self.delete_all_failure) {
            Some(message) => Err(DeployError::internal(message)),
            None => Ok(()),
        }
    }
}

/// Installer producing installations rooted at a fixed directory.
pub struct FakeCpiInstaller {
    root: PathBuf,
    registry: Arc<FakeRegistryServerManager>,
    validate_calls: AtomicUsize,
    install_calls: AtomicUsize,
    validate_failure: Mutex<Option<String>>,
    install_failure: Mutex<Option<String>>,
}

impl FakeCpiInstaller {
    pub fn new(root: PathBuf) -> Arc<Self> {
        Arc::new(Self {
            root,
            registry: FakeRegistryServerManager::new(),
            validate_calls: AtomicUsize::new(0),
            install_calls: AtomicUsize::new(0),
            validate_failure: Mutex::new(None),
            install_failure: Mutex::new(None),
        })
    }

    pub fn validate_calls(&self) -> usize {
        self.validate_calls.load(Ordering::SeqCst)
    }

    pub fn install_calls(&self) -> usize {
        self.install_calls.load(Ordering::SeqCst)
    }

    pub fn fail_validate(&self, message: &str) {
        set(&self.validate_failure, message);
    }

    pub fn fail_install(&self, message: &str) {
        set(&self.install_failure, message);
    }
}

#[async_trait]
impl CpiInstaller for FakeCpiInstaller {
    async fn validate_cpi_release(&self, manifest: &InstallationManifest, _stage: &Stage) -> Result<()> {
        self.validate_calls.fetch_add(1, Ordering::SeqCst);
        match configured(&self.validate_failure) {
            Some(problem) => Err(ValidationError::InvalidCpiRelease {
                release: manifest.template.release.clone(),
                problems: vec![problem],
            }
            .into()),
            None => Ok(()),
        }
    }

    async fn install_cpi_release(
        &self,
        manifest: &InstallationManifest,
        _stage: &Stage,
    ) -> Result<Installation> {
        self.install_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = configured(&self.install_failure) {
            return Err(InstallationError::Sandbox {
                path: self.root.clone(),
                message,
            }
            .into());
        }

        let job = Job {
            name: manifest.template.name.clone(),
            release_name: manifest.template.release.clone(),
            release_version: String::from("1.2"),
            fingerprint: String::new(),
            templates: BTreeMap::new(),
            packages: Vec::new(),
            properties: BTreeMap::new(),
            extracted_path: PathBuf::new(),
        };
        Ok(Installation::new(
            InstallationTarget::new(&self.root),
            job,
            manifest.clone(),
            self.registry.clone(),
        ))
    }
}

/// Cloud factory handing out fresh [`FakeCloud`]s.
#[derive(Default)]
pub struct FakeCloudFactory {
    calls: Mutex<Vec<String>>,
    failure: Mutex<Option<String>>,
}

impl FakeCloudFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Director ids the factory was asked for.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail(&self, message: &str) {
        set(&self.failure, message);
    }
}

impl CloudFactory for FakeCloudFactory {
    fn new_cloud(&self, _installation: &Installation, director_id: &str) -> Result<Arc<dyn Cloud>> {
        self.calls.lock().unwrap().push(director_id.to_string());
        match configured(&self.failure) {
            Some(message) => Err(CloudError::Exec {
                method: String::from("info"),
                message,
            }
            .into()),
            None => Ok(FakeCloud::new()),
        }
    }
}

/// Agent client factory recording `<director_id> <mbus_url>`.
#[derive(Default)]
pub struct FakeAgentClientFactory {
    calls: Mutex<Vec<String>>,
}

impl FakeAgentClientFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl AgentClientFactory for FakeAgentClientFactory {
    fn new_agent_client(&self, director_id: &str, mbus_url: &str) -> Arc<dyn AgentClient> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{director_id} {mbus_url}"));
        FakeAgentClient::new()
    }
}

/// Blobstore factory recording message bus URLs.
#[derive(Default)]
pub struct FakeBlobstoreFactory {
    calls: Mutex<Vec<String>>,
    failure: Mutex<Option<String>>,
}

impl FakeBlobstoreFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn fail(&self, message: &str) {
        set(&self.failure, message);
    }
}

impl BlobstoreFactory for FakeBlobstoreFactory {
    fn create(&self, mbus_url: &str) -> Result<Arc<dyn Blobstore>> {
        self.calls.lock().unwrap().push(mbus_url.to_string());
        match configured(&self.failure) {
            Some(message) => Err(BlobstoreError::InvalidEndpoint {
                url: mbus_url.to_string(),
                message,
            }
            .into()),
            None => Ok(FakeBlobstore::new()),
        }
    }
}

/// Script shared by a [`FakeManagerFactory`] and everything it creates.
#[derive(Default)]
struct ManagerScript {
    calls: Mutex<Vec<String>>,
    current_instances: Mutex<Option<usize>>,
    find_failure: Mutex<Option<String>>,
    delete_failure: Mutex<Option<String>>,
    cleanup_failure: Mutex<Option<String>>,
}

impl ManagerScript {
    fn record(&self, call: String, failure: &Mutex<Option<String>>) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        match configured(failure) {
            Some(message) => Err(DeployError::internal(message)),
            None => Ok(()),
        }
    }
}

/// Manager factory whose managers follow a shared script.
#[derive(Default)]
pub struct FakeManagerFactory {
    script: Arc<ManagerScript>,
}

impl FakeManagerFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Manager and deployment calls, in order.
    pub fn calls(&self) -> Vec<String> {
        self.script.calls.lock().unwrap().clone()
    }

    /// `find_current` returns a deployment with `instances` instances.
    pub fn set_current_deployment(&self, instances: usize) {
        *self.script.current_instances.lock().unwrap() = Some(instances);
    }

    pub fn fail_find_current(&self, message: &str) {
        set(&self.script.find_failure, message);
    }

    pub fn fail_delete(&self, message: &str) {
        set(&self.script.delete_failure, message);
    }

    pub fn fail_cleanup(&self, message: &str) {
        set(&self.script.cleanup_failure, message);
    }
}

impl ManagerFactory for FakeManagerFactory {
    fn new_manager(
        &self,
        _cloud: Arc<dyn Cloud>,
        _agent_client: Arc<dyn AgentClient>,
        _blobstore: Arc<dyn Blobstore>,
    ) -> Box<dyn Manager> {
        Box::new(FakeManager {
            script: Arc::clone(&self.script),
        })
    }
}

struct FakeManager {
    script: Arc<ManagerScript>,
}

#[async_trait]
impl Manager for FakeManager {
    async fn find_current(&self) -> Result<Option<Box<dyn Deployment>>> {
        self.script
            .record(String::from("find_current"), &self.script.find_failure)?;
        let current = *self.script.current_instances.lock().unwrap();
        Ok(current.map(|instances| {
            Box::new(FakeDeployment {
                instances,
                script: Arc::clone(&self.script),
            }) as Box<dyn Deployment>
        }))
    }

    async fn cleanup(&self, _stage: &Stage) -> Result<()> {
        self.script
            .record(String::from("cleanup"), &self.script.cleanup_failure)
    }
}

struct FakeDeployment {
    instances: usize,
    script: Arc<ManagerScript>,
}

#[async_trait]
impl Deployment for FakeDeployment {
    fn instance_count(&self) -> usize {
        self.instances
    }

    async fn delete(&self, _stage: &Stage) -> Result<()> {
        self.script
            .record(format!("delete {}", self.instances), &self.script.delete_failure)
    }
}

/// Release archives built in memory.
pub mod fixtures {
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tar::{Builder, Header};

    /// Builds a gzip tarball from `(path, content)` pairs.
    pub fn tarball(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut builder = Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        for (path, content) in entries {
            let mut header = Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, path, *content).unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }

    /// A release shipping a `cpi` job that renders `bin/cpi` and a `ruby` package.
    pub fn cpi_release_tarball(name: &str, version: &str) -> Vec<u8> {
        let job_manifest = "\
name: cpi
templates:
  cpi.erb: bin/cpi
packages:
  - ruby
properties:
  cpi.region:
    description: Region to provision in
    default: us-east-1
";
        let template = "#!/bin/sh\nexec ruby cpi.rb --region <%= p(\"cpi.region\") %> \"$@\"\n";
        let job = tarball(&[
            ("job.MF", job_manifest.as_bytes()),
            ("templates/cpi.erb", template.as_bytes()),
        ]);

        let release_manifest = format!(
            "\
name: {name}
version: '{version}'
commit_hash: abc1234
jobs:
  - name: cpi
    fingerprint: cpi-fingerprint
packages:
  - name: ruby
    fingerprint: ruby-fingerprint
"
        );

        tarball(&[
            ("release.MF", release_manifest.as_bytes()),
            ("jobs/cpi.tgz", job.as_slice()),
        ])
    }
}
