//! CPI subprocess protocol.
//!
//! Each call runs the CPI executable once, writes a JSON request on its
//! stdin and reads a JSON response from its stdout:
//!
//! ```json
//! {"method":"delete_vm","arguments":["vm-1"],"context":{"director_uuid":"abc123"}}
//! {"result":null,"error":null,"log":""}
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use super::{Cloud, CloudFactory};
use crate::error::{CloudError, DeployError, Result};
use crate::installation::Installation;

#[derive(Debug, Serialize)]
struct CpiRequest<'a> {
    method: &'a str,
    arguments: Vec<Value>,
    context: CpiContext<'a>,
}

#[derive(Debug, Serialize)]
struct CpiContext<'a> {
    director_uuid: &'a str,
}

#[derive(Debug, Deserialize)]
struct CpiResponse {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<CpiResponseError>,
    #[serde(default)]
    log: String,
}

#[derive(Debug, Deserialize)]
struct CpiResponseError {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
    #[serde(default)]
    ok_to_retry: bool,
}

/// Runs CPI methods through the installed executable.
#[derive(Debug, Clone)]
pub struct CpiCmdRunner {
    executable: PathBuf,
    temp_root: PathBuf,
    director_id: String,
}

impl CpiCmdRunner {
    /// Creates a runner for `executable`.
    #[must_use]
    pub fn new(executable: PathBuf, temp_root: PathBuf, director_id: impl Into<String>) -> Self {
        Self {
            executable,
            temp_root,
            director_id: director_id.into(),
        }
    }

    /// Invokes `method` with `arguments` and returns its result.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Cmd`] when the CPI reports an error, or an
    /// exec/response error when the process misbehaves.
    pub async fn run(&self, method: &str, arguments: Vec<Value>) -> Result<Value> {
        let exec_error = |message: String| {
            DeployError::Cloud(CloudError::Exec {
                method: method.to_string(),
                message,
            })
        };

        let request = serde_json::to_vec(&CpiRequest {
            method,
            arguments,
            context: CpiContext {
                director_uuid: &self.director_id,
            },
        })
        .map_err(|e| exec_error(format!("failed to encode request: {e}")))?;

        debug!(method, executable = %self.executable.display(), "Running CPI");

        let mut child = Command::new(&self.executable)
            .env("TMPDIR", &self.temp_root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| exec_error(format!("failed to start: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&request)
                .await
                .map_err(|e| exec_error(format!("failed to write request: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| exec_error(format!("failed to wait: {e}")))?;

        if output.stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(exec_error(format!(
                "exited with {} and no response: {}",
                output.status,
                stderr.trim()
            )));
        }

        let response: CpiResponse = serde_json::from_slice(&output.stdout).map_err(|e| {
            DeployError::Cloud(CloudError::InvalidResponse {
                method: method.to_string(),
                message: e.to_string(),
            })
        })?;

        if !response.log.is_empty() {
            debug!(method, log = %response.log, "CPI log");
        }

        if let Some(error) = response.error {
            return Err(DeployError::Cloud(CloudError::Cmd {
                method: method.to_string(),
                error_type: error.error_type,
                message: error.message,
                ok_to_retry: error.ok_to_retry,
            }));
        }

        Ok(response.result)
    }
}

/// [`Cloud`] backed by a CPI executable.
#[derive(Debug)]
pub struct CpiCloud {
    runner: CpiCmdRunner,
}

impl CpiCloud {
    /// Creates a cloud talking through `runner`.
    #[must_use]
    pub const fn new(runner: CpiCmdRunner) -> Self {
        Self { runner }
    }
}

#[async_trait]
impl Cloud for CpiCloud {
    async fn has_vm(&self, vm_cid: &str) -> Result<bool> {
        let result = self.runner.run("has_vm", vec![Value::from(vm_cid)]).await?;
        result.as_bool().ok_or_else(|| {
            DeployError::Cloud(CloudError::InvalidResponse {
                method: String::from("has_vm"),
                message: format!("expected a boolean result, got {result}"),
            })
        })
    }

    async fn delete_vm(&self, vm_cid: &str) -> Result<()> {
        info!(vm_cid, "Deleting VM");
        self.runner.run("delete_vm", vec![Value::from(vm_cid)]).await?;
        Ok(())
    }

    async fn delete_disk(&self, disk_cid: &str) -> Result<()> {
        info!(disk_cid, "Deleting disk");
        self.runner.run("delete_disk", vec![Value::from(disk_cid)]).await?;
        Ok(())
    }

    async fn delete_stemcell(&self, stemcell_cid: &str) -> Result<()> {
        info!(stemcell_cid, "Deleting stemcell");
        self.runner
            .run("delete_stemcell", vec![Value::from(stemcell_cid)])
            .await?;
        Ok(())
    }
}

/// [`CloudFactory`] building [`CpiCloud`]s from installations.
#[derive(Debug, Default)]
pub struct CpiCloudFactory;

impl CpiCloudFactory {
    /// Creates a new factory.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl CloudFactory for CpiCloudFactory {
    fn new_cloud(&self, installation: &Installation, director_id: &str) -> Result<Arc<dyn Cloud>> {
        let executable = installation.cpi_executable();
        if !executable.is_file() {
            return Err(DeployError::Cloud(CloudError::CpiNotInstalled { path: executable }));
        }

        let runner = CpiCmdRunner::new(executable, installation.target().temp_root(), director_id);
        Ok(Arc::new(CpiCloud::new(runner)))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::TempDir;

    fn script(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("cpi");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn test_request_and_result() {
        let tmp = TempDir::new().unwrap();
        let request_file = tmp.path().join("request.json");
        let executable = script(
            tmp.path(),
            &format!(
                "cat > {}\necho '{{\"result\":true,\"error\":null,\"log\":\"checked\"}}'",
                request_file.display()
            ),
        );
        let cloud = CpiCloud::new(CpiCmdRunner::new(executable, tmp.path().to_path_buf(), "abc123"));

        assert!(cloud.has_vm("vm-1").await.unwrap());

        let request: Value =
            serde_json::from_str(&std::fs::read_to_string(request_file).unwrap()).unwrap();
        assert_eq!(request["method"], "has_vm");
        assert_eq!(request["arguments"], serde_json::json!(["vm-1"]));
        assert_eq!(request["context"]["director_uuid"], "abc123");
    }

    #[tokio::test]
    async fn test_cpi_error_is_reported() {
        let tmp = TempDir::new().unwrap();
        let executable = script(
            tmp.path(),
            "cat > /dev/null\necho '{\"result\":null,\"error\":{\"type\":\"Bosh::Clouds::VMNotFound\",\"message\":\"vm-1 gone\",\"ok_to_retry\":false},\"log\":\"\"}'",
        );
        let cloud = CpiCloud::new(CpiCmdRunner::new(executable, tmp.path().to_path_buf(), "abc123"));

        let err = cloud.delete_vm("vm-1").await.unwrap_err();
        let DeployError::Cloud(cloud_error) = err else {
            panic!("expected a cloud error");
        };
        assert!(cloud_error.is_not_found());
        assert_eq!(
            cloud_error.to_string(),
            "CPI 'delete_vm' method responded with error: Bosh::Clouds::VMNotFound: vm-1 gone"
        );
    }

    #[tokio::test]
    async fn test_garbage_response() {
        let tmp = TempDir::new().unwrap();
        let executable = script(tmp.path(), "cat > /dev/null\necho 'not json'");
        let cloud = CpiCloud::new(CpiCmdRunner::new(executable, tmp.path().to_path_buf(), "abc123"));

        let err = cloud.delete_disk("disk-1").await.unwrap_err();
        assert!(matches!(err, DeployError::Cloud(CloudError::InvalidResponse { .. })));
    }

    #[tokio::test]
    async fn test_silent_failure() {
        let tmp = TempDir::new().unwrap();
        let executable = script(tmp.path(), "cat > /dev/null\necho boom >&2\nexit 1");
        let cloud = CpiCloud::new(CpiCmdRunner::new(executable, tmp.path().to_path_buf(), "abc123"));

        let err = cloud.delete_stemcell("sc-1").await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
