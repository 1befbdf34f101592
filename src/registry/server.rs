//! In-process HTTP registry server.
//!
//! Serves instance settings under `/instances/{id}/settings`, protected by
//! HTTP basic auth. Settings live in memory for the lifetime of the server.

use async_trait::async_trait;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{RegistryServer, RegistryServerManager};
use crate::config::RegistryConfig;
use crate::error::{DeployError, InstallationError, Result};

/// Shared registry state.
#[derive(Debug)]
struct RegistryState {
    /// Expected `Authorization` header value.
    authorization: String,
    /// Settings JSON keyed by instance id.
    settings: RwLock<HashMap<String, String>>,
}

fn registry_error(message: impl Into<String>) -> DeployError {
    DeployError::Installation(InstallationError::Registry {
        message: message.into(),
    })
}

/// Starts [`HttpRegistryServer`]s.
#[derive(Debug, Default)]
pub struct HttpRegistryServerManager;

impl HttpRegistryServerManager {
    /// Creates a new manager.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RegistryServerManager for HttpRegistryServerManager {
    async fn start(&self, config: &RegistryConfig) -> Result<Box<dyn RegistryServer>> {
        let bind = format!("{}:{}", config.host, config.port);
        let listener = tokio::net::TcpListener::bind(&bind)
            .await
            .map_err(|e| registry_error(format!("Failed to bind {bind}: {e}")))?;
        let address = listener
            .local_addr()
            .map_err(|e| registry_error(format!("Failed to read bound address: {e}")))?;

        let credentials = STANDARD.encode(format!("{}:{}", config.username, config.password));
        let state = Arc::new(RegistryState {
            authorization: format!("Basic {credentials}"),
            settings: RwLock::new(HashMap::new()),
        });

        let app = Router::new()
            .route(
                "/instances/{id}/settings",
                get(get_settings).put(put_settings).delete(delete_settings),
            )
            .with_state(state);

        let cancel = CancellationToken::new();
        let shutdown = cancel.clone();
        let task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
        });

        info!(address = %address, "Registry listening");

        Ok(Box::new(HttpRegistryServer {
            address,
            cancel,
            task: Some(task),
        }))
    }
}

/// A running registry server.
///
/// Dropping the handle cancels the server without waiting for it.
#[derive(Debug)]
pub struct HttpRegistryServer {
    address: SocketAddr,
    cancel: CancellationToken,
    task: Option<JoinHandle<std::io::Result<()>>>,
}

#[async_trait]
impl RegistryServer for HttpRegistryServer {
    fn address(&self) -> SocketAddr {
        self.address
    }

    async fn stop(mut self: Box<Self>) -> Result<()> {
        self.cancel.cancel();

        let Some(task) = self.task.take() else {
            return Ok(());
        };

        task.await
            .map_err(|e| registry_error(format!("Registry task failed: {e}")))?
            .map_err(|e| registry_error(format!("Registry server failed: {e}")))?;

        info!(address = %self.address, "Registry stopped");
        Ok(())
    }
}

impl Drop for HttpRegistryServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn authorized(state: &RegistryState, headers: &HeaderMap) -> bool {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == state.authorization)
}

fn unauthorized() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "status": "unauthorized" })),
    )
}

/// Returns the settings of an instance.
async fn get_settings(
    State(state): State<Arc<RegistryState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if !authorized(&state, &headers) {
        return unauthorized();
    }

    match state.settings.read().await.get(&id) {
        Some(settings) => (
            StatusCode::OK,
            Json(serde_json::json!({ "settings": settings, "status": "ok" })),
        ),
        None => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({ "status": "not_found" })),
        ),
    }
}

/// Creates or replaces the settings of an instance.
async fn put_settings(
    State(state): State<Arc<RegistryState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    if !authorized(&state, &headers) {
        return unauthorized();
    }

    let settings = String::from_utf8_lossy(&body).into_owned();
    debug!(instance = %id, "Storing instance settings");
    let created = state.settings.write().await.insert(id, settings).is_none();

    let status = if created { StatusCode::CREATED } else { StatusCode::OK };
    (status, Json(serde_json::json!({ "status": "ok" })))
}

/// Removes the settings of an instance.
async fn delete_settings(
    State(state): State<Arc<RegistryState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if !authorized(&state, &headers) {
        return unauthorized();
    }

    state.settings.write().await.remove(&id);
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}
