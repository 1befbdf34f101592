//! DAV blobstore reached through the message bus host.
//!
//! The endpoint is derived from the message bus URL: same scheme, host,
//! port and credentials, path `/blobs`.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::{Blobstore, BlobstoreFactory};
use crate::error::{BlobstoreError, DeployError, Result};

/// Timeout for a single blob transfer.
const TRANSFER_TIMEOUT_SECS: u64 = 600;

fn request_error(message: impl Into<String>) -> DeployError {
    DeployError::Blobstore(BlobstoreError::Request {
        message: message.into(),
    })
}

/// Blobstore speaking plain HTTP verbs to a DAV server.
#[derive(Debug)]
pub struct DavBlobstore {
    http: Client,
    base: Url,
    username: Option<String>,
    password: Option<String>,
}

impl DavBlobstore {
    /// Creates a blobstore from a message bus URL.
    ///
    /// # Errors
    ///
    /// Returns [`BlobstoreError::InvalidEndpoint`] if the URL cannot be parsed
    /// or has no host.
    pub fn from_mbus(mbus_url: &str) -> Result<Self> {
        let invalid = |url: &str, message: String| {
            DeployError::Blobstore(BlobstoreError::InvalidEndpoint {
                url: url.to_string(),
                message,
            })
        };

        let mbus = Url::parse(mbus_url).map_err(|e| invalid(mbus_url, e.to_string()))?;
        let host = mbus
            .host_str()
            .ok_or_else(|| invalid(mbus_url, String::from("missing host")))?;
        let port = mbus
            .port_or_known_default()
            .ok_or_else(|| invalid(host, String::from("missing port")))?;

        let base_text = format!("{}://{host}:{port}/blobs/", mbus.scheme());
        let base = Url::parse(&base_text).map_err(|e| invalid(&base_text, e.to_string()))?;

        let http = Client::builder()
            .timeout(Duration::from_secs(TRANSFER_TIMEOUT_SECS))
            .danger_accept_invalid_certs(true)
            .build()
            .map_err(|e| request_error(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base,
            username: (!mbus.username().is_empty()).then(|| mbus.username().to_string()),
            password: mbus.password().map(ToString::to_string),
        })
    }

    /// Endpoint blobs are stored under.
    #[must_use]
    pub const fn endpoint(&self) -> &Url {
        &self.base
    }

    fn blob_url(&self, blob_id: &str) -> Result<Url> {
        self.base
            .join(blob_id)
            .map_err(|e| request_error(format!("invalid blob id '{blob_id}': {e}")))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.username {
            Some(username) => request.basic_auth(username, self.password.as_deref()),
            None => request,
        }
    }
}

#[async_trait]
impl Blobstore for DavBlobstore {
    async fn get(&self, blob_id: &str, destination: &Path) -> Result<()> {
        debug!(blob_id, destination = %destination.display(), "Downloading blob");
        let response = self
            .authorize(self.http.get(self.blob_url(blob_id)?))
            .send()
            .await
            .map_err(|e| request_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DeployError::Blobstore(BlobstoreError::Http {
                status: response.status().as_u16(),
                blob_id: blob_id.to_string(),
            }));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| request_error(e.to_string()))?;
        tokio::fs::write(destination, &bytes).await?;
        Ok(())
    }

    async fn add(&self, source: &Path) -> Result<String> {
        let blob_id = Uuid::new_v4().to_string();
        let body = tokio::fs::read(source).await?;
        info!(blob_id = %blob_id, source = %source.display(), "Uploading blob");

        let response = self
            .authorize(self.http.put(self.blob_url(&blob_id)?))
            .body(body)
            .send()
            .await
            .map_err(|e| request_error(e.to_string()))?;

        if !response.status().is_success() {
            return Err(DeployError::Blobstore(BlobstoreError::Http {
                status: response.status().as_u16(),
                blob_id,
            }));
        }

        Ok(blob_id)
    }

    async fn delete(&self, blob_id: &str) -> Result<()> {
        debug!(blob_id, "Deleting blob");
        let response = self
            .authorize(self.http.delete(self.blob_url(blob_id)?))
            .send()
            .await
            .map_err(|e| request_error(e.to_string()))?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(());
        }

        Err(DeployError::Blobstore(BlobstoreError::Http {
            status: status.as_u16(),
            blob_id: blob_id.to_string(),
        }))
    }
}

/// [`BlobstoreFactory`] building [`DavBlobstore`]s.
#[derive(Debug, Default)]
pub struct DavBlobstoreFactory;

impl DavBlobstoreFactory {
    /// Creates a new factory.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl BlobstoreFactory for DavBlobstoreFactory {
    fn create(&self, mbus_url: &str) -> Result<Arc<dyn Blobstore>> {
        Ok(Arc::new(DavBlobstore::from_mbus(mbus_url)?))
    }
}
