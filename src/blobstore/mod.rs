//! Blob transfer to and from deployed machines.

mod dav;

pub use dav::{DavBlobstore, DavBlobstoreFactory};

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;

/// Blob storage used alongside the agent.
#[async_trait]
pub trait Blobstore: Send + Sync {
    /// Downloads `blob_id` into `destination`.
    async fn get(&self, blob_id: &str, destination: &Path) -> Result<()>;

    /// Uploads `source` and returns the new blob id.
    async fn add(&self, source: &Path) -> Result<String>;

    /// Deletes `blob_id`. Deleting a missing blob succeeds.
    async fn delete(&self, blob_id: &str) -> Result<()>;
}

/// Builds [`Blobstore`]s.
pub trait BlobstoreFactory: Send + Sync {
    /// Creates a blobstore from the message bus URL.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::BlobstoreError::InvalidEndpoint`] on a
    /// malformed URL.
    fn create(&self, mbus_url: &str) -> Result<Arc<dyn Blobstore>>;
}
