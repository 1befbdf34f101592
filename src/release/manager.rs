//! Registry of extracted releases.

use std::sync::{Mutex, PoisonError};
use tracing::{debug, info};

use super::types::Release;
use crate::error::{DeployError, Result};

/// Owns every extracted release and deletes them in bulk.
///
/// Methods are synchronous so that cleanup can run from a `Drop` guard.
pub trait ReleaseManager: Send + Sync {
    /// Registers an extracted release.
    fn add(&self, release: Release);

    /// Finds a registered release by name.
    fn find(&self, name: &str) -> Option<Release>;

    /// Returns every registered release.
    fn list(&self) -> Vec<Release>;

    /// Deletes every registered release from disk and forgets them.
    ///
    /// # Errors
    ///
    /// Returns the first removal failure after attempting all removals.
    fn delete_all(&self) -> Result<()>;
}

/// [`ReleaseManager`] over extracted directories on the local filesystem.
#[derive(Debug, Default)]
pub struct LocalReleaseManager {
    releases: Mutex<Vec<Release>>,
}

impl LocalReleaseManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReleaseManager for LocalReleaseManager {
    fn add(&self, release: Release) {
        debug!("Registering release '{}'", release.id());
        self.releases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(release);
    }

    fn find(&self, name: &str) -> Option<Release> {
        self.releases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|release| release.name == name)
            .cloned()
    }

    fn list(&self) -> Vec<Release> {
        self.releases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn delete_all(&self) -> Result<()> {
        let releases =
            std::mem::take(&mut *self.releases.lock().unwrap_or_else(PoisonError::into_inner));

        let mut first_error = None;
        for release in releases {
            info!(
                "Deleting extracted release '{}' at {}",
                release.id(),
                release.extracted_path.display()
            );
            if let Err(e) = std::fs::remove_dir_all(&release.extracted_path) {
                if e.kind() == std::io::ErrorKind::NotFound {
                    continue;
                }
                first_error.get_or_insert_with(|| {
                    DeployError::Io(e).wrap(format!("Deleting release '{}'", release.id()))
                });
            }
        }

        first_error.map_or(Ok(()), Err)
    }
}
