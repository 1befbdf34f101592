//! Releases: fetching, extraction, job resolution and CPI validation.
//!
//! Every extracted release is registered with a [`ReleaseManager`], which is
//! the only owner allowed to delete it.

mod archive;
mod fetcher;
mod job_resolver;
mod manager;
mod types;
mod validator;

pub use archive::{JOB_MANIFEST, RELEASE_MANIFEST, extract_tarball, read_release, sha256_hex};
pub use fetcher::{ArchiveReleaseFetcher, ReleaseFetcher};
#[cfg(test)]
pub use job_resolver::MockReleaseJobResolver;
pub use job_resolver::{JobResolver, ManagedReleaseJobResolver, ReleaseJobResolver};
pub use manager::{LocalReleaseManager, ReleaseManager};
pub use types::{Job, Package, PropertyDefinition, Release};
pub use validator::{CPI_EXECUTABLE, CpiReleaseValidator};
