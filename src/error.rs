//! Error types for the deployment lifecycle.
//!
//! The hierarchy mirrors the phases of a run: manifest parsing, release
//! resolution and fetching, CPI validation, installation, and the runtime
//! calls made against the cloud, agents and blobstore. Every fallible step
//! wraps its cause with [`ResultExt::context`], so the caller receives one
//! annotated causal chain.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the deployment system.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Manifest parsing or validation errors.
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),

    /// A named release or job could not be resolved.
    #[error("{0}")]
    Resolution(#[from] ResolutionError),

    /// Release download or extraction errors.
    #[error("Fetching release: {0}")]
    Fetch(#[from] FetchError),

    /// Release does not satisfy the CPI contract.
    #[error("Validating release: {0}")]
    Validation(#[from] ValidationError),

    /// Sandbox or registry setup errors.
    #[error("Installation error: {0}")]
    Installation(#[from] InstallationError),

    /// CPI call failures.
    #[error("Cloud error: {0}")]
    Cloud(#[from] CloudError),

    /// Agent call failures.
    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    /// Blobstore call failures.
    #[error("Blobstore error: {0}")]
    Blobstore(#[from] BlobstoreError),

    /// Deployment state errors.
    #[error("State error: {0}")]
    State(#[from] StateError),

    /// Director query errors.
    #[error("Director error: {0}")]
    Director(#[from] DirectorError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An error annotated with the action that was being performed.
    #[error("{action}: {source}")]
    Context {
        /// One-line description of the failed action.
        action: String,
        /// The underlying cause.
        #[source]
        source: Box<DeployError>,
    },

    /// Two independent failures, such as a failed run followed by a failed
    /// registry shutdown.
    #[error("{primary}; additionally: {secondary}")]
    Combined {
        /// The failure of the guarded work.
        primary: Box<DeployError>,
        /// The failure of the finalizer.
        secondary: Box<DeployError>,
    },

    /// Signals the stage engine that a stage was skipped rather than failed.
    #[error("Stage skipped: {reason}")]
    SkipStage {
        /// Reason shown to the user.
        reason: String,
        /// The condition that caused the skip, if any.
        #[source]
        source: Option<Box<DeployError>>,
    },

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Manifest-related errors.
#[derive(Debug, Error)]
pub enum ManifestError {
    /// The manifest file was not found.
    #[error("Manifest file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The manifest could not be parsed.
    #[error("Failed to parse manifest: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Manifest validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },
}

/// Errors resolving named releases and jobs.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The installation refers to a release missing from the release set.
    #[error("installation release '{name}' must refer to a release in releases")]
    ReleaseNotFound {
        /// Name of the missing release.
        name: String,
    },

    /// No extracted release carries the requested name.
    #[error("Release '{name}' has not been extracted")]
    ReleaseNotExtracted {
        /// Name of the release.
        name: String,
    },

    /// The release does not contain the requested job.
    #[error("Job '{job}' not found in release '{release}'")]
    JobNotFound {
        /// Job name.
        job: String,
        /// Release name.
        release: String,
    },
}

/// Release download and extraction errors.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The release source could not be read.
    #[error("Downloading '{url}': {message}")]
    Download {
        /// Source location.
        url: String,
        /// Description of the failure.
        message: String,
    },

    /// The remote source answered with a non-success status.
    #[error("Downloading '{url}': HTTP {status}")]
    Http {
        /// Source location.
        url: String,
        /// HTTP status code.
        status: u16,
    },

    /// The URL scheme is not supported.
    #[error("Unsupported release source '{url}'")]
    UnsupportedSource {
        /// Source location.
        url: String,
    },

    /// The archive digest does not match the manifest entry.
    #[error("Checksum mismatch for release '{name}': expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// Release name.
        name: String,
        /// Digest recorded in the release set.
        expected: String,
        /// Digest of the downloaded archive.
        actual: String,
    },

    /// The archive is malformed.
    #[error("Extracting '{path}': {message}")]
    Extract {
        /// Archive or destination path.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// A release or job manifest inside the archive is unreadable.
    #[error("Reading '{path}': {message}")]
    ReleaseManifest {
        /// Path to the manifest file.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// The archive holds a different release than requested.
    #[error("Expected release '{expected}' but archive contains '{actual}'")]
    ReleaseMismatch {
        /// `name/version` from the release set.
        expected: String,
        /// `name/version` found in the archive.
        actual: String,
    },
}

/// The release cannot act as a CPI.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// One or more capability checks failed.
    #[error("CPI release '{release}' is invalid: {}", .problems.join("; "))]
    InvalidCpiRelease {
        /// Release name.
        release: String,
        /// Every problem found.
        problems: Vec<String>,
    },
}

/// Installation assembly errors.
#[derive(Debug, Error)]
pub enum InstallationError {
    /// The sandbox directory could not be prepared.
    #[error("Preparing sandbox '{path}': {message}")]
    Sandbox {
        /// Sandbox path.
        path: PathBuf,
        /// Description of the failure.
        message: String,
    },

    /// A job template could not be rendered.
    #[error("Rendering template '{template}' of job '{job}': {message}")]
    Render {
        /// Job name.
        job: String,
        /// Template source path.
        template: String,
        /// Description of the failure.
        message: String,
    },

    /// The local registry could not be started or stopped.
    #[error("Registry: {message}")]
    Registry {
        /// Description of the failure.
        message: String,
    },
}

/// CPI errors.
#[derive(Debug, Error)]
pub enum CloudError {
    /// The installation has no CPI executable.
    #[error("CPI executable not found at '{path}'")]
    CpiNotInstalled {
        /// Expected executable path.
        path: PathBuf,
    },

    /// The CPI reported an error.
    #[error("CPI '{method}' method responded with error: {error_type}: {message}")]
    Cmd {
        /// CPI method.
        method: String,
        /// Error type reported by the CPI.
        error_type: String,
        /// Error message reported by the CPI.
        message: String,
        /// Whether the CPI considers the call safe to retry.
        ok_to_retry: bool,
    },

    /// The CPI process could not be run.
    #[error("Executing CPI '{method}': {message}")]
    Exec {
        /// CPI method.
        method: String,
        /// Description of the failure.
        message: String,
    },

    /// The CPI wrote an unparseable response.
    #[error("Invalid CPI '{method}' response: {message}")]
    InvalidResponse {
        /// CPI method.
        method: String,
        /// Description of the failure.
        message: String,
    },
}

/// Agent errors.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The agent could not be reached.
    #[error("Sending '{method}' to agent: {message}")]
    Network {
        /// Agent method.
        method: String,
        /// Description of the failure.
        message: String,
    },

    /// The agent answered with a non-success status.
    #[error("Agent '{method}' responded with HTTP {status}")]
    Http {
        /// Agent method.
        method: String,
        /// HTTP status code.
        status: u16,
    },

    /// The agent reported an exception.
    #[error("Agent '{method}' responded with exception: {message}")]
    Exception {
        /// Agent method.
        method: String,
        /// Exception message.
        message: String,
    },

    /// The agent response could not be parsed.
    #[error("Invalid agent '{method}' response: {message}")]
    InvalidResponse {
        /// Agent method.
        method: String,
        /// Description of the failure.
        message: String,
    },

    /// The agent did not finish in time.
    #[error("Timed out after {secs}s waiting for agent '{method}'")]
    Timeout {
        /// Agent method.
        method: String,
        /// Seconds waited.
        secs: u64,
    },
}

/// Blobstore errors.
#[derive(Debug, Error)]
pub enum BlobstoreError {
    /// The endpoint derived from the message bus URL is malformed.
    #[error("Invalid blobstore endpoint '{url}': {message}")]
    InvalidEndpoint {
        /// Offending URL with credentials removed.
        url: String,
        /// Description of the problem.
        message: String,
    },

    /// The request could not be sent.
    #[error("Blobstore request failed: {message}")]
    Request {
        /// Description of the failure.
        message: String,
    },

    /// The blobstore answered with a non-success status.
    #[error("Blobstore responded with HTTP {status} for blob '{blob_id}'")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Blob identifier.
        blob_id: String,
    },
}

/// Deployment state errors.
#[derive(Debug, Error)]
pub enum StateError {
    /// State is corrupted.
    #[error("State is corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// Serialization error.
    #[error("State serialization error: {message}")]
    SerializationError {
        /// Description of the serialization error.
        message: String,
    },

    /// The state file could not be written.
    #[error("Failed to write state: {message}")]
    WriteFailed {
        /// Description of the failure.
        message: String,
    },
}

/// Director query errors.
#[derive(Debug, Error)]
pub enum DirectorError {
    /// The director URL is malformed.
    #[error("Invalid director URL '{url}'")]
    InvalidUrl {
        /// Offending URL.
        url: String,
    },

    /// The director could not be reached.
    #[error("Network error communicating with director: {message}")]
    Network {
        /// Description of the failure.
        message: String,
    },

    /// The director answered with a non-success status.
    #[error("Director responded with HTTP {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Response body.
        message: String,
    },

    /// The director response could not be parsed.
    #[error("Invalid director response: {message}")]
    InvalidResponse {
        /// Description of the failure.
        message: String,
    },
}

/// Result type alias for deployment operations.
pub type Result<T> = std::result::Result<T, DeployError>;

impl DeployError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Creates a skip signal for the stage engine.
    #[must_use]
    pub fn skip(reason: impl Into<String>, cause: Self) -> Self {
        Self::SkipStage {
            reason: reason.into(),
            source: Some(Box::new(cause)),
        }
    }

    /// Wraps this error with the action being performed.
    #[must_use]
    pub fn wrap(self, action: impl Into<String>) -> Self {
        Self::Context {
            action: action.into(),
            source: Box::new(self),
        }
    }

    /// Returns true if this error only signals a skipped stage.
    #[must_use]
    pub const fn is_skip(&self) -> bool {
        matches!(self, Self::SkipStage { .. })
    }

    /// Returns the innermost error of a context chain.
    #[must_use]
    pub fn root_cause(&self) -> &Self {
        match self {
            Self::Context { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Returns true if this error is retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self.root_cause() {
            Self::Agent(AgentError::Network { .. })
            | Self::Director(DirectorError::Network { .. }) => true,
            Self::Cloud(CloudError::Cmd { ok_to_retry, .. }) => *ok_to_retry,
            _ => false,
        }
    }
}

/// CPI error types that denote an already absent resource.
const NOT_FOUND_ERROR_TYPES: &[&str] = &[
    "Bosh::Clouds::VMNotFound",
    "Bosh::Clouds::DiskNotFound",
    "Bosh::Clouds::StemcellNotFound",
];

impl CloudError {
    /// Returns true if the CPI reported the target resource as missing.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Cmd { error_type, .. } if NOT_FOUND_ERROR_TYPES.contains(&error_type.as_str()))
    }
}

impl ManifestError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

impl StateError {
    /// Creates a serialization error with the given message.
    #[must_use]
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::SerializationError {
            message: message.into(),
        }
    }
}

/// Adds action context to fallible results.
pub trait ResultExt<T> {
    /// Wraps the error with a one-line description of the failed action.
    ///
    /// # Errors
    ///
    /// Returns the wrapped error if `self` is an error.
    fn context(self, action: impl Into<String>) -> Result<T>;

    /// Like [`ResultExt::context`], building the description lazily.
    ///
    /// # Errors
    ///
    /// Returns the wrapped error if `self` is an error.
    fn with_context<F: FnOnce() -> String>(self, action: F) -> Result<T>;
}

impl<T, E: Into<DeployError>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, action: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().wrap(action))
    }

    fn with_context<F: FnOnce() -> String>(self, action: F) -> Result<T> {
        self.map_err(|e| e.into().wrap(action()))
    }
}
