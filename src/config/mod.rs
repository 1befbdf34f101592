//! Configuration module.
//!
//! This module handles all configuration-related functionality:
//! - Parsing the deployment manifest into a release set and an installation
//! - Validation of manifest values
//! - Runtime settings taken from the environment

mod manifest;
mod parser;
mod settings;
mod validator;

pub use manifest::{
    CloudProviderSpec, DeploymentManifest, InstallationManifest, RegistryConfig, ReleaseJobRef,
    ReleaseRef, ReleaseSetManifest,
};
pub use parser::{ManifestParser, YamlManifestParser, default_state_path};
pub use settings::{HOME_ENV_VAR, Settings, load_dotenv};
pub use validator::{FieldError, InstallationValidator, ReleaseSetValidator, ValidationReport};
