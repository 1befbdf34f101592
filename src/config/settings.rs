//! Runtime settings.
//!
//! Settings come from the environment (optionally seeded from a `.env`
//! file) and control where installations are placed and how patiently
//! agents are waited for.

use crate::error::{DeployError, ManifestError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable overriding the deployer home directory.
pub const HOME_ENV_VAR: &str = "CPI_DEPLOYER_HOME";

/// Directory under the user's home used when no override is set.
const DEFAULT_HOME_DIR: &str = ".cpi-deployer";

/// Runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Root directory holding installations and release work directories.
    pub home: PathBuf,
    /// How long to wait for an agent to answer `ping`.
    pub agent_ping_timeout: Duration,
    /// Delay between `ping` attempts.
    pub agent_ping_delay: Duration,
    /// Delay between agent task polls.
    pub agent_task_poll_delay: Duration,
    /// Upper bound on a single long-running agent task.
    pub agent_task_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            home: PathBuf::from(DEFAULT_HOME_DIR),
            agent_ping_timeout: Duration::from_secs(10),
            agent_ping_delay: Duration::from_millis(500),
            agent_task_poll_delay: Duration::from_millis(500),
            agent_task_timeout: Duration::from_secs(600),
        }
    }
}

impl Settings {
    /// Builds settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        let home = resolve_home(std::env::var(HOME_ENV_VAR).ok(), dirs::home_dir());
        debug!("Using deployer home: {}", home.display());
        Self::default().with_home(home)
    }

    /// Overrides the home directory.
    #[must_use]
    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = home.into();
        self
    }

    /// Overrides the agent ping timeout.
    #[must_use]
    pub const fn with_agent_ping_timeout(mut self, timeout: Duration) -> Self {
        self.agent_ping_timeout = timeout;
        self
    }

    /// Directory holding per-installation sandboxes.
    #[must_use]
    pub fn installations_dir(&self) -> PathBuf {
        self.home.join("installations")
    }

    /// Directory where releases are extracted.
    #[must_use]
    pub fn releases_work_dir(&self) -> PathBuf {
        self.home.join("tmp")
    }
}

/// Picks the home directory from an explicit override or the user's home.
fn resolve_home(override_home: Option<String>, user_home: Option<PathBuf>) -> PathBuf {
    match override_home {
        Some(home) if !home.is_empty() => PathBuf::from(home),
        _ => user_home.map_or_else(
            || PathBuf::from(DEFAULT_HOME_DIR),
            |home| home.join(DEFAULT_HOME_DIR),
        ),
    }
}

/// Loads a `.env` file from `dir` if present.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be loaded.
pub fn load_dotenv(dir: &Path) -> Result<()> {
    let env_path = dir.join(".env");

    if env_path.exists() {
        info!("Loading environment from: {}", env_path.display());
        dotenvy::from_path(&env_path).map_err(|e| {
            DeployError::Manifest(ManifestError::ParseError {
                message: format!("Failed to load .env file: {e}"),
                location: Some(env_path.display().to_string()),
            })
        })?;
    } else {
        debug!(".env file not found at: {}", env_path.display());
    }

    Ok(())
}
