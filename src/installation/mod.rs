//! CPI installation assembly.
//!
//! An installation is the CPI job rendered into a per-installation sandbox
//! under `<home>/installations/<installation-id>`, together with the local
//! registry the CPI talks to while it runs.

mod handle;
mod installer;
mod renderer;
mod target;

pub use handle::Installation;
pub use installer::{CpiInstaller, ReleaseCpiInstaller};
pub use renderer::JobRenderer;
pub use target::{InstallationTarget, TargetProvider};
