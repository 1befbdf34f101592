//! Local registry used by the CPI while it provisions machines.

mod server;

pub use server::{HttpRegistryServer, HttpRegistryServerManager};

use async_trait::async_trait;
use std::net::SocketAddr;

use crate::config::RegistryConfig;
use crate::error::Result;

/// Starts registry servers.
#[async_trait]
pub trait RegistryServerManager: Send + Sync {
    /// Starts a server bound to `config`.
    ///
    /// # Errors
    ///
    /// Returns an installation error if the server cannot bind.
    async fn start(&self, config: &RegistryConfig) -> Result<Box<dyn RegistryServer>>;
}

/// A running registry server.
#[async_trait]
pub trait RegistryServer: Send + Sync {
    /// Address the server is listening on.
    fn address(&self) -> SocketAddr;

    /// Stops the server and waits for it to finish.
    ///
    /// # Errors
    ///
    /// Returns an installation error if the server did not shut down cleanly.
    async fn stop(self: Box<Self>) -> Result<()>;
}
