//! Read-only director queries.

mod client;
mod types;

pub use client::HttpDirector;
pub use types::{Event, EventsFilter};

use async_trait::async_trait;

use crate::error::Result;

/// Director query surface.
#[async_trait]
pub trait Director: Send + Sync {
    /// Lists events matching `filter`, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the director cannot be reached or answers with
    /// an error.
    async fn events(&self, filter: &EventsFilter) -> Result<Vec<Event>>;
}
