//! Stage observers.

use std::sync::Arc;
use tracing::{debug, info, warn};

use super::event::{StageEvent, StageEventKind};

/// Receives stage notifications.
pub trait StageObserver: Send + Sync {
    /// Called once when a stage starts and once when it terminates.
    fn on_event(&self, event: &StageEvent);
}

/// Observer that forwards stage events to `tracing`.
#[derive(Debug, Default)]
pub struct LoggingStageObserver;

impl LoggingStageObserver {
    /// Creates a new logging observer.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl StageObserver for LoggingStageObserver {
    fn on_event(&self, event: &StageEvent) {
        let stage = event.path.join(" > ");
        match &event.kind {
            StageEventKind::Started => debug!(stage = %stage, "Stage started"),
            StageEventKind::Finished { elapsed } => {
                info!(stage = %stage, elapsed_ms = elapsed.as_millis(), "Stage finished");
            }
            StageEventKind::Failed { message, elapsed } => {
                warn!(stage = %stage, elapsed_ms = elapsed.as_millis(), error = %message, "Stage failed");
            }
            StageEventKind::Skipped { reason, cause, .. } => {
                info!(stage = %stage, reason = %reason, cause = ?cause, "Stage skipped");
            }
        }
    }
}

/// Observer that fans every event out to several observers, in order.
#[derive(Default)]
pub struct CompositeStageObserver {
    observers: Vec<Arc<dyn StageObserver>>,
}

impl CompositeStageObserver {
    /// Creates an empty composite.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an observer.
    #[must_use]
    pub fn with(mut self, observer: Arc<dyn StageObserver>) -> Self {
        self.observers.push(observer);
        self
    }
}

impl StageObserver for CompositeStageObserver {
    fn on_event(&self, event: &StageEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}
