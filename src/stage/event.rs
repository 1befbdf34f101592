//! Stage notification payloads.

use serde::Serialize;
use std::time::Duration;

/// A single notification emitted by the stage engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageEvent {
    /// Names from the outermost stage down to this one.
    pub path: Vec<String>,
    /// Whether the stage declares nested stages.
    pub complex: bool,
    /// What happened.
    pub kind: StageEventKind,
}

/// Lifecycle point reported for a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StageEventKind {
    /// The stage is about to run.
    Started,
    /// The stage completed successfully.
    Finished {
        /// Time spent in the stage.
        elapsed: Duration,
    },
    /// The stage failed.
    Failed {
        /// Rendered error.
        message: String,
        /// Time spent in the stage.
        elapsed: Duration,
    },
    /// The stage decided there was nothing to do.
    Skipped {
        /// Reason shown to the user.
        reason: String,
        /// Rendered underlying condition, if any.
        cause: Option<String>,
        /// Time spent in the stage.
        elapsed: Duration,
    },
}

impl StageEvent {
    /// Name of the stage this event concerns.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.last().map_or("", String::as_str)
    }

    /// Nesting depth, zero for top-level stages.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    /// Returns true for finished, failed and skipped events.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self.kind, StageEventKind::Started)
    }
}
