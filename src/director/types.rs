//! Director event types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Filter applied to an events query. Empty fields are not sent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventsFilter {
    /// Only events older than this event id.
    pub before_id: Option<String>,
    /// Only events before this time.
    pub before: Option<String>,
    /// Only events after this time.
    pub after: Option<String>,
    /// Only events of this deployment.
    pub deployment: Option<String>,
    /// Only events of this task.
    pub task: Option<String>,
    /// Only events of this instance.
    pub instance: Option<String>,
}

impl EventsFilter {
    /// Query parameters understood by the director's `/events` endpoint.
    #[must_use]
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        [
            ("before_id", &self.before_id),
            ("before_time", &self.before),
            ("after_time", &self.after),
            ("deployment", &self.deployment),
            ("task", &self.task),
            ("instance", &self.instance),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(|v| (key, v))
        })
        .collect()
    }
}

/// An event recorded by the director.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Event id.
    pub id: String,
    /// Id of the event this one completes, if any.
    #[serde(default)]
    pub parent_id: Option<String>,
    /// When the event happened.
    #[serde(with = "chrono::serde::ts_seconds")]
    pub timestamp: DateTime<Utc>,
    /// User that triggered the event.
    #[serde(default)]
    pub user: String,
    /// Action performed.
    #[serde(default)]
    pub action: String,
    /// Type of the affected object.
    #[serde(default)]
    pub object_type: String,
    /// Name of the affected object.
    #[serde(default)]
    pub object_name: String,
    /// Task that produced the event.
    #[serde(default, rename = "task")]
    pub task_id: String,
    /// Deployment the event belongs to.
    #[serde(default, rename = "deployment")]
    pub deployment_name: String,
    /// Instance the event concerns.
    #[serde(default)]
    pub instance: String,
    /// Free-form context.
    #[serde(default)]
    pub context: BTreeMap<String, serde_json::Value>,
    /// Error message for failed actions.
    #[serde(default)]
    pub error: Option<String>,
}

impl Event {
    /// Returns the id, followed by `<- parent` when the event has a parent.
    #[must_use]
    pub fn display_id(&self) -> String {
        match self.parent_id.as_deref() {
            Some(parent) if !parent.is_empty() => format!("{} <- {parent}", self.id),
            _ => self.id.clone(),
        }
    }
}
