//! Output formatting for CLI commands.

use colored::Colorize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::director::Event;

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Event row for table display.
#[derive(Tabled)]
struct EventRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "User")]
    user: String,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Object Type")]
    object_type: String,
    #[tabled(rename = "Object ID")]
    object_name: String,
    #[tabled(rename = "Task ID")]
    task_id: String,
    #[tabled(rename = "Deployment")]
    deployment: String,
    #[tabled(rename = "Instance")]
    instance: String,
    #[tabled(rename = "Context")]
    context: String,
    #[tabled(rename = "Error")]
    error: String,
}

impl From<&Event> for EventRow {
    fn from(event: &Event) -> Self {
        let context = if event.context.is_empty() {
            String::new()
        } else {
            serde_json::to_string(&event.context).unwrap_or_default()
        };

        Self {
            id: event.display_id(),
            time: event.timestamp.format("%a %b %e %H:%M:%S UTC %Y").to_string(),
            user: event.user.clone(),
            action: event.action.clone(),
            object_type: event.object_type.clone(),
            object_name: event.object_name.clone(),
            task_id: event.task_id.clone(),
            deployment: event.deployment_name.clone(),
            instance: event.instance.clone(),
            context,
            error: event.error.clone().unwrap_or_default(),
        }
    }
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats director events for display.
    #[must_use]
    pub fn format_events(&self, events: &[Event]) -> String {
        match self.format {
            OutputFormat::Json => serde_json::to_string_pretty(events).unwrap_or_default(),
            OutputFormat::Text => Self::format_events_text(events),
        }
    }

    fn format_events_text(events: &[Event]) -> String {
        let mut output = String::new();

        if !events.is_empty() {
            let rows: Vec<EventRow> = events.iter().map(EventRow::from).collect();
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        let _ = write!(output, "\n{} events\n", events.len().to_string().bold());
        output
    }

    /// Formats the outcome of a deletion.
    #[must_use]
    pub fn format_deleted(&self, state_path: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::json!({ "status": "success", "state": state_path }).to_string()
            }
            OutputFormat::Text => format!("{} Deletion finished", "✓".green()),
        }
    }

    /// Formats a fatal error.
    #[must_use]
    pub fn format_error(&self, message: &str) -> String {
        match self.format {
            OutputFormat::Json => {
                serde_json::json!({ "status": "error", "message": message }).to_string()
            }
            OutputFormat::Text => format!("{} {message}", "✗".red()),
        }
    }
}
