//! Terminal rendering of stage progress.

use colored::Colorize;
use std::io::Write;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use super::Writer;
use crate::cli::OutputFormat;
use crate::stage::{StageEvent, StageEventKind, StageObserver};

/// Prints one line per stage event, indented by nesting depth.
pub struct StagePrinter {
    format: OutputFormat,
    writer: Mutex<Writer>,
}

impl StagePrinter {
    /// Creates a printer writing to stderr.
    #[must_use]
    pub fn stderr(format: OutputFormat) -> Self {
        Self::with_writer(format, Box::new(std::io::stderr()))
    }

    /// Creates a printer writing to `writer`.
    #[must_use]
    pub fn with_writer(format: OutputFormat, writer: Writer) -> Self {
        Self {
            format,
            writer: Mutex::new(writer),
        }
    }

    fn render_text(event: &StageEvent) -> String {
        let indent = "  ".repeat(event.depth());
        let name = event.name();

        match &event.kind {
            StageEventKind::Started => format!("{indent}Started {name}"),
            StageEventKind::Finished { elapsed } => format!(
                "{indent}{} {name} ({})",
                "Finished".green(),
                format_elapsed(*elapsed)
            ),
            StageEventKind::Failed { message, elapsed } => format!(
                "{indent}{} {name} ({}): {message}",
                "Failed".red(),
                format_elapsed(*elapsed)
            ),
            StageEventKind::Skipped { reason, .. } => {
                format!("{indent}{} {name} ({reason})", "Skipped".yellow())
            }
        }
    }
}

/// Formats a duration as `HH:MM:SS`.
fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

impl StageObserver for StagePrinter {
    fn on_event(&self, event: &StageEvent) {
        let line = match self.format {
            OutputFormat::Json => serde_json::to_string(event).unwrap_or_default(),
            OutputFormat::Text => Self::render_text(event),
        };

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(writer, "{line}");
    }
}
