//! User-facing output.
//!
//! Everything the deployer tells the user goes through the [`Ui`] trait,
//! while stage progress is rendered by the [`StagePrinter`] observer. Both
//! write to stderr by default and switch to JSON lines with `--output json`.

mod stage_printer;

pub use stage_printer::StagePrinter;

use colored::Colorize;
use std::io::Write;
use std::sync::{Mutex, PoisonError};

use crate::cli::OutputFormat;

/// Output sink shared by [`TerminalUi`] and [`StagePrinter`].
pub type Writer = Box<dyn Write + Send>;

/// Sink for user-facing messages.
pub trait Ui: Send + Sync {
    /// Prints an informational line.
    fn print_line(&self, message: &str);

    /// Prints a warning.
    fn print_warning(&self, message: &str);

    /// Prints an error.
    fn print_error(&self, message: &str);

    /// Prints a pre-rendered block, such as a table.
    fn print_block(&self, block: &str);
}

/// [`Ui`] writing to a terminal stream.
pub struct TerminalUi {
    format: OutputFormat,
    writer: Mutex<Writer>,
}

impl TerminalUi {
    /// Creates a UI writing to stderr.
    #[must_use]
    pub fn stderr(format: OutputFormat) -> Self {
        Self::with_writer(format, Box::new(std::io::stderr()))
    }

    /// Creates a UI writing to `writer`.
    #[must_use]
    pub fn with_writer(format: OutputFormat, writer: Writer) -> Self {
        Self {
            format,
            writer: Mutex::new(writer),
        }
    }

    fn emit(&self, level: &str, message: &str, text: &str) {
        let line = match self.format {
            OutputFormat::Json => {
                serde_json::json!({ "type": level, "message": message }).to_string()
            }
            OutputFormat::Text => text.to_string(),
        };

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        // Output is best-effort; a closed stderr must not fail the run.
        let _ = writeln!(writer, "{line}");
    }
}

impl Ui for TerminalUi {
    fn print_line(&self, message: &str) {
        self.emit("info", message, message);
    }

    fn print_warning(&self, message: &str) {
        self.emit("warning", message, &format!("{} {message}", "!".yellow()));
    }

    fn print_error(&self, message: &str) {
        self.emit("error", message, &format!("{} {message}", "x".red()));
    }

    fn print_block(&self, block: &str) {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = write!(writer, "{block}");
        if !block.ends_with('\n') {
            let _ = writeln!(writer);
        }
    }
}
