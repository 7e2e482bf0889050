//! Terminal output for imgsync.
//!
//! Results (pushed images, digests, check reports) go to stdout in the
//! requested [`OutputFormat`]. Status lines and the push spinner go to
//! stderr through an [`OutputFormatter`], so `imgsync digest -f json` stays
//! pipeable.

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};
use std::io::IsTerminal;
use std::time::Duration;

/// Status reporting on stderr.
pub trait OutputFormatter: Send + Sync {
    fn success(&self, message: &str);

    /// Reports a failed command; callers exit non-zero afterwards.
    fn error(&self, message: &str);

    /// Reports a non-fatal condition such as a drifted digest.
    fn warning(&self, message: &str);

    /// Starts the spinner shown while the engine streams push progress.
    /// Its message is replaced with each layer status.
    fn spinner(&self, message: &str) -> ProgressBar;

    /// Stops a spinner started by [`OutputFormatter::spinner`].
    fn finish_progress(&self, pb: ProgressBar, message: &str);
}

/// Colored marks and a live spinner, for interactive terminals.
pub struct TtyFormatter;

impl OutputFormatter for TtyFormatter {
    fn success(&self, message: &str) {
        eprintln!("{} {}", "✓".green().bold(), message);
    }

    fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red().bold(), message);
    }

    fn warning(&self, message: &str) {
        eprintln!("{} {}", "⚠".yellow().bold(), message);
    }

    fn spinner(&self, message: &str) -> ProgressBar {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            spinner.set_style(style);
        }
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    }

    fn finish_progress(&self, pb: ProgressBar, message: &str) {
        pb.finish_and_clear();
        eprintln!("{} {}", "✓".green(), message);
    }
}

/// Uncolored marks and no spinner, for CI logs and redirected stderr.
pub struct PlainFormatter;

impl OutputFormatter for PlainFormatter {
    fn success(&self, message: &str) {
        eprintln!("✓ {}", message);
    }

    fn error(&self, message: &str) {
        eprintln!("✗ {}", message);
    }

    fn warning(&self, message: &str) {
        eprintln!("⚠ {}", message);
    }

    fn spinner(&self, message: &str) -> ProgressBar {
        eprintln!("{}", message);
        ProgressBar::hidden()
    }

    fn finish_progress(&self, pb: ProgressBar, message: &str) {
        pb.finish();
        eprintln!("✓ {}", message);
    }
}

/// Value of `--color`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    #[default]
    Auto,
    Always,
    Never,
}

impl From<&str> for ColorChoice {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "always" => ColorChoice::Always,
            "never" => ColorChoice::Never,
            _ => ColorChoice::Auto,
        }
    }
}

/// Picks the formatter for `--color`, honouring `NO_COLOR` under `auto`.
pub fn create_formatter(color: ColorChoice) -> Box<dyn OutputFormatter> {
    if should_color(color) {
        Box::new(TtyFormatter)
    } else {
        Box::new(PlainFormatter)
    }
}

pub fn should_color(color: ColorChoice) -> bool {
    match color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        // Progress and status go to stderr
        ColorChoice::Auto => std::io::stderr().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Value of `-f/--format` for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Pretty,
    Json,
    Yaml,
}

impl From<&str> for OutputFormat {
    fn from(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => OutputFormat::Json,
            "yaml" | "yml" => OutputFormat::Yaml,
            _ => OutputFormat::Pretty,
        }
    }
}

/// Command results printable as text, JSON or YAML.
pub trait Formattable: Serialize {
    /// Text shown for `-f pretty`; JSON and YAML come from `Serialize`.
    fn format_pretty(&self) -> String;
}

/// Renders a command result in `format`.
pub fn format_output<T: Formattable>(item: &T, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Pretty => Ok(item.format_pretty()),
        OutputFormat::Json => serde_json::to_string_pretty(item)
            .map_err(|e| format!("Failed to serialize to JSON: {}", e)),
        OutputFormat::Yaml => {
            serde_yaml::to_string(item).map_err(|e| format!("Failed to serialize to YAML: {}", e))
        }
    }
}
