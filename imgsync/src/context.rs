//! Application context that holds resolved configuration
//!
//! The context is built following the precedence order:
//! 1. Default values
//! 2. Config file values
//! 3. Environment variables
//! 4. CLI flags
//!
//! Once built, the context is passed as read-only throughout the application.

use crate::format::{self, ColorChoice, OutputFormatter};
use libimgsync::Config;
use std::path::{Path, PathBuf};

/// Verbosity level from repeated `-v` flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum VerbosityLevel {
    Normal,
    Verbose,
    Debug,
    Trace,
}

impl VerbosityLevel {
    pub fn from_count(count: u8) -> Self {
        match count {
            0 => VerbosityLevel::Normal,
            1 => VerbosityLevel::Verbose,
            2 => VerbosityLevel::Debug,
            _ => VerbosityLevel::Trace,
        }
    }

    /// Log filter directive used when RUST_LOG is unset
    pub fn filter(&self) -> &'static str {
        match self {
            VerbosityLevel::Normal => "warn",
            VerbosityLevel::Verbose => "libimgsync=info,imgsync=info",
            VerbosityLevel::Debug => "libimgsync=debug,imgsync=debug",
            VerbosityLevel::Trace => "trace",
        }
    }
}

/// Application context with resolved configuration and runtime state
pub struct AppContext {
    /// Resolved configuration
    pub config: Config,
    /// Status output, colored or plain
    pub formatter: Box<dyn OutputFormatter>,
}

impl AppContext {
    /// Build context with precedence: defaults > config file > env vars > CLI flags
    pub fn build(
        config_path: Option<&Path>,
        host: Option<String>,
        color: ColorChoice,
    ) -> libimgsync::Result<Self> {
        let path = config_path
            .map(Path::to_path_buf)
            .or_else(|| default_config_path().filter(|p| p.exists()));

        let config = match host {
            Some(host) => Config::load_with_host(path.as_deref(), Some(host))?,
            None => Config::load(path.as_deref())?,
        };

        Ok(Self {
            config,
            formatter: format::create_formatter(color),
        })
    }
}

/// `$XDG_CONFIG_HOME/imgsync/config.yaml` or the platform equivalent
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("imgsync").join("config.yaml"))
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
