//! Configuration management for shell-capture.
//!
//! Defaults are loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Built-in values

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cli::Args;

/// Default settings applied to every command created from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    /// Shell binary (host default when unset).
    pub shell: Option<String>,
    /// Suppress live forwarding.
    pub quiet: bool,
    /// Resolve failures instead of raising them.
    pub nothrow: bool,
    /// Timeout in milliseconds (unbounded when unset).
    pub timeout_ms: Option<u64>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            shell: None,
            quiet: false,
            nothrow: false,
            timeout_ms: None,
            log_level: "info".to_string(),
        }
    }
}

impl Defaults {
    /// Load defaults from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(shell) = lookup("SHELL_CAPTURE_SHELL").filter(|s| !s.is_empty()) {
            self.shell = Some(shell);
        }

        if let Some(value) = lookup("SHELL_CAPTURE_QUIET") {
            self.quiet = parse_flag("SHELL_CAPTURE_QUIET", &value)?;
        }

        if let Some(value) = lookup("SHELL_CAPTURE_NOTHROW") {
            self.nothrow = parse_flag("SHELL_CAPTURE_NOTHROW", &value)?;
        }

        if let Some(value) = lookup("SHELL_CAPTURE_TIMEOUT_MS") {
            let ms = value
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SHELL_CAPTURE_TIMEOUT_MS", value))?;
            self.timeout_ms = Some(ms);
        }

        if let Some(level) = lookup("SHELL_CAPTURE_LOG_LEVEL") {
            self.log_level = level;
        } else if let Some(level) = lookup("RUST_LOG") {
            self.log_level = level;
        }

        Ok(())
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref shell) = args.shell {
            self.shell = Some(shell.clone());
        }
        if args.quiet {
            self.quiet = true;
        }
        if args.nothrow {
            self.nothrow = true;
        }
        if let Some(ms) = args.timeout_ms {
            self.timeout_ms = Some(ms);
        }
        if let Some(ref level) = args.log_level {
            self.log_level = level.clone();
        }
    }

    /// Load defaults with the full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > built-in values
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut defaults = match args.config {
            Some(ref path) => Self::from_file(path)?,
            None => Self::default(),
        };

        defaults.apply_env()?;
        defaults.apply_args(args);

        Ok(defaults)
    }

    /// Timeout as a duration.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.log_level
    }
}

fn parse_flag(name: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ConfigError::InvalidValue(name, value.to_string())),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("failed to read config file: {0}")]
    Io(#[source] std::io::Error),
    /// JSON parsing error.
    #[error("failed to parse config file: {0}")]
    Json(#[source] serde_json::Error),
    /// Environment variable with an unusable value.
    #[error("invalid value for {0}: '{1}'")]
    InvalidValue(&'static str, String),
}
