//! Configuration management for script-session.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::cli::Args;
use crate::execution::ArtifactLayout;
use crate::session::SessionKey;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Debug artifact configuration.
    pub artifacts: ArtifactsSection,
    /// Session configuration.
    pub session: SessionSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Debug artifact section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsSection {
    /// Emit a code and symbol file for every executed script.
    pub enabled: bool,
    /// Output directory and file extensions.
    #[serde(flatten)]
    pub layout: ArtifactLayout,
}

/// Session configuration section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    /// Session key to run under. Without one every script gets a fresh
    /// session.
    pub key: Option<String>,
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace) or filter directive.
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("SCRIPT_SESSION_KEY") {
            if !key.is_empty() {
                self.session.key = Some(key);
            }
        }

        if let Ok(level) = std::env::var("SCRIPT_SESSION_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Ok(level) = std::env::var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if args.debug {
            self.artifacts.enabled = true;
        }

        if let Some(ref key) = args.session {
            self.session.key = Some(key.clone());
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = match args.config {
            Some(ref path) => Config::from_file(path)?,
            None => Config::default(),
        };

        config.apply_env();
        config.apply_args(args);

        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let layout = &self.artifacts.layout;
        for (field, value) in [
            ("artifacts.code_extension", &layout.code_extension),
            ("artifacts.symbol_extension", &layout.symbol_extension),
        ] {
            if value.is_empty() || value.contains(['/', '\\', '.']) {
                return Err(ConfigError::InvalidValue(field, value.clone()));
            }
        }
        if layout.code_extension == layout.symbol_extension {
            return Err(ConfigError::InvalidValue(
                "artifacts.symbol_extension",
                layout.symbol_extension.clone(),
            ));
        }
        Ok(())
    }

    /// Artifact layout, if artifacts are enabled.
    pub fn artifact_layout(&self) -> Option<ArtifactLayout> {
        self.artifacts
            .enabled
            .then(|| self.artifacts.layout.clone())
    }

    /// Session key to run under, if one is configured.
    pub fn session_key(&self) -> Option<SessionKey> {
        self.session.key.as_deref().map(SessionKey::new)
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// A value that parses but cannot be used.
    InvalidValue(&'static str, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::InvalidValue(field, value) => {
                write!(f, "invalid value for {}: '{}'", field, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
