//! Engine settings, loaded from an optional `lmpctx.toml`.
//!
//! These govern how the engine runs (discovery naming, concurrency, the
//! path-boundary opt-in, logging), not what a project selects; project
//! selection lives in source documents.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Default settings file name.
pub const SETTINGS_FILE_NAME: &str = "lmpctx.toml";

/// Top-level engine settings.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Source file discovery.
    #[serde(default)]
    pub discovery: DiscoverySettings,

    /// Resource limits and safety switches.
    #[serde(default)]
    pub limits: LimitSettings,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSettings,
}

/// Source file discovery settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverySettings {
    /// Extension that marks a source document (without the dot). A file
    /// named exactly `.<extension>` also counts.
    #[serde(default = "default_source_extension")]
    pub source_extension: String,

    /// Directory names never descended into.
    #[serde(default = "default_ignore_dirs")]
    pub ignore_dirs: Vec<String>,

    /// Follow symbolic links while walking. Loops are reported, not followed.
    #[serde(default = "default_follow_symlinks")]
    pub follow_symlinks: bool,
}

impl Default for DiscoverySettings {
    fn default() -> Self {
        Self {
            source_extension: default_source_extension(),
            ignore_dirs: default_ignore_dirs(),
            follow_symlinks: default_follow_symlinks(),
        }
    }
}

fn default_source_extension() -> String {
    "lmp".to_string()
}

fn default_ignore_dirs() -> Vec<String> {
    vec![
        ".git".to_string(),
        "node_modules".to_string(),
        "target".to_string(),
    ]
}

fn default_follow_symlinks() -> bool {
    true
}

/// Resource limits and safety switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitSettings {
    /// Maximum number of files read or parsed at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Allow include paths to resolve outside the project root.
    #[serde(default)]
    pub allow_outside_root: bool,

    /// Token ceiling used when no source document sets one (0 = unbounded).
    #[serde(default)]
    pub default_max_tokens: u64,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            allow_outside_root: false,
            default_max_tokens: 0,
        }
    }
}

fn default_concurrency() -> usize {
    8
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl EngineSettings {
    /// Load settings from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        Self::parse(&content)
    }

    /// Parse settings from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let settings: EngineSettings = toml::from_str(s)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let ext = &self.discovery.source_extension;
        if ext.is_empty() {
            return Err(ConfigError::Validation(
                "discovery.source_extension must not be empty".to_string(),
            ));
        }
        if ext.contains(['.', '/', '\\']) {
            return Err(ConfigError::Validation(format!(
                "discovery.source_extension must be a bare extension, got {ext:?}"
            )));
        }
        if self.limits.concurrency == 0 {
            return Err(ConfigError::Validation(
                "limits.concurrency must be at least 1".to_string(),
            ));
        }
        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }
        Ok(())
    }

    /// Whether a file name marks a source document.
    pub fn is_source_file_name(&self, name: &str) -> bool {
        let ext = self.discovery.source_extension.as_str();
        name.strip_suffix(ext)
            .and_then(|stem| stem.strip_suffix('.'))
            .is_some()
    }

    /// The default token ceiling, if one is configured.
    pub fn default_max_tokens(&self) -> Option<u64> {
        (self.limits.default_max_tokens > 0).then_some(self.limits.default_max_tokens)
    }
}
