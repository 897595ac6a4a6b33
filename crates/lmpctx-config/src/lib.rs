#![deny(unsafe_code)]

//! Source documents, configuration schema, and engine settings for lmpctx.
//!
//! A source document (`*.lmp`) is human-readable documentation followed by
//! one fenced configuration block in JSON, YAML or TOML. This crate splits
//! and decodes those files ([`SourceDocument`]), defines the schema they
//! carry ([`ParsedConfig`]), and loads the engine's own TOML settings
//! ([`EngineSettings`]).

/// Configuration schema: include entries, context options, AI guidance.
pub mod schema;
/// Engine settings loaded from `lmpctx.toml`.
pub mod settings;
/// Splitting and decoding of hybrid source documents.
pub mod source;

pub use schema::{
    AiContext, ContextOptions, EntryType, IncludeEntry, MergeStrategy, OutputFormat, ParsedConfig,
};
pub use settings::EngineSettings;
pub use source::{ConfigFormat, ConfigParseError, SourceDocument, split_source};

/// Errors that can occur while loading settings or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read settings file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("failed to serialize config as {format}: {message}")]
    Serialize {
        format: ConfigFormat,
        message: String,
    },
}
