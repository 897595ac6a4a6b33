//! Source document parsing.
//!
//! A source document is free markdown-like text followed by at most one
//! configuration fence. The fence is the *last* fenced block whose info
//! string names a recognized format (`json`, `yaml`/`yml`, `toml`); earlier
//! recognized fences stay part of the documentation so that examples inside
//! prose are never mistaken for configuration.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::ConfigError;
use crate::schema::ParsedConfig;

/// Serialization of a configuration fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// All supported formats.
    pub const ALL: [ConfigFormat; 3] = [ConfigFormat::Json, ConfigFormat::Yaml, ConfigFormat::Toml];

    /// Map a fence info-string tag to a format.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().as_str() {
            "json" => Some(ConfigFormat::Json),
            "yaml" | "yml" => Some(ConfigFormat::Yaml),
            "toml" => Some(ConfigFormat::Toml),
            _ => None,
        }
    }

    /// Canonical fence tag.
    pub fn tag(&self) -> &'static str {
        match self {
            ConfigFormat::Json => "json",
            ConfigFormat::Yaml => "yaml",
            ConfigFormat::Toml => "toml",
        }
    }
}

impl fmt::Display for ConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// A configuration fragment failed to decode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("failed to parse {format} config in {}: {message}", path.display())]
pub struct ConfigParseError {
    /// Source file the fragment came from.
    pub path: PathBuf,
    /// Declared format of the fragment.
    pub format: ConfigFormat,
    /// Underlying decoder message.
    pub message: String,
}

/// One parsed source file. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDocument {
    /// Path of the source file.
    pub path: PathBuf,
    /// Text before the configuration fence, trimmed; `None` when empty.
    pub documentation: Option<String>,
    /// Decoded configuration; `None` when there is no (non-empty) fence.
    pub config: Option<ParsedConfig>,
    /// Format the configuration was written in.
    pub format: Option<ConfigFormat>,
}

impl SourceDocument {
    /// Split and decode the raw text of the source file at `path`.
    pub fn parse(path: impl Into<PathBuf>, text: &str) -> Result<Self, ConfigParseError> {
        let path = path.into();
        let split = split_source(text);

        let (config, format) = match split.fragment {
            Some(fragment) if !fragment.body.trim().is_empty() => {
                let format = fragment.format;
                match ParsedConfig::decode(format, fragment.body) {
                    Ok(config) => (Some(config), Some(format)),
                    Err(message) => {
                        return Err(ConfigParseError {
                            path,
                            format,
                            message,
                        });
                    }
                }
            }
            Some(fragment) => {
                debug!(
                    path = %path.display(),
                    format = %fragment.format,
                    "Empty config fence"
                );
                (None, Some(fragment.format))
            }
            None => (None, None),
        };

        Ok(Self {
            path,
            documentation: split.documentation.map(str::to_string),
            config,
            format,
        })
    }

    /// Directory containing the source file. Relative include paths resolve
    /// against it.
    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }
}

/// Raw sections of a source file before decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitSource<'a> {
    /// Text before the configuration fence, trimmed; `None` when empty.
    pub documentation: Option<&'a str>,
    /// The configuration fence, if any.
    pub fragment: Option<Fragment<'a>>,
}

/// Body of the configuration fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment<'a> {
    pub format: ConfigFormat,
    pub body: &'a str,
}

/// An open fence while scanning.
struct OpenFence {
    marker: char,
    len: usize,
    format: Option<ConfigFormat>,
    open_at: usize,
    body_start: usize,
}

/// Locate the documentation and the configuration fence in `text`.
pub fn split_source(text: &str) -> SplitSource<'_> {
    let mut offset = 0;
    let mut open: Option<OpenFence> = None;
    // (open_at, format, body_start, body_end)
    let mut last: Option<(usize, ConfigFormat, usize, usize)> = None;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();
        let trimmed = line.trim();

        match &open {
            None => {
                if let Some((marker, len, info)) = fence_opening(trimmed) {
                    let tag = info.split_whitespace().next().unwrap_or("");
                    open = Some(OpenFence {
                        marker,
                        len,
                        format: ConfigFormat::from_tag(tag),
                        open_at: line_start,
                        body_start: offset,
                    });
                }
            }
            Some(fence) => {
                if is_fence_closing(trimmed, fence.marker, fence.len) {
                    if let Some(format) = fence.format {
                        last = Some((fence.open_at, format, fence.body_start, line_start));
                    }
                    open = None;
                }
            }
        }
    }

    // An unclosed fence runs to the end of the text.
    if let Some(fence) = open
        && let Some(format) = fence.format
    {
        last = Some((fence.open_at, format, fence.body_start, text.len()));
    }

    match last {
        Some((open_at, format, body_start, body_end)) => SplitSource {
            documentation: non_empty(&text[..open_at]),
            fragment: Some(Fragment {
                format,
                body: &text[body_start..body_end],
            }),
        },
        None => SplitSource {
            documentation: non_empty(text),
            fragment: None,
        },
    }
}

fn non_empty(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Returns `(marker, run length, info string)` when `line` opens a fence.
fn fence_opening(line: &str) -> Option<(char, usize, &str)> {
    let marker = line.chars().next().filter(|c| *c == '`' || *c == '~')?;
    let len = line.chars().take_while(|c| *c == marker).count();
    if len < 3 {
        return None;
    }
    // Both markers are ASCII, so `len` is also the byte length of the run.
    let info = line[len..].trim();
    if marker == '`' && info.contains('`') {
        return None;
    }
    Some((marker, len, info))
}

fn is_fence_closing(line: &str, marker: char, len: usize) -> bool {
    line.len() >= len && line.chars().all(|c| c == marker)
}

impl ParsedConfig {
    /// Decode a fragment body written in `format`.
    ///
    /// The error is the decoder's own message; callers attach the path.
    pub fn decode(format: ConfigFormat, body: &str) -> Result<Self, String> {
        match format {
            ConfigFormat::Json => serde_json::from_str(body).map_err(|e| e.to_string()),
            ConfigFormat::Yaml => serde_yaml::from_str(body).map_err(|e| e.to_string()),
            ConfigFormat::Toml => toml::from_str(body).map_err(|e| e.to_string()),
        }
    }

    /// Serialize to `format`.
    pub fn to_format(&self, format: ConfigFormat) -> Result<String, ConfigError> {
        let serialized = match format {
            ConfigFormat::Json => serde_json::to_string_pretty(self).map_err(|e| e.to_string()),
            ConfigFormat::Yaml => serde_yaml::to_string(self).map_err(|e| e.to_string()),
            ConfigFormat::Toml => toml::to_string_pretty(self).map_err(|e| e.to_string()),
        };
        serialized.map_err(|message| ConfigError::Serialize { format, message })
    }

    /// Render as a complete fenced block, ready to append to documentation.
    pub fn to_fenced(&self, format: ConfigFormat) -> Result<String, ConfigError> {
        let body = self.to_format(format)?;
        let body = body.trim_end();
        Ok(format!("```{}\n{body}\n```\n", format.tag()))
    }
}
