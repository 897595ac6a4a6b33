//! Configuration schema carried inside source documents.
//!
//! The same shapes are accepted verbatim from JSON, YAML and TOML fences;
//! see [`crate::source`] for how a fragment is located and decoded.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Lowest accepted include priority.
pub const MIN_PRIORITY: u8 = 1;
/// Highest accepted include priority.
pub const MAX_PRIORITY: u8 = 10;
/// Priority used when an include entry does not set one.
pub const DEFAULT_PRIORITY: u8 = 5;

/// Decoded structured section of one source document.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedConfig {
    /// Project name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Short project description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Project version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Files and directories to select, in authored order.
    #[serde(default)]
    pub include: Vec<IncludeEntry>,

    /// Global exclude globs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,

    /// Technology name to version/description, in authored order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub tech_stack: IndexMap<String, String>,

    /// Convention name to rule, in authored order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub conventions: IndexMap<String, String>,

    /// Guidance lists for the consuming model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_context: Option<AiContext>,

    /// Free-form instructions for the consuming model.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_instructions: Option<String>,

    /// Generation knobs (token ceiling, merge strategy, output format).
    #[serde(default, skip_serializing_if = "ContextOptions::is_empty")]
    pub context_options: ContextOptions,

    /// Keys this schema does not know about. Kept for round-trips, ignored
    /// by selection.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A single include entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeEntry {
    /// Path relative to the declaring source file's directory, or absolute.
    pub path: String,

    /// Whether `path` names a single file or a directory.
    #[serde(rename = "type", alias = "entry_type")]
    pub entry_type: EntryType,

    /// Descend into subdirectories (directories only).
    #[serde(default = "default_recursive")]
    pub recursive: bool,

    /// Include globs (directories only).
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,

    /// Entry-local exclude globs.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,

    /// Directory levels below `path` to descend (directories only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,

    /// Shown next to every file this entry selects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Packing priority, 1 (lowest) to 10 (highest).
    #[serde(default = "default_priority")]
    pub priority: u8,
}

fn default_recursive() -> bool {
    true
}

fn default_patterns() -> Vec<String> {
    vec!["*".to_string()]
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

impl IncludeEntry {
    /// A `file` entry with default settings.
    pub fn file(path: &str) -> Self {
        Self::new(path, EntryType::File)
    }

    /// A `dir` entry with default settings.
    pub fn dir(path: &str) -> Self {
        Self::new(path, EntryType::Dir)
    }

    fn new(path: &str, entry_type: EntryType) -> Self {
        Self {
            path: path.to_string(),
            entry_type,
            recursive: default_recursive(),
            patterns: default_patterns(),
            exclude: Vec::new(),
            max_depth: None,
            description: None,
            priority: DEFAULT_PRIORITY,
        }
    }

    /// Set the include patterns.
    pub fn with_patterns(mut self, patterns: &[&str]) -> Self {
        self.patterns = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Set the entry-local excludes.
    pub fn with_exclude(mut self, exclude: &[&str]) -> Self {
        self.exclude = exclude.iter().map(|p| p.to_string()).collect();
        self
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Directory levels to descend, folding `recursive = false` into zero.
    /// `None` means unbounded. Always zero for `file` entries.
    pub fn effective_depth(&self) -> Option<u32> {
        match self.entry_type {
            EntryType::File => Some(0),
            EntryType::Dir if !self.recursive => Some(0),
            EntryType::Dir => self.max_depth,
        }
    }
}

/// Include entry kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    File,
    #[serde(alias = "directory")]
    Dir,
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryType::File => write!(f, "file"),
            EntryType::Dir => write!(f, "dir"),
        }
    }
}

/// Guidance lists for the consuming model.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AiContext {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub focus_areas: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domain_knowledge: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub avoid: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub patterns_to_follow: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub performance_considerations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security_notes: Vec<String>,
}

impl AiContext {
    /// The lists paired with their display titles, in rendering order.
    pub fn sections(&self) -> [(&'static str, &[String]); 6] {
        [
            ("Focus areas", &self.focus_areas),
            ("Domain knowledge", &self.domain_knowledge),
            ("Avoid", &self.avoid),
            ("Patterns to follow", &self.patterns_to_follow),
            ("Performance considerations", &self.performance_considerations),
            ("Security notes", &self.security_notes),
        ]
    }

    /// Mutable access to the lists in the same order as [`AiContext::sections`].
    pub fn lists_mut(&mut self) -> [&mut Vec<String>; 6] {
        [
            &mut self.focus_areas,
            &mut self.domain_knowledge,
            &mut self.avoid,
            &mut self.patterns_to_follow,
            &mut self.performance_considerations,
            &mut self.security_notes,
        ]
    }

    /// Whether every list is empty.
    pub fn is_empty(&self) -> bool {
        self.sections().iter().all(|(_, list)| list.is_empty())
    }
}

/// Generation knobs.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextOptions {
    /// Token ceiling for included file contents.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,

    /// How this scope combines with its ancestors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_strategy: Option<MergeStrategy>,

    /// Artifact format.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
}

impl ContextOptions {
    /// Whether no option is set.
    pub fn is_empty(&self) -> bool {
        self.max_tokens.is_none() && self.merge_strategy.is_none() && self.output_format.is_none()
    }

    /// The merge strategy, defaulting to [`MergeStrategy::Inherit`].
    pub fn strategy(&self) -> MergeStrategy {
        self.merge_strategy.unwrap_or_default()
    }
}

/// How a more specific scope combines with the accumulated parent state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// Child scalars override, collections concatenate.
    #[default]
    Inherit,
    /// Child-set fields supersede the parent's.
    Replace,
    /// Like inherit, but narrative text fields are joined.
    Append,
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeStrategy::Inherit => write!(f, "inherit"),
            MergeStrategy::Replace => write!(f, "replace"),
            MergeStrategy::Append => write!(f, "append"),
        }
    }
}

/// Artifact format.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    #[serde(alias = "md")]
    Markdown,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Markdown => write!(f, "markdown"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            other => Err(ConfigError::Validation(format!(
                "output format must be \"markdown\" or \"json\", got {other:?}"
            ))),
        }
    }
}

impl ParsedConfig {
    /// Check the constraints serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(0) = self.context_options.max_tokens {
            return Err(ConfigError::Validation(
                "context_options.max_tokens must be greater than zero".to_string(),
            ));
        }

        for (i, entry) in self.include.iter().enumerate() {
            if entry.path.trim().is_empty() {
                let message = format!("include[{i}].path must not be empty");
                return Err(ConfigError::Validation(message));
            }
            if !(MIN_PRIORITY..=MAX_PRIORITY).contains(&entry.priority) {
                return Err(ConfigError::Validation(format!(
                    "include[{i}].priority must be in [{MIN_PRIORITY}, {MAX_PRIORITY}], got {}",
                    entry.priority
                )));
            }
            for pattern in entry.patterns.iter().chain(&entry.exclude) {
                check_glob(pattern).map_err(|e| {
                    ConfigError::Validation(format!("include[{i}]: invalid glob {pattern:?}: {e}"))
                })?;
            }
        }

        for pattern in &self.exclude {
            check_glob(pattern).map_err(|e| {
                ConfigError::Validation(format!("exclude: invalid glob {pattern:?}: {e}"))
            })?;
        }

        Ok(())
    }
}

fn check_glob(pattern: &str) -> Result<(), globset::Error> {
    globset::GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_include_entry_defaults() {
        let entry: IncludeEntry =
            serde_json::from_str(r#"{"path": "src", "type": "dir"}"#).unwrap();
        assert_eq!(entry, IncludeEntry::dir("src"));
        assert!(entry.recursive);
        assert_eq!(entry.patterns, vec!["*"]);
        assert_eq!(entry.priority, DEFAULT_PRIORITY);
        assert_eq!(entry.effective_depth(), None);
    }

    #[test]
    fn test_entry_type_aliases() {
        let entry: IncludeEntry =
            serde_json::from_str(r#"{"path": "src", "entry_type": "directory"}"#).unwrap();
        assert_eq!(entry.entry_type, EntryType::Dir);
    }

    #[test]
    fn test_effective_depth() {
        let mut entry = IncludeEntry::dir("src");
        entry.max_depth = Some(2);
        assert_eq!(entry.effective_depth(), Some(2));
        entry.recursive = false;
        assert_eq!(entry.effective_depth(), Some(0));

        let mut file = IncludeEntry::file("main.rs");
        file.max_depth = Some(7);
        assert_eq!(file.effective_depth(), Some(0));
    }

    #[test]
    fn test_context_options_strategy_defaults_to_inherit() {
        let options = ContextOptions::default();
        assert!(options.is_empty());
        assert_eq!(options.strategy(), MergeStrategy::Inherit);
    }

    #[test]
    fn test_output_format_from_str() {
        let md: OutputFormat = "md".parse().unwrap();
        assert_eq!(md, OutputFormat::Markdown);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("html".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_unknown_fields_are_kept() {
        let config: ParsedConfig =
            serde_json::from_str(r#"{"name": "demo", "owner": {"team": "core"}}"#).unwrap();
        assert_eq!(config.name.as_deref(), Some("demo"));
        assert_eq!(config.extra["owner"]["team"], "core");
    }

    #[test]
    fn test_validate_accepts_defaults() {
        let config = ParsedConfig {
            include: vec![IncludeEntry::dir("src").with_patterns(&["**/*.{rs,toml}"])],
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_priority_out_of_range() {
        let mut config = ParsedConfig {
            include: vec![IncludeEntry::file("a.rs").with_priority(11)],
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.include[0].priority = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_max_tokens() {
        let mut config = ParsedConfig::default();
        config.context_options.max_tokens = Some(0);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_tokens"));
    }

    #[test]
    fn test_validate_rejects_empty_path() {
        let mut config = ParsedConfig::default();
        config.include.push(IncludeEntry::file("  "));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_glob() {
        let mut config = ParsedConfig::default();
        config.exclude.push("src/[".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_ai_context_is_empty() {
        let mut ctx = AiContext::default();
        assert!(ctx.is_empty());
        ctx.avoid.push("global state".to_string());
        assert!(!ctx.is_empty());
        assert_eq!(ctx.sections()[2].1, ["global state".to_string()]);
    }
}
