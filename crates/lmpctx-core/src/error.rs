//! Engine errors and per-invocation diagnostics.
//!
//! Only [`EngineError`] aborts a generation. Every local failure (a bad
//! source file, a rejected include path, an unreadable file) is recorded as
//! a [`Diagnostic`] instead, so one bad file never blocks an otherwise valid
//! project context.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, error, warn};

/// Errors that abort a generation.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(
        "included file does not exist: {} (declared in {})",
        path.display(),
        declared_in.display()
    )]
    IncludeResolution { path: PathBuf, declared_in: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("failed to render output: {0}")]
    Render(#[from] serde_json::Error),
}

impl EngineError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        EngineError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// How serious a diagnostic is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// What a diagnostic is about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A configuration fence failed to decode.
    ConfigParse,
    /// A decoded configuration violated the schema.
    Schema,
    /// An include path escaped the project root.
    PathTraversal,
    /// An include path was absolute.
    NonPortablePath,
    /// A directory include was missing or selected nothing.
    EmptyDirectory,
    /// A symbolic link loop was found while walking.
    SymlinkLoop,
    /// A file could not be read.
    Io,
    /// A candidate did not fit the token budget.
    SkippedForBudget,
    /// A file extension had no language tag.
    UnknownLanguage,
}

impl DiagnosticKind {
    /// Default severity for this kind.
    pub fn severity(self) -> Severity {
        match self {
            DiagnosticKind::ConfigParse | DiagnosticKind::Schema => Severity::Error,
            DiagnosticKind::PathTraversal
            | DiagnosticKind::NonPortablePath
            | DiagnosticKind::SymlinkLoop
            | DiagnosticKind::Io => Severity::Warning,
            DiagnosticKind::EmptyDirectory
            | DiagnosticKind::SkippedForBudget
            | DiagnosticKind::UnknownLanguage => Severity::Info,
        }
    }

    /// Whether this kind counts as a configuration error for exit codes.
    pub fn is_config_error(self) -> bool {
        matches!(self, DiagnosticKind::ConfigParse | DiagnosticKind::Schema)
    }
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiagnosticKind::ConfigParse => "config-parse",
            DiagnosticKind::Schema => "schema",
            DiagnosticKind::PathTraversal => "path-traversal",
            DiagnosticKind::NonPortablePath => "non-portable-path",
            DiagnosticKind::EmptyDirectory => "empty-directory",
            DiagnosticKind::SymlinkLoop => "symlink-loop",
            DiagnosticKind::Io => "io",
            DiagnosticKind::SkippedForBudget => "skipped-for-budget",
            DiagnosticKind::UnknownLanguage => "unknown-language",
        };
        f.write_str(name)
    }
}

/// A recorded soft failure or notable condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub kind: DiagnosticKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        let (kind, message) = (self.kind, &self.message);
        match &self.path {
            Some(path) => write!(f, "{severity}[{kind}] {}: {message}", path.display()),
            None => write!(f, "{severity}[{kind}] {message}"),
        }
    }
}

/// Diagnostics collected during one invocation.
///
/// Each recorded entry is also emitted as a `tracing` event at a level
/// matching its severity.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic with the kind's default severity.
    pub fn record(
        &mut self,
        kind: DiagnosticKind,
        path: Option<&Path>,
        message: impl Into<String>,
    ) {
        let diagnostic = Diagnostic {
            severity: kind.severity(),
            kind,
            path: path.map(Path::to_path_buf),
            message: message.into(),
        };
        match diagnostic.severity {
            Severity::Error => error!(kind = %kind, "{}", diagnostic),
            Severity::Warning => warn!(kind = %kind, "{}", diagnostic),
            Severity::Info => debug!(kind = %kind, "{}", diagnostic),
        }
        self.entries.push(diagnostic);
    }

    /// Append every entry of `other`, keeping order. Entries are not logged again.
    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any entry is a configuration error.
    pub fn has_config_errors(&self) -> bool {
        self.entries.iter().any(|d| d.kind.is_config_error())
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}
