//! Source document discovery.
//!
//! Discovery first ascends from the target directory while each parent holds
//! a source file; the topmost such directory becomes the project root and
//! the boundary for include paths. It then walks the target's subtree.
//!
//! Documents come back in merge order:
//!
//! ```text
//! root-most ancestor → … → nearest ancestor → target → descendants (sorted by relative path)
//! ```
//!
//! Files are read and parsed concurrently, but the order above is restored
//! before anything is returned.

use std::io;
use std::path::{Path, PathBuf};

use lmpctx_config::source::ConfigParseError;
use lmpctx_config::{ConfigError, EngineSettings, SourceDocument};
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::concurrency::map_bounded;
use crate::error::{DiagnosticKind, Diagnostics, EngineError};
use crate::paths::to_slash;

/// Where the source files of one invocation live, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocations {
    /// Canonical target directory.
    pub target: PathBuf,
    /// Topmost directory of the contiguous chain of ancestors holding a
    /// source file, or `target` when there is none.
    pub project_root: PathBuf,
    /// Source file paths in discovery order.
    pub files: Vec<PathBuf>,
}

/// Parsed source documents in discovery order.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub target: PathBuf,
    pub project_root: PathBuf,
    /// Number of source files found, including ones that failed to parse.
    pub located: usize,
    /// Successfully parsed and validated documents.
    pub documents: Vec<SourceDocument>,
}

/// Find every source file relevant to `target` without reading them.
pub fn locate(
    target: &Path,
    settings: &EngineSettings,
    diagnostics: &mut Diagnostics,
) -> Result<SourceLocations, EngineError> {
    let target = std::fs::canonicalize(target).map_err(|e| EngineError::io(target, e))?;
    if !target.is_dir() {
        return Err(EngineError::io(
            &target,
            io::Error::new(io::ErrorKind::NotADirectory, "target is not a directory"),
        ));
    }

    // Ascend while the parent directory holds a source file.
    let mut ancestors: Vec<Vec<PathBuf>> = Vec::new();
    let mut current = target.as_path();
    while let Some(parent) = current.parent() {
        let files = match source_files_in(parent, settings) {
            Ok(files) => files,
            Err(e) => {
                diagnostics.record(DiagnosticKind::Io, Some(parent), e.to_string());
                break;
            }
        };
        if files.is_empty() {
            break;
        }
        ancestors.push(files);
        current = parent;
    }
    let project_root = current.to_path_buf();
    ancestors.reverse();

    let mut files: Vec<PathBuf> = ancestors.into_iter().flatten().collect();
    files.extend(source_files_in(&target, settings).map_err(|e| EngineError::io(&target, e))?);
    files.extend(descendant_source_files(&target, settings, diagnostics));

    debug!(
        target = %target.display(),
        root = %project_root.display(),
        count = files.len(),
        "Located source files"
    );

    Ok(SourceLocations {
        target,
        project_root,
        files,
    })
}

/// Source files directly inside `dir`, sorted by file name.
fn source_files_in(dir: &Path, settings: &EngineSettings) -> io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let is_source = entry
            .file_name()
            .to_str()
            .is_some_and(|name| settings.is_source_file_name(name));
        if is_source && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Source files strictly below `target`'s own directory level, sorted by
/// relative path.
fn descendant_source_files(
    target: &Path,
    settings: &EngineSettings,
    diagnostics: &mut Diagnostics,
) -> Vec<PathBuf> {
    let ignore = &settings.discovery.ignore_dirs;
    let walker = WalkDir::new(target)
        .follow_links(settings.discovery.follow_symlinks)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            !(e.depth() > 0
                && e.file_type().is_dir()
                && e.file_name()
                    .to_str()
                    .is_some_and(|name| ignore.iter().any(|i| i == name)))
        });

    let mut found: Vec<(String, PathBuf)> = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                record_walk_error(&e, diagnostics);
                continue;
            }
        };
        // Depth-1 files belong to the target itself and are already listed.
        if entry.depth() < 2 || !entry.file_type().is_file() {
            continue;
        }
        let is_source = entry
            .file_name()
            .to_str()
            .is_some_and(|name| settings.is_source_file_name(name));
        if is_source {
            let rel = entry.path().strip_prefix(target).unwrap_or(entry.path());
            found.push((to_slash(rel), entry.into_path()));
        }
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));
    found.into_iter().map(|(_, path)| path).collect()
}

/// Record a walk error as a symlink-loop or I/O diagnostic.
pub(crate) fn record_walk_error(e: &walkdir::Error, diagnostics: &mut Diagnostics) {
    if let Some(ancestor) = e.loop_ancestor() {
        diagnostics.record(
            DiagnosticKind::SymlinkLoop,
            e.path(),
            format!("symlink loops back to {}", ancestor.display()),
        );
    } else {
        diagnostics.record(DiagnosticKind::Io, e.path(), e.to_string());
    }
}

/// Why a located source file was dropped.
enum SourceFailure {
    Io(io::Error),
    Parse(ConfigParseError),
    Schema(ConfigError),
}

async fn read_source(path: PathBuf) -> Result<SourceDocument, SourceFailure> {
    let bytes = tokio::fs::read(&path).await.map_err(SourceFailure::Io)?;
    let text = String::from_utf8_lossy(&bytes);
    let document = SourceDocument::parse(path, &text).map_err(SourceFailure::Parse)?;
    if let Some(config) = &document.config {
        config.validate().map_err(SourceFailure::Schema)?;
    }
    Ok(document)
}

/// Locate, read and parse every source document relevant to `target`.
///
/// A file that cannot be read, decoded or validated is recorded in
/// `diagnostics` and skipped; the remaining documents still come back in
/// discovery order.
pub async fn discover(
    target: &Path,
    settings: &EngineSettings,
    diagnostics: &mut Diagnostics,
) -> Result<Discovery, EngineError> {
    let (locations, walk_diagnostics) = {
        let target = target.to_path_buf();
        let settings = settings.clone();
        tokio::task::spawn_blocking(move || {
            let mut diagnostics = Diagnostics::new();
            let located = locate(&target, &settings, &mut diagnostics);
            (located, diagnostics)
        })
        .await?
    };
    diagnostics.extend(walk_diagnostics);
    let locations = locations?;

    let located = locations.files.len();
    let paths = locations.files.clone();
    let parsed = map_bounded(locations.files, settings.limits.concurrency, read_source).await?;

    let mut documents = Vec::with_capacity(located);
    for (path, outcome) in paths.iter().zip(parsed) {
        match outcome {
            Ok(document) => documents.push(document),
            Err(SourceFailure::Io(e)) => {
                diagnostics.record(DiagnosticKind::Io, Some(path.as_path()), e.to_string());
            }
            Err(SourceFailure::Parse(e)) => {
                diagnostics.record(DiagnosticKind::ConfigParse, Some(path.as_path()), e.message);
            }
            Err(SourceFailure::Schema(e)) => {
                diagnostics.record(DiagnosticKind::Schema, Some(path.as_path()), e.to_string());
            }
        }
    }

    info!(
        root = %locations.project_root.display(),
        located,
        parsed = documents.len(),
        "Discovered source documents"
    );

    Ok(Discovery {
        target: locations.target,
        project_root: locations.project_root,
        located,
        documents,
    })
}
