//! Turning the effective include list into candidate files.

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};

use lmpctx_config::{EngineSettings, EntryType};
use serde::Serialize;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::budget::estimate_tokens;
use crate::discovery::record_walk_error;
use crate::error::{DiagnosticKind, Diagnostics, EngineError};
use crate::merge::{EffectiveConfig, ScopedInclude};
use crate::paths::{self, PathError, display_relative};
use crate::pattern::{Admission, EntryFilter, PatternSet};

/// A file selected by an include entry, pending budget admission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateFile {
    pub absolute_path: PathBuf,
    /// Relative to the project root with `/` separators; the absolute path
    /// for files outside the root.
    pub relative_path: String,
    pub size_bytes: u64,
    pub priority: u8,
    pub description: Option<String>,
    pub estimated_tokens: u64,
    /// Index of the selecting entry in [`EffectiveConfig::include`].
    pub source_entry: usize,
}

/// Select candidate files for every include entry, in include order.
///
/// Only a `file` entry naming a missing path fails the selection. A later
/// entry that selects an already selected file replaces the earlier
/// candidate in place.
pub fn select(
    config: &EffectiveConfig,
    project_root: &Path,
    settings: &EngineSettings,
    diagnostics: &mut Diagnostics,
) -> Result<Vec<CandidateFile>, EngineError> {
    let global_exclude = compile(&config.exclude, None, diagnostics);

    let mut candidates: Vec<CandidateFile> = Vec::new();
    let mut positions: HashMap<PathBuf, usize> = HashMap::new();

    for (idx, scoped) in config.include.iter().enumerate() {
        let entry = &scoped.entry;
        let declared_in = Some(scoped.source.as_path());
        let resolved = match paths::resolve(
            &entry.path,
            &scoped.base_dir,
            project_root,
            settings.limits.allow_outside_root,
        ) {
            Ok(resolved) => resolved,
            Err(e @ PathError::Traversal { .. }) => {
                diagnostics.record(DiagnosticKind::PathTraversal, declared_in, e.to_string());
                continue;
            }
            Err(e @ PathError::Empty) => {
                diagnostics.record(DiagnosticKind::Schema, declared_in, e.to_string());
                continue;
            }
        };
        if !resolved.portable {
            diagnostics.record(
                DiagnosticKind::NonPortablePath,
                declared_in,
                format!("absolute include path {}", entry.path.trim()),
            );
        }

        let patterns = if entry.patterns.is_empty() {
            PatternSet::new(&["*"]).unwrap_or_else(|_| PatternSet::empty())
        } else {
            compile(&entry.patterns, declared_in, diagnostics)
        };
        let local_exclude = compile(&entry.exclude, declared_in, diagnostics);
        let expansion = Expansion {
            idx,
            scoped,
            filter: EntryFilter::new(patterns, local_exclude, global_exclude.clone()),
            project_root,
        };

        let selected = match entry.entry_type {
            EntryType::File => {
                let named = expansion.select_file(&resolved.path, diagnostics)?;
                named.into_iter().collect()
            }
            EntryType::Dir => expansion.select_dir(&resolved.path, settings, diagnostics),
        };

        for candidate in selected {
            match positions.get(&candidate.absolute_path) {
                Some(&pos) => {
                    debug!(
                        path = %candidate.relative_path,
                        entry = idx,
                        "Later include overrides candidate"
                    );
                    candidates[pos] = candidate;
                }
                None => {
                    positions.insert(candidate.absolute_path.clone(), candidates.len());
                    candidates.push(candidate);
                }
            }
        }
    }

    info!(
        entries = config.include.len(),
        candidates = candidates.len(),
        "Selected candidate files"
    );
    Ok(candidates)
}

fn compile(
    patterns: &[String],
    source: Option<&Path>,
    diagnostics: &mut Diagnostics,
) -> PatternSet {
    PatternSet::new(patterns).unwrap_or_else(|e| {
        diagnostics.record(DiagnosticKind::Schema, source, format!("invalid glob: {e}"));
        PatternSet::empty()
    })
}

/// One include entry being expanded into candidates.
struct Expansion<'a> {
    /// Position of the entry in the effective include list.
    idx: usize,
    scoped: &'a ScopedInclude,
    filter: EntryFilter,
    project_root: &'a Path,
}

impl Expansion<'_> {
    fn candidate(&self, path: PathBuf, size_bytes: u64) -> CandidateFile {
        CandidateFile {
            relative_path: display_relative(&path, self.project_root),
            absolute_path: path,
            size_bytes,
            priority: self.scoped.entry.priority,
            description: self.scoped.entry.description.clone(),
            estimated_tokens: estimate_tokens(size_bytes),
            source_entry: self.idx,
        }
    }

    fn root_relative<'p>(&self, path: &'p Path) -> &'p Path {
        path.strip_prefix(self.project_root).unwrap_or(path)
    }

    /// A `file` entry names exactly one file; patterns and depth do not
    /// apply, only the excludes.
    fn select_file(
        &self,
        path: &Path,
        diagnostics: &mut Diagnostics,
    ) -> Result<Option<CandidateFile>, EngineError> {
        let metadata = match std::fs::metadata(path) {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(EngineError::IncludeResolution {
                    path: path.to_path_buf(),
                    declared_in: self.scoped.source.clone(),
                });
            }
            Err(e) => {
                diagnostics.record(DiagnosticKind::Io, Some(path), e.to_string());
                return Ok(None);
            }
        };
        if !metadata.is_file() {
            let message = "file include names a directory";
            diagnostics.record(DiagnosticKind::Io, Some(path), message);
            return Ok(None);
        }

        let name = path.file_name().map(Path::new).unwrap_or(path);
        if let Some(reason) = self.filter.excluded(name, self.root_relative(path)) {
            debug!(path = %path.display(), ?reason, "Named file excluded");
            return Ok(None);
        }

        Ok(Some(self.candidate(path.to_path_buf(), metadata.len())))
    }

    fn select_dir(
        &self,
        dir: &Path,
        settings: &EngineSettings,
        diagnostics: &mut Diagnostics,
    ) -> Vec<CandidateFile> {
        if !dir.is_dir() {
            let declared_in = self.scoped.source.display();
            diagnostics.record(
                DiagnosticKind::EmptyDirectory,
                Some(dir),
                format!("directory include declared in {declared_in} does not exist"),
            );
            return Vec::new();
        }

        let mut walker = WalkDir::new(dir)
            .follow_links(settings.discovery.follow_symlinks)
            .sort_by_file_name()
            .min_depth(1);
        if let Some(depth) = self.scoped.entry.effective_depth() {
            // Depth 0 means direct children, which walkdir counts as depth 1.
            walker = walker.max_depth(depth as usize + 1);
        }

        let ignore = &settings.discovery.ignore_dirs;
        let walker = walker.into_iter().filter_entry(|e| {
            !(e.depth() > 0
                && e.file_type().is_dir()
                && e.file_name()
                    .to_str()
                    .is_some_and(|name| ignore.iter().any(|i| i == name)))
        });

        let mut selected = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    record_walk_error(&e, diagnostics);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let entry_relative = path.strip_prefix(dir).unwrap_or(path);
            let admission = self.filter.admit(entry_relative, self.root_relative(path));
            if admission != Admission::Included {
                continue;
            }

            let size = match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    record_walk_error(&e, diagnostics);
                    continue;
                }
            };
            selected.push(self.candidate(entry.into_path(), size));
        }

        if selected.is_empty() {
            diagnostics.record(
                DiagnosticKind::EmptyDirectory,
                Some(dir),
                "directory include selected no files",
            );
        } else {
            debug!(
                dir = %dir.display(),
                count = selected.len(),
                "Directory include selected files"
            );
        }
        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmpctx_config::IncludeEntry;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    type Selected = Result<Vec<CandidateFile>, EngineError>;

    struct Fixture {
        _tmp: TempDir,
        root: PathBuf,
    }

    impl Fixture {
        fn new(files: &[(&str, &str)]) -> Self {
            let tmp = TempDir::new().unwrap();
            let root = std::fs::canonicalize(tmp.path()).unwrap();
            for (rel, content) in files {
                let path = root.join(rel);
                std::fs::create_dir_all(path.parent().unwrap()).unwrap();
                std::fs::write(path, content).unwrap();
            }
            Self { _tmp: tmp, root }
        }

        fn scoped(&self, entry: IncludeEntry) -> ScopedInclude {
            self.scoped_in("", entry)
        }

        fn scoped_in(&self, dir: &str, entry: IncludeEntry) -> ScopedInclude {
            let base_dir = self.root.join(dir);
            ScopedInclude {
                entry,
                source: base_dir.join(".lmp"),
                base_dir,
            }
        }

        fn select(&self, config: &EffectiveConfig) -> (Selected, Diagnostics) {
            let settings = EngineSettings::default();
            let mut diagnostics = Diagnostics::new();
            let result = select(config, &self.root, &settings, &mut diagnostics);
            (result, diagnostics)
        }
    }

    fn config(include: Vec<ScopedInclude>) -> EffectiveConfig {
        EffectiveConfig {
            include,
            ..Default::default()
        }
    }

    fn paths_of(candidates: &[CandidateFile]) -> Vec<&str> {
        candidates
            .iter()
            .map(|c| c.relative_path.as_str())
            .collect()
    }

    fn kinds(diagnostics: &Diagnostics) -> Vec<DiagnosticKind> {
        diagnostics.iter().map(|d| d.kind).collect()
    }

    #[test]
    fn test_dir_entry_with_patterns_and_local_exclude() {
        let fx = Fixture::new(&[
            ("src/a.ts", "export {}"),
            ("src/a.test.ts", "test()"),
            ("src/b.js", "x"),
        ]);
        let entry = IncludeEntry::dir("./src/")
            .with_patterns(&["*.ts"])
            .with_exclude(&["*.test.ts"]);

        let (result, _) = fx.select(&config(vec![fx.scoped(entry)]));
        let candidates = result.unwrap();
        assert_eq!(paths_of(&candidates), vec!["src/a.ts"]);
        assert_eq!(candidates[0].size_bytes, 9);
        assert_eq!(candidates[0].estimated_tokens, 3);
        assert_eq!(candidates[0].priority, 5);
    }

    #[test]
    fn test_missing_named_file_aborts() {
        let fx = Fixture::new(&[("present.rs", "")]);
        let (result, _) = fx.select(&config(vec![
            fx.scoped(IncludeEntry::file("present.rs")),
            fx.scoped(IncludeEntry::file("missing.rs")),
        ]));
        match result {
            Err(EngineError::IncludeResolution { path, declared_in }) => {
                assert_eq!(path, fx.root.join("missing.rs"));
                assert_eq!(declared_in, fx.root.join(".lmp"));
            }
            other => panic!("expected IncludeResolution, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_or_empty_directory_is_soft() {
        let fx = Fixture::new(&[("empty/.keep", "")]);
        let (result, diagnostics) = fx.select(&config(vec![
            fx.scoped(IncludeEntry::dir("nowhere")),
            fx.scoped(IncludeEntry::dir("empty").with_patterns(&["*.rs"])),
        ]));
        assert!(result.unwrap().is_empty());
        assert_eq!(kinds(&diagnostics), [DiagnosticKind::EmptyDirectory; 2]);
    }

    #[test]
    fn test_traversal_skips_only_that_entry() {
        let fx = Fixture::new(&[("pkg/a.rs", "a"), ("b.rs", "b")]);
        let (result, diagnostics) = fx.select(&config(vec![
            fx.scoped_in("pkg", IncludeEntry::file("../../escape.rs")),
            fx.scoped_in("pkg", IncludeEntry::file("../b.rs")),
            fx.scoped_in("pkg", IncludeEntry::file("a.rs")),
        ]));
        assert_eq!(paths_of(&result.unwrap()), vec!["b.rs", "pkg/a.rs"]);
        assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::PathTraversal]);
    }

    #[test]
    fn test_global_exclude_can_drop_named_file() {
        let fx = Fixture::new(&[("secrets.env", "KEY=1"), ("main.rs", "")]);
        let mut cfg = config(vec![
            fx.scoped(IncludeEntry::file("secrets.env")),
            fx.scoped(IncludeEntry::file("main.rs")),
        ]);
        cfg.exclude = vec!["*.env".to_string()];
        let (result, _) = fx.select(&cfg);
        assert_eq!(paths_of(&result.unwrap()), vec!["main.rs"]);
    }

    #[test]
    fn test_file_entry_ignores_walk_options() {
        let fx = Fixture::new(&[("main.rs", "fn main() {}"), ("docs/guide.md", "")]);
        let mut entry = IncludeEntry::file("main.rs").with_patterns(&["*.md"]);
        entry.recursive = false;
        entry.max_depth = Some(0);

        let (result, diagnostics) = fx.select(&config(vec![fx.scoped(entry)]));
        let candidates = result.unwrap();
        assert_eq!(paths_of(&candidates), vec!["main.rs"]);
        assert_eq!(candidates[0].size_bytes, 12);
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_later_entry_overrides_metadata_in_place() {
        let fx = Fixture::new(&[("src/a.rs", "a"), ("src/b.rs", "b"), ("src/c.rs", "c")]);
        let (result, _) = fx.select(&config(vec![
            fx.scoped(IncludeEntry::dir("src")),
            fx.scoped(
                IncludeEntry::file("src/b.rs")
                    .with_priority(9)
                    .with_description("The important one"),
            ),
        ]));
        let candidates = result.unwrap();
        assert_eq!(paths_of(&candidates), ["src/a.rs", "src/b.rs", "src/c.rs"]);
        assert_eq!(candidates[1].priority, 9);
        let description = candidates[1].description.as_deref();
        assert_eq!(description, Some("The important one"));
        assert_eq!(candidates[1].source_entry, 1);
        assert_eq!(candidates[0].source_entry, 0);
    }

    #[test]
    fn test_depth_limits() {
        let fx = Fixture::new(&[
            ("d/top.rs", ""),
            ("d/one/mid.rs", ""),
            ("d/one/two/deep.rs", ""),
        ]);

        let mut flat = IncludeEntry::dir("d");
        flat.recursive = false;
        let (result, _) = fx.select(&config(vec![fx.scoped(flat)]));
        assert_eq!(paths_of(&result.unwrap()), vec!["d/top.rs"]);

        let mut one = IncludeEntry::dir("d");
        one.max_depth = Some(1);
        let (result, _) = fx.select(&config(vec![fx.scoped(one)]));
        assert_eq!(paths_of(&result.unwrap()), vec!["d/one/mid.rs", "d/top.rs"]);

        let (result, _) = fx.select(&config(vec![fx.scoped(IncludeEntry::dir("d"))]));
        assert_eq!(result.unwrap().len(), 3);
    }

    #[test]
    fn test_ignored_dirs_not_walked() {
        let fx = Fixture::new(&[("web/index.js", ""), ("web/node_modules/x/y.js", "")]);
        let (result, _) = fx.select(&config(vec![fx.scoped(IncludeEntry::dir("web"))]));
        assert_eq!(paths_of(&result.unwrap()), vec!["web/index.js"]);
    }

    #[test]
    fn test_absolute_path_flagged_non_portable() {
        let fx = Fixture::new(&[("abs.txt", "x")]);
        let absolute = fx.root.join("abs.txt");
        let (result, diagnostics) = fx.select(&config(vec![
            fx.scoped(IncludeEntry::file(absolute.to_str().unwrap())),
        ]));
        assert_eq!(paths_of(&result.unwrap()), vec!["abs.txt"]);
        assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::NonPortablePath]);
    }
}
