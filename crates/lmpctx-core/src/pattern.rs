//! Glob include/exclude matching.
//!
//! `*` and `?` never cross `/`; `**` does; `[...]` and `{a,b}` are supported.
//! A pattern without `/` is matched against the file name, the way ignore
//! files treat bare names, while a pattern containing `/` is matched against
//! the whole relative path. For excludes, a bare pattern also matches any
//! directory component, so `build` excludes everything under `build/`.
//!
//! Exclusion always wins: [`EntryFilter::admit`] checks excludes before
//! includes and there is no negation syntax.

use std::path::{Component, Path};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

/// A compiled set of patterns split into name-only and path patterns.
#[derive(Debug, Clone)]
pub struct PatternSet {
    names: GlobSet,
    paths: GlobSet,
    len: usize,
}

impl PatternSet {
    /// Compile `patterns`. A leading `./` is ignored and a trailing `/`
    /// means "everything below".
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, globset::Error> {
        let mut names = GlobSetBuilder::new();
        let mut paths = GlobSetBuilder::new();

        for raw in patterns {
            let pattern = raw.as_ref().trim();
            let pattern = pattern.strip_prefix("./").unwrap_or(pattern);
            if pattern.is_empty() {
                continue;
            }
            if let Some(dir) = pattern.strip_suffix('/') {
                paths.add(glob(&format!("{dir}/**"))?);
                if !dir.contains('/') {
                    names.add(glob(dir)?);
                }
            } else if pattern.contains('/') {
                paths.add(glob(pattern)?);
            } else {
                names.add(glob(pattern)?);
            }
        }

        Ok(Self {
            names: names.build()?,
            paths: paths.build()?,
            len: patterns.len(),
        })
    }

    /// An empty set, matching nothing.
    pub fn empty() -> Self {
        Self {
            names: GlobSet::empty(),
            paths: GlobSet::empty(),
            len: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Include-style match: name patterns against the file name, path
    /// patterns against `relative`.
    pub fn matches(&self, relative: &Path) -> bool {
        self.paths.is_match(relative)
            || relative
                .file_name()
                .is_some_and(|name| self.names.is_match(Path::new(name)))
    }

    /// Exclude-style match: like [`PatternSet::matches`], with name patterns
    /// also tried against every directory component.
    pub fn matches_any_component(&self, relative: &Path) -> bool {
        self.paths.is_match(relative)
            || relative.components().any(|c| match c {
                Component::Normal(part) => self.names.is_match(Path::new(part)),
                _ => false,
            })
    }
}

fn glob(pattern: &str) -> Result<globset::Glob, globset::Error> {
    GlobBuilder::new(pattern).literal_separator(true).build()
}

/// Whether `relative_path` matches at least one of `patterns`.
///
/// Patterns that fail to compile never match; configurations are validated
/// before they reach selection.
pub fn matches(relative_path: &str, patterns: &[String]) -> bool {
    PatternSet::new(patterns).is_ok_and(|set| set.matches(Path::new(relative_path)))
}

/// Whether `relative_path` is excluded by any of `excludes`.
pub fn excluded(relative_path: &str, excludes: &[String]) -> bool {
    PatternSet::new(excludes).is_ok_and(|set| set.matches_any_component(Path::new(relative_path)))
}

/// Outcome of filtering one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Included,
    NotMatched,
    ExcludedByEntry,
    ExcludedGlobally,
}

/// The full filter for one include entry: its patterns, its local excludes
/// and the global excludes.
#[derive(Debug, Clone)]
pub struct EntryFilter {
    include: PatternSet,
    local_exclude: PatternSet,
    global_exclude: PatternSet,
}

impl EntryFilter {
    pub fn new(include: PatternSet, local_exclude: PatternSet, global_exclude: PatternSet) -> Self {
        Self {
            include,
            local_exclude,
            global_exclude,
        }
    }

    /// Filter a file. `entry_relative` is relative to the include entry's
    /// directory, `root_relative` to the project root. Excludes are tried
    /// against both; includes only against `entry_relative`.
    pub fn admit(&self, entry_relative: &Path, root_relative: &Path) -> Admission {
        let hit = |set: &PatternSet| {
            set.matches_any_component(entry_relative) || set.matches_any_component(root_relative)
        };
        if hit(&self.local_exclude) {
            Admission::ExcludedByEntry
        } else if hit(&self.global_exclude) {
            Admission::ExcludedGlobally
        } else if self.include.matches(entry_relative) {
            Admission::Included
        } else {
            Admission::NotMatched
        }
    }

    /// Exclude-only check, for explicitly named files.
    pub fn excluded(&self, entry_relative: &Path, root_relative: &Path) -> Option<Admission> {
        match self.admit(entry_relative, root_relative) {
            a @ (Admission::ExcludedByEntry | Admission::ExcludedGlobally) => Some(a),
            _ => None,
        }
    }
}
