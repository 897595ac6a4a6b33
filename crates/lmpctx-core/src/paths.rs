//! Include path resolution.
//!
//! Resolution is purely lexical: `.` components are dropped and `..` pops
//! the previous component. The filesystem is never consulted, so a path that
//! traverses a symlink is judged by its spelling, not by its target.

use std::path::{Component, Path, PathBuf};

/// Errors from resolving an include path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("include path is empty")]
    Empty,

    #[error("path {} escapes project root {}", path.display(), boundary.display())]
    Traversal { path: PathBuf, boundary: PathBuf },
}

/// An absolute, normalized include path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    pub path: PathBuf,
    /// `false` when the configured path was absolute.
    pub portable: bool,
}

/// Resolve `configured` against `base_dir` (the directory holding the
/// declaring source file).
///
/// Relative results must stay inside `boundary` unless `allow_outside` is
/// set. Absolute inputs are accepted as-is and marked non-portable.
pub fn resolve(
    configured: &str,
    base_dir: &Path,
    boundary: &Path,
    allow_outside: bool,
) -> Result<ResolvedPath, PathError> {
    let trimmed = configured.trim();
    if trimmed.is_empty() {
        return Err(PathError::Empty);
    }

    let configured = Path::new(trimmed);
    if configured.is_absolute() {
        return Ok(ResolvedPath {
            path: normalize(configured),
            portable: false,
        });
    }

    let path = normalize(&base_dir.join(configured));
    if !allow_outside && !path.starts_with(normalize(boundary)) {
        return Err(PathError::Traversal {
            path,
            boundary: boundary.to_path_buf(),
        });
    }

    Ok(ResolvedPath {
        path,
        portable: true,
    })
}

/// Lexically normalize a path.
///
/// `..` at the root stays at the root; leading `..` in a relative path is
/// kept.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            Component::Normal(part) => out.push(part),
        }
    }
    out
}

/// `path` relative to `root` with `/` separators, or the full path when it
/// lies outside `root`.
pub fn display_relative(path: &Path, root: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(rel) if !rel.as_os_str().is_empty() => to_slash(rel),
        Ok(_) => ".".to_string(),
        Err(_) => to_slash(path),
    }
}

/// Join the components of `path` with `/`.
pub fn to_slash(path: &Path) -> String {
    let mut out = String::new();
    for component in path.components() {
        match component {
            Component::RootDir => out.push('/'),
            other => {
                if !out.is_empty() && !out.ends_with('/') {
                    out.push('/');
                }
                out.push_str(&other.as_os_str().to_string_lossy());
            }
        }
    }
    out
}
