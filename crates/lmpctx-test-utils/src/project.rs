//! Temporary project trees for engine tests.

use std::path::{Path, PathBuf};

use lmpctx_config::EngineSettings;
use lmpctx_core::{Engine, EngineError, GenerationRequest, GenerationResult};
use tempfile::TempDir;

/// A project tree in a temporary directory.
///
/// The directory is deleted when this value is dropped, even on panic.
/// `root` is canonicalized so it compares equal to the paths the engine
/// reports.
pub struct TestProject {
    pub root: PathBuf,
    _temp_dir: TempDir,
}

impl TestProject {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let root = std::fs::canonicalize(temp_dir.path()).expect("failed to canonicalize temp dir");
        Self {
            root,
            _temp_dir: temp_dir,
        }
    }

    /// Write `content` to `rel`, creating parent directories.
    pub fn file(&self, rel: &str, content: &str) -> &Self {
        let path = self.root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dirs");
        }
        std::fs::write(&path, content).expect("failed to write test file");
        self
    }

    /// Write a file of `bytes` bytes.
    pub fn sized(&self, rel: &str, bytes: usize) -> &Self {
        self.file(rel, &"x".repeat(bytes))
    }

    /// Write a `.lmp` source document into directory `dir` (`""` for the root).
    pub fn source(&self, dir: &str, text: &str) -> &Self {
        let rel = if dir.is_empty() {
            ".lmp".to_string()
        } else {
            format!("{}/.lmp", dir.trim_end_matches('/'))
        };
        self.file(&rel, text)
    }

    /// Create an empty directory.
    pub fn dir(&self, rel: &str) -> &Self {
        std::fs::create_dir_all(self.root.join(rel)).expect("failed to create dir");
        self
    }

    pub fn path(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Run a default engine against `target` (relative to the root).
    pub async fn generate(&self, target: &str) -> Result<GenerationResult, EngineError> {
        let request = GenerationRequest::new(self.path(target));
        self.generate_with(EngineSettings::default(), request).await
    }

    pub async fn generate_with(
        &self,
        settings: EngineSettings,
        request: GenerationRequest,
    ) -> Result<GenerationResult, EngineError> {
        Engine::new(settings).generate(&request).await
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}
