//! The generation pipeline: discovery, merge, selection, packing and
//! content loading.
//!
//! An [`Engine`] holds nothing but its settings, so one instance can serve
//! any number of concurrent generations.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use lmpctx_config::{ConfigFormat, EngineSettings, OutputFormat};
use serde::Serialize;
use tracing::{debug, info};

use crate::budget::{self, Packed};
use crate::concurrency::map_bounded;
use crate::discovery::discover;
use crate::error::{Diagnostic, DiagnosticKind, Diagnostics, EngineError};
use crate::language::{self, Language};
use crate::merge::{EffectiveConfig, merge, merge_documentation};
use crate::render::create_renderer;
use crate::selection::{CandidateFile, select};

/// Inputs for one generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub target: PathBuf,
    /// Overrides every configured `max_tokens`.
    pub max_tokens: Option<u64>,
    /// Overrides the configured `output_format`.
    pub output_format: Option<OutputFormat>,
}

impl GenerationRequest {
    pub fn new(target: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            max_tokens: None,
            output_format: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }
}

/// What a generation would include, before any content is read.
#[derive(Debug, Clone)]
pub struct Plan {
    pub target: PathBuf,
    pub root: PathBuf,
    pub documentation: String,
    pub config: EffectiveConfig,
    /// Admitted candidates in selection order.
    pub included: Vec<CandidateFile>,
    /// Rejected candidates in admission order.
    pub excluded_for_budget: Vec<CandidateFile>,
    /// Source files found, including ones that failed to parse.
    pub lmp_file_count: usize,
    pub max_tokens: Option<u64>,
    pub output_format: OutputFormat,
    pub diagnostics: Diagnostics,
}

impl Plan {
    /// Number of candidates before packing.
    pub fn candidate_count(&self) -> usize {
        self.included.len() + self.excluded_for_budget.len()
    }

    pub fn included_tokens(&self) -> u64 {
        self.included.iter().map(|c| c.estimated_tokens).sum()
    }
}

/// An included file with its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncludedFile {
    #[serde(flatten)]
    pub file: CandidateFile,
    /// Fence language tag.
    pub language: &'static str,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub root: PathBuf,
    pub target: PathBuf,
    /// Candidates selected before budget packing.
    pub files_processed_count: usize,
    /// Source documents found, including ones that failed to parse.
    pub lmp_file_count: usize,
    /// Sum of the included files' estimates.
    pub estimated_total_tokens: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u64>,
    pub generated_at: DateTime<Utc>,
}

/// Everything one generation produced.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub documentation: String,
    pub config: EffectiveConfig,
    pub included_files: Vec<IncludedFile>,
    pub excluded_for_budget: Vec<CandidateFile>,
    pub diagnostics: Vec<Diagnostic>,
    pub output_format: OutputFormat,
    pub metadata: Metadata,
}

impl GenerationResult {
    /// Whether any source document failed to decode or validate.
    pub fn has_config_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.kind.is_config_error())
    }

    /// Render in [`GenerationResult::output_format`].
    pub fn render(&self) -> Result<String, EngineError> {
        create_renderer(self.output_format).render(self)
    }
}

/// One successfully parsed source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceSummary {
    pub path: PathBuf,
    pub format: Option<ConfigFormat>,
    pub has_documentation: bool,
    pub include_count: usize,
}

/// Result of parsing and schema-checking a project without selecting files.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationReport {
    pub root: PathBuf,
    pub lmp_file_count: usize,
    pub sources: Vec<SourceSummary>,
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        !self.diagnostics.iter().any(|d| d.kind.is_config_error())
    }
}

/// The context generation engine.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    settings: EngineSettings,
}

impl Engine {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Discover and parse every source document under `target` and check
    /// it against the schema.
    pub async fn validate(&self, target: &Path) -> Result<ValidationReport, EngineError> {
        let mut diagnostics = Diagnostics::new();
        let discovery = discover(target, &self.settings, &mut diagnostics).await?;

        let sources = discovery
            .documents
            .iter()
            .map(|doc| SourceSummary {
                path: doc.path.clone(),
                format: doc.format,
                has_documentation: doc.documentation.is_some(),
                include_count: doc.config.as_ref().map_or(0, |c| c.include.len()),
            })
            .collect();

        Ok(ValidationReport {
            root: discovery.project_root,
            lmp_file_count: discovery.located,
            sources,
            diagnostics: diagnostics.into_vec(),
        })
    }

    /// Run everything except content loading.
    pub async fn plan(&self, request: &GenerationRequest) -> Result<Plan, EngineError> {
        let mut diagnostics = Diagnostics::new();
        let discovery = discover(&request.target, &self.settings, &mut diagnostics).await?;

        let documentation = merge_documentation(&discovery.documents);
        let config = merge(&discovery.documents);
        debug!(
            includes = config.include.len(),
            excludes = config.exclude.len(),
            "Merged effective configuration"
        );

        let (config, selected, select_diagnostics) = {
            let settings = self.settings.clone();
            let root = discovery.project_root.clone();
            tokio::task::spawn_blocking(move || {
                let mut diagnostics = Diagnostics::new();
                let selected = select(&config, &root, &settings, &mut diagnostics);
                (config, selected, diagnostics)
            })
            .await?
        };
        diagnostics.extend(select_diagnostics);
        let candidates = selected?;

        let max_tokens = request
            .max_tokens
            .or(config.context_options.max_tokens)
            .or(self.settings.default_max_tokens());
        let output_format = request
            .output_format
            .or(config.context_options.output_format)
            .unwrap_or_default();

        let Packed { included, excluded } = budget::pack(candidates, max_tokens);
        for skipped in &excluded {
            diagnostics.record(
                DiagnosticKind::SkippedForBudget,
                Some(skipped.absolute_path.as_path()),
                format!(
                    "{} (~{} tokens, priority {}) did not fit the budget",
                    skipped.relative_path, skipped.estimated_tokens, skipped.priority
                ),
            );
        }

        Ok(Plan {
            target: discovery.target,
            root: discovery.project_root,
            documentation,
            config,
            included,
            excluded_for_budget: excluded,
            lmp_file_count: discovery.located,
            max_tokens,
            output_format,
            diagnostics,
        })
    }

    /// Produce the full generation result for `request`.
    ///
    /// Fails only when a named include file is missing or the target
    /// itself cannot be read. A file whose content cannot be read is
    /// dropped with an `Io` diagnostic.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, EngineError> {
        let plan = self.plan(request).await?;
        let files_processed_count = plan.candidate_count();
        let Plan {
            target,
            root,
            documentation,
            config,
            included,
            excluded_for_budget,
            lmp_file_count,
            max_tokens,
            output_format,
            mut diagnostics,
        } = plan;

        let paths: Vec<PathBuf> = included.iter().map(|c| c.absolute_path.clone()).collect();
        let contents = map_bounded(paths, self.settings.limits.concurrency, |path| async move {
            tokio::fs::read(&path).await
        })
        .await?;

        let mut included_files = Vec::with_capacity(included.len());
        let mut unknown_extensions: Vec<String> = Vec::new();
        for (file, content) in included.into_iter().zip(contents) {
            let bytes = match content {
                Ok(bytes) => bytes,
                Err(e) => {
                    diagnostics.record(
                        DiagnosticKind::Io,
                        Some(file.absolute_path.as_path()),
                        e.to_string(),
                    );
                    continue;
                }
            };
            let detected = language::detect(&file.absolute_path);
            if detected == Language::UnknownExtension
                && let Some(ext) = file.absolute_path.extension().and_then(|e| e.to_str())
            {
                let ext = ext.to_ascii_lowercase();
                if !unknown_extensions.contains(&ext) {
                    diagnostics.record(
                        DiagnosticKind::UnknownLanguage,
                        Some(file.absolute_path.as_path()),
                        format!("no language tag for .{ext}; using {}", language::PLAIN_TEXT),
                    );
                    unknown_extensions.push(ext);
                }
            }
            included_files.push(IncludedFile {
                language: detected.tag(),
                content: String::from_utf8_lossy(&bytes).into_owned(),
                file,
            });
        }

        let estimated_total_tokens: u64 =
            included_files.iter().map(|f| f.file.estimated_tokens).sum();
        info!(
            root = %root.display(),
            included = included_files.len(),
            excluded = excluded_for_budget.len(),
            tokens = estimated_total_tokens,
            "Generated context"
        );

        Ok(GenerationResult {
            documentation,
            config,
            included_files,
            excluded_for_budget,
            diagnostics: diagnostics.into_vec(),
            output_format,
            metadata: Metadata {
                root,
                target,
                files_processed_count,
                lmp_file_count,
                estimated_total_tokens,
                max_tokens,
                generated_at: Utc::now(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let root = std::fs::canonicalize(tmp.path()).unwrap();
        for (rel, content) in files {
            let path = root.join(rel);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(path, content).unwrap();
        }
        (tmp, root)
    }

    #[test_log::test(tokio::test)]
    async fn test_generate_reads_included_content() {
        let (_tmp, root) = project(&[
            (
                ".lmp",
                "# Demo\n\n```toml\nname = \"demo\"\n[[include]]\npath = \"src\"\ntype = \"dir\"\n```\n",
            ),
            ("src/main.rs", "fn main() {}\n"),
            ("src/data.xyz", "?"),
            ("src/more.xyz", "?"),
        ]);

        let result = Engine::default()
            .generate(&GenerationRequest::new(&root))
            .await
            .unwrap();

        let paths: Vec<&str> = result
            .included_files
            .iter()
            .map(|f| f.file.relative_path.as_str())
            .collect();
        assert_eq!(paths, vec!["src/data.xyz", "src/main.rs", "src/more.xyz"]);
        assert_eq!(result.included_files[1].content, "fn main() {}\n");
        assert_eq!(result.included_files[1].language, "rust");
        assert_eq!(result.included_files[0].language, "text");
        assert_eq!(result.documentation, "# Demo");
        assert_eq!(result.config.name.as_deref(), Some("demo"));
        assert_eq!(result.metadata.lmp_file_count, 1);
        assert_eq!(result.metadata.files_processed_count, 3);
        assert_eq!(result.metadata.estimated_total_tokens, 1 + 4 + 1);

        let unknown: Vec<_> = result
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::UnknownLanguage)
            .collect();
        assert_eq!(unknown.len(), 1);
    }

    #[tokio::test]
    async fn test_request_overrides_configuration() {
        let forty_bytes = "x".repeat(40);
        let (_tmp, root) = project(&[
            (
                ".lmp",
                "```json\n{\"include\": [{\"path\": \"a.txt\", \"type\": \"file\"}], \"context_options\": {\"max_tokens\": 100, \"output_format\": \"json\"}}\n```",
            ),
            ("a.txt", forty_bytes.as_str()),
        ]);
        let engine = Engine::default();

        let configured = engine.plan(&GenerationRequest::new(&root)).await.unwrap();
        assert_eq!(configured.max_tokens, Some(100));
        assert_eq!(configured.output_format, OutputFormat::Json);

        let overridden = engine
            .plan(
                &GenerationRequest::new(&root)
                    .with_max_tokens(5)
                    .with_output_format(OutputFormat::Markdown),
            )
            .await
            .unwrap();
        assert_eq!(overridden.max_tokens, Some(5));
        assert_eq!(overridden.output_format, OutputFormat::Markdown);
        assert!(overridden.included.is_empty());
        assert_eq!(overridden.excluded_for_budget.len(), 1);
        assert!(
            overridden
                .diagnostics
                .iter()
                .any(|d| d.kind == DiagnosticKind::SkippedForBudget)
        );
    }

    #[tokio::test]
    async fn test_settings_default_ceiling_applies_last() {
        let (_tmp, root) = project(&[(".lmp", "docs only")]);
        let mut settings = EngineSettings::default();
        settings.limits.default_max_tokens = 42;

        let plan = Engine::new(settings)
            .plan(&GenerationRequest::new(&root))
            .await
            .unwrap();
        assert_eq!(plan.max_tokens, Some(42));
    }

    #[tokio::test]
    async fn test_validate_reports_sources_and_errors() {
        let (_tmp, root) = project(&[
            (".lmp", "Docs\n\n```yaml\ninclude:\n  - path: a.rs\n    type: file\n```\n"),
            ("broken/.lmp", "```json\n{ nope\n```\n"),
        ]);

        let report = Engine::default().validate(&root).await.unwrap();
        assert_eq!(report.lmp_file_count, 2);
        assert_eq!(report.sources.len(), 1);
        assert_eq!(report.sources[0].format, Some(ConfigFormat::Yaml));
        assert_eq!(report.sources[0].include_count, 1);
        assert!(report.sources[0].has_documentation);
        assert!(!report.is_valid());
    }
}
