//! Markdown artifact renderer.
//!
//! Section order is fixed: title and metadata, documentation, configuration
//! summary, then one block per included file. Empty sections are left out.

use std::fmt::Write as _;

use chrono::SecondsFormat;
use indexmap::IndexMap;

use crate::engine::{GenerationResult, IncludedFile};
use crate::error::EngineError;
use crate::merge::EffectiveConfig;
use crate::render::Renderer;

const DEFAULT_TITLE: &str = "Project Context";

pub struct MarkdownRenderer;

impl Renderer for MarkdownRenderer {
    fn render(&self, result: &GenerationResult) -> Result<String, EngineError> {
        let mut out = String::new();
        let title = result.config.name.as_deref().unwrap_or(DEFAULT_TITLE);
        let _ = writeln!(out, "# {title}\n");

        render_metadata(&mut out, result);

        let documentation = result.documentation.trim();
        if !documentation.is_empty() {
            out.push_str("## Documentation\n\n");
            out.push_str(documentation);
            out.push_str("\n\n");
        }

        let configuration = render_configuration(&result.config);
        if !configuration.is_empty() {
            out.push_str("## Configuration\n\n");
            out.push_str(&configuration);
        }

        if !result.included_files.is_empty() {
            out.push_str("## Files\n\n");
            for file in &result.included_files {
                render_file(&mut out, file);
            }
        }

        // Exactly one trailing newline.
        let trimmed = out.trim_end().len();
        out.truncate(trimmed);
        out.push('\n');
        Ok(out)
    }

    fn file_extension(&self) -> &'static str {
        "md"
    }
}

fn render_metadata(out: &mut String, result: &GenerationResult) {
    let meta = &result.metadata;
    let _ = writeln!(
        out,
        "- Generated: {}",
        meta.generated_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    let _ = writeln!(out, "- Root: `{}`", meta.root.display());
    let _ = writeln!(out, "- Source files: {}", meta.lmp_file_count);
    let _ = writeln!(
        out,
        "- Files: {} included of {} selected",
        result.included_files.len(),
        meta.files_processed_count
    );
    let tokens = meta.estimated_total_tokens;
    match meta.max_tokens {
        Some(max) => {
            let _ = writeln!(out, "- Estimated tokens: {tokens} / {max}");
        }
        None => {
            let _ = writeln!(out, "- Estimated tokens: {tokens}");
        }
    }
    if !result.excluded_for_budget.is_empty() {
        let skipped: Vec<&str> = result
            .excluded_for_budget
            .iter()
            .map(|c| c.relative_path.as_str())
            .collect();
        let _ = writeln!(out, "- Excluded for budget: {}", skipped.join(", "));
    }
    out.push('\n');
}

fn render_configuration(config: &EffectiveConfig) -> String {
    let mut out = String::new();

    if let Some(description) = config.description.as_deref().map(str::trim)
        && !description.is_empty()
    {
        let _ = writeln!(out, "{description}\n");
    }
    if let Some(version) = &config.version {
        let _ = writeln!(out, "**Version:** {version}\n");
    }
    render_map(&mut out, "Tech Stack", &config.tech_stack);
    render_map(&mut out, "Conventions", &config.conventions);

    if !config.ai_context.is_empty() {
        out.push_str("### AI Context\n\n");
        for (title, items) in config.ai_context.sections() {
            if items.is_empty() {
                continue;
            }
            let _ = writeln!(out, "#### {title}\n");
            for item in items {
                let _ = writeln!(out, "- {item}");
            }
            out.push('\n');
        }
    }

    if let Some(instructions) = config.ai_instructions.as_deref().map(str::trim)
        && !instructions.is_empty()
    {
        let _ = writeln!(out, "### AI Instructions\n\n{instructions}\n");
    }
    out
}

fn render_map(out: &mut String, title: &str, map: &IndexMap<String, String>) {
    if map.is_empty() {
        return;
    }
    let _ = writeln!(out, "### {title}\n");
    for (key, value) in map {
        let _ = writeln!(out, "- **{key}**: {value}");
    }
    out.push('\n');
}

fn render_file(out: &mut String, file: &IncludedFile) {
    let _ = writeln!(out, "### {}\n", file.file.relative_path);
    if let Some(description) = &file.file.description {
        let _ = writeln!(out, "{description}\n");
    }

    let fence = fence_for(&file.content);
    let _ = writeln!(out, "{fence}{}", file.language);
    out.push_str(&file.content);
    if !file.content.ends_with('\n') {
        out.push('\n');
    }
    let _ = writeln!(out, "{fence}\n");
}

/// A backtick fence longer than any backtick run inside `content`.
fn fence_for(content: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in content.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    "`".repeat((longest + 1).max(3))
}
