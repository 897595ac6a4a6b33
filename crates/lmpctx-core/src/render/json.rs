//! JSON renderer for tooling integration.

use serde_json::json;

use crate::engine::GenerationResult;
use crate::error::EngineError;
use crate::render::Renderer;

pub struct JsonRenderer;

impl Renderer for JsonRenderer {
    fn render(&self, result: &GenerationResult) -> Result<String, EngineError> {
        let config = &result.config;
        let files: Vec<_> = result
            .included_files
            .iter()
            .map(|f| {
                json!({
                    "path": f.file.relative_path,
                    "description": f.file.description,
                    "priority": f.file.priority,
                    "tokens": f.file.estimated_tokens,
                    "language": f.language,
                    "content": f.content,
                })
            })
            .collect();
        let excluded: Vec<&str> = result
            .excluded_for_budget
            .iter()
            .map(|c| c.relative_path.as_str())
            .collect();

        let document = json!({
            "metadata": result.metadata,
            "documentation": result.documentation,
            "configuration": {
                "name": config.name,
                "description": config.description,
                "version": config.version,
                "tech_stack": config.tech_stack,
                "conventions": config.conventions,
                "ai_context": config.ai_context,
                "ai_instructions": config.ai_instructions,
                "exclude": config.exclude,
                "context_options": config.context_options,
            },
            "files": files,
            "excluded_for_budget": excluded,
            "diagnostics": result.diagnostics,
        });

        let mut out = serde_json::to_string_pretty(&document)?;
        out.push('\n');
        Ok(out)
    }

    fn file_extension(&self) -> &'static str {
        "json"
    }
}
