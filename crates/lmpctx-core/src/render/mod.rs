//! Output assembly with one renderer per output format.
//!
//! Renderers are pure: they turn a finished [`GenerationResult`] into text
//! and never touch the filesystem.

pub mod json;
pub mod markdown;

use lmpctx_config::OutputFormat;

use crate::engine::GenerationResult;
use crate::error::EngineError;

/// Renders a generation result into one output format.
pub trait Renderer {
    fn render(&self, result: &GenerationResult) -> Result<String, EngineError>;
    fn file_extension(&self) -> &'static str;
}

/// Renderer for `format`.
pub fn create_renderer(format: OutputFormat) -> Box<dyn Renderer + Send + Sync> {
    match format {
        OutputFormat::Markdown => Box::new(markdown::MarkdownRenderer),
        OutputFormat::Json => Box::new(json::JsonRenderer),
    }
}

/// Render `result` in its own output format.
pub fn assemble(result: &GenerationResult) -> Result<String, EngineError> {
    result.render()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renderer_per_format() {
        let extension = |format| create_renderer(format).file_extension();
        assert_eq!(extension(OutputFormat::Markdown), "md");
        assert_eq!(extension(OutputFormat::Json), "json");
    }

    #[test]
    fn test_assemble_uses_result_format() {
        let out = assemble(&fixtures::result(OutputFormat::Json)).unwrap();
        assert!(out.trim_start().starts_with('{'));
        let out = assemble(&fixtures::result(OutputFormat::Markdown)).unwrap();
        assert!(out.starts_with("# demo"));
    }
}
