#![deny(unsafe_code)]

//! Context generation engine for lmpctx.
//!
//! Pipeline, leaves first:
//!
//! ```text
//! discover → merge → select → pack → read contents → render
//! ```
//!
//! [`Engine::generate`] runs the whole pipeline for one target directory and
//! returns a [`GenerationResult`]; [`render::create_renderer`] turns that
//! into Markdown or JSON. Every stage keeps its state local to the call.

/// Token estimation and priority packing.
pub mod budget;
mod concurrency;
/// Source document discovery across ancestors and descendants.
pub mod discovery;
/// The pipeline entry point.
pub mod engine;
/// Engine errors and diagnostics.
pub mod error;
/// Extension to language tag lookup.
pub mod language;
/// Folding source documents into one effective configuration.
pub mod merge;
/// Lexical include path resolution.
pub mod paths;
/// Include/exclude glob matching.
pub mod pattern;
/// Markdown and JSON output.
pub mod render;
/// Candidate file selection.
pub mod selection;

pub use budget::{Packed, TokenBudget, estimate_tokens, pack};
pub use discovery::{Discovery, SourceLocations, discover, locate};
pub use engine::{
    Engine, GenerationRequest, GenerationResult, IncludedFile, Metadata, Plan, SourceSummary,
    ValidationReport,
};
pub use error::{Diagnostic, DiagnosticKind, Diagnostics, EngineError, Severity};
pub use merge::{EffectiveConfig, Provenance, ScopedInclude, merge, merge_documentation};
pub use paths::{PathError, ResolvedPath, resolve};
pub use render::{Renderer, assemble, create_renderer};
pub use selection::{CandidateFile, select};
