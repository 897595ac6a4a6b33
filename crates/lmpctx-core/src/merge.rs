//! Merge resolution across the discovered scopes.
//!
//! Documents are folded left to right in discovery order. The accumulator is
//! the more general (parent) state and each document is the more specific
//! (child) state; the child's own `merge_strategy` picks the fold:
//!
//! - `inherit`: child scalars override, collections concatenate parent
//!   first.
//! - `replace`: child scalars override, and a non-empty child collection
//!   supersedes the parent's.
//! - `append`: `description` and `ai_instructions` are joined with a blank
//!   line, `name`, `version` and the options only fill gaps, and collections
//!   concatenate.
//!
//! Fields the child leaves unset always fall back to the parent. Because the
//! fold is ordered, `merge(a, b)` and `merge(b, a)` generally differ: the
//! later, more specific document is the last writer.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use lmpctx_config::{
    AiContext, ContextOptions, EntryType, IncludeEntry, MergeStrategy, ParsedConfig,
    SourceDocument,
};
use serde::Serialize;
use tracing::debug;

use crate::paths::normalize;

/// An include entry together with the scope that declared it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopedInclude {
    pub entry: IncludeEntry,
    /// Directory of the declaring source file; relative paths resolve here.
    pub base_dir: PathBuf,
    /// The declaring source file.
    pub source: PathBuf,
}

impl ScopedInclude {
    /// Identity used to detect duplicates: lexically resolved path plus type.
    fn key(&self) -> (PathBuf, EntryType) {
        (
            normalize(&self.base_dir.join(self.entry.path.trim())),
            self.entry.entry_type,
        )
    }
}

/// Which source files wrote each field, in write order.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    fields: BTreeMap<&'static str, Vec<PathBuf>>,
}

impl Provenance {
    /// `field` now comes from `source` alone.
    fn set(&mut self, field: &'static str, source: &Path) {
        self.fields.insert(field, vec![source.to_path_buf()]);
    }

    /// `source` contributed to `field` alongside earlier writers.
    fn add(&mut self, field: &'static str, source: &Path) {
        let sources = self.fields.entry(field).or_default();
        if sources.last().map(PathBuf::as_path) != Some(source) {
            sources.push(source.to_path_buf());
        }
    }

    /// Source files that contributed to `field`.
    pub fn sources(&self, field: &str) -> &[PathBuf] {
        self.fields.get(field).map_or(&[], Vec::as_slice)
    }
}

/// The single configuration produced by folding every discovered document.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
pub struct EffectiveConfig {
    pub name: Option<String>,
    pub description: Option<String>,
    pub version: Option<String>,
    pub include: Vec<ScopedInclude>,
    pub exclude: Vec<String>,
    pub tech_stack: IndexMap<String, String>,
    pub conventions: IndexMap<String, String>,
    pub ai_context: AiContext,
    pub ai_instructions: Option<String>,
    pub context_options: ContextOptions,
    /// Unknown keys, later documents overriding earlier ones.
    pub extra: BTreeMap<String, serde_json::Value>,
    #[serde(skip)]
    pub provenance: Provenance,
}

impl EffectiveConfig {
    /// The effective values in source-document shape, for display. Include
    /// paths are kept as authored and lose their declaring scope.
    pub fn to_parsed_config(&self) -> ParsedConfig {
        ParsedConfig {
            name: self.name.clone(),
            description: self.description.clone(),
            version: self.version.clone(),
            include: self.include.iter().map(|i| i.entry.clone()).collect(),
            exclude: self.exclude.clone(),
            tech_stack: self.tech_stack.clone(),
            conventions: self.conventions.clone(),
            ai_context: (!self.ai_context.is_empty()).then(|| self.ai_context.clone()),
            ai_instructions: self.ai_instructions.clone(),
            context_options: self.context_options,
            extra: self.extra.clone(),
        }
    }
}

/// Fold `documents` (in discovery order) into one effective configuration.
///
/// Documents without a configuration section contribute nothing here; their
/// text still reaches [`merge_documentation`].
pub fn merge(documents: &[SourceDocument]) -> EffectiveConfig {
    let mut acc = EffectiveConfig::default();
    for doc in documents {
        let Some(config) = &doc.config else {
            continue;
        };
        let scope = Scope {
            config,
            base_dir: doc.dir(),
            source: &doc.path,
        };
        let strategy = config.context_options.strategy();
        debug!(source = %doc.path.display(), %strategy, "Merging scope");
        match strategy {
            MergeStrategy::Inherit => {
                override_scalars(&mut acc, &scope);
                concat_collections(&mut acc, &scope);
            }
            MergeStrategy::Replace => {
                override_scalars(&mut acc, &scope);
                replace_collections(&mut acc, &scope);
            }
            MergeStrategy::Append => {
                append_scalars(&mut acc, &scope);
                concat_collections(&mut acc, &scope);
            }
        }
        fold_common(&mut acc, &scope);
    }
    acc
}

/// Concatenate every document's documentation in discovery order,
/// separated by a blank line. Independent of merge strategy.
pub fn merge_documentation(documents: &[SourceDocument]) -> String {
    documents
        .iter()
        .filter_map(|d| d.documentation.as_deref())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The child side of one fold step.
struct Scope<'a> {
    config: &'a ParsedConfig,
    base_dir: &'a Path,
    source: &'a Path,
}

impl Scope<'_> {
    fn includes(&self) -> impl Iterator<Item = ScopedInclude> + '_ {
        self.config.include.iter().map(|entry| ScopedInclude {
            entry: entry.clone(),
            base_dir: self.base_dir.to_path_buf(),
            source: self.source.to_path_buf(),
        })
    }
}

/// Scalar writes for one fold step, recorded in the provenance as they land.
struct FieldWriter<'a> {
    source: &'a Path,
    prov: &'a mut Provenance,
}

impl<'a> FieldWriter<'a> {
    fn new(source: &'a Path, prov: &'a mut Provenance) -> Self {
        Self { source, prov }
    }

    /// The child's value wins when it has one.
    fn overwrite<T: Clone>(
        &mut self,
        field: &mut Option<T>,
        child: &Option<T>,
        name: &'static str,
    ) {
        if child.is_some() {
            *field = child.clone();
            self.prov.set(name, self.source);
        }
    }

    /// The child's value is used only when the parent has none.
    fn fill_gap<T: Clone>(
        &mut self,
        field: &mut Option<T>,
        child: &Option<T>,
        name: &'static str,
    ) {
        if field.is_none() && child.is_some() {
            *field = child.clone();
            self.prov.set(name, self.source);
        }
    }

    /// The child's text goes after the parent's, separated by a blank line.
    fn join_text(
        &mut self,
        field: &mut Option<String>,
        child: &Option<String>,
        name: &'static str,
    ) {
        let Some(text) = child.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return;
        };
        match field {
            Some(existing) if !existing.trim().is_empty() => {
                existing.push_str("\n\n");
                existing.push_str(text);
                self.prov.add(name, self.source);
            }
            _ => {
                *field = Some(text.to_string());
                self.prov.set(name, self.source);
            }
        }
    }
}

/// Scalars and options for `inherit` and `replace`.
fn override_scalars(acc: &mut EffectiveConfig, scope: &Scope<'_>) {
    let c = scope.config;
    let child_opts = &c.context_options;
    let opts = &mut acc.context_options;
    let mut w = FieldWriter::new(scope.source, &mut acc.provenance);
    w.overwrite(&mut acc.name, &c.name, "name");
    w.overwrite(&mut acc.description, &c.description, "description");
    w.overwrite(&mut acc.version, &c.version, "version");
    w.overwrite(
        &mut acc.ai_instructions,
        &c.ai_instructions,
        "ai_instructions",
    );
    w.overwrite(&mut opts.max_tokens, &child_opts.max_tokens, "max_tokens");
    w.overwrite(
        &mut opts.output_format,
        &child_opts.output_format,
        "output_format",
    );
}

/// Scalars and options for `append`.
fn append_scalars(acc: &mut EffectiveConfig, scope: &Scope<'_>) {
    let c = scope.config;
    let child_opts = &c.context_options;
    let opts = &mut acc.context_options;
    let mut w = FieldWriter::new(scope.source, &mut acc.provenance);
    w.join_text(&mut acc.description, &c.description, "description");
    w.join_text(
        &mut acc.ai_instructions,
        &c.ai_instructions,
        "ai_instructions",
    );
    w.fill_gap(&mut acc.name, &c.name, "name");
    w.fill_gap(&mut acc.version, &c.version, "version");
    w.fill_gap(&mut opts.max_tokens, &child_opts.max_tokens, "max_tokens");
    w.fill_gap(
        &mut opts.output_format,
        &child_opts.output_format,
        "output_format",
    );
}

/// Steps shared by every strategy: the recorded strategy and unknown keys.
fn fold_common(acc: &mut EffectiveConfig, scope: &Scope<'_>) {
    let c = scope.config;
    if let Some(strategy) = c.context_options.merge_strategy {
        acc.context_options.merge_strategy = Some(strategy);
        acc.provenance.set("merge_strategy", scope.source);
    }
    for (key, value) in &c.extra {
        acc.extra.insert(key.clone(), value.clone());
    }
}

/// Parent entries first, child entries appended.
fn concat_collections(acc: &mut EffectiveConfig, scope: &Scope<'_>) {
    let c = scope.config;
    let prov = &mut acc.provenance;
    if !c.include.is_empty() {
        push_includes(&mut acc.include, scope.includes());
        prov.add("include", scope.source);
    }
    if !c.exclude.is_empty() {
        acc.exclude.extend(c.exclude.iter().cloned());
        prov.add("exclude", scope.source);
    }
    if !c.tech_stack.is_empty() {
        extend_map(&mut acc.tech_stack, &c.tech_stack);
        prov.add("tech_stack", scope.source);
    }
    if !c.conventions.is_empty() {
        extend_map(&mut acc.conventions, &c.conventions);
        prov.add("conventions", scope.source);
    }
    if let Some(child) = &c.ai_context
        && !child.is_empty()
    {
        let lists = acc.ai_context.lists_mut();
        for (list, new) in lists.into_iter().zip(child_lists(child)) {
            list.extend(new.iter().cloned());
        }
        prov.add("ai_context", scope.source);
    }
}

/// A non-empty child collection supersedes the parent's. An empty one,
/// including an explicit `[]`, leaves the parent's in place.
fn replace_collections(acc: &mut EffectiveConfig, scope: &Scope<'_>) {
    let c = scope.config;
    let prov = &mut acc.provenance;
    if !c.include.is_empty() {
        acc.include.clear();
        push_includes(&mut acc.include, scope.includes());
        prov.set("include", scope.source);
    }
    if !c.exclude.is_empty() {
        acc.exclude = c.exclude.clone();
        prov.set("exclude", scope.source);
    }
    if !c.tech_stack.is_empty() {
        acc.tech_stack = c.tech_stack.clone();
        prov.set("tech_stack", scope.source);
    }
    if !c.conventions.is_empty() {
        acc.conventions = c.conventions.clone();
        prov.set("conventions", scope.source);
    }
    if let Some(child) = &c.ai_context {
        let lists = acc.ai_context.lists_mut();
        for (list, new) in lists.into_iter().zip(child_lists(child)) {
            if !new.is_empty() {
                *list = new.to_vec();
            }
        }
        if !child.is_empty() {
            prov.set("ai_context", scope.source);
        }
    }
}

fn child_lists(ctx: &AiContext) -> [&[String]; 6] {
    ctx.sections().map(|(_, list)| list)
}

/// Append `new` entries; an entry with the same resolved path and type as an
/// existing one replaces it at the existing position.
fn push_includes(target: &mut Vec<ScopedInclude>, new: impl Iterator<Item = ScopedInclude>) {
    for include in new {
        let key = include.key();
        match target.iter().position(|existing| existing.key() == key) {
            Some(idx) => target[idx] = include,
            None => target.push(include),
        }
    }
}

/// Existing keys keep their position and take the child's value.
fn extend_map(target: &mut IndexMap<String, String>, child: &IndexMap<String, String>) {
    for (key, value) in child {
        target.insert(key.clone(), value.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lmpctx_config::OutputFormat;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn doc(path: &str, config: ParsedConfig) -> SourceDocument {
        SourceDocument {
            path: PathBuf::from(path),
            documentation: None,
            config: Some(config),
            format: None,
        }
    }

    fn with_strategy(mut config: ParsedConfig, strategy: MergeStrategy) -> ParsedConfig {
        config.context_options.merge_strategy = Some(strategy);
        config
    }

    fn include_paths(config: &EffectiveConfig) -> Vec<&str> {
        config
            .include
            .iter()
            .map(|i| i.entry.path.as_str())
            .collect()
    }

    #[test]
    fn test_descendant_without_options_keeps_ancestor_max_tokens() {
        let mut root = ParsedConfig::default();
        root.context_options.max_tokens = Some(1000);
        let child = ParsedConfig {
            name: Some("child".to_string()),
            ..Default::default()
        };

        let merged = merge(&[doc("/p/.lmp", root), doc("/p/sub/.lmp", child)]);
        assert_eq!(merged.context_options.max_tokens, Some(1000));
        assert_eq!(
            merged.provenance.sources("max_tokens"),
            [PathBuf::from("/p/.lmp")]
        );
    }

    #[test]
    fn test_replace_drops_ancestor_includes() {
        let root = ParsedConfig {
            include: vec![IncludeEntry::dir(".").with_patterns(&["*.py"])],
            ..Default::default()
        };
        let docs = IncludeEntry::dir(".").with_patterns(&["*.md"]);
        let child = ParsedConfig {
            include: vec![docs.with_priority(8)],
            ..Default::default()
        };
        let child = with_strategy(child, MergeStrategy::Replace);

        let merged = merge(&[doc("/p/.lmp", root), doc("/p/docs/.lmp", child)]);
        assert_eq!(merged.include.len(), 1);
        assert_eq!(merged.include[0].entry.patterns, vec!["*.md"]);
        assert_eq!(merged.include[0].entry.priority, 8);
        assert_eq!(merged.include[0].base_dir, PathBuf::from("/p/docs"));
    }

    #[test]
    fn test_replace_falls_back_for_unset_fields() {
        let mut root = ParsedConfig {
            name: Some("root".to_string()),
            exclude: vec!["*.log".to_string()],
            ..Default::default()
        };
        root.tech_stack.insert("rust".into(), "1.93".into());
        let child = with_strategy(
            ParsedConfig {
                description: Some("child".to_string()),
                ..Default::default()
            },
            MergeStrategy::Replace,
        );

        let merged = merge(&[doc("/p/.lmp", root), doc("/p/a/.lmp", child)]);
        assert_eq!(merged.name.as_deref(), Some("root"));
        assert_eq!(merged.description.as_deref(), Some("child"));
        assert_eq!(merged.exclude, vec!["*.log"]);
        assert_eq!(merged.tech_stack["rust"], "1.93");
    }

    #[test]
    fn test_replace_with_explicit_empty_lists_keeps_parent_lists() {
        let root = ParsedConfig {
            include: vec![IncludeEntry::dir("src")],
            exclude: vec!["*.log".to_string()],
            ..Default::default()
        };
        let child: ParsedConfig = serde_json::from_value(json!({
            "include": [],
            "exclude": [],
            "context_options": { "merge_strategy": "replace" },
        }))
        .unwrap();
        assert!(child.include.is_empty());

        let merged = merge(&[doc("/p/.lmp", root), doc("/p/a/.lmp", child)]);
        assert_eq!(include_paths(&merged), vec!["src"]);
        assert_eq!(merged.exclude, vec!["*.log"]);
        let root_only = [PathBuf::from("/p/.lmp")];
        assert_eq!(merged.provenance.sources("include"), root_only);
        assert_eq!(merged.context_options.strategy(), MergeStrategy::Replace);
    }

    #[test]
    fn test_inherit_concatenates_collections_and_overrides_scalars() {
        let mut root = ParsedConfig {
            name: Some("root".to_string()),
            include: vec![IncludeEntry::file("README.md")],
            exclude: vec!["*.log".to_string()],
            ..Default::default()
        };
        root.tech_stack.insert("rust".into(), "1.90".into());
        root.tech_stack.insert("tokio".into(), "1".into());

        let mut child = ParsedConfig {
            name: Some("child".to_string()),
            include: vec![IncludeEntry::dir("src")],
            exclude: vec!["*.tmp".to_string()],
            ..Default::default()
        };
        child.tech_stack.insert("rust".into(), "1.93".into());
        child.tech_stack.insert("serde".into(), "1".into());

        let merged = merge(&[doc("/p/.lmp", root), doc("/p/a/.lmp", child)]);
        assert_eq!(merged.name.as_deref(), Some("child"));
        assert_eq!(include_paths(&merged), vec!["README.md", "src"]);
        assert_eq!(merged.exclude, vec!["*.log", "*.tmp"]);
        let stack: Vec<(&str, &str)> = merged
            .tech_stack
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(stack, [("rust", "1.93"), ("tokio", "1"), ("serde", "1")]);
        assert_eq!(
            merged.provenance.sources("include"),
            [PathBuf::from("/p/.lmp"), PathBuf::from("/p/a/.lmp")]
        );
    }

    #[test]
    fn test_duplicate_include_replaced_in_place() {
        let root = ParsedConfig {
            include: vec![
                IncludeEntry::file("a.rs").with_priority(2),
                IncludeEntry::file("b.rs"),
            ],
            ..Default::default()
        };
        // Same resolved path (/p/a.rs) spelled from a child scope.
        let child = ParsedConfig {
            include: vec![
                IncludeEntry::file("../a.rs").with_priority(9),
                IncludeEntry::dir("../a.rs"),
            ],
            ..Default::default()
        };

        let merged = merge(&[doc("/p/.lmp", root), doc("/p/sub/.lmp", child)]);
        assert_eq!(include_paths(&merged), vec!["../a.rs", "b.rs", "../a.rs"]);
        assert_eq!(merged.include[0].entry.priority, 9);
        assert_eq!(merged.include[2].entry.entry_type, EntryType::Dir);
    }

    #[test]
    fn test_append_joins_narrative_and_fills_gaps() {
        let mut root = ParsedConfig {
            name: Some("root".to_string()),
            description: Some("Root description.".to_string()),
            ..Default::default()
        };
        root.context_options.max_tokens = Some(500);
        let mut child = with_strategy(
            ParsedConfig {
                name: Some("child".to_string()),
                version: Some("2.0".to_string()),
                description: Some("Child addendum.".to_string()),
                ai_instructions: Some("Prefer small diffs.".to_string()),
                ..Default::default()
            },
            MergeStrategy::Append,
        );
        child.context_options.max_tokens = Some(9000);
        child.context_options.output_format = Some(OutputFormat::Json);

        let merged = merge(&[doc("/p/.lmp", root), doc("/p/a/.lmp", child)]);
        assert_eq!(
            merged.description.as_deref(),
            Some("Root description.\n\nChild addendum.")
        );
        assert_eq!(
            merged.ai_instructions.as_deref(),
            Some("Prefer small diffs.")
        );
        assert_eq!(merged.name.as_deref(), Some("root"));
        assert_eq!(merged.version.as_deref(), Some("2.0"));
        let opts = merged.context_options;
        assert_eq!(opts.max_tokens, Some(500));
        assert_eq!(opts.output_format, Some(OutputFormat::Json));
        assert_eq!(opts.merge_strategy, Some(MergeStrategy::Append));
        assert_eq!(merged.provenance.sources("description").len(), 2);
    }

    #[test]
    fn test_ai_context_lists_concatenate_or_replace() {
        let root = ParsedConfig {
            ai_context: Some(AiContext {
                focus_areas: vec!["api".to_string()],
                avoid: vec!["unsafe".to_string()],
                ..Default::default()
            }),
            ..Default::default()
        };
        let child = ParsedConfig {
            ai_context: Some(AiContext {
                focus_areas: vec!["cli".to_string()],
                ..Default::default()
            }),
            ..Default::default()
        };

        let inherited = merge(&[
            doc("/p/.lmp", root.clone()),
            doc("/p/a/.lmp", child.clone()),
        ]);
        assert_eq!(inherited.ai_context.focus_areas, vec!["api", "cli"]);
        assert_eq!(inherited.ai_context.avoid, vec!["unsafe"]);

        let child = with_strategy(child, MergeStrategy::Replace);
        let replaced = merge(&[doc("/p/.lmp", root), doc("/p/a/.lmp", child)]);
        assert_eq!(replaced.ai_context.focus_areas, vec!["cli"]);
        assert_eq!(replaced.ai_context.avoid, vec!["unsafe"]);
    }

    #[test]
    fn test_order_not_alphabet_decides_precedence() {
        let a = ParsedConfig {
            name: Some("a".to_string()),
            ..Default::default()
        };
        let b = with_strategy(
            ParsedConfig {
                name: Some("b".to_string()),
                ..Default::default()
            },
            MergeStrategy::Replace,
        );

        let ab = merge(&[doc("/p/a.lmp", a.clone()), doc("/p/b.lmp", b.clone())]);
        let ba = merge(&[doc("/p/b.lmp", b), doc("/p/a.lmp", a)]);
        assert_eq!(ab.name.as_deref(), Some("b"));
        assert_eq!(ba.name.as_deref(), Some("a"));
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_documentation_joined_regardless_of_strategy() {
        let mut root = doc("/p/.lmp", ParsedConfig::default());
        root.documentation = Some("# Root".to_string());
        let replace = with_strategy(ParsedConfig::default(), MergeStrategy::Replace);
        let mut child = doc("/p/a/.lmp", replace);
        child.documentation = Some("## Child".to_string());
        let docs_only = SourceDocument {
            path: PathBuf::from("/p/b/.lmp"),
            documentation: Some("Plain notes".to_string()),
            config: None,
            format: None,
        };

        let documents = [root, child, docs_only];
        assert_eq!(
            merge_documentation(&documents),
            "# Root\n\n## Child\n\nPlain notes"
        );
        assert_eq!(merge(&documents), merge(&documents[..2]));
    }

    #[test]
    fn test_unknown_keys_later_wins() {
        let mut root = ParsedConfig::default();
        root.extra.insert("owner".into(), json!("root-team"));
        let mut child = ParsedConfig::default();
        child.extra.insert("owner".into(), json!("child-team"));

        let merged = merge(&[doc("/p/.lmp", root), doc("/p/a/.lmp", child)]);
        assert_eq!(merged.extra["owner"], "child-team");
    }
}
