//! Configuration builders for tests.
//!
//! [`TestConfigBuilder`] builds the [`ParsedConfig`] carried by a source
//! document; [`TestSettingsBuilder`] builds the engine's own
//! [`EngineSettings`].

use lmpctx_config::{
    ConfigFormat, EngineSettings, IncludeEntry, MergeStrategy, OutputFormat, ParsedConfig,
};

/// Fluent builder for [`ParsedConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .name("api")
///     .include(IncludeEntry::dir("src").with_patterns(&["*.rs"]))
///     .max_tokens(2000)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: ParsedConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ParsedConfig::default(),
        }
    }

    pub fn name(mut self, name: &str) -> Self {
        self.config.name = Some(name.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.config.description = Some(description.to_string());
        self
    }

    pub fn include(mut self, entry: IncludeEntry) -> Self {
        self.config.include.push(entry);
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.config.exclude.push(pattern.to_string());
        self
    }

    pub fn tech(mut self, key: &str, value: &str) -> Self {
        let stack = &mut self.config.tech_stack;
        stack.insert(key.to_string(), value.to_string());
        self
    }

    pub fn max_tokens(mut self, max_tokens: u64) -> Self {
        self.config.context_options.max_tokens = Some(max_tokens);
        self
    }

    pub fn strategy(mut self, strategy: MergeStrategy) -> Self {
        self.config.context_options.merge_strategy = Some(strategy);
        self
    }

    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.config.context_options.output_format = Some(format);
        self
    }

    pub fn build(self) -> ParsedConfig {
        self.config
    }

    /// Full source document text: `docs`, a blank line, then the
    /// configuration fenced in `format`.
    ///
    /// Panics if serialization fails; only for tests.
    pub fn to_source(self, docs: &str, format: ConfigFormat) -> String {
        let fenced = self
            .config
            .to_fenced(format)
            .expect("failed to serialize test config");
        if docs.is_empty() {
            fenced
        } else {
            format!("{docs}\n\n{fenced}")
        }
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Fluent builder for [`EngineSettings`] in tests.
pub struct TestSettingsBuilder {
    settings: EngineSettings,
}

impl TestSettingsBuilder {
    pub fn new() -> Self {
        Self {
            settings: EngineSettings::default(),
        }
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.settings.limits.concurrency = n;
        self
    }

    pub fn allow_outside_root(mut self, allow: bool) -> Self {
        self.settings.limits.allow_outside_root = allow;
        self
    }

    pub fn default_max_tokens(mut self, max_tokens: u64) -> Self {
        self.settings.limits.default_max_tokens = max_tokens;
        self
    }

    pub fn source_extension(mut self, extension: &str) -> Self {
        self.settings.discovery.source_extension = extension.to_string();
        self
    }

    pub fn build(self) -> EngineSettings {
        self.settings
    }
}

impl Default for TestSettingsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
