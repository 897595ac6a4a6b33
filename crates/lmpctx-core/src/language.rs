//! File-extension to fence language tag lookup.

use std::path::Path;

/// Tag used for files with no known language.
pub const PLAIN_TEXT: &str = "text";

/// Well-known file names without a telling extension.
const FILE_NAMES: &[(&str, &str)] = &[
    ("Dockerfile", "dockerfile"),
    ("Containerfile", "dockerfile"),
    ("Makefile", "makefile"),
    ("GNUmakefile", "makefile"),
    ("CMakeLists.txt", "cmake"),
    ("Justfile", "just"),
    ("justfile", "just"),
    ("Gemfile", "ruby"),
    ("Rakefile", "ruby"),
    ("Vagrantfile", "ruby"),
    ("Jenkinsfile", "groovy"),
];

const EXTENSIONS: &[(&str, &str)] = &[
    ("bash", "bash"),
    ("c", "c"),
    ("cc", "cpp"),
    ("cfg", "ini"),
    ("cjs", "javascript"),
    ("clj", "clojure"),
    ("cpp", "cpp"),
    ("cs", "csharp"),
    ("css", "css"),
    ("csv", "csv"),
    ("cxx", "cpp"),
    ("dart", "dart"),
    ("dockerfile", "dockerfile"),
    ("erl", "erlang"),
    ("ex", "elixir"),
    ("exs", "elixir"),
    ("fish", "fish"),
    ("go", "go"),
    ("gradle", "groovy"),
    ("graphql", "graphql"),
    ("groovy", "groovy"),
    ("h", "c"),
    ("hcl", "hcl"),
    ("hpp", "cpp"),
    ("hs", "haskell"),
    ("htm", "html"),
    ("html", "html"),
    ("ini", "ini"),
    ("java", "java"),
    ("js", "javascript"),
    ("json", "json"),
    ("jsx", "jsx"),
    ("kt", "kotlin"),
    ("kts", "kotlin"),
    ("lmp", "markdown"),
    ("lua", "lua"),
    ("md", "markdown"),
    ("mjs", "javascript"),
    ("ml", "ocaml"),
    ("nix", "nix"),
    ("php", "php"),
    ("pl", "perl"),
    ("proto", "protobuf"),
    ("ps1", "powershell"),
    ("py", "python"),
    ("r", "r"),
    ("rb", "ruby"),
    ("rs", "rust"),
    ("scala", "scala"),
    ("scss", "scss"),
    ("sh", "bash"),
    ("sql", "sql"),
    ("svelte", "svelte"),
    ("swift", "swift"),
    ("tf", "hcl"),
    ("toml", "toml"),
    ("ts", "typescript"),
    ("tsx", "tsx"),
    ("txt", "text"),
    ("vue", "vue"),
    ("xml", "xml"),
    ("yaml", "yaml"),
    ("yml", "yaml"),
    ("zig", "zig"),
    ("zsh", "bash"),
];

/// Outcome of a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Language {
    Known(&'static str),
    /// The file has an extension the table doesn't know.
    UnknownExtension,
    /// No extension and no well-known name.
    Unlabelled,
}

impl Language {
    /// The fence tag to use; never empty.
    pub fn tag(self) -> &'static str {
        match self {
            Language::Known(tag) => tag,
            Language::UnknownExtension | Language::Unlabelled => PLAIN_TEXT,
        }
    }
}

/// Look up the language of `path` by file name, then by extension
/// (case-insensitive).
pub fn detect(path: &Path) -> Language {
    if let Some(name) = path.file_name().and_then(|n| n.to_str())
        && let Some((_, tag)) = FILE_NAMES.iter().find(|(known, _)| *known == name)
    {
        return Language::Known(tag);
    }

    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return Language::Unlabelled;
    };
    let ext = ext.to_ascii_lowercase();
    match EXTENSIONS.binary_search_by(|(known, _)| (*known).cmp(ext.as_str())) {
        Ok(idx) => Language::Known(EXTENSIONS[idx].1),
        Err(_) => Language::UnknownExtension,
    }
}

/// Shorthand for `detect(path).tag()`.
pub fn language_tag(path: &Path) -> &'static str {
    detect(path).tag()
}
