#![deny(unsafe_code)]

//! lmpctx CLI: generate, validate and preview project context.
//!
//! Exit codes: `0` success, `1` general or file error, `2` bad arguments,
//! `3` configuration error. The artifact goes to stdout (or `--output`);
//! logs go to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use lmpctx_config::{ConfigFormat, EngineSettings, OutputFormat};
use lmpctx_core::{CandidateFile, Engine, GenerationRequest, Plan, ValidationReport};
use tracing::info;
use tracing_subscriber::EnvFilter;

const EXIT_FAILURE: u8 = 1;
const EXIT_CONFIG: u8 = 3;

/// lmpctx: assemble project context for language models from `.lmp` files.
#[derive(Parser)]
#[command(name = "lmpctx", version, about, long_about = None)]
struct Cli {
    /// Path to the engine settings file.
    #[arg(long, global = true, default_value = lmpctx_config::settings::SETTINGS_FILE_NAME)]
    settings: PathBuf,

    /// Increase log verbosity (-v, -vv).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate the context artifact.
    Generate {
        /// Target directory.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Token ceiling, overriding every configured `max_tokens`.
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        max_tokens: Option<u64>,

        /// Output format, overriding the configured one.
        #[arg(long, value_enum)]
        format: Option<FormatArg>,

        /// Write the artifact to this file instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse and schema-check every source file without selecting files.
    Validate {
        /// Target directory.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show which files would be included and what they would cost.
    Preview {
        /// Target directory.
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Token ceiling, overriding every configured `max_tokens`.
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        max_tokens: Option<u64>,

        /// Also print the effective configuration in this format.
        #[arg(long, value_enum)]
        show_config: Option<ConfigFormatArg>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Markdown,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Markdown => OutputFormat::Markdown,
            FormatArg::Json => OutputFormat::Json,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ConfigFormatArg {
    Json,
    Yaml,
    Toml,
}

impl From<ConfigFormatArg> for ConfigFormat {
    fn from(arg: ConfigFormatArg) -> Self {
        match arg {
            ConfigFormatArg::Json => ConfigFormat::Json,
            ConfigFormatArg::Yaml => ConfigFormat::Yaml,
            ConfigFormatArg::Toml => ConfigFormat::Toml,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // clap exits with code 2 on bad arguments.
    let cli = Cli::parse();

    let settings = load_settings(&cli.settings).await;
    init_tracing(&cli, settings.as_ref().ok());
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::from(EXIT_CONFIG);
        }
    };

    let engine = Engine::new(settings);
    let outcome = match cli.command {
        Commands::Generate {
            path,
            max_tokens,
            format,
            output,
        } => cmd_generate(&engine, path, max_tokens, format, output.as_deref()).await,
        Commands::Validate { path, json } => cmd_validate(&engine, &path, json).await,
        Commands::Preview {
            path,
            max_tokens,
            show_config,
        } => cmd_preview(&engine, path, max_tokens, show_config).await,
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// `-q` and `-v` win over `RUST_LOG`, which wins over the settings file.
fn init_tracing(cli: &Cli, settings: Option<&EngineSettings>) {
    let configured = settings.map_or("info", |s| s.logging.level.as_str());
    let filter = match (cli.quiet, cli.verbose) {
        (true, _) => EnvFilter::new("error"),
        (false, 0) => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(configured))
        }
        (false, 1) => EnvFilter::new("debug"),
        (false, _) => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn load_settings(path: &Path) -> Result<EngineSettings> {
    if path.exists() {
        EngineSettings::load(path)
            .await
            .with_context(|| format!("invalid settings file {}", path.display()))
    } else {
        Ok(EngineSettings::default())
    }
}

fn config_exit(has_config_errors: bool) -> ExitCode {
    if has_config_errors {
        ExitCode::from(EXIT_CONFIG)
    } else {
        ExitCode::SUCCESS
    }
}

async fn cmd_generate(
    engine: &Engine,
    path: PathBuf,
    max_tokens: Option<u64>,
    format: Option<FormatArg>,
    output: Option<&Path>,
) -> Result<ExitCode> {
    let request = GenerationRequest {
        target: path,
        max_tokens,
        output_format: format.map(OutputFormat::from),
    };
    let result = engine.generate(&request).await?;
    let artifact = result.render()?;

    match output {
        Some(file) => {
            tokio::fs::write(file, &artifact)
                .await
                .with_context(|| format!("failed to write {}", file.display()))?;
            info!(
                path = %file.display(),
                files = result.included_files.len(),
                tokens = result.metadata.estimated_total_tokens,
                "Wrote context"
            );
        }
        None => print!("{artifact}"),
    }

    Ok(config_exit(result.has_config_errors()))
}

async fn cmd_validate(engine: &Engine, path: &Path, json: bool) -> Result<ExitCode> {
    let report = engine.validate(path).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(config_exit(!report.is_valid()))
}

fn print_report(report: &ValidationReport) {
    println!("Project root: {}", report.root.display());
    for source in &report.sources {
        let format = match source.format {
            Some(format) => format.to_string(),
            None => "no config".into(),
        };
        println!(
            "ok     {} ({format}, {} include entries)",
            source.path.display(),
            source.include_count
        );
    }
    for diagnostic in &report.diagnostics {
        println!("{diagnostic}");
    }
    let failed = report.lmp_file_count - report.sources.len();
    println!(
        "{} source files, {} valid, {failed} invalid",
        report.lmp_file_count,
        report.sources.len()
    );
}

async fn cmd_preview(
    engine: &Engine,
    path: PathBuf,
    max_tokens: Option<u64>,
    show_config: Option<ConfigFormatArg>,
) -> Result<ExitCode> {
    let request = GenerationRequest {
        target: path,
        max_tokens,
        output_format: None,
    };
    let plan = engine.plan(&request).await?;
    print_plan(&plan);

    if let Some(format) = show_config {
        let format = ConfigFormat::from(format);
        println!("\nEffective configuration ({format}):\n");
        print!("{}", plan.config.to_parsed_config().to_format(format)?);
    }

    Ok(config_exit(plan.diagnostics.has_config_errors()))
}

fn print_candidate(c: &CandidateFile) {
    let (priority, tokens) = (c.priority, c.estimated_tokens);
    println!("  [p{priority:>2}] {tokens:>8}  {}", c.relative_path);
}

fn print_plan(plan: &Plan) {
    println!("Project root: {}", plan.root.display());
    println!("Source files: {}", plan.lmp_file_count);
    match plan.max_tokens {
        Some(max) => println!("Budget: {max} tokens"),
        None => println!("Budget: unbounded"),
    }
    println!("Output format: {}", plan.output_format);

    println!(
        "\nIncluded ({} files, ~{} tokens):",
        plan.included.len(),
        plan.included_tokens()
    );
    plan.included.iter().for_each(print_candidate);

    let excluded = &plan.excluded_for_budget;
    if !excluded.is_empty() {
        println!("\nExcluded for budget ({} files):", excluded.len());
        excluded.iter().for_each(print_candidate);
    }

    let notable: Vec<_> = plan
        .diagnostics
        .iter()
        .filter(|d| d.severity > lmpctx_core::Severity::Info)
        .collect();
    if !notable.is_empty() {
        println!("\nDiagnostics:");
        for diagnostic in notable {
            println!("  {diagnostic}");
        }
    }
}
