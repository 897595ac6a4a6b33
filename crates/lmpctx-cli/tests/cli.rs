use std::process::Command;

use lmpctx_config::{ConfigFormat, IncludeEntry};
use lmpctx_test_utils::{TestConfigBuilder, TestProject};
use predicates::prelude::*;
use pretty_assertions::assert_eq;

fn cmd() -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::from(Command::new(env!("CARGO_BIN_EXE_lmpctx")));
    cmd.env_remove("RUST_LOG");
    cmd
}

fn sample_project() -> TestProject {
    let project = TestProject::new();
    project
        .file("src/main.rs", "fn main() {}\n")
        .file("src/lib.rs", "pub mod x;\n")
        .source(
            "",
            &TestConfigBuilder::new()
                .name("sample")
                .include(IncludeEntry::dir("src").with_patterns(&["*.rs"]))
                .to_source("# Sample\n\nA tiny project.", ConfigFormat::Yaml),
        );
    project
}

#[test]
fn test_generate_prints_markdown_to_stdout() {
    let project = sample_project();
    cmd()
        .arg("generate")
        .arg(project.root())
        .assert()
        .success()
        .stdout(predicate::str::starts_with("# sample\n"))
        .stdout(predicate::str::contains("## Documentation\n\n# Sample\n\nA tiny project."))
        .stdout(predicate::str::contains("### src/lib.rs"))
        .stdout(predicate::str::contains("```rust\nfn main() {}\n```"));
}

#[test]
fn test_generate_json_to_file() {
    let project = sample_project();
    let out = project.path("context.json");
    cmd()
        .args(["generate", "--format", "json", "--output"])
        .arg(&out)
        .arg(project.root())
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out).unwrap()).unwrap();
    assert_eq!(value["configuration"]["name"], "sample");
    assert_eq!(value["files"].as_array().unwrap().len(), 2);
}

#[test]
fn test_generate_missing_named_file_exits_1() {
    let project = TestProject::new();
    project.source(
        "",
        &TestConfigBuilder::new()
            .include(IncludeEntry::file("gone.rs"))
            .to_source("", ConfigFormat::Json),
    );
    cmd()
        .arg("generate")
        .arg(project.root())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("included file does not exist"));
}

#[test]
fn test_generate_with_broken_source_still_writes_and_exits_3() {
    let project = sample_project();
    project.source("src", "```json\n{ \"name\": \n```\n");
    cmd()
        .arg("generate")
        .arg(project.root())
        .assert()
        .code(3)
        .stdout(predicate::str::contains("### src/main.rs"));
}

#[test]
fn test_bad_arguments_exit_2() {
    cmd()
        .args(["generate", "--max-tokens", "0"])
        .assert()
        .code(2);
    cmd().args(["generate", "--format", "pdf"]).assert().code(2);
    cmd().arg("frobnicate").assert().code(2);
}

#[test]
fn test_invalid_settings_file_exits_3() {
    let project = sample_project();
    project.file("bad.toml", "[limits]\nconcurrency = 0\n");
    cmd()
        .arg("--settings")
        .arg(project.path("bad.toml"))
        .arg("generate")
        .arg(project.root())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("concurrency"));
}

#[test]
fn test_validate_lists_sources() {
    let project = sample_project();
    cmd()
        .arg("validate")
        .arg(project.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("(yaml, 1 include entries)"))
        .stdout(predicate::str::contains("1 source files, 1 valid, 0 invalid"));
}

#[test]
fn test_validate_reports_parse_errors_with_exit_3() {
    let project = sample_project();
    project.source("src", "```toml\nname = [\n```\n");
    cmd()
        .arg("validate")
        .arg(project.root())
        .assert()
        .code(3)
        .stdout(predicate::str::contains("error[config-parse]"))
        .stdout(predicate::str::contains("2 source files, 1 valid, 1 invalid"));
}

#[test]
fn test_validate_json_report() {
    let project = sample_project();
    let assert = cmd()
        .args(["validate", "--json"])
        .arg(project.root())
        .assert()
        .success();
    let value: serde_json::Value = serde_json::from_slice(&assert.get_output().stdout).unwrap();
    assert_eq!(value["lmp_file_count"], 1);
    assert_eq!(value["sources"][0]["format"], "yaml");
}

#[test]
fn test_preview_shows_budget_split_and_config() {
    let project = sample_project();
    cmd()
        .args(["preview", "--max-tokens", "4", "--show-config", "toml"])
        .arg(project.root())
        .assert()
        .success()
        .stdout(predicate::str::contains("Budget: 4 tokens"))
        .stdout(predicate::str::contains("Included (1 files, ~3 tokens):"))
        .stdout(predicate::str::contains("Excluded for budget (1 files):"))
        .stdout(predicate::str::contains("name = \"sample\""));
}
