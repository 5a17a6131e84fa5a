//! Command-line integration tests. None of these reach the generation
//! service.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn dealscope() -> Command {
    let mut cmd = Command::cargo_bin("dealscope").unwrap_or_else(|_| unreachable!());
    cmd.env_remove("OPENAI_API_KEY")
        .env_remove("DEALSCOPE_API_KEY")
        .env_remove("DEALSCOPE_OUTPUT_DIR")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn chunk_reports_locations() {
    let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
    let path = dir.path().join("acme.txt");
    std::fs::write(&path, "abcdefghij".repeat(1200)).unwrap_or_else(|_| unreachable!());

    dealscope()
        .arg("chunk")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("acme: 20 location(s)"));
}

#[test]
fn chunk_json_output() {
    let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
    let path = dir.path().join("site.md");
    std::fs::write(&path, "We build rockets.").unwrap_or_else(|_| unreachable!());

    dealscope()
        .args(["--format", "json", "chunk"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"document_id\": \"site\""))
        .stdout(predicate::str::contains("\"count\": 1"));
}

#[test]
fn unsupported_input_fails() {
    let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
    let path = dir.path().join("deck.pdf");
    std::fs::write(&path, "%PDF-1.7").unwrap_or_else(|_| unreachable!());

    dealscope()
        .arg("chunk")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported input file"));
}

#[test]
fn agents_lists_builtin_capabilities() {
    dealscope()
        .arg("agents")
        .assert()
        .success()
        .stdout(predicate::str::contains("market"))
        .stdout(predicate::str::contains("Risk Analyst"));
}

#[test]
fn synthesize_rejects_weights_not_summing_to_100() {
    dealscope()
        .args([
            "synthesize",
            "--primary",
            "deck.md",
            "--agents",
            "market=60,team=30,risk=5",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("weights must sum to 100 (got 95)"));
}

#[test]
fn synthesize_rejects_malformed_selection() {
    dealscope()
        .args(["synthesize", "--primary", "deck.md", "--agents", "market"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected capability=weight"));
}

#[test]
fn analyze_without_api_key_fails() {
    let dir = TempDir::new().unwrap_or_else(|_| unreachable!());
    let path = dir.path().join("acme.txt");
    std::fs::write(&path, "We build rockets.").unwrap_or_else(|_| unreachable!());

    dealscope()
        .arg("analyze")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("API key missing"));
}

#[test]
fn init_prompts_writes_templates() {
    let dir = TempDir::new().unwrap_or_else(|_| unreachable!());

    dealscope()
        .arg("init-prompts")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote 4 prompt template(s)"));
    assert!(dir.path().join("synthesizer.md").exists());
}
