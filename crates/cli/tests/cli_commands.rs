use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn setup_repo() -> tempfile::TempDir {
    let temp = tempdir().unwrap();
    let root = temp.path();
    fs::write(root.join("pom.xml"), "<project/>").unwrap();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::write(root.join("src/A.java"), "class A extends B {}\n").unwrap();
    fs::write(root.join("src/B.java"), "class B extends A {}\n").unwrap();
    fs::write(
        root.join("src/Widget.java"),
        "class Widget implements Runnable {\n    Frame render(int scale) { return null; }\n}\n",
    )
    .unwrap();
    fs::write(root.join("src/Frame.java"), "class Frame {}\n").unwrap();
    temp
}

#[allow(deprecated)]
fn cli(workdir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("context-engine").expect("binary");
    cmd.current_dir(workdir).arg("--quiet");
    cmd
}

fn run_json(workdir: &Path, args: &[&str]) -> Value {
    let output = cli(workdir)
        .arg("--json")
        .args(args)
        .output()
        .expect("command run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

#[test]
fn analyze_reports_parsed_files() {
    let temp = setup_repo();
    let body = run_json(temp.path(), &["analyze"]);
    assert_eq!(body["metrics"]["files_parsed"], 4);
    assert_eq!(body["structure"]["languages"]["java"], 4);
    assert_eq!(body["degraded"], false);
}

#[test]
fn cycles_finds_mutual_inheritance() {
    let temp = setup_repo();
    let body = run_json(temp.path(), &["cycles"]);
    let cycles = body.as_array().expect("array");
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].as_array().unwrap().len(), 2);

    cli(temp.path())
        .arg("cycles")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 circular"));
}

#[test]
fn search_ranks_matching_class() {
    let temp = setup_repo();
    let body = run_json(temp.path(), &["search", "widget", "--limit", "3"]);
    let hits = body.as_array().expect("array");
    assert!(!hits.is_empty() && hits.len() <= 3);
    assert!(hits.iter().any(|hit| hit["symbol"] == "Widget"));
}

#[test]
fn deps_and_reverse_deps() {
    let temp = setup_repo();
    let body = run_json(temp.path(), &["deps", "Widget"]);
    let targets: Vec<String> = body["dependencies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| format!("{}:{}", entry["target"]["kind"].as_str().unwrap(), entry["target"]["name"].as_str().unwrap()))
        .collect();
    assert!(targets.contains(&"interface:Runnable".to_string()));
    assert!(targets.contains(&"type:Frame".to_string()));

    let body = run_json(temp.path(), &["deps", "Frame", "--reverse"]);
    assert!(!body["dependents"].as_array().unwrap().is_empty());
}

#[test]
fn path_follows_edges() {
    let temp = setup_repo();
    let body = run_json(temp.path(), &["path", "Widget", "Frame"]);
    assert_eq!(body["reachable"], true);
    let body = run_json(temp.path(), &["path", "Frame", "Widget"]);
    assert_eq!(body["reachable"], false);
}

#[test]
fn unknown_symbol_fails_with_message() {
    let temp = setup_repo();
    cli(temp.path())
        .args(["deps", "Nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Node not found"));
}

#[test]
fn stats_include_graph_and_engine() {
    let temp = setup_repo();
    let body = run_json(temp.path(), &["stats"]);
    assert_eq!(body["graph"]["cycle_count"], 1);
    assert_eq!(body["engine"]["cache_size"], 4);
}

#[test]
fn bad_config_is_reported() {
    let temp = setup_repo();
    let config = temp.path().join("engine.toml");
    fs::write(&config, "max_results = 0\n").unwrap();
    cli(temp.path())
        .arg("--config")
        .arg(&config)
        .arg("analyze")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load config"));
}
