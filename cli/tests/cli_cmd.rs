//! Binary-level tests: run the `thoughtgraph` executable in an isolated directory.

use std::path::Path;
use std::process::{Command, Output};

fn thoughtgraph(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_thoughtgraph"))
        .args(args)
        .current_dir(dir)
        .env("XDG_CONFIG_HOME", dir)
        .env("HOME", dir)
        .env_remove("LOG_FILE")
        .env_remove("RUST_LOG")
        .output()
        .expect("run thoughtgraph")
}

fn stdout_json(out: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&out.stdout);
    serde_json::from_str(stdout.trim()).expect("stdout is JSON")
}

#[test]
fn explore_json_reports_conclusions() {
    let dir = tempfile::tempdir().unwrap();
    let out = thoughtgraph(
        dir.path(),
        &[
            "explore",
            "--json",
            "--graph-id",
            "bin",
            "-k",
            "2",
            "-p",
            "Plan a three day trip",
            "Start",
            "with",
            "the",
            "budget",
        ],
    );
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let v = stdout_json(&out);
    assert_eq!(v["graph_id"], "bin");
    assert_eq!(v["problem"], "Plan a three day trip");
    assert_eq!(v["total_generated"], 2);
    assert!(!v["conclusions"].as_array().unwrap().is_empty());
}

#[test]
fn explore_text_summary() {
    let dir = tempfile::tempdir().unwrap();
    let out = thoughtgraph(dir.path(), &["-m", "Sort the list [3,1,2]"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("conclusions"));
    assert!(stdout.contains("totals:"));
}

#[test]
fn explore_without_thought_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = thoughtgraph(dir.path(), &["explore"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("initial thought"));
}

#[test]
fn script_writes_responses_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("script.json");
    std::fs::write(
        &script,
        r#"[
            {"op": "initialize", "graph_id": "s", "initial_thought": "root"},
            {"op": "generate", "graph_id": "s", "k": 3},
            {"op": "prune", "graph_id": "s", "threshold": 2.0}
        ]"#,
    )
    .unwrap();
    let out_file = dir.path().join("out.json");
    let out = thoughtgraph(
        dir.path(),
        &[
            "script",
            script.to_str().unwrap(),
            "--file",
            out_file.to_str().unwrap(),
        ],
    );
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let v: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out_file).unwrap()).unwrap();
    let items = v.as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["root_id"], "s-v0");
    assert_eq!(items[1]["new_vertices"].as_array().unwrap().len(), 3);
    assert_eq!(items[2]["error"]["kind"], "invalid_argument");
}

#[test]
fn script_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = thoughtgraph(dir.path(), &["script", "nope.json"]);
    assert!(!out.status.success());
    assert!(String::from_utf8_lossy(&out.stderr).contains("nope.json"));
}

#[test]
fn config_reflects_dotenv_override() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".env"), "THOUGHTGRAPH_MAX_VERTICES=12\n").unwrap();
    let out = thoughtgraph(dir.path(), &["config"]);
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    let v = stdout_json(&out);
    assert_eq!(v["graph"]["max_vertices"], 12);
    assert_eq!(v["graph"]["max_depth"], 7);
}
