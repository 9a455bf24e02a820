//! CLI Integration Tests
//!
//! Tests for the seedtrace CLI commands using subprocess execution.

use std::path::Path;
use std::process::{Command, Output};
use tempfile::tempdir;

fn seedtrace(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_seedtrace"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to execute seedtrace")
}

fn ok(args: &[&str]) -> String {
    let output = seedtrace(args);
    assert!(
        output.status.success(),
        "{:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn created_id(stdout: &str) -> String {
    stdout
        .trim()
        .strip_prefix("Created lot: ")
        .expect("unexpected add output")
        .to_string()
}

fn init(dir: &Path) -> String {
    let store = dir.join("lots.json");
    let store = store.to_str().unwrap().to_string();
    ok(&["init", &store]);
    store
}

fn add(store: &str, level: &str, qty: &str, parent: Option<&str>) -> String {
    let mut args = vec![
        "add", store, "--level", level, "--variety", "Sahel 108", "--quantity", qty, "--date",
        "2024-06-01",
    ];
    if let Some(parent) = parent {
        args.extend(["--parent", parent]);
    }
    created_id(&ok(&args))
}

#[test]
fn test_cli_init_creates_store() {
    let dir = tempdir().unwrap();
    let store = init(dir.path());
    assert!(Path::new(&store).exists());
}

#[test]
fn test_cli_add_and_show() {
    let dir = tempdir().unwrap();
    let store = init(dir.path());

    let go = add(&store, "GO", "100", None);
    assert_eq!(go, "SL-GO-2024-001");
    let g1 = add(&store, "G1", "40", Some(&go));

    let shown = ok(&["show", &store, &go]);
    assert!(shown.contains("SL-GO-2024-001 [GO] Sahel 108 - 60 kg"));
    assert!(shown.contains(&g1));

    let shown = ok(&["show", &store, &g1]);
    assert!(shown.contains(&format!("parent: {}", go)));
}

#[test]
fn test_cli_link_tree_and_ancestors() {
    let dir = tempdir().unwrap();
    let store = init(dir.path());

    let go = add(&store, "GO", "100", None);
    let g1 = add(&store, "G1", "30", None);
    let out = ok(&["link", &store, &go, &g1, "--quantity", "30"]);
    assert!(out.contains("Linked"));

    let tree = ok(&["tree", &store, &go]);
    let lines: Vec<_> = tree.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with(&go));
    assert!(lines[1].starts_with(&format!("  {}", g1)));

    let ancestors = ok(&["ancestors", &store, &g1]);
    assert!(ancestors.lines().next().unwrap().contains(&go));

    let descendants = ok(&["descendants", &store, &go]);
    assert!(descendants.contains("Descendants of SL-GO-2024-001: 1"));
}

#[test]
fn test_cli_hierarchy_error_exit_code() {
    let dir = tempdir().unwrap();
    let store = init(dir.path());

    let g3 = add(&store, "G3", "100", None);
    let g2 = add(&store, "G2", "10", None);

    let output = seedtrace(&["link", &store, &g3, &g2]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Error [4002]"), "stderr: {}", stderr);
}

#[test]
fn test_cli_unlink_and_relink() {
    let dir = tempdir().unwrap();
    let store = init(dir.path());

    let a = add(&store, "GO", "100", None);
    let b = add(&store, "GO", "100", None);
    let c = add(&store, "G1", "10", Some(&a));

    ok(&["relink", &store, &c, "--parent", &b, "--notes", "moved"]);
    assert!(ok(&["show", &store, &c]).contains(&format!("parent: {}", b)));

    ok(&["unlink", &store, &c]);
    assert!(ok(&["show", &store, &c]).contains("parent: none"));

    let output = seedtrace(&["unlink", &store, &c]);
    assert!(!output.status.success());
}

#[test]
fn test_cli_check_reports_quantity_issue() {
    let dir = tempdir().unwrap();
    let store = init(dir.path());

    let a = add(&store, "GO", "100", None);
    let b = add(&store, "G1", "60", None);
    let c = add(&store, "G1", "50", None);
    ok(&["link", &store, &a, &b]);
    ok(&["link", &store, &a, &c]);

    let out = ok(&["check", &store, &a]);
    assert!(out.contains("1 issue(s)"), "{}", out);
    assert!(out.contains("Quantity exceeded"));

    let stats = ok(&["stats", &store, &a]);
    let stats: serde_json::Value = serde_json::from_str(&stats).unwrap();
    assert_eq!(stats["total_descendants"], 2);
}

#[test]
fn test_cli_export_formats() {
    let dir = tempdir().unwrap();
    let store = init(dir.path());

    let go = add(&store, "GO", "100", None);
    add(&store, "G1", "20", Some(&go));

    let csv = ok(&["export", &store, &go, "--format", "csv"]);
    assert!(csv.starts_with("Parent ID,Parent Level,Child ID"));
    assert_eq!(csv.lines().count(), 2);

    let dot = ok(&["export", &store, &go, "--format", "dot"]);
    assert!(dot.starts_with("digraph genealogy"));

    let out_file = dir.path().join("tree.json");
    ok(&["export", &store, &go, "--output", out_file.to_str().unwrap()]);
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&out_file).unwrap()).unwrap();
    assert_eq!(json["id"], go.as_str());

    let output = seedtrace(&["export", &store, &go, "--format", "xml"]);
    assert!(!output.status.success());
}

#[test]
fn test_cli_missing_store_fails() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.json");
    let output = seedtrace(&["show", missing.to_str().unwrap(), "SL-GO-2024-001"]);
    assert!(!output.status.success());
    assert!(!missing.exists());
}

#[test]
fn test_cli_config_depth_limit() {
    let dir = tempdir().unwrap();
    let store = init(dir.path());

    let go = add(&store, "GO", "100", None);
    let g1 = add(&store, "G1", "40", Some(&go));
    add(&store, "G2", "10", Some(&g1));

    let config = dir.path().join("genealogy.json");
    std::fs::write(&config, r#"{"max_depth": 2}"#).unwrap();

    let tree = ok(&["--config", config.to_str().unwrap(), "tree", &store, &go]);
    assert_eq!(tree.lines().count(), 2);

    let tree = ok(&["tree", &store, &go, "--depth", "1"]);
    assert_eq!(tree.lines().count(), 1);
}
