//! Runs the `orgraph` binary against a local directory server.

mod support;

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use org_graph::sqlite_graph::SqliteGraph;
use org_graph_core::graph::{labels, relationships};
use serde_json::Value;
use support::{employee, serve};
use tempfile::TempDir;

fn orgraph_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_orgraph"))
}

fn setup_test_env(addr: SocketAddr) -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let db_path = root.join("data").join("org.sqlite");

    fs::write(
        config_dir.join("overlays.json"),
        r#"[{"Employee_ID": "E1", "Display_Name": "Dr. Root"}]"#,
    )
    .unwrap();

    let config_content = format!(
        r#"[directory]
base_url = "http://{addr}"
central_locations = [44, 45]

[migration]
root_employee_id = "E1"
connection = "local"
request_delay_ms = 0

[overlays]
path = "{overlays}"

[validation]
excluded_employee_types = ["Contractor"]

[graph.connections.local]
backend = "sqlite"
path = "{db}"

[graph.connections.scratch]
backend = "memory"
"#,
        addr = addr,
        overlays = config_dir.join("overlays.json").display(),
        db = db_path.display(),
    );

    let config_path = config_dir.join("orgraph.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path, db_path)
}

async fn run_orgraph(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = orgraph_binary();
    let output = tokio::process::Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .await
        .unwrap_or_else(|e| panic!("Failed to run orgraph binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

fn org() -> Vec<Value> {
    let mut contractor = employee("E5", Some("E1"), "Finance", "44");
    contractor["Employee_Type"] = Value::from("Contractor");
    vec![
        employee("E1", None, "Finance", "44"),
        employee("E2", Some("E1"), "Payroll", "44"),
        employee("E3", Some("E1"), "Transport", "45"),
        employee("E4", Some("E2"), "Payroll", "44"),
        contractor,
    ]
}

#[tokio::test]
async fn test_connections_lists_aliases() {
    let (addr, _dir) = serve(vec![]).await;
    let (_tmp, config_path, _db) = setup_test_env(addr);
    let (stdout, stderr, success) = run_orgraph(&config_path, &["connections"]).await;
    assert!(success, "connections failed: {}", stderr);
    assert!(stdout.contains("local"));
    assert!(stdout.contains("sqlite"));
    assert!(stdout.contains("scratch"));
}

#[tokio::test]
async fn test_init_creates_sqlite_file() {
    let (addr, _dir) = serve(vec![]).await;
    let (_tmp, config_path, db_path) = setup_test_env(addr);
    let (stdout, stderr, success) = run_orgraph(&config_path, &["init"]).await;
    assert!(success, "init failed: {}", stderr);
    assert!(stdout.contains("Initialized local"));
    assert!(db_path.exists());

    // Idempotent
    let (_, stderr, success) = run_orgraph(&config_path, &["init"]).await;
    assert!(success, "second init failed: {}", stderr);
}

#[tokio::test]
async fn test_migrate_writes_sqlite_graph() {
    let (addr, _dir) = serve(org()).await;
    let (_tmp, config_path, db_path) = setup_test_env(addr);

    let (stdout, stderr, success) =
        run_orgraph(&config_path, &["migrate", "--progress", "off", "--json"]).await;
    assert!(success, "migrate failed: {}", stderr);

    let report: Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(report["employees"], 4);
    assert_eq!(report["employees_rejected"], 1);
    assert_eq!(report["connection"], "local");

    let graph = SqliteGraph::open(&db_path).await.unwrap();
    assert_eq!(graph.count_nodes(labels::EMPLOYEE).await.unwrap(), 4);
    assert_eq!(graph.count_nodes(labels::LOCATION).await.unwrap(), 2);
    assert_eq!(
        graph
            .count_relationships(relationships::REPORTS_TO)
            .await
            .unwrap(),
        3
    );

    let employees = graph.node_properties(labels::EMPLOYEE).await.unwrap();
    assert_eq!(employees[0]["display_name"], "Dr. Root");
}

#[tokio::test]
async fn test_migrate_root_only_flag() {
    let (addr, _dir) = serve(org()).await;
    let (_tmp, config_path, db_path) = setup_test_env(addr);

    let (stdout, stderr, success) = run_orgraph(
        &config_path,
        &["migrate", "--root-only", "--progress", "off"],
    )
    .await;
    assert!(success, "migrate failed: {}", stderr);
    assert!(stdout.contains("--- Migration ---"));

    let graph = SqliteGraph::open(&db_path).await.unwrap();
    assert_eq!(graph.count_nodes(labels::EMPLOYEE).await.unwrap(), 1);
}

#[tokio::test]
async fn test_migrate_unknown_root_fails() {
    let (addr, _dir) = serve(org()).await;
    let (_tmp, config_path, _db) = setup_test_env(addr);

    let (_stdout, stderr, success) = run_orgraph(
        &config_path,
        &["migrate", "--root", "E404", "--progress", "off"],
    )
    .await;
    assert!(!success);
    assert!(stderr.contains("E404"), "stderr: {}", stderr);
}

#[tokio::test]
async fn test_departments_uses_central_locations() {
    let (addr, _dir) = serve(org()).await;
    let (_tmp, config_path, _db) = setup_test_env(addr);

    let (stdout, stderr, success) = run_orgraph(&config_path, &["departments", "--json"]).await;
    assert!(success, "departments failed: {}", stderr);
    let names: Vec<String> = serde_json::from_str(&stdout).unwrap();
    assert_eq!(names, vec!["Finance", "Payroll", "Transport"]);

    let (stdout, _, success) =
        run_orgraph(&config_path, &["departments", "--location", "45"]).await;
    assert!(success);
    assert_eq!(stdout.trim(), "Transport");
}

#[tokio::test]
async fn test_head_prints_first_member() {
    let (addr, _dir) = serve(org()).await;
    let (_tmp, config_path, _db) = setup_test_env(addr);

    let (stdout, stderr, success) = run_orgraph(&config_path, &["head", "Payroll"]).await;
    assert!(success, "head failed: {}", stderr);
    assert!(stdout.contains("employee_id:  E2"));

    let (_, _, success) = run_orgraph(&config_path, &["head", "Nowhere"]).await;
    assert!(!success);
}

#[tokio::test]
async fn test_completions_need_no_config() {
    let missing = PathBuf::from("/nonexistent/orgraph.toml");
    let (stdout, _stderr, success) = run_orgraph(&missing, &["completions", "bash"]).await;
    assert!(success);
    assert!(stdout.contains("orgraph"));
}
