//! Full migrations written to the SQLite backend.

use std::sync::Arc;
use std::time::Duration;

use org_graph::sqlite_graph::SqliteGraph;
use org_graph_core::graph::memory::InMemoryGraph;
use org_graph_core::graph::{labels, relationships, GraphSink};
use org_graph_core::models::EmployeeRecord;
use org_graph_core::overlay::OverlayStore;
use org_graph_core::source::memory::InMemoryDirectory;
use org_graph_core::{MigrationEngine, MigrationOptions, MigrationReport};
use serde_json::json;

fn person(id: &str, manager: Option<&str>, department: &str) -> EmployeeRecord {
    EmployeeRecord::from_value(&json!({
        "Employee_ID": id,
        "Display_Name": format!("Person {}", id),
        "First_Name": "Person",
        "Last_Name": id,
        "Manager_s_Default_Supervisory_Organization": department,
        "Primary_Position_Job_Description": format!("Job of {}", id),
        "Primary_Position_Location_Code": 44,
        "Primary_Position_Location": "Central Office",
        "Primary_Position_Manager": manager,
    }))
    .unwrap()
}

fn directory() -> InMemoryDirectory {
    InMemoryDirectory::new(vec![
        person("E1", None, "Finance"),
        person("E2", Some("E1"), "Payroll"),
        person("E3", Some("E1"), "Finance"),
        person("E4", Some("E2"), "Payroll"),
    ])
}

async fn migrate(sink: Arc<dyn GraphSink>, reset: bool) -> MigrationReport {
    let engine = MigrationEngine::new(
        Arc::new(directory()),
        sink,
        Arc::new(OverlayStore::empty()),
    );
    let options = MigrationOptions::new("E1")
        .connection("local")
        .reset_graph(reset)
        .request_delay(Duration::ZERO);
    engine.migrate(&options).await.unwrap()
}

#[tokio::test]
async fn test_sqlite_matches_in_memory_graph() {
    let dir = tempfile::tempdir().unwrap();
    let sqlite = Arc::new(
        SqliteGraph::open(&dir.path().join("org.sqlite"))
            .await
            .unwrap(),
    );
    let memory = Arc::new(InMemoryGraph::new());

    let on_disk = migrate(sqlite.clone(), true).await;
    let in_memory = migrate(memory.clone(), true).await;

    assert_eq!(on_disk.employees, 4);
    assert_eq!(on_disk.nodes_created, in_memory.nodes_created);
    assert_eq!(on_disk.relationships_created, in_memory.relationships_created);
    assert_eq!(on_disk.unmatched_edges, in_memory.unmatched_edges);
    assert_eq!(on_disk.departments_merged, 2);
    assert_eq!(in_memory.departments_merged, 2);
    assert_eq!(on_disk.locations_merged, 1);
    assert_eq!(in_memory.locations_merged, 1);

    let state = memory.snapshot("local");
    for label in [
        labels::EMPLOYEE,
        labels::POSITION,
        labels::LOCATION,
        labels::DEPARTMENT,
    ] {
        assert_eq!(
            sqlite.count_nodes(label).await.unwrap() as usize,
            state.count(label),
            "{} nodes",
            label
        );
    }
    for rel in [
        relationships::HAS_POSITION,
        relationships::IS_LOCATED_AT,
        relationships::REPORTS_TO,
        relationships::IS_HEADED_BY,
        relationships::IS_DIVISION_OF,
    ] {
        assert_eq!(
            sqlite.count_relationships(rel).await.unwrap() as usize,
            state.relationships(rel).count(),
            "{} edges",
            rel
        );
    }

    assert_eq!(sqlite.count_nodes(labels::LOCATION).await.unwrap(), 1);
    assert_eq!(sqlite.count_nodes(labels::DEPARTMENT).await.unwrap(), 2);
    assert_eq!(
        sqlite
            .count_relationships(relationships::REPORTS_TO)
            .await
            .unwrap(),
        3
    );
}

#[tokio::test]
async fn test_department_slug_is_stored() {
    let dir = tempfile::tempdir().unwrap();
    let sqlite = Arc::new(
        SqliteGraph::open(&dir.path().join("org.sqlite"))
            .await
            .unwrap(),
    );
    migrate(sqlite.clone(), true).await;

    let departments = sqlite.node_properties(labels::DEPARTMENT).await.unwrap();
    let slugs: Vec<&str> = departments
        .iter()
        .filter_map(|d| d["slug"].as_str())
        .collect();
    assert_eq!(slugs, vec!["finance", "payroll"]);
}

#[tokio::test]
async fn test_rerun_without_reset_duplicates_people_only() {
    let dir = tempfile::tempdir().unwrap();
    let sqlite = Arc::new(
        SqliteGraph::open(&dir.path().join("org.sqlite"))
            .await
            .unwrap(),
    );
    migrate(sqlite.clone(), true).await;
    let rerun = migrate(sqlite.clone(), false).await;
    // Locations and departments already exist, so the merges create nothing.
    assert_eq!(rerun.departments_merged, 0);
    assert_eq!(rerun.locations_merged, 0);

    assert_eq!(sqlite.count_nodes(labels::EMPLOYEE).await.unwrap(), 8);
    assert_eq!(sqlite.count_nodes(labels::POSITION).await.unwrap(), 8);
    assert_eq!(sqlite.count_nodes(labels::LOCATION).await.unwrap(), 1);
    assert_eq!(sqlite.count_nodes(labels::DEPARTMENT).await.unwrap(), 2);
    assert_eq!(
        sqlite
            .count_relationships(relationships::REPORTS_TO)
            .await
            .unwrap(),
        6
    );

    migrate(sqlite.clone(), true).await;
    assert_eq!(sqlite.count_nodes(labels::EMPLOYEE).await.unwrap(), 4);
}

#[tokio::test]
async fn test_graph_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("org.sqlite");
    {
        let sqlite = Arc::new(SqliteGraph::open(&path).await.unwrap());
        migrate(sqlite.clone(), true).await;
        sqlite.close().await;
    }
    let reopened = SqliteGraph::open(&path).await.unwrap();
    assert_eq!(reopened.count_nodes(labels::EMPLOYEE).await.unwrap(), 4);
}
