mod support;

use std::time::Duration;

use org_graph::directory::DirectoryClient;
use org_graph_core::models::fields;
use org_graph_core::source::{Conditions, DirectorySource, SourceError};
use serde_json::{json, Value};
use support::{directory_config, employee, serve, Behaviour};

fn staff(n: usize) -> Vec<Value> {
    (0..n)
        .map(|i| employee(&format!("E{:05}", i), Some("E99999"), "Finance", "44"))
        .collect()
}

async fn client_for(records: Vec<Value>) -> (DirectoryClient, std::sync::Arc<support::MockDirectory>) {
    let (addr, dir) = serve(records).await;
    let client = DirectoryClient::new(&directory_config(addr)).unwrap();
    (client, dir)
}

#[tokio::test]
async fn test_pagination_collects_every_page() {
    let (client, dir) = client_for(staff(250)).await;
    let records = client
        .find(&Conditions::new(), Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(records.len(), 250);
    assert_eq!(records[0].employee_id, "E00000");
    assert_eq!(records[249].employee_id, "E00249");
    assert_eq!(dir.search_requests(), 3);
}

#[tokio::test]
async fn test_exact_multiple_costs_one_empty_request() {
    let (client, dir) = client_for(staff(200)).await;
    let records = client
        .find(&Conditions::new(), Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(records.len(), 200);
    assert_eq!(dir.search_requests(), 3);
}

#[tokio::test]
async fn test_empty_result_is_one_request() {
    let (client, dir) = client_for(vec![]).await;
    let records = client
        .find(&Conditions::new(), Duration::ZERO)
        .await
        .unwrap();
    assert!(records.is_empty());
    assert_eq!(dir.search_requests(), 1);
}

#[tokio::test]
async fn test_conditions_filter_on_the_server() {
    let mut records = staff(3);
    records.push(employee("E77777", Some("E00001"), "Payroll", "45"));
    let (client, _dir) = client_for(records).await;

    let reports = client
        .direct_reports("E00001", Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].employee_id, "E77777");

    let one = client
        .find_one(
            &Conditions::new().eq(fields::EMPLOYEE_ID, "E00002"),
            Duration::ZERO,
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(one.display_name, "Person E00002");
}

#[tokio::test]
async fn test_delay_is_applied_before_each_page() {
    let (client, dir) = client_for(staff(150)).await;
    let started = std::time::Instant::now();
    client
        .find(&Conditions::new(), Duration::from_millis(40))
        .await
        .unwrap();
    assert_eq!(dir.search_requests(), 2);
    assert!(started.elapsed() >= Duration::from_millis(80));
}

#[tokio::test]
async fn test_unsuccessful_response_is_an_error() {
    let (client, dir) = client_for(staff(1)).await;
    dir.set_behaviour(Behaviour::Unsuccessful);
    let err = client
        .find(&Conditions::new(), Duration::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Unsuccessful { .. }));
}

#[tokio::test]
async fn test_http_error_status_is_an_error() {
    let (client, dir) = client_for(staff(1)).await;
    dir.set_behaviour(Behaviour::ServerError);
    match client.find(&Conditions::new(), Duration::ZERO).await {
        Err(SourceError::Status { status, .. }) => assert_eq!(status, 500),
        other => panic!("unexpected {:?}", other.map(|r| r.len())),
    }
}

#[tokio::test]
async fn test_non_json_body_is_malformed() {
    let (client, dir) = client_for(staff(1)).await;
    dir.set_behaviour(Behaviour::Garbage);
    let err = client
        .find(&Conditions::new(), Duration::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Malformed { .. }));
}

#[tokio::test]
async fn test_null_message_is_an_empty_page() {
    let (client, dir) = client_for(staff(5)).await;
    dir.set_behaviour(Behaviour::NullMessage);
    let records = client
        .find(&Conditions::new(), Duration::ZERO)
        .await
        .unwrap();
    assert!(records.is_empty());
    assert_eq!(dir.search_requests(), 1);
}

#[tokio::test]
async fn test_record_missing_identity_fails_the_page() {
    let mut records = staff(2);
    records.push(json!({"Employee_ID": "E3", "Display_Name": "No Names"}));
    let (client, _dir) = client_for(records).await;
    match client.find(&Conditions::new(), Duration::ZERO).await {
        Err(SourceError::Record { index, .. }) => assert_eq!(index, 2),
        other => panic!("unexpected {:?}", other.map(|r| r.len())),
    }
}

#[tokio::test]
async fn test_unreachable_directory_is_a_transport_error() {
    // Bind and drop a listener to get a port nobody is serving.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = DirectoryClient::new(&directory_config(addr)).unwrap();
    let err = client
        .find(&Conditions::new(), Duration::ZERO)
        .await
        .unwrap_err();
    assert!(matches!(err, SourceError::Transport { .. }));
}

#[tokio::test]
async fn test_departments_are_unique_across_locations() {
    let mut records = vec![
        employee("E1", None, "Finance", "44"),
        employee("E2", Some("E1"), "Finance", "44"),
        employee("E3", Some("E1"), "Payroll", "44"),
        employee("E4", Some("E1"), "Payroll", "45"),
        employee("E5", Some("E1"), "Transport", "45"),
        employee("E6", Some("E1"), "Grounds", "77"),
    ];
    records.push(json!({
        "Employee_ID": "E7",
        "Display_Name": "Blank Dept",
        "First_Name": "Blank",
        "Last_Name": "Dept",
        "Manager_s_Default_Supervisory_Organization": "",
        "Primary_Position_Location_Code": 45
    }));
    let (client, dir) = client_for(records).await;

    let at_44 = client
        .departments_for_location("44", Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(at_44, vec!["Finance", "Payroll"]);

    let all = client
        .departments(&["44".to_string(), "45".to_string()], Duration::ZERO)
        .await
        .unwrap();
    assert_eq!(all, vec!["Finance", "Payroll", "Transport"]);
    assert_eq!(dir.value_requests.load(std::sync::atomic::Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_department_head_is_first_match() {
    let records = vec![
        employee("E1", None, "Finance", "44"),
        employee("E2", Some("E1"), "Finance", "44"),
    ];
    let (client, _dir) = client_for(records).await;

    let head = client
        .department_head("Finance", Duration::ZERO)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(head.employee_id, "E1");

    let none = client
        .department_head("Nowhere", Duration::ZERO)
        .await
        .unwrap();
    assert!(none.is_none());
}
