//! A local stand-in for the directory search API.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use org_graph::config::DirectoryConfig;
use serde_json::{json, Value};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Behaviour {
    Normal,
    Unsuccessful,
    ServerError,
    Garbage,
    NullMessage,
}

pub struct MockDirectory {
    records: Vec<Value>,
    behaviour: Mutex<Behaviour>,
    pub search_requests: AtomicUsize,
    pub value_requests: AtomicUsize,
}

impl MockDirectory {
    pub fn search_requests(&self) -> usize {
        self.search_requests.load(Ordering::SeqCst)
    }

    pub fn set_behaviour(&self, behaviour: Behaviour) {
        *self.behaviour.lock().unwrap() = behaviour;
    }

    fn behaviour(&self) -> Behaviour {
        *self.behaviour.lock().unwrap()
    }
}

pub fn employee(id: &str, manager: Option<&str>, department: &str, location: &str) -> Value {
    json!({
        "Employee_ID": id,
        "Display_Name": format!("Person {}", id),
        "First_Name": "Person",
        "Last_Name": id,
        "mail": format!("{}@example.org", id.to_lowercase()),
        "Work_Phone": "555-0100",
        "Manager_s_Default_Supervisory_Organization": department,
        "Primary_Position_Job_Description": format!("Role of {}", id),
        "Primary_Position_Location_Code": location,
        "Primary_Position_Location": format!("Site {}", location),
        "Primary_Position_Manager": manager,
    })
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn matching<'a>(records: &'a [Value], params: &HashMap<String, String>) -> Vec<&'a Value> {
    let conditions: Vec<(&str, &str)> = params
        .iter()
        .filter_map(|(k, v)| {
            k.strip_prefix("q[")
                .and_then(|k| k.strip_suffix(']'))
                .map(|field| (field, v.as_str()))
        })
        .collect();
    records
        .iter()
        .filter(|r| {
            conditions
                .iter()
                .all(|(field, value)| r.get(*field).and_then(text).as_deref() == Some(*value))
        })
        .collect()
}

fn failure(behaviour: Behaviour) -> Option<Response> {
    match behaviour {
        Behaviour::Normal => None,
        Behaviour::Unsuccessful => {
            Some(Json(json!({"success": false, "message": "nope"})).into_response())
        }
        Behaviour::ServerError => {
            Some((StatusCode::INTERNAL_SERVER_ERROR, "boom").into_response())
        }
        Behaviour::Garbage => Some((StatusCode::OK, "<html>not json</html>").into_response()),
        Behaviour::NullMessage => {
            Some(Json(json!({"success": true, "message": null})).into_response())
        }
    }
}

async fn search(
    State(dir): State<Arc<MockDirectory>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    dir.search_requests.fetch_add(1, Ordering::SeqCst);
    if let Some(resp) = failure(dir.behaviour()) {
        return resp;
    }

    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(0);
    let page_size: usize = params
        .get("page_size")
        .and_then(|p| p.parse().ok())
        .unwrap_or(100);

    let items: Vec<Value> = matching(&dir.records, &params)
        .into_iter()
        .skip(page * page_size)
        .take(page_size)
        .cloned()
        .collect();
    Json(json!({"success": true, "message": items})).into_response()
}

async fn field_values(
    State(dir): State<Arc<MockDirectory>>,
    Path(field): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    dir.value_requests.fetch_add(1, Ordering::SeqCst);
    if let Some(resp) = failure(dir.behaviour()) {
        return resp;
    }

    // Raw column values, repeats and blanks included.
    let values: Vec<Value> = matching(&dir.records, &params)
        .into_iter()
        .map(|r| r.get(&field).cloned().unwrap_or(Value::Null))
        .collect();
    Json(json!({"success": true, "message": values})).into_response()
}

/// Serve `records` on an ephemeral local port.
pub async fn serve(records: Vec<Value>) -> (SocketAddr, Arc<MockDirectory>) {
    let dir = Arc::new(MockDirectory {
        records,
        behaviour: Mutex::new(Behaviour::Normal),
        search_requests: AtomicUsize::new(0),
        value_requests: AtomicUsize::new(0),
    });

    let app = Router::new()
        .route("/api/public/search/user", get(search))
        .route("/api/public/field/{field}/values", get(field_values))
        .with_state(dir.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (addr, dir)
}

pub fn directory_config(addr: SocketAddr) -> DirectoryConfig {
    DirectoryConfig {
        base_url: format!("http://{}", addr),
        search_path: "/api/public/search/user".to_string(),
        field_values_path: "/api/public/field".to_string(),
        page_size: 100,
        timeout_secs: 5,
        central_locations: vec!["44".to_string(), "45".to_string()],
    }
}
