//! Migration progress reporting.
//!
//! Reports observable progress during `orgraph migrate` so operators see
//! which employee is being written and how deep the traversal is.
//! Progress is emitted on **stderr** so the final report on stdout stays
//! parseable for scripts.

use std::io::Write;

use org_graph_core::progress::{MigrationEvent, NoProgress, ProgressReporter};

/// Human-friendly progress on stderr: "migrate default  E01234  depth 2  1,234 written".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: MigrationEvent) {
        let line = match &event {
            MigrationEvent::RootResolved { employee_id } => {
                format!("migrate  root {} found\n", employee_id)
            }
            MigrationEvent::Reset { connection } => {
                format!("migrate {}  graph cleared\n", connection)
            }
            MigrationEvent::EmployeeWritten {
                employee_id,
                depth,
                written,
            } => format!(
                "migrate  {}  depth {}  {} written\n",
                employee_id,
                depth,
                format_number(*written)
            ),
            MigrationEvent::Finished { employees, batches } => format!(
                "migrate  done  {} employees in {} batches\n",
                format_number(*employees),
                format_number(*batches)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: MigrationEvent) {
        let obj = event_json(&event);
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

fn event_json(event: &MigrationEvent) -> serde_json::Value {
    match event {
        MigrationEvent::RootResolved { employee_id } => serde_json::json!({
            "event": "root_resolved",
            "employee_id": employee_id
        }),
        MigrationEvent::Reset { connection } => serde_json::json!({
            "event": "reset",
            "connection": connection
        }),
        MigrationEvent::EmployeeWritten {
            employee_id,
            depth,
            written,
        } => serde_json::json!({
            "event": "progress",
            "employee_id": employee_id,
            "depth": depth,
            "written": written
        }),
        MigrationEvent::Finished { employees, batches } => serde_json::json!({
            "event": "finished",
            "employees": employees,
            "batches": batches
        }),
    }
}

pub fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "off" | "none" => Some(ProgressMode::Off),
            "human" => Some(ProgressMode::Human),
            "json" => Some(ProgressMode::Json),
            _ => None,
        }
    }

    /// Build a reporter for this mode. The caller hands it to the engine.
    pub fn reporter(&self) -> std::sync::Arc<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => std::sync::Arc::new(NoProgress),
            ProgressMode::Human => std::sync::Arc::new(StderrProgress),
            ProgressMode::Json => std::sync::Arc::new(JsonProgress),
        }
    }
}
