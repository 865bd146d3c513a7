//! Errors that end a migration run.

use thiserror::Error;

use crate::graph::GraphError;
use crate::source::SourceError;

/// Why a run stopped early. Batches committed before the failure stay in
/// the graph; nothing is rolled back.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("root employee '{0}' not found in the directory")]
    RootNotFound(String),

    #[error("graph write failed{}: {source}", for_employee(.employee_id))]
    Sink {
        /// Employee whose batch failed; `None` for the reset statement.
        employee_id: Option<String>,
        #[source]
        source: GraphError,
    },
}

fn for_employee(employee_id: &Option<String>) -> String {
    match employee_id {
        Some(id) => format!(" for employee {}", id),
        None => String::new(),
    }
}

pub type MigrationResult<T> = Result<T, MigrationError>;
