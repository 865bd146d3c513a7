//! Progress events emitted while a migration runs.
//!
//! The engine reports through [`ProgressReporter`]; the CLI decides where
//! the events go (stderr lines, JSON, or nowhere).

/// A single progress event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MigrationEvent {
    /// The root record was found; traversal starts.
    RootResolved { employee_id: String },
    /// Every node and relationship on the connection was deleted.
    Reset { connection: String },
    /// One employee's batch was committed.
    EmployeeWritten {
        employee_id: String,
        depth: usize,
        /// Employees written so far, this one included.
        written: u64,
    },
    /// Traversal reached every validated leaf.
    Finished { employees: u64, batches: u64 },
}

pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: MigrationEvent);
}

/// Discards every event.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: MigrationEvent) {}
}
