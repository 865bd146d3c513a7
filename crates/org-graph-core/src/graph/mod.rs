//! Write side of the migration: typed graph statements, per-employee
//! batches, and the [`GraphSink`] trait that executes them.
//!
//! Every [`Statement`] renders to a Cypher template plus a parameter map;
//! values are always bound, never spliced into the template text. Backends
//! that do not speak Cypher (SQLite, the in-memory graph) match on the enum
//! directly and reproduce the same MATCH/CREATE/MERGE semantics.
//!
//! # Write semantics
//!
//! | Statement | Semantics |
//! |-----------|-----------|
//! | [`Statement::CreateEmployee`] | create (duplicates on re-run) |
//! | [`Statement::MergeLocation`] | merge by `code` |
//! | [`Statement::CreatePosition`] | create node + `HAS_POSITION` + `IS_LOCATED_AT` |
//! | [`Statement::ReportsTo`] | create edge if both positions match |
//! | [`Statement::MergeDepartment`] | merge by `name` |
//! | [`Statement::HeadedBy`] | create edge if department and position match |
//! | [`Statement::DivisionOf`] | create edge to the manager's department, if any |

pub mod memory;

use std::ops::AddAssign;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Node labels of the organizational graph.
pub mod labels {
    pub const EMPLOYEE: &str = "Employee";
    pub const POSITION: &str = "Position";
    pub const LOCATION: &str = "Location";
    pub const DEPARTMENT: &str = "Department";
}

/// Relationship types of the organizational graph.
pub mod relationships {
    pub const HAS_POSITION: &str = "HAS_POSITION";
    pub const IS_LOCATED_AT: &str = "IS_LOCATED_AT";
    pub const REPORTS_TO: &str = "REPORTS_TO";
    pub const IS_HEADED_BY: &str = "IS_HEADED_BY";
    pub const IS_DIVISION_OF: &str = "IS_DIVISION_OF";
}

/// Deletes every node and relationship on a connection.
pub const RESET_CYPHER: &str = "MATCH (n) DETACH DELETE n";

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("no graph connection named '{0}'")]
    UnknownConnection(String),
    #[error("graph connection '{connection}' unreachable: {message}")]
    Transport { connection: String, message: String },
    #[error("statement failed on '{connection}' ({code}): {message}")]
    Statement {
        connection: String,
        code: String,
        message: String,
    },
    #[error("graph storage error on '{connection}': {message}")]
    Storage { connection: String, message: String },
}

/// One parameterized write against the organizational graph.
///
/// `run_id` scopes `Employee` and `Position` nodes to the migration run that
/// created them, so edge statements never attach to copies left by an
/// earlier run on a graph that was not reset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    CreateEmployee {
        run_id: String,
        employee_id: String,
        display_name: String,
        first_name: String,
        last_name: String,
        email: Option<String>,
        phone: Option<String>,
    },
    MergeLocation {
        code: String,
        name: Option<String>,
    },
    CreatePosition {
        run_id: String,
        employee_id: String,
        position_id: String,
        description: String,
        weight: usize,
        primary: bool,
        location_code: String,
    },
    ReportsTo {
        run_id: String,
        position_id: String,
        manager_position_id: String,
    },
    MergeDepartment {
        name: String,
        slug: String,
    },
    HeadedBy {
        run_id: String,
        department: String,
        position_id: String,
    },
    DivisionOf {
        run_id: String,
        department: String,
        position_id: String,
    },
}

impl Statement {
    /// Cypher template; parameters are referenced as `$name`.
    pub fn cypher(&self) -> &'static str {
        match self {
            Statement::CreateEmployee { .. } => {
                "CREATE (e:Employee {
                    employee_id:  $employee_id,
                    display_name: $display_name,
                    first_name:   $first_name,
                    last_name:    $last_name,
                    email:        $email,
                    phone:        $phone,
                    run_id:       $run_id
                })"
            }
            Statement::MergeLocation { .. } => {
                "MERGE (l:Location {code: $code})
                 ON CREATE SET l.name = $name"
            }
            Statement::CreatePosition { .. } => {
                "MATCH (e:Employee {employee_id: $employee_id, run_id: $run_id}),
                       (l:Location {code: $code})
                 CREATE (e)-[:HAS_POSITION {primary: $primary}]->(p:Position {
                     position_id: $position_id,
                     description: $description,
                     weight:      $weight,
                     run_id:      $run_id
                 })-[:IS_LOCATED_AT]->(l)"
            }
            Statement::ReportsTo { .. } => {
                "MATCH (sp:Position {position_id: $position_id, run_id: $run_id}),
                       (mp:Position {position_id: $manager_position_id, run_id: $run_id})
                 CREATE (sp)-[:REPORTS_TO]->(mp)"
            }
            Statement::MergeDepartment { .. } => {
                "MERGE (d:Department {name: $name})
                 ON CREATE SET d.slug = $slug"
            }
            Statement::HeadedBy { .. } => {
                "MATCH (d:Department {name: $name}),
                       (p:Position {position_id: $position_id, run_id: $run_id})
                 CREATE (d)-[:IS_HEADED_BY]->(p)"
            }
            Statement::DivisionOf { .. } => {
                "MATCH (p:Position {position_id: $position_id, run_id: $run_id})
                       -[:REPORTS_TO]->(:Position)<-[:IS_HEADED_BY]-(pd:Department),
                       (d:Department {name: $name})
                 CREATE (d)-[:IS_DIVISION_OF]->(pd)"
            }
        }
    }

    /// Bound parameters for [`cypher`](Statement::cypher).
    pub fn parameters(&self) -> Map<String, Value> {
        let value = match self {
            Statement::CreateEmployee {
                run_id,
                employee_id,
                display_name,
                first_name,
                last_name,
                email,
                phone,
            } => json!({
                "run_id": run_id,
                "employee_id": employee_id,
                "display_name": display_name,
                "first_name": first_name,
                "last_name": last_name,
                "email": email,
                "phone": phone,
            }),
            Statement::MergeLocation { code, name } => json!({ "code": code, "name": name }),
            Statement::CreatePosition {
                run_id,
                employee_id,
                position_id,
                description,
                weight,
                primary,
                location_code,
            } => json!({
                "run_id": run_id,
                "employee_id": employee_id,
                "position_id": position_id,
                "description": description,
                "weight": weight,
                "primary": primary,
                "code": location_code,
            }),
            Statement::ReportsTo {
                run_id,
                position_id,
                manager_position_id,
            } => json!({
                "run_id": run_id,
                "position_id": position_id,
                "manager_position_id": manager_position_id,
            }),
            Statement::MergeDepartment { name, slug } => json!({ "name": name, "slug": slug }),
            Statement::HeadedBy {
                run_id,
                department,
                position_id,
            }
            | Statement::DivisionOf {
                run_id,
                department,
                position_id,
            } => json!({
                "run_id": run_id,
                "name": department,
                "position_id": position_id,
            }),
        };

        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    /// Relationships this statement creates when every MATCH finds exactly
    /// one node.
    pub fn expected_relationships(&self) -> u64 {
        match self {
            Statement::CreatePosition { .. } => 2,
            Statement::ReportsTo { .. }
            | Statement::HeadedBy { .. }
            | Statement::DivisionOf { .. } => 1,
            _ => 0,
        }
    }
}

/// Ordered statements for one employee, bound to one named connection.
///
/// Statements execute in append order: later statements MATCH nodes that
/// earlier statements in the same batch created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    connection: String,
    statements: Vec<Statement>,
}

impl Batch {
    pub fn new(connection: impl Into<String>) -> Self {
        Self {
            connection: connection.into(),
            statements: Vec::new(),
        }
    }

    pub fn push(&mut self, statement: Statement) {
        self.statements.push(statement);
    }

    pub fn connection(&self) -> &str {
        &self.connection
    }

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn expected_relationships(&self) -> u64 {
        self.statements
            .iter()
            .map(Statement::expected_relationships)
            .sum()
    }
}

/// Counters reported by a backend after executing statements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchOutcome {
    pub nodes_created: u64,
    pub relationships_created: u64,
    /// `Location` nodes created by merges; a merge that matched creates none.
    pub locations_created: u64,
    /// `Department` nodes created by merges.
    pub departments_created: u64,
}

impl BatchOutcome {
    /// Counters of one executed `statement`.
    pub fn of_statement(
        statement: &Statement,
        nodes_created: u64,
        relationships_created: u64,
    ) -> Self {
        let mut outcome = Self {
            nodes_created,
            relationships_created,
            ..Self::default()
        };
        match statement {
            Statement::MergeLocation { .. } => outcome.locations_created = nodes_created,
            Statement::MergeDepartment { .. } => outcome.departments_created = nodes_created,
            _ => {}
        }
        outcome
    }
}

impl AddAssign for BatchOutcome {
    fn add_assign(&mut self, other: Self) {
        self.nodes_created += other.nodes_created;
        self.relationships_created += other.relationships_created;
        self.locations_created += other.locations_created;
        self.departments_created += other.departments_created;
    }
}

/// Executes batches against named graph connections.
///
/// A batch is the unit of atomic application. Nothing is promised about
/// ordering across batches beyond the order in which callers submit them,
/// and a failed batch does not undo batches that already ran.
#[async_trait]
pub trait GraphSink: Send + Sync {
    /// Delete every node and relationship on `connection`. Irreversible.
    async fn reset(&self, connection: &str) -> Result<(), GraphError>;

    /// Open an empty batch for `connection`.
    fn stack(&self, connection: &str) -> Batch {
        Batch::new(connection)
    }

    /// Execute every statement of `batch`, in order, as one unit.
    async fn run(&self, batch: &Batch) -> Result<BatchOutcome, GraphError>;
}
