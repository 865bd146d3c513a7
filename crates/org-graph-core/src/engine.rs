//! Reconstruction of the organizational graph from the flat directory.
//!
//! Starting from a root employee, the engine walks the reporting tree
//! depth-first and pre-order. Each visited employee becomes one [`Batch`]:
//! the `Employee` node, one `Position` per eligible slot with its location
//! and reporting line, and the department links. Batches are submitted one
//! at a time, so a manager's positions always exist before any subordinate
//! batch refers to them.
//!
//! The traversal uses an explicit stack instead of recursion. Children are
//! pushed in reverse source order, which yields the same submission order
//! as the recursive formulation without tying call depth to hierarchy
//! depth. There is no cycle detection: the directory is assumed to be a
//! tree.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{MigrationError, MigrationResult};
use crate::graph::{Batch, BatchOutcome, GraphSink, Statement};
use crate::models::{fields, position_id, EmployeeRecord, SLOT_COUNT};
use crate::overlay::OverlayStore;
use crate::progress::{MigrationEvent, NoProgress, ProgressReporter};
use crate::slug::slugify;
use crate::source::{Conditions, DirectorySource};
use crate::validate::{AcceptAll, Validator};

pub const DEFAULT_CONNECTION: &str = "default";
pub const DEFAULT_REQUEST_DELAY: Duration = Duration::from_millis(100);

/// Parameters of a single run. Nothing here is kept on the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationOptions {
    pub root_employee_id: String,
    /// Named graph connection to write to.
    pub connection: String,
    /// Wipe the whole connection before writing. Irreversible.
    pub reset_graph: bool,
    /// Pause before every directory page request.
    pub request_delay: Duration,
    /// Visit direct reports of each written employee.
    pub include_subordinates: bool,
}

impl MigrationOptions {
    pub fn new(root_employee_id: impl Into<String>) -> Self {
        Self {
            root_employee_id: root_employee_id.into(),
            connection: DEFAULT_CONNECTION.to_string(),
            reset_graph: true,
            request_delay: DEFAULT_REQUEST_DELAY,
            include_subordinates: true,
        }
    }

    pub fn connection(mut self, connection: impl Into<String>) -> Self {
        self.connection = connection.into();
        self
    }

    pub fn reset_graph(mut self, reset: bool) -> Self {
        self.reset_graph = reset;
        self
    }

    pub fn request_delay(mut self, delay: Duration) -> Self {
        self.request_delay = delay;
        self
    }

    pub fn include_subordinates(mut self, include: bool) -> Self {
        self.include_subordinates = include;
        self
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationReport {
    pub run_id: String,
    pub connection: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Employees written (one batch each).
    pub employees: u64,
    /// Position statements issued.
    pub positions: u64,
    /// Distinct `Location` nodes the run's merges created. A location that
    /// already existed, or that an earlier batch created, is not counted.
    pub locations_merged: u64,
    /// Distinct `Department` nodes the run's merges created.
    pub departments_merged: u64,
    pub statements: u64,
    pub batches: u64,
    pub nodes_created: u64,
    pub relationships_created: u64,
    /// Edges whose MATCH found no endpoint (e.g. a manager outside the
    /// migrated tree, or the root's missing parent department).
    pub unmatched_edges: u64,
    /// Titled slots without a location code.
    pub slots_skipped: u64,
    /// Slots rejected by the validator.
    pub slots_rejected: u64,
    /// Direct reports rejected by the validator (with their subtrees).
    pub employees_rejected: u64,
}

impl MigrationReport {
    fn new(run_id: String, connection: String) -> Self {
        Self {
            run_id,
            connection,
            started_at: Utc::now(),
            finished_at: None,
            employees: 0,
            positions: 0,
            locations_merged: 0,
            departments_merged: 0,
            statements: 0,
            batches: 0,
            nodes_created: 0,
            relationships_created: 0,
            unmatched_edges: 0,
            slots_skipped: 0,
            slots_rejected: 0,
            employees_rejected: 0,
        }
    }

    fn record_batch(&mut self, batch: &Batch, outcome: BatchOutcome) {
        self.batches += 1;
        self.statements += batch.len() as u64;
        self.nodes_created += outcome.nodes_created;
        self.relationships_created += outcome.relationships_created;
        self.locations_merged += outcome.locations_created;
        self.departments_merged += outcome.departments_created;
        self.unmatched_edges += batch
            .expected_relationships()
            .saturating_sub(outcome.relationships_created);
    }
}

/// Statement counts for one employee, before execution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchPlan {
    pub positions: u64,
    pub slots_skipped: u64,
    pub slots_rejected: u64,
}

/// Rebuilds the reporting tree below a root employee as a graph.
///
/// The engine holds only immutable collaborators; every run-specific value
/// arrives through [`MigrationOptions`], so one engine can serve many runs.
pub struct MigrationEngine {
    source: Arc<dyn DirectorySource>,
    sink: Arc<dyn GraphSink>,
    overlays: Arc<OverlayStore>,
    validator: Arc<dyn Validator>,
    progress: Arc<dyn ProgressReporter>,
}

impl MigrationEngine {
    pub fn new(
        source: Arc<dyn DirectorySource>,
        sink: Arc<dyn GraphSink>,
        overlays: Arc<OverlayStore>,
    ) -> Self {
        Self {
            source,
            sink,
            overlays,
            validator: Arc::new(AcceptAll),
            progress: Arc::new(NoProgress),
        }
    }

    pub fn with_validator(mut self, validator: Arc<dyn Validator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// Run a full migration.
    ///
    /// # Workflow
    ///
    /// 1. Resolve the root record (fails with
    ///    [`MigrationError::RootNotFound`] before anything is written).
    /// 2. If requested, delete everything on the target connection.
    /// 3. Walk the tree root-first, one committed batch per employee.
    ///
    /// Any source or sink failure ends the run; batches already committed
    /// remain.
    pub async fn migrate(&self, options: &MigrationOptions) -> MigrationResult<MigrationReport> {
        let run_id = Uuid::new_v4().to_string();
        let connection = options.connection.as_str();
        let delay = options.request_delay;
        let mut report = MigrationReport::new(run_id.clone(), connection.to_string());

        info!(
            run_id = %run_id,
            root = %options.root_employee_id,
            connection,
            reset = options.reset_graph,
            "starting migration"
        );

        let root_conditions = Conditions::new().eq(fields::EMPLOYEE_ID, &options.root_employee_id);
        let root = self
            .source
            .find_one(&root_conditions, delay)
            .await?
            .ok_or_else(|| MigrationError::RootNotFound(options.root_employee_id.clone()))?;
        self.progress.report(MigrationEvent::RootResolved {
            employee_id: root.employee_id.clone(),
        });

        if options.reset_graph {
            self.sink
                .reset(connection)
                .await
                .map_err(|source| MigrationError::Sink {
                    employee_id: None,
                    source,
                })?;
            warn!(connection, "deleted all nodes and relationships");
            self.progress.report(MigrationEvent::Reset {
                connection: connection.to_string(),
            });
        }

        let mut pending: Vec<(EmployeeRecord, usize)> = vec![(root, 0)];

        while let Some((record, depth)) = pending.pop() {
            let employee_id = record.employee_id.clone();
            let record = self.overlays.apply(&employee_id, record);

            let (batch, plan) = self.build_batch(&record, &run_id, connection);
            let outcome = self
                .sink
                .run(&batch)
                .await
                .map_err(|source| MigrationError::Sink {
                    employee_id: Some(employee_id.clone()),
                    source,
                })?;

            report.record_batch(&batch, outcome);
            report.employees += 1;
            report.positions += plan.positions;
            report.slots_skipped += plan.slots_skipped;
            report.slots_rejected += plan.slots_rejected;

            debug!(
                employee_id = %employee_id,
                depth,
                statements = batch.len(),
                nodes = outcome.nodes_created,
                relationships = outcome.relationships_created,
                "batch committed"
            );
            self.progress.report(MigrationEvent::EmployeeWritten {
                employee_id: employee_id.clone(),
                depth,
                written: report.employees,
            });

            if !options.include_subordinates {
                continue;
            }

            let reports = self.source.direct_reports(&employee_id, delay).await?;
            let mut eligible = Vec::with_capacity(reports.len());
            for subordinate in reports {
                if self.validator.validate_employee(&subordinate) {
                    eligible.push(subordinate);
                } else {
                    debug!(
                        employee_id = %subordinate.employee_id,
                        manager = %employee_id,
                        "subordinate rejected"
                    );
                    report.employees_rejected += 1;
                }
            }
            // Reverse so the first report returned is the next one visited.
            pending.extend(eligible.into_iter().rev().map(|r| (r, depth + 1)));
        }

        report.finished_at = Some(Utc::now());
        self.progress.report(MigrationEvent::Finished {
            employees: report.employees,
            batches: report.batches,
        });
        info!(
            run_id = %run_id,
            employees = report.employees,
            nodes = report.nodes_created,
            relationships = report.relationships_created,
            unmatched_edges = report.unmatched_edges,
            "migration finished"
        );

        Ok(report)
    }

    /// Build the ordered statements for one (already merged) record.
    ///
    /// Order matters within the batch: the employee is created first so
    /// position statements can match it, and each location is merged right
    /// before the position that attaches to it.
    pub fn build_batch(
        &self,
        record: &EmployeeRecord,
        run_id: &str,
        connection: &str,
    ) -> (Batch, BatchPlan) {
        let mut batch = self.sink.stack(connection);
        let mut plan = BatchPlan::default();

        batch.push(Statement::CreateEmployee {
            run_id: run_id.to_string(),
            employee_id: record.employee_id.clone(),
            display_name: record.display_name.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
            email: record.email.clone(),
            phone: record.phone.clone(),
        });

        for weight in 0..SLOT_COUNT {
            let slot = record.slot(weight);
            let Some(job_title) = &slot.job_title else {
                continue;
            };

            if !self.validator.validate_position(weight, record) {
                plan.slots_rejected += 1;
                continue;
            }

            let Some(location_code) = &slot.location_code else {
                warn!(
                    employee_id = %record.employee_id,
                    weight,
                    "position has no location code, skipping"
                );
                plan.slots_skipped += 1;
                continue;
            };

            let pid = record.position_id(weight);

            batch.push(Statement::MergeLocation {
                code: location_code.clone(),
                name: slot.location_name.clone(),
            });

            batch.push(Statement::CreatePosition {
                run_id: run_id.to_string(),
                employee_id: record.employee_id.clone(),
                position_id: pid.clone(),
                description: job_title.clone(),
                weight,
                primary: weight == 0,
                location_code: location_code.clone(),
            });
            plan.positions += 1;

            if let Some(manager_id) = &slot.manager_id {
                batch.push(Statement::ReportsTo {
                    run_id: run_id.to_string(),
                    position_id: pid,
                    manager_position_id: position_id(manager_id, 0),
                });
            }
        }

        if let Some(department) = &record.department {
            batch.push(Statement::MergeDepartment {
                name: department.clone(),
                slug: slugify(department),
            });

            batch.push(Statement::HeadedBy {
                run_id: run_id.to_string(),
                department: department.clone(),
                position_id: record.primary_position_id(),
            });

            batch.push(Statement::DivisionOf {
                run_id: run_id.to_string(),
                department: department.clone(),
                position_id: record.primary_position_id(),
            });
        }

        (batch, plan)
    }
}
