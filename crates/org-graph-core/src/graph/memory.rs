//! In-memory [`GraphSink`] for testing and dry runs.
//!
//! Keeps one property graph per connection alias behind a `RwLock` and
//! applies [`Statement`]s with the same MATCH/CREATE/MERGE behaviour the
//! Cypher templates have. Every node and relationship remembers the
//! sequence number of the batch that created it, so tests can check the
//! order in which parts of the graph appeared.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{labels, relationships, Batch, BatchOutcome, GraphError, GraphSink, Statement};

#[derive(Debug, Clone)]
pub struct Node {
    pub id: u64,
    pub label: &'static str,
    pub properties: Map<String, Value>,
    /// Sequence number (1-based) of the batch that created the node.
    pub batch: u64,
}

impl Node {
    pub fn prop(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone)]
pub struct Relationship {
    pub id: u64,
    pub rel_type: &'static str,
    pub from: u64,
    pub to: u64,
    pub properties: Map<String, Value>,
    pub batch: u64,
}

/// The contents of one connection.
#[derive(Debug, Clone, Default)]
pub struct GraphState {
    nodes: Vec<Node>,
    relationships: Vec<Relationship>,
    next_id: u64,
}

impl GraphState {
    pub fn nodes(&self, label: &str) -> impl Iterator<Item = &Node> {
        let label = label.to_string();
        self.nodes.iter().filter(move |n| n.label == label)
    }

    pub fn count(&self, label: &str) -> usize {
        self.nodes(label).count()
    }

    pub fn relationships(&self, rel_type: &str) -> impl Iterator<Item = &Relationship> {
        let rel_type = rel_type.to_string();
        self.relationships
            .iter()
            .filter(move |r| r.rel_type == rel_type)
    }

    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    pub fn node(&self, id: u64) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Nodes with `label` whose string property `key` equals `value`.
    pub fn find(&self, label: &str, key: &str, value: &str) -> Vec<&Node> {
        self.nodes(label)
            .filter(|n| n.prop(key) == Some(value))
            .collect()
    }

    fn matching(&self, label: &str, props: &[(&str, &str)]) -> Vec<u64> {
        self.nodes(label)
            .filter(|n| props.iter().all(|(k, v)| n.prop(k) == Some(*v)))
            .map(|n| n.id)
            .collect()
    }

    fn create_node(&mut self, label: &'static str, properties: Value, batch: u64) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        let properties = match properties {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.nodes.push(Node {
            id,
            label,
            properties,
            batch,
        });
        id
    }

    fn create_relationship(
        &mut self,
        rel_type: &'static str,
        from: u64,
        to: u64,
        properties: Value,
        batch: u64,
    ) {
        self.next_id += 1;
        let properties = match properties {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        self.relationships.push(Relationship {
            id: self.next_id,
            rel_type,
            from,
            to,
            properties,
            batch,
        });
    }

    fn apply(&mut self, statement: &Statement, batch: u64) -> BatchOutcome {
        let nodes_before = self.nodes.len();
        let rels_before = self.relationships.len();

        match statement {
            Statement::CreateEmployee {
                run_id,
                employee_id,
                display_name,
                first_name,
                last_name,
                email,
                phone,
            } => {
                self.create_node(
                    labels::EMPLOYEE,
                    json!({
                        "employee_id": employee_id,
                        "display_name": display_name,
                        "first_name": first_name,
                        "last_name": last_name,
                        "email": email,
                        "phone": phone,
                        "run_id": run_id,
                    }),
                    batch,
                );
            }
            Statement::MergeLocation { code, name } => {
                if self.matching(labels::LOCATION, &[("code", code.as_str())]).is_empty() {
                    self.create_node(labels::LOCATION, json!({ "code": code, "name": name }), batch);
                }
            }
            Statement::CreatePosition {
                run_id,
                employee_id,
                position_id,
                description,
                weight,
                primary,
                location_code,
            } => {
                let employees = self.matching(
                    labels::EMPLOYEE,
                    &[("employee_id", employee_id.as_str()), ("run_id", run_id.as_str())],
                );
                let locations = self.matching(labels::LOCATION, &[("code", location_code.as_str())]);
                for &e in &employees {
                    for &l in &locations {
                        let p = self.create_node(
                            labels::POSITION,
                            json!({
                                "position_id": position_id,
                                "description": description,
                                "weight": weight,
                                "run_id": run_id,
                            }),
                            batch,
                        );
                        self.create_relationship(
                            relationships::HAS_POSITION,
                            e,
                            p,
                            json!({ "primary": primary }),
                            batch,
                        );
                        self.create_relationship(relationships::IS_LOCATED_AT, p, l, json!({}), batch);
                    }
                }
            }
            Statement::ReportsTo {
                run_id,
                position_id,
                manager_position_id,
            } => {
                let subordinates = self.matching(
                    labels::POSITION,
                    &[("position_id", position_id.as_str()), ("run_id", run_id.as_str())],
                );
                let managers = self.matching(
                    labels::POSITION,
                    &[("position_id", manager_position_id.as_str()), ("run_id", run_id.as_str())],
                );
                for &sp in &subordinates {
                    for &mp in &managers {
                        self.create_relationship(relationships::REPORTS_TO, sp, mp, json!({}), batch);
                    }
                }
            }
            Statement::MergeDepartment { name, slug } => {
                if self.matching(labels::DEPARTMENT, &[("name", name.as_str())]).is_empty() {
                    self.create_node(
                        labels::DEPARTMENT,
                        json!({ "name": name, "slug": slug }),
                        batch,
                    );
                }
            }
            Statement::HeadedBy {
                run_id,
                department,
                position_id,
            } => {
                let departments = self.matching(labels::DEPARTMENT, &[("name", department.as_str())]);
                let positions = self.matching(
                    labels::POSITION,
                    &[("position_id", position_id.as_str()), ("run_id", run_id.as_str())],
                );
                for &d in &departments {
                    for &p in &positions {
                        self.create_relationship(relationships::IS_HEADED_BY, d, p, json!({}), batch);
                    }
                }
            }
            Statement::DivisionOf {
                run_id,
                department,
                position_id,
            } => {
                let positions = self.matching(
                    labels::POSITION,
                    &[("position_id", position_id.as_str()), ("run_id", run_id.as_str())],
                );
                let mut parents = Vec::new();
                for &p in &positions {
                    for up in self.relationships(relationships::REPORTS_TO).filter(|r| r.from == p) {
                        for head in self
                            .relationships(relationships::IS_HEADED_BY)
                            .filter(|r| r.to == up.to)
                        {
                            parents.push(head.from);
                        }
                    }
                }
                let departments = self.matching(labels::DEPARTMENT, &[("name", department.as_str())]);
                for &pd in &parents {
                    for &d in &departments {
                        self.create_relationship(
                            relationships::IS_DIVISION_OF,
                            d,
                            pd,
                            json!({}),
                            batch,
                        );
                    }
                }
            }
        }

        BatchOutcome::of_statement(
            statement,
            (self.nodes.len() - nodes_before) as u64,
            (self.relationships.len() - rels_before) as u64,
        )
    }
}

#[derive(Default)]
struct Inner {
    graphs: HashMap<String, GraphState>,
    batches: u64,
    log: Vec<Batch>,
}

/// In-memory graph store, one [`GraphState`] per connection alias.
#[derive(Default)]
pub struct InMemoryGraph {
    inner: RwLock<Inner>,
    fail_at_batch: Option<u64>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the `n`-th submitted batch (1-based) without applying it.
    pub fn failing_at_batch(mut self, n: u64) -> Self {
        self.fail_at_batch = Some(n);
        self
    }

    /// Copy of the graph held for `connection`.
    pub fn snapshot(&self, connection: &str) -> GraphState {
        self.inner
            .read()
            .map(|inner| inner.graphs.get(connection).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Every batch that was executed successfully, in submission order.
    pub fn executed(&self) -> Vec<Batch> {
        self.inner
            .read()
            .map(|inner| inner.log.clone())
            .unwrap_or_default()
    }
}

fn poisoned(connection: &str) -> GraphError {
    GraphError::Storage {
        connection: connection.to_string(),
        message: "in-memory graph lock poisoned".to_string(),
    }
}

#[async_trait]
impl GraphSink for InMemoryGraph {
    async fn reset(&self, connection: &str) -> Result<(), GraphError> {
        let mut inner = self.inner.write().map_err(|_| poisoned(connection))?;
        inner.graphs.remove(connection);
        Ok(())
    }

    async fn run(&self, batch: &Batch) -> Result<BatchOutcome, GraphError> {
        let mut inner = self
            .inner
            .write()
            .map_err(|_| poisoned(batch.connection()))?;
        inner.batches += 1;
        let seq = inner.batches;

        if self.fail_at_batch == Some(seq) {
            return Err(GraphError::Statement {
                connection: batch.connection().to_string(),
                code: "Memory.InjectedFailure".to_string(),
                message: format!("batch {} rejected", seq),
            });
        }

        // Apply to a copy so a batch lands entirely or not at all.
        let mut state = inner
            .graphs
            .get(batch.connection())
            .cloned()
            .unwrap_or_default();
        let mut outcome = BatchOutcome::default();
        for statement in batch.statements() {
            outcome += state.apply(statement, seq);
        }
        inner.graphs.insert(batch.connection().to_string(), state);
        inner.log.push(batch.clone());
        Ok(outcome)
    }
}
