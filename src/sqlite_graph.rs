//! SQLite graph backend.
//!
//! Stores the organizational graph in two tables (see [`crate::schema`])
//! and applies each [`Statement`] with plain SQL that reproduces the MATCH,
//! CREATE and MERGE behaviour of its Cypher template. A batch runs inside
//! one transaction: either every statement lands or none does.

use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;
use org_graph_core::graph::{
    labels, relationships, Batch, BatchOutcome, GraphError, GraphSink, Statement,
};
use serde_json::{json, Value};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::{db, schema};

pub struct SqliteGraph {
    pool: SqlitePool,
}

impl SqliteGraph {
    /// Open the database at `path`, creating the file and tables if needed.
    pub async fn open(path: &Path) -> Result<Self> {
        let pool = db::connect(path).await?;
        schema::ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn count_nodes(&self, label: &str) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM graph_nodes WHERE label = ?")
            .bind(label)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn count_relationships(&self, rel_type: &str) -> Result<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM graph_edges WHERE rel_type = ?")
                .bind(rel_type)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    /// Properties of every node with `label`, oldest first.
    pub async fn node_properties(&self, label: &str) -> Result<Vec<Value>> {
        let rows: Vec<String> =
            sqlx::query_scalar("SELECT properties FROM graph_nodes WHERE label = ? ORDER BY id")
                .bind(label)
                .fetch_all(&self.pool)
                .await?;
        rows.iter()
            .map(|raw| serde_json::from_str(raw).map_err(Into::into))
            .collect()
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn storage(connection: &str) -> impl Fn(sqlx::Error) -> GraphError + '_ {
    move |e| GraphError::Storage {
        connection: connection.to_string(),
        message: e.to_string(),
    }
}

async fn insert_node(
    conn: &mut SqliteConnection,
    label: &str,
    key: &str,
    run_id: Option<&str>,
    properties: &Value,
    batch: i64,
) -> Result<i64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO graph_nodes (label, key, run_id, properties, batch, created_at)
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(label)
    .bind(key)
    .bind(run_id)
    .bind(properties.to_string())
    .bind(batch)
    .bind(chrono::Utc::now().timestamp())
    .execute(&mut *conn)
    .await?;
    Ok(result.last_insert_rowid())
}

async fn insert_edge(
    conn: &mut SqliteConnection,
    rel_type: &str,
    from: i64,
    to: i64,
    properties: &Value,
    batch: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO graph_edges (rel_type, from_id, to_id, properties, batch)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(rel_type)
    .bind(from)
    .bind(to)
    .bind(properties.to_string())
    .bind(batch)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Insert a node unless one with the same label and key exists.
async fn merge_node(
    conn: &mut SqliteConnection,
    label: &str,
    key: &str,
    properties: &Value,
    batch: i64,
) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        "INSERT INTO graph_nodes (label, key, run_id, properties, batch, created_at)
         SELECT ?, ?, NULL, ?, ?, ?
         WHERE NOT EXISTS (SELECT 1 FROM graph_nodes WHERE label = ? AND key = ?)",
    )
    .bind(label)
    .bind(key)
    .bind(properties.to_string())
    .bind(batch)
    .bind(chrono::Utc::now().timestamp())
    .bind(label)
    .bind(key)
    .execute(&mut *conn)
    .await?;
    Ok(result.rows_affected())
}

async fn node_ids(
    conn: &mut SqliteConnection,
    label: &str,
    key: &str,
    run_id: Option<&str>,
) -> Result<Vec<i64>, sqlx::Error> {
    match run_id {
        Some(run_id) => {
            sqlx::query_scalar(
                "SELECT id FROM graph_nodes WHERE label = ? AND key = ? AND run_id = ? ORDER BY id",
            )
            .bind(label)
            .bind(key)
            .bind(run_id)
            .fetch_all(&mut *conn)
            .await
        }
        None => {
            sqlx::query_scalar("SELECT id FROM graph_nodes WHERE label = ? AND key = ? ORDER BY id")
                .bind(label)
                .bind(key)
                .fetch_all(&mut *conn)
                .await
        }
    }
}

async fn apply(
    conn: &mut SqliteConnection,
    statement: &Statement,
    batch: i64,
) -> Result<BatchOutcome, sqlx::Error> {
    let mut outcome = BatchOutcome::default();

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
            let properties = json!({
                "employee_id": employee_id,
                "display_name": display_name,
                "first_name": first_name,
                "last_name": last_name,
                "email": email,
                "phone": phone,
                "run_id": run_id,
            });
            insert_node(
                conn,
                labels::EMPLOYEE,
                employee_id,
                Some(run_id),
                &properties,
                batch,
            )
            .await?;
            outcome.nodes_created += 1;
        }
        Statement::MergeLocation { code, name } => {
            let properties = json!({ "code": code, "name": name });
            outcome.nodes_created +=
                merge_node(conn, labels::LOCATION, code, &properties, batch).await?;
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
            let employees = node_ids(conn, labels::EMPLOYEE, employee_id, Some(run_id)).await?;
            let locations = node_ids(conn, labels::LOCATION, location_code, None).await?;
            let properties = json!({
                "position_id": position_id,
                "description": description,
                "weight": weight,
                "run_id": run_id,
            });
            for &e in &employees {
                for &l in &locations {
                    let p = insert_node(
                        conn,
                        labels::POSITION,
                        position_id,
                        Some(run_id),
                        &properties,
                        batch,
                    )
                    .await?;
                    insert_edge(
                        conn,
                        relationships::HAS_POSITION,
                        e,
                        p,
                        &json!({ "primary": primary }),
                        batch,
                    )
                    .await?;
                    insert_edge(conn, relationships::IS_LOCATED_AT, p, l, &json!({}), batch)
                        .await?;
                    outcome.nodes_created += 1;
                    outcome.relationships_created += 2;
                }
            }
        }
        Statement::ReportsTo {
            run_id,
            position_id,
            manager_position_id,
        } => {
            let result = sqlx::query(
                "INSERT INTO graph_edges (rel_type, from_id, to_id, properties, batch)
                 SELECT ?, sp.id, mp.id, '{}', ?
                 FROM graph_nodes sp, graph_nodes mp
                 WHERE sp.label = ? AND sp.key = ? AND sp.run_id = ?
                   AND mp.label = ? AND mp.key = ? AND mp.run_id = ?",
            )
            .bind(relationships::REPORTS_TO)
            .bind(batch)
            .bind(labels::POSITION)
            .bind(position_id)
            .bind(run_id)
            .bind(labels::POSITION)
            .bind(manager_position_id)
            .bind(run_id)
            .execute(&mut *conn)
            .await?;
            outcome.relationships_created += result.rows_affected();
        }
        Statement::MergeDepartment { name, slug } => {
            let properties = json!({ "name": name, "slug": slug });
            outcome.nodes_created +=
                merge_node(conn, labels::DEPARTMENT, name, &properties, batch).await?;
        }
        Statement::HeadedBy {
            run_id,
            department,
            position_id,
        } => {
            let result = sqlx::query(
                "INSERT INTO graph_edges (rel_type, from_id, to_id, properties, batch)
                 SELECT ?, d.id, p.id, '{}', ?
                 FROM graph_nodes d, graph_nodes p
                 WHERE d.label = ? AND d.key = ?
                   AND p.label = ? AND p.key = ? AND p.run_id = ?",
            )
            .bind(relationships::IS_HEADED_BY)
            .bind(batch)
            .bind(labels::DEPARTMENT)
            .bind(department)
            .bind(labels::POSITION)
            .bind(position_id)
            .bind(run_id)
            .execute(&mut *conn)
            .await?;
            outcome.relationships_created += result.rows_affected();
        }
        Statement::DivisionOf {
            run_id,
            department,
            position_id,
        } => {
            // (p)-[:REPORTS_TO]->(mp)<-[:IS_HEADED_BY]-(pd), then (d)->(pd)
            let result = sqlx::query(
                "INSERT INTO graph_edges (rel_type, from_id, to_id, properties, batch)
                 SELECT ?, d.id, head.from_id, '{}', ?
                 FROM graph_nodes p
                 JOIN graph_edges up ON up.from_id = p.id AND up.rel_type = ?
                 JOIN graph_edges head ON head.to_id = up.to_id AND head.rel_type = ?
                 JOIN graph_nodes d ON d.label = ? AND d.key = ?
                 WHERE p.label = ? AND p.key = ? AND p.run_id = ?",
            )
            .bind(relationships::IS_DIVISION_OF)
            .bind(batch)
            .bind(relationships::REPORTS_TO)
            .bind(relationships::IS_HEADED_BY)
            .bind(labels::DEPARTMENT)
            .bind(department)
            .bind(labels::POSITION)
            .bind(position_id)
            .bind(run_id)
            .execute(&mut *conn)
            .await?;
            outcome.relationships_created += result.rows_affected();
        }
    }

    Ok(BatchOutcome::of_statement(
        statement,
        outcome.nodes_created,
        outcome.relationships_created,
    ))
}

#[async_trait]
impl GraphSink for SqliteGraph {
    async fn reset(&self, connection: &str) -> Result<(), GraphError> {
        let mut tx = self.pool.begin().await.map_err(storage(connection))?;
        sqlx::query("DELETE FROM graph_edges")
            .execute(&mut *tx)
            .await
            .map_err(storage(connection))?;
        sqlx::query("DELETE FROM graph_nodes")
            .execute(&mut *tx)
            .await
            .map_err(storage(connection))?;
        tx.commit().await.map_err(storage(connection))?;
        Ok(())
    }

    async fn run(&self, batch: &Batch) -> Result<BatchOutcome, GraphError> {
        let connection = batch.connection();
        let mut tx = self.pool.begin().await.map_err(storage(connection))?;

        let seq: i64 = sqlx::query_scalar(
            "SELECT COALESCE(MAX(batch), 0) + 1 FROM (
                 SELECT batch FROM graph_nodes UNION ALL SELECT batch FROM graph_edges
             )",
        )
        .fetch_one(&mut *tx)
        .await
        .map_err(storage(connection))?;

        let mut outcome = BatchOutcome::default();
        for statement in batch.statements() {
            outcome += apply(&mut *tx, statement, seq)
                .await
                .map_err(storage(connection))?;
        }

        tx.commit().await.map_err(storage(connection))?;
        debug!(
            connection,
            batch = seq,
            nodes = outcome.nodes_created,
            relationships = outcome.relationships_created,
            "sqlite batch committed"
        );
        Ok(outcome)
    }
}
