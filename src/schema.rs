//! Tables backing the SQLite graph backend.
//!
//! Nodes and relationships each get one table. `key` holds the property a
//! node is matched on (`employee_id`, `position_id`, `code` or `name`);
//! `run_id` is set for `Employee` and `Position` nodes only. Remaining
//! properties are kept as a JSON object.

use anyhow::Result;
use sqlx::SqlitePool;

pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS graph_nodes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            label TEXT NOT NULL,
            key TEXT NOT NULL,
            run_id TEXT,
            properties TEXT NOT NULL DEFAULT '{}',
            batch INTEGER NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS graph_edges (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            rel_type TEXT NOT NULL,
            from_id INTEGER NOT NULL,
            to_id INTEGER NOT NULL,
            properties TEXT NOT NULL DEFAULT '{}',
            batch INTEGER NOT NULL,
            FOREIGN KEY (from_id) REFERENCES graph_nodes(id) ON DELETE CASCADE,
            FOREIGN KEY (to_id) REFERENCES graph_nodes(id) ON DELETE CASCADE
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_graph_nodes_label_key ON graph_nodes(label, key)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_graph_edges_from ON graph_edges(rel_type, from_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_graph_edges_to ON graph_edges(rel_type, to_id)")
        .execute(pool)
        .await?;

    Ok(())
}
