//! Named graph connections.
//!
//! [`GraphClient`] maps connection aliases from `[graph.connections.<alias>]`
//! to backends and routes each batch to the backend its alias names. An
//! alias that is not registered fails with
//! [`GraphError::UnknownConnection`].

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use org_graph_core::graph::memory::InMemoryGraph;
use org_graph_core::graph::{Batch, BatchOutcome, GraphError, GraphSink};

use crate::config::{Config, ConnectionConfig};
use crate::neo4j::Neo4jGraph;
use crate::sqlite_graph::SqliteGraph;

#[derive(Default)]
pub struct GraphClient {
    backends: BTreeMap<String, Arc<dyn GraphSink>>,
}

impl GraphClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open every connection defined in the config.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let mut client = Self::new();
        for (alias, cfg) in &config.graph.connections {
            client.register(alias.clone(), open_backend(alias, cfg).await?);
        }
        Ok(client)
    }

    /// Open only `alias`, so credentials of unused connections are not
    /// required.
    pub async fn connect(config: &Config, alias: &str) -> Result<Self> {
        let cfg = config
            .graph
            .connections
            .get(alias)
            .ok_or_else(|| GraphError::UnknownConnection(alias.to_string()))?;
        let mut client = Self::new();
        client.register(alias, open_backend(alias, cfg).await?);
        Ok(client)
    }

    pub fn register(&mut self, alias: impl Into<String>, backend: Arc<dyn GraphSink>) {
        self.backends.insert(alias.into(), backend);
    }

    fn backend(&self, alias: &str) -> Result<&Arc<dyn GraphSink>, GraphError> {
        self.backends
            .get(alias)
            .ok_or_else(|| GraphError::UnknownConnection(alias.to_string()))
    }
}

#[async_trait]
impl GraphSink for GraphClient {
    async fn reset(&self, connection: &str) -> Result<(), GraphError> {
        self.backend(connection)?.reset(connection).await
    }

    async fn run(&self, batch: &Batch) -> Result<BatchOutcome, GraphError> {
        self.backend(batch.connection())?.run(batch).await
    }
}

async fn open_backend(alias: &str, cfg: &ConnectionConfig) -> Result<Arc<dyn GraphSink>> {
    let backend: Arc<dyn GraphSink> = match cfg {
        ConnectionConfig::Neo4j(neo) => Arc::new(
            Neo4jGraph::new(neo)
                .with_context(|| format!("Failed to configure connection '{}'", alias))?,
        ),
        ConnectionConfig::Sqlite(sq) => Arc::new(
            SqliteGraph::open(&sq.path)
                .await
                .with_context(|| format!("Failed to open connection '{}'", alias))?,
        ),
        ConnectionConfig::Memory => Arc::new(InMemoryGraph::new()),
    };
    Ok(backend)
}

/// Print the configured connections, one per line.
pub fn list_connections(config: &Config) -> Result<()> {
    println!("{:<16} {:<8} {:<8} TARGET", "CONNECTION", "BACKEND", "DEFAULT");
    for (alias, cfg) in &config.graph.connections {
        let target = match cfg {
            ConnectionConfig::Neo4j(neo) => format!("{} (db {})", neo.url, neo.database),
            ConnectionConfig::Sqlite(sq) => sq.path.display().to_string(),
            ConnectionConfig::Memory => "-".to_string(),
        };
        let default = if *alias == config.migration.connection {
            "yes"
        } else {
            ""
        };
        println!(
            "{:<16} {:<8} {:<8} {}",
            alias,
            cfg.backend(),
            default,
            target
        );
    }
    Ok(())
}
