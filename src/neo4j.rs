//! Neo4j backend over the HTTP transactional endpoint.
//!
//! Each batch is one `POST {url}/db/{database}/tx/commit` carrying every
//! statement of the batch, so the server applies the batch in a single
//! transaction and rolls it back if any statement fails. Counters come
//! from `includeStats`.
//!
//! ```json
//! {"statements": [{"statement": "MERGE ...", "parameters": {...}, "includeStats": true}]}
//! ```

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use org_graph_core::graph::{
    Batch, BatchOutcome, GraphError, GraphSink, Statement, RESET_CYPHER,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::Neo4jConfig;

#[derive(Serialize)]
struct CommitRequest<'a> {
    statements: Vec<CypherStatement<'a>>,
}

#[derive(Serialize)]
struct CypherStatement<'a> {
    statement: &'a str,
    parameters: Map<String, Value>,
    #[serde(rename = "includeStats")]
    include_stats: bool,
}

#[derive(Debug, Deserialize)]
struct CommitResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    #[serde(default)]
    errors: Vec<ServerError>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    stats: Option<Stats>,
}

#[derive(Debug, Default, Deserialize)]
struct Stats {
    #[serde(default)]
    nodes_created: u64,
    #[serde(default)]
    relationships_created: u64,
}

#[derive(Debug, Deserialize)]
struct ServerError {
    code: String,
    message: String,
}

pub struct Neo4jGraph {
    client: reqwest::Client,
    commit_url: String,
    user: Option<String>,
    password: Option<String>,
}

impl Neo4jGraph {
    /// Build the client. The password is read from the environment
    /// variable named by `password_env` now, not per request.
    pub fn new(config: &Neo4jConfig) -> Result<Self> {
        let password = match &config.password_env {
            Some(var) => Some(
                std::env::var(var)
                    .with_context(|| format!("Neo4j password variable {} is not set", var))?,
            ),
            None => None,
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            commit_url: format!(
                "{}/db/{}/tx/commit",
                config.url.trim_end_matches('/'),
                config.database
            ),
            user: config.user.clone(),
            password,
        })
    }

    pub fn commit_url(&self) -> &str {
        &self.commit_url
    }

    async fn commit(
        &self,
        connection: &str,
        statements: Vec<CypherStatement<'_>>,
    ) -> Result<CommitResponse, GraphError> {
        let transport = |message: String| GraphError::Transport {
            connection: connection.to_string(),
            message,
        };

        let mut req = self
            .client
            .post(&self.commit_url)
            .header("Accept", "application/json")
            .json(&CommitRequest { statements });
        if let Some(user) = &self.user {
            req = req.basic_auth(user, self.password.as_deref());
        }

        let resp = req.send().await.map_err(|e| transport(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(transport(format!("HTTP {}: {}", status.as_u16(), body)));
        }

        let body: CommitResponse = resp.json().await.map_err(|e| transport(e.to_string()))?;
        if let Some(err) = body.errors.first() {
            return Err(GraphError::Statement {
                connection: connection.to_string(),
                code: err.code.clone(),
                message: err.message.clone(),
            });
        }
        Ok(body)
    }
}

/// Results come back in statement order, one per statement sent.
fn outcome_of(statements: &[Statement], body: CommitResponse) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();
    for (statement, result) in statements.iter().zip(body.results) {
        let stats = result.stats.unwrap_or_default();
        outcome += BatchOutcome::of_statement(
            statement,
            stats.nodes_created,
            stats.relationships_created,
        );
    }
    outcome
}

#[async_trait]
impl GraphSink for Neo4jGraph {
    async fn reset(&self, connection: &str) -> Result<(), GraphError> {
        self.commit(
            connection,
            vec![CypherStatement {
                statement: RESET_CYPHER,
                parameters: Map::new(),
                include_stats: false,
            }],
        )
        .await?;
        Ok(())
    }

    async fn run(&self, batch: &Batch) -> Result<BatchOutcome, GraphError> {
        let statements = batch
            .statements()
            .iter()
            .map(|s| CypherStatement {
                statement: s.cypher(),
                parameters: s.parameters(),
                include_stats: true,
            })
            .collect();

        let body = self.commit(batch.connection(), statements).await?;
        let outcome = outcome_of(batch.statements(), body);
        debug!(
            connection = batch.connection(),
            statements = batch.len(),
            nodes = outcome.nodes_created,
            relationships = outcome.relationships_created,
            "neo4j batch committed"
        );
        Ok(outcome)
    }
}
