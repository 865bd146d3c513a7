//! TOML configuration.
//!
//! ```toml
//! [directory]
//! base_url = "https://sam.example.org"
//! central_locations = [44, 45, 99]
//!
//! [migration]
//! root_employee_id = "E07715"
//!
//! [overlays]
//! path = "./config/overlays.json"
//!
//! [validation]
//! excluded_job_titles = ["*Substitute*"]
//! excluded_employee_types = ["Contractor"]
//!
//! [graph.connections.default]
//! backend = "neo4j"
//! url = "http://localhost:7474"
//! user = "neo4j"
//! password_env = "NEO4J_PASSWORD"
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub directory: DirectoryConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
    #[serde(default)]
    pub overlays: OverlaysConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub graph: GraphConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DirectoryConfig {
    pub base_url: String,
    #[serde(default = "default_search_path")]
    pub search_path: String,
    #[serde(default = "default_field_values_path")]
    pub field_values_path: String,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Location codes whose departments `orgraph departments` lists by default.
    #[serde(default, deserialize_with = "location_codes")]
    pub central_locations: Vec<String>,
}

fn default_search_path() -> String {
    "/api/public/search/user".to_string()
}
fn default_field_values_path() -> String {
    "/api/public/field".to_string()
}
fn default_page_size() -> usize {
    100
}
fn default_timeout_secs() -> u64 {
    30
}

/// Location codes are numeric in the directory but written either way in
/// config files.
fn location_codes<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Code {
        Text(String),
        Number(i64),
    }

    let codes = Vec::<Code>::deserialize(deserializer)?;
    Ok(codes
        .into_iter()
        .map(|c| match c {
            Code::Text(s) => s,
            Code::Number(n) => n.to_string(),
        })
        .collect())
}

#[derive(Debug, Deserialize, Clone)]
pub struct MigrationConfig {
    #[serde(default)]
    pub root_employee_id: Option<String>,
    #[serde(default = "default_connection")]
    pub connection: String,
    #[serde(default = "default_true")]
    pub reset: bool,
    #[serde(default = "default_request_delay_ms")]
    pub request_delay_ms: u64,
    #[serde(default = "default_true")]
    pub include_subordinates: bool,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            root_employee_id: None,
            connection: default_connection(),
            reset: true,
            request_delay_ms: default_request_delay_ms(),
            include_subordinates: true,
        }
    }
}

fn default_connection() -> String {
    "default".to_string()
}
fn default_true() -> bool {
    true
}
fn default_request_delay_ms() -> u64 {
    100
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct OverlaysConfig {
    /// JSON file holding an array of overlay documents.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Fail when the file is missing instead of running without overlays.
    #[serde(default)]
    pub required: bool,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ValidationConfig {
    /// Glob patterns; a position whose job title matches is not migrated.
    #[serde(default)]
    pub excluded_job_titles: Vec<String>,
    /// Employee types whose holders (and their reports) are not migrated.
    #[serde(default)]
    pub excluded_employee_types: Vec<String>,
    /// Location codes whose positions are not migrated.
    #[serde(default, deserialize_with = "location_codes")]
    pub excluded_locations: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct GraphConfig {
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,
}

/// One named graph connection.
#[derive(Debug, Deserialize, Clone)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum ConnectionConfig {
    Neo4j(Neo4jConfig),
    Sqlite(SqliteGraphConfig),
    Memory,
}

impl ConnectionConfig {
    pub fn backend(&self) -> &'static str {
        match self {
            ConnectionConfig::Neo4j(_) => "neo4j",
            ConnectionConfig::Sqlite(_) => "sqlite",
            ConnectionConfig::Memory => "memory",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct Neo4jConfig {
    /// HTTP endpoint, e.g. `http://localhost:7474`.
    pub url: String,
    #[serde(default = "default_database")]
    pub database: String,
    #[serde(default)]
    pub user: Option<String>,
    /// Environment variable holding the password.
    #[serde(default)]
    pub password_env: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_database() -> String {
    "neo4j".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SqliteGraphConfig {
    pub path: PathBuf,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Checks that cannot be expressed in the serde schema.
pub fn validate(config: &Config) -> Result<()> {
    if config.directory.base_url.trim().is_empty() {
        anyhow::bail!("directory.base_url must not be empty");
    }

    if config.directory.page_size == 0 {
        anyhow::bail!("directory.page_size must be > 0");
    }

    if !config
        .graph
        .connections
        .contains_key(&config.migration.connection)
    {
        anyhow::bail!(
            "migration.connection '{}' is not defined under [graph.connections]",
            config.migration.connection
        );
    }

    crate::rules::RuleValidator::from_config(&config.validation)
        .context("Invalid [validation] section")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[directory]
base_url = "http://sam.local"

[graph.connections.default]
backend = "memory"
"#;

    #[test]
    fn test_defaults_fill_in() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        validate(&config).unwrap();
        assert_eq!(config.directory.search_path, "/api/public/search/user");
        assert_eq!(config.directory.page_size, 100);
        assert_eq!(config.migration.connection, "default");
        assert!(config.migration.reset);
        assert_eq!(config.migration.request_delay_ms, 100);
        assert!(config.overlays.path.is_none());
    }

    #[test]
    fn test_location_codes_accept_numbers_and_strings() {
        let config: Config = toml::from_str(
            r#"
[directory]
base_url = "http://sam.local"
central_locations = [44, "45", 99]

[graph.connections.default]
backend = "memory"
"#,
        )
        .unwrap();
        assert_eq!(config.directory.central_locations, vec!["44", "45", "99"]);
    }

    #[test]
    fn test_connection_backends() {
        let config: Config = toml::from_str(
            r#"
[directory]
base_url = "http://sam.local"

[graph.connections.default]
backend = "neo4j"
url = "http://localhost:7474"
password_env = "NEO4J_PASSWORD"

[graph.connections.local]
backend = "sqlite"
path = "/tmp/org.sqlite"
"#,
        )
        .unwrap();
        match &config.graph.connections["default"] {
            ConnectionConfig::Neo4j(neo) => {
                assert_eq!(neo.database, "neo4j");
                assert_eq!(neo.password_env.as_deref(), Some("NEO4J_PASSWORD"));
            }
            other => panic!("unexpected backend {}", other.backend()),
        }
        assert_eq!(config.graph.connections["local"].backend(), "sqlite");
    }

    #[test]
    fn test_unknown_migration_connection_rejected() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.migration.connection = "missing".to_string();
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.directory.page_size = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_bad_glob_rejected() {
        let mut config: Config = toml::from_str(MINIMAL).unwrap();
        config.validation.excluded_job_titles = vec!["[".to_string()];
        assert!(validate(&config).is_err());
    }
}
