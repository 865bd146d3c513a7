//! CLI command implementations.
//!
//! Each `run_*` function loads what it needs from the [`Config`], does the
//! work, and prints results to stdout. Diagnostics go through `tracing`
//! (stderr), progress through the selected [`ProgressMode`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use org_graph_core::overlay::OverlayStore;
use org_graph_core::{MigrationEngine, MigrationOptions, MigrationReport};

use crate::config::{Config, ConnectionConfig};
use crate::connections::GraphClient;
use crate::directory::DirectoryClient;
use crate::overlay_file::JsonFileOverlays;
use crate::progress::{format_number, ProgressMode};
use crate::rules::RuleValidator;
use crate::sqlite_graph::SqliteGraph;

/// Command-line overrides for `orgraph migrate`.
#[derive(Debug, Clone, Default)]
pub struct MigrateArgs {
    pub root: Option<String>,
    pub connection: Option<String>,
    pub no_reset: bool,
    pub delay_ms: Option<u64>,
    pub root_only: bool,
    pub progress: Option<ProgressMode>,
    pub json: bool,
}

/// Merge config values and CLI overrides into run options.
pub fn migration_options(config: &Config, args: &MigrateArgs) -> Result<MigrationOptions> {
    let root = match args
        .root
        .clone()
        .or_else(|| config.migration.root_employee_id.clone())
    {
        Some(root) if !root.trim().is_empty() => root,
        _ => bail!("No root employee: pass --root or set migration.root_employee_id"),
    };

    let connection = args
        .connection
        .clone()
        .unwrap_or_else(|| config.migration.connection.clone());
    if !config.graph.connections.contains_key(&connection) {
        bail!(
            "Unknown connection '{}'. Run `orgraph connections` to list them.",
            connection
        );
    }

    let delay_ms = args.delay_ms.unwrap_or(config.migration.request_delay_ms);

    Ok(MigrationOptions::new(root)
        .connection(connection)
        .reset_graph(config.migration.reset && !args.no_reset)
        .request_delay(Duration::from_millis(delay_ms))
        .include_subordinates(config.migration.include_subordinates && !args.root_only))
}

async fn load_overlays(config: &Config) -> Result<OverlayStore> {
    match &config.overlays.path {
        Some(path) => {
            let source = JsonFileOverlays::new(path, config.overlays.required);
            OverlayStore::load(&source)
                .await
                .with_context(|| format!("Failed to load overlays from {}", path.display()))
        }
        None => Ok(OverlayStore::empty()),
    }
}

pub async fn run_migrate(config: &Config, args: &MigrateArgs) -> Result<()> {
    let options = migration_options(config, args)?;

    let source = Arc::new(DirectoryClient::new(&config.directory)?);
    let sink = Arc::new(GraphClient::connect(config, &options.connection).await?);
    let overlays = Arc::new(load_overlays(config).await?);
    let validator = Arc::new(RuleValidator::from_config(&config.validation)?);
    let progress = args
        .progress
        .unwrap_or_else(ProgressMode::default_for_tty)
        .reporter();

    let engine = MigrationEngine::new(source, sink, overlays)
        .with_validator(validator)
        .with_progress(progress);
    let report = engine.migrate(&options).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &MigrationReport) {
    println!("--- Migration ---");
    println!("run_id:                {}", report.run_id);
    println!("connection:            {}", report.connection);
    println!(
        "started_at:            {}",
        report.started_at.format("%Y-%m-%dT%H:%M:%SZ")
    );
    if let Some(finished) = report.finished_at {
        let elapsed = finished - report.started_at;
        println!(
            "finished_at:           {} ({}s)",
            finished.format("%Y-%m-%dT%H:%M:%SZ"),
            elapsed.num_seconds()
        );
    }
    println!("employees:             {}", format_number(report.employees));
    println!("positions:             {}", format_number(report.positions));
    println!("locations merged:      {}", format_number(report.locations_merged));
    println!("departments merged:    {}", format_number(report.departments_merged));
    println!(
        "statements / batches:  {} / {}",
        format_number(report.statements),
        format_number(report.batches)
    );
    println!("nodes created:         {}", format_number(report.nodes_created));
    println!(
        "relationships created: {}",
        format_number(report.relationships_created)
    );
    println!("unmatched edges:       {}", format_number(report.unmatched_edges));
    println!("slots skipped:         {}", format_number(report.slots_skipped));
    println!("slots rejected:        {}", format_number(report.slots_rejected));
    println!("employees rejected:    {}", format_number(report.employees_rejected));
}

fn request_delay(config: &Config) -> Duration {
    Duration::from_millis(config.migration.request_delay_ms)
}

/// List department names for `locations`, or for the configured central
/// locations when none are given.
pub async fn run_departments(config: &Config, locations: &[String], json: bool) -> Result<()> {
    let locations = if locations.is_empty() {
        config.directory.central_locations.as_slice()
    } else {
        locations
    };
    if locations.is_empty() {
        bail!("No locations: pass --location or set directory.central_locations");
    }

    let client = DirectoryClient::new(&config.directory)?;
    let departments = client.departments(locations, request_delay(config)).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&departments)?);
    } else {
        for name in &departments {
            println!("{}", name);
        }
        eprintln!(
            "{} departments across {} locations",
            departments.len(),
            locations.len()
        );
    }
    Ok(())
}

pub async fn run_head(config: &Config, department: &str, json: bool) -> Result<()> {
    let client = DirectoryClient::new(&config.directory)?;
    let head = match client
        .department_head(department, request_delay(config))
        .await?
    {
        Some(record) => record,
        None => bail!("No employee found for department: {}", department),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&head)?);
        return Ok(());
    }

    println!("--- Department Head ---");
    println!("department:   {}", department);
    println!("employee_id:  {}", head.employee_id);
    println!("name:         {}", head.display_name);
    if let Some(ref email) = head.email {
        println!("email:        {}", email);
    }
    let primary = head.slot(0);
    if let Some(ref title) = primary.job_title {
        println!("position:     {}", title);
    }
    if let Some(ref location) = primary.location_name {
        println!("location:     {}", location);
    }
    Ok(())
}

/// Create the graph tables of every SQLite connection.
pub async fn run_init(config: &Config) -> Result<()> {
    let mut initialized = 0;
    for (alias, cfg) in &config.graph.connections {
        if let ConnectionConfig::Sqlite(sq) = cfg {
            let graph = SqliteGraph::open(&sq.path)
                .await
                .with_context(|| format!("Failed to initialize connection '{}'", alias))?;
            graph.close().await;
            println!("Initialized {} at {}", alias, sq.path.display());
            initialized += 1;
        }
    }
    if initialized == 0 {
        println!("No sqlite connections configured; nothing to initialize.");
    }
    Ok(())
}
