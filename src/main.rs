//! # Org Graph CLI (`orgraph`)
//!
//! ## Usage
//!
//! ```bash
//! orgraph --config ./config/orgraph.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `orgraph init` | Create graph tables for SQLite connections |
//! | `orgraph connections` | List graph connections |
//! | `orgraph migrate` | Rebuild the graph below the root employee |
//! | `orgraph departments` | List department names by location |
//! | `orgraph head <name>` | Show the head of a department |
//! | `orgraph completions <shell>` | Print shell completions |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG`
//! (default `org_graph=info`).

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use org_graph::progress::ProgressMode;
use org_graph::run::MigrateArgs;
use org_graph::{config, connections, run};

/// Rebuild a paginated HR directory as an organizational graph.
#[derive(Parser)]
#[command(
    name = "orgraph",
    about = "Rebuild a paginated HR directory as an organizational graph",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/orgraph.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the graph tables of every sqlite connection.
    ///
    /// Idempotent. Neo4j and memory connections need no setup.
    Init,

    /// List configured graph connections.
    Connections,

    /// Rebuild the organizational graph below the root employee.
    ///
    /// Unless `--no-reset` is given, EVERYTHING on the target connection is
    /// deleted first.
    Migrate {
        /// Root employee id (overrides `migration.root_employee_id`).
        #[arg(long)]
        root: Option<String>,

        /// Graph connection alias (overrides `migration.connection`).
        #[arg(long)]
        connection: Option<String>,

        /// Keep existing graph contents.
        #[arg(long)]
        no_reset: bool,

        /// Pause before each directory request, in milliseconds.
        #[arg(long)]
        delay_ms: Option<u64>,

        /// Write the root employee only, without subordinates.
        #[arg(long)]
        root_only: bool,

        /// Progress output: `off`, `human` or `json` (stderr).
        #[arg(long, value_parser = parse_progress)]
        progress: Option<ProgressMode>,

        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List department names at the given locations.
    ///
    /// Without `--location`, `directory.central_locations` is used.
    Departments {
        /// Location code; repeat for several.
        #[arg(long = "location")]
        locations: Vec<String>,

        #[arg(long)]
        json: bool,
    },

    /// Show the head of a department.
    Head {
        /// Department name as it appears in the directory.
        department: String,

        #[arg(long)]
        json: bool,
    },

    /// Print shell completions to stdout.
    Completions {
        shell: Shell,
    },
}

fn parse_progress(s: &str) -> Result<ProgressMode, String> {
    ProgressMode::parse(s).ok_or_else(|| format!("invalid progress mode '{}' (off|human|json)", s))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "org_graph=info,org_graph_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "orgraph", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            run::run_init(&cfg).await?;
        }
        Commands::Connections => {
            connections::list_connections(&cfg)?;
        }
        Commands::Migrate {
            root,
            connection,
            no_reset,
            delay_ms,
            root_only,
            progress,
            json,
        } => {
            let args = MigrateArgs {
                root,
                connection,
                no_reset,
                delay_ms,
                root_only,
                progress,
                json,
            };
            run::run_migrate(&cfg, &args).await?;
        }
        Commands::Departments { locations, json } => {
            run::run_departments(&cfg, &locations, json).await?;
        }
        Commands::Head { department, json } => {
            run::run_head(&cfg, &department, json).await?;
        }
        Commands::Completions { .. } => {
            // Handled above (before config loading)
            unreachable!()
        }
    }

    Ok(())
}
