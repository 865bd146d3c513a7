//! # Org Graph
//!
//! Rebuilds the reporting structure held in a flat, paginated HR directory
//! as an organizational graph of employees, positions, locations and
//! departments.
//!
//! The domain model and the migration engine live in [`org_graph_core`];
//! this crate supplies the adapters (HTTP directory client, Neo4j and
//! SQLite graph backends, overlay files, configuration) and the `orgraph`
//! CLI.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────┐   ┌───────────────┐
//! │  Directory  │──▶│   Engine     │──▶│ GraphClient   │
//! │ search API  │   │ root-first   │   │ neo4j/sqlite/ │
//! └─────────────┘   │ walk, one    │   │ memory        │
//!        ▲          │ batch/person │   └───────────────┘
//! ┌──────┴──────┐   └──────────────┘
//! │  Overlays   │
//! │ (JSON file) │
//! └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! orgraph init                       # create sqlite graph tables
//! orgraph connections                # list graph connections
//! orgraph migrate --root E07715      # rebuild the graph
//! orgraph departments                # departments at central locations
//! orgraph head "Finance"             # who heads a department
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`directory`] | Paged directory search client |
//! | [`neo4j`] | Neo4j HTTP backend |
//! | [`sqlite_graph`] | SQLite graph backend |
//! | [`schema`] | SQLite graph tables |
//! | [`connections`] | Connection aliases and routing |
//! | [`overlay_file`] | Overlay documents on disk |
//! | [`rules`] | Configured eligibility rules |
//! | [`progress`] | Progress output |
//! | [`run`] | CLI commands |

pub mod config;
pub mod connections;
pub mod db;
pub mod directory;
pub mod neo4j;
pub mod overlay_file;
pub mod progress;
pub mod rules;
pub mod run;
pub mod schema;
pub mod sqlite_graph;
