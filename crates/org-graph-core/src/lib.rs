//! # Org Graph Core
//!
//! Domain model and migration engine for rebuilding an HR directory as an
//! organizational graph: employees, positions, locations, departments and
//! the relationships between them.
//!
//! This crate contains no HTTP client, database driver, or filesystem I/O.
//! Those live behind the [`source::DirectorySource`],
//! [`graph::GraphSink`] and [`overlay::OverlaySource`] traits, with
//! in-memory implementations here for tests.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Directory records and wire field names |
//! | [`overlay`] | Manual override documents |
//! | [`validate`] | Eligibility predicates |
//! | [`source`] | Paged directory search abstraction |
//! | [`graph`] | Graph statements, batches, sinks |
//! | [`engine`] | Root-first tree reconstruction |
//! | [`progress`] | Run progress events |

pub mod engine;
pub mod error;
pub mod graph;
pub mod models;
pub mod overlay;
pub mod progress;
pub mod slug;
pub mod source;
pub mod validate;

pub use engine::{MigrationEngine, MigrationOptions, MigrationReport};
pub use error::{MigrationError, MigrationResult};
