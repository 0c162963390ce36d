//! Legacy content migration: validate and normalize each collection, rewrite MDX bodies,
//! relocate assets and persist a checkpoint per completed collection.

pub mod config;
pub mod graph;
pub mod normalize;
pub mod pipeline;
pub mod schema;
pub mod tables;

pub use config::MigrationConfig;
pub use graph::{processing_order, DependencyGraph};
pub use pipeline::{
    run_migration, run_migration_from_env, status, CollectionReport, CollectionState,
    CollectionStatus, MigrationPipeline, MigrationSummary,
};
pub use tables::UuidTable;

pub const CRATE_NAME: &str = "campus-migrate";
