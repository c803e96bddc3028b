//! # optica-migrate
//!
//! Dependency-ordered MySQL to MongoDB migration for the Optica store schema.
//!
//! Relational rows are folded into nested documents, integer keys are
//! replaced by freshly allocated ObjectIds, and foreign keys are rewritten
//! into `*_ref` fields that point at documents loaded earlier in the run.
//!
//! - **Declarative relationships** in [`relationships`]
//! - **Topological load order** computed by [`loader::DependencyGraph`]
//! - **Per-entity transformers** in [`transform`]
//! - **Key remapping** via [`remap::RemapContext`]
//!
//! ## Example
//!
//! ```rust,no_run
//! use optica_migrate::{Config, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> optica_migrate::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::connect(config).await?;
//!     let result = orchestrator.run().await?;
//!     println!("Inserted {} documents", result.documents_inserted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod drivers;
pub mod error;
pub mod loader;
pub mod orchestrator;
pub mod relationships;
pub mod remap;
pub mod transform;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, SourceConfig, TargetConfig};
pub use core::{DocumentSink, EntityType, SourceReader, SourceRow, Value};
pub use error::{MigrateError, Result};
pub use loader::{DependencyGraph, EntityReport, Loader};
pub use orchestrator::{
    HealthCheckResult, MigrationResult, Orchestrator, PlanStep, ValidationEntry,
};
pub use remap::RemapContext;
