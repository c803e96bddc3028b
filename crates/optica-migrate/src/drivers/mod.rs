//! Source and sink driver implementations.
//!
//! - [`mysql`]: MySQL source reader (SQLx)
//! - [`mongo`]: MongoDB document sink
//! - [`memory`]: in-memory source and sink for dry runs and tests
//!
//! # Adding New Endpoints
//!
//! 1. Create a new module under `drivers/`
//! 2. Implement [`SourceReader`](crate::core::SourceReader) or
//!    [`DocumentSink`](crate::core::DocumentSink)
//! 3. Wire it into [`Orchestrator::connect`](crate::orchestrator::Orchestrator::connect)

pub mod memory;
pub mod mongo;
pub mod mysql;

pub use memory::{MemorySink, MemorySource};
pub use mongo::MongoSink;
pub use mysql::MysqlReader;
