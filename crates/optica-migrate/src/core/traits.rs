//! Core traits for the relational source and the document sink.
//!
//! - [`SourceReader`]: scans whole relational tables into [`SourceRow`]s
//! - [`DocumentSink`]: clears, bulk-inserts and counts document collections
//!
//! The engine only ever talks to these two seams; the MySQL and MongoDB
//! drivers implement them for real runs and the in-memory driver for tests
//! and dry runs.

use async_trait::async_trait;
use mongodb::bson::Document;

use crate::error::Result;

use super::row::SourceRow;

/// Read data from a relational source.
#[async_trait]
pub trait SourceReader: Send + Sync {
    /// List the table names visible in the source database.
    async fn list_tables(&self) -> Result<Vec<String>>;

    /// Fetch every row of a table in source-natural order.
    ///
    /// No filtering is applied. Fails with `SourceUnavailable` if the table
    /// or the connection cannot be reached.
    async fn read_table(&self, table: &str) -> Result<Vec<SourceRow>>;

    /// Number of rows in a table.
    async fn row_count(&self, table: &str) -> Result<u64>;

    /// Round-trip a trivial query to check the connection.
    async fn ping(&self) -> Result<()>;

    /// Get the database type identifier (e.g., "mysql", "memory").
    fn db_type(&self) -> &str;

    /// Release the connection pool.
    async fn close(&self);
}

/// Write documents to a document store.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    /// Delete every document in a collection. Returns the number removed.
    async fn clear_collection(&self, collection: &str) -> Result<u64>;

    /// Insert documents in order. Returns the number inserted.
    async fn bulk_insert(&self, collection: &str, documents: Vec<Document>) -> Result<u64>;

    /// Count the documents in a collection.
    async fn count(&self, collection: &str) -> Result<u64>;

    /// Round-trip a trivial command to check the connection.
    async fn ping(&self) -> Result<()>;

    /// Get the store type identifier (e.g., "mongodb", "memory").
    fn db_type(&self) -> &str;

    /// Release the client.
    async fn close(&self);
}
