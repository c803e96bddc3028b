//! Error types for the migration library.

use thiserror::Error;

/// Main error type for migration operations.
#[derive(Error, Debug)]
pub enum MigrateError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Source connection lost or table missing. Fatal to the whole run.
    #[error("Source unavailable while reading {table}: {message}")]
    SourceUnavailable { table: String, message: String },

    /// Destination (or source) endpoint could not be reached.
    #[error("Connection error ({endpoint}): {message}")]
    Connection { endpoint: String, message: String },

    /// The declared relationship graph contains a cycle.
    #[error("Cyclic dependency between entities: {}", .0.join(" -> "))]
    CyclicDependency(Vec<String>),

    /// A reference pointed at a key that has not been allocated yet.
    #[error("Unresolved reference {field} -> {entity} key {key}")]
    UnresolvedReference {
        entity: String,
        key: i64,
        field: String,
    },

    /// A lookup table has no row for the requested key.
    #[error("Missing lookup row in {table} for key {key}")]
    MissingLookup { table: String, key: i64 },

    /// A source row is malformed (missing key column, wrong type).
    #[error("Invalid row in {table}: {message}")]
    InvalidRow { table: String, message: String },

    /// Document sink rejected an operation
    #[error("Sink error on collection {collection}: {message}")]
    Sink { collection: String, message: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Process exit codes reported by the CLI.
pub const EXIT_CONFIG_ERROR: u8 = 1;
pub const EXIT_SOURCE_ERROR: u8 = 2;
pub const EXIT_CONNECTION_ERROR: u8 = 3;
pub const EXIT_PLAN_ERROR: u8 = 4;
pub const EXIT_DATA_ERROR: u8 = 5;
pub const EXIT_SINK_ERROR: u8 = 6;
pub const EXIT_IO_ERROR: u8 = 7;

impl MigrateError {
    /// Create a SourceUnavailable error for a table.
    pub fn source(table: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::SourceUnavailable {
            table: table.into(),
            message: message.to_string(),
        }
    }

    /// Create a Connection error with the endpoint it occurred on.
    pub fn connection(endpoint: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Connection {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    /// Create a Sink error
    pub fn sink(collection: impl Into<String>, message: impl ToString) -> Self {
        MigrateError::Sink {
            collection: collection.into(),
            message: message.to_string(),
        }
    }

    /// Create an InvalidRow error
    pub fn invalid_row(table: impl Into<String>, message: impl Into<String>) -> Self {
        MigrateError::InvalidRow {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Whether the error only invalidates the row being transformed.
    ///
    /// Row-level errors are caught at the row boundary inside a transformer;
    /// every other variant unwinds to the orchestrator.
    pub fn is_row_level(&self) -> bool {
        matches!(
            self,
            MigrateError::UnresolvedReference { .. }
                | MigrateError::MissingLookup { .. }
                | MigrateError::InvalidRow { .. }
        )
    }

    /// Exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        match self {
            MigrateError::Config(_) | MigrateError::Yaml(_) => EXIT_CONFIG_ERROR,
            MigrateError::SourceUnavailable { .. } => EXIT_SOURCE_ERROR,
            MigrateError::Connection { .. } => EXIT_CONNECTION_ERROR,
            MigrateError::CyclicDependency(_) => EXIT_PLAN_ERROR,
            MigrateError::UnresolvedReference { .. }
            | MigrateError::MissingLookup { .. }
            | MigrateError::InvalidRow { .. } => EXIT_DATA_ERROR,
            MigrateError::Sink { .. } | MigrateError::Json(_) => EXIT_SINK_ERROR,
            MigrateError::Io(_) => EXIT_IO_ERROR,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
