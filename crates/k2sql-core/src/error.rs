//! Error types for the k2sql core library.
//!
//! Uses hierarchical domain-specific errors following the thiserror pattern.

use crate::config::InsertMode;
use thiserror::Error;

/// Result type alias for k2sql operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level error type for k2sql.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Destination schema / DDL error
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Batch execution contract violation
    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    /// Driver or transport error surfaced by the database layer
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Destination schema and DDL errors.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// Table does not exist and auto-creation is disabled
    #[error("table '{table}' is missing and auto-creation is disabled")]
    TableMissing {
        /// Destination table
        table: String,
    },

    /// Required columns are absent and auto-evolution is disabled
    #[error("table '{table}' is missing columns {columns:?} and auto-evolution is disabled")]
    ColumnsMissing {
        /// Destination table
        table: String,
        /// Columns required by the record schema but absent from the table
        columns: Vec<String>,
    },

    /// A column cannot be added without breaking existing rows
    #[error(
        "cannot alter table '{table}' to add column '{column}': \
         the field is not optional and has no default value"
    )]
    NonOptionalColumn {
        /// Destination table
        table: String,
        /// Offending column
        column: String,
    },
}

/// Batch execution verification errors.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// Per-row success counts did not cover the whole batch
    #[error(
        "update count ({actual}) did not sum up to total number of {record_type} \
         records ({expected}) for table '{table}' in {mode} mode"
    )]
    CountMismatch {
        /// Destination table
        table: String,
        /// Active insert mode
        mode: InsertMode,
        /// "regular" or "tombstone"
        record_type: &'static str,
        /// Batch size
        expected: usize,
        /// Observed successful-row sum
        actual: u64,
    },
}

/// Errors surfaced by the database connection layer.
///
/// These wrap whatever the driver reports; the engine propagates them
/// unmodified so the caller keeps its redelivery semantics.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Connection-level failure
    #[error("connection failed: {0}")]
    Connection(String),

    /// Statement preparation failed
    #[error("statement prepare failed: {0}")]
    Prepare(String),

    /// Parameter binding failed
    #[error("bind failed at parameter {index}: {message}")]
    Bind {
        /// 1-based parameter position
        index: usize,
        /// Driver message
        message: String,
    },

    /// Batch execution failed
    #[error("batch execution failed: {0}")]
    Execute(String),

    /// DDL execution failed
    #[error("DDL execution failed: {0}")]
    Ddl(String),

    /// Table metadata query failed
    #[error("metadata query failed: {0}")]
    Metadata(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
