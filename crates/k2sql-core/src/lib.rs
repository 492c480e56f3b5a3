//! K2SQL Core - batched relational write engine for change-record streams
//!
//! This library buffers change records per destination table and flushes
//! them to a relational database as batched SQL statements, with:
//!
//! - Schema-homogeneous batches detected via key/value schema pairs
//! - Automatic table creation and column evolution through a pluggable dialect
//! - Insert, upsert, update and multi-row insert write strategies
//! - Tombstone records applied as keyed DELETEs
//! - Per-row execution verification tolerating drivers that report no counts
//!
//! The record source, offset commits and connection management live in the
//! host runtime; this crate owns everything between "record received" and
//! "rows durably written".

pub mod buffer;
pub mod config;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod metadata;
pub mod record;
pub mod structure;
pub mod table;
pub mod writer;

// Re-export commonly used types
pub use buffer::BufferedRecords;
pub use config::{InsertMode, PrimaryKeyMode, SinkConfig};
pub use connection::{BatchResult, DbConnection, PreparedStatement, SqlParam};
pub use dialect::{DatabaseDialect, PostgresDialect, SqliteDialect};
pub use error::{DatabaseError, ExecutionError, SchemaError};
pub use error::{Error, Result};
pub use metadata::FieldsMetadata;
pub use record::{Schema, SchemaPair, SchemaType, SinkRecord, Value};
pub use structure::TableStructure;
pub use table::{ColumnId, TableDefinition, TableId};
pub use writer::DbWriter;
