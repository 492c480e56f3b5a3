//! Database connection capability consumed by the write engine.
//!
//! The engine never speaks a wire protocol itself; a host-provided
//! implementation of these traits supplies statement preparation, parameter
//! binding and batched execution. Every call is a synchronous round-trip and
//! blocks the calling worker; scheduling and timeouts are owned by the
//! connection layer. Commit and rollback boundaries belong to the caller —
//! all writes of one flush occur inside the connection's ambient transaction
//! scope.

use crate::error::DatabaseError;
use crate::record::SchemaType;
use crate::table::{TableDefinition, TableId};

/// Per-entry result of a batched statement execution.
///
/// Some drivers report success without an affected-row count; that legacy
/// convention is kept as an explicit tri-state rather than a sentinel
/// integer so the verification rule can branch on it directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchResult {
    /// The entry succeeded and affected this many rows
    Rows(u64),
    /// The entry succeeded but the driver did not report a count
    SuccessNoInfo,
    /// The entry failed
    Failed,
}

/// A parameter value bound into a prepared statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// SQL NULL, tagged with the schema type of the absent value
    Null(SchemaType),
    /// Boolean parameter
    Boolean(bool),
    /// 8-bit integer parameter
    Int8(i8),
    /// 16-bit integer parameter
    Int16(i16),
    /// 32-bit integer parameter
    Int32(i32),
    /// 64-bit integer parameter
    Int64(i64),
    /// 32-bit float parameter
    Float32(f32),
    /// 64-bit float parameter
    Float64(f64),
    /// String parameter
    Text(String),
    /// Bytes parameter
    Bytes(Vec<u8>),
}

/// A prepared statement with positional, 1-based parameters.
pub trait PreparedStatement {
    /// Bind one parameter of the current row.
    fn bind(&mut self, index: usize, param: SqlParam) -> Result<(), DatabaseError>;

    /// Seal the currently bound parameters as one batch entry.
    fn add_batch(&mut self) -> Result<(), DatabaseError>;

    /// Execute all batch entries; returns one result per entry.
    fn execute_batch(&mut self) -> Result<Vec<BatchResult>, DatabaseError>;
}

/// A live connection to the destination database.
///
/// A connection is exclusively owned by one writer; no other component may
/// issue statements on it concurrently.
pub trait DbConnection {
    /// Prepare a statement for batched execution.
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn PreparedStatement>, DatabaseError>;

    /// Execute DDL statements, outside any statement batch.
    fn execute_ddl(&mut self, statements: &[String]) -> Result<(), DatabaseError>;

    /// Snapshot the current definition of a table; `None` if it does not
    /// exist.
    fn describe_table(&mut self, table: &TableId)
        -> Result<Option<TableDefinition>, DatabaseError>;
}
