//! Per-delivery-cycle orchestration of table buffers.
//!
//! One writer exists per ingestion worker. It owns the connection, resolves
//! each record's destination table, routes records into per-table buffers
//! and flushes every buffer at the end of the delivery cycle. Commit and
//! rollback of the connection's transaction remain with the caller.

use crate::buffer::BufferedRecords;
use crate::config::SinkConfig;
use crate::connection::DbConnection;
use crate::dialect::DatabaseDialect;
use crate::record::SinkRecord;
use crate::structure::TableStructure;
use crate::table::TableId;
use crate::{Error, Result};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

/// Writes delivered records into their destination tables.
pub struct DbWriter {
    config: Arc<SinkConfig>,
    dialect: Arc<dyn DatabaseDialect>,
    structure: TableStructure,
    connection: Box<dyn DbConnection>,
}

impl DbWriter {
    /// Create a writer over an exclusively owned connection.
    pub fn new(
        config: SinkConfig,
        dialect: Arc<dyn DatabaseDialect>,
        connection: Box<dyn DbConnection>,
    ) -> Self {
        let structure = TableStructure::new(dialect.clone());
        Self {
            config: Arc::new(config),
            dialect,
            structure,
            connection,
        }
    }

    /// Write one delivery of records.
    ///
    /// Returns every record that was flushed, in flush order; the caller
    /// uses the list to acknowledge upstream offsets. Records not returned
    /// were not durably written and must not be acknowledged.
    pub fn write(&mut self, records: Vec<SinkRecord>) -> Result<Vec<SinkRecord>> {
        let mut buffers: IndexMap<TableId, BufferedRecords> = IndexMap::new();
        let mut flushed = Vec::new();

        for record in records {
            let table_id = self.destination_table(&record.topic)?;
            let buffer = buffers.entry(table_id.clone()).or_insert_with(|| {
                BufferedRecords::new(table_id, self.config.clone(), self.dialect.clone())
            });
            flushed.extend(buffer.add(record, &mut self.structure, self.connection.as_mut())?);
        }

        for (table_id, buffer) in buffers.iter_mut() {
            debug!(table = %table_id, "flushing remaining records for table");
            flushed.extend(buffer.flush(self.connection.as_mut())?);
        }

        Ok(flushed)
    }

    /// Resolve the destination table for a topic via the configured format.
    fn destination_table(&self, topic: &str) -> Result<TableId> {
        let name = self.config.table_name_format.replace("${topic}", topic);
        if name.trim().is_empty() {
            return Err(Error::Config(format!(
                "Destination table name for topic '{}' is empty using the format string '{}'",
                topic, self.config.table_name_format
            )));
        }
        Ok(self.dialect.parse_table_identifier(&name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::SqliteDialect;

    struct NoopConnection;

    impl DbConnection for NoopConnection {
        fn prepare(
            &mut self,
            _sql: &str,
        ) -> std::result::Result<
            Box<dyn crate::connection::PreparedStatement>,
            crate::error::DatabaseError,
        > {
            Err(crate::error::DatabaseError::Prepare("noop".into()))
        }

        fn execute_ddl(
            &mut self,
            _statements: &[String],
        ) -> std::result::Result<(), crate::error::DatabaseError> {
            Ok(())
        }

        fn describe_table(
            &mut self,
            _table: &TableId,
        ) -> std::result::Result<Option<crate::table::TableDefinition>, crate::error::DatabaseError>
        {
            Ok(None)
        }
    }

    fn writer(table_name_format: &str) -> DbWriter {
        let config = SinkConfig {
            table_name_format: table_name_format.to_string(),
            ..Default::default()
        };
        DbWriter::new(config, Arc::new(SqliteDialect), Box::new(NoopConnection))
    }

    #[test]
    fn test_destination_table_substitutes_topic() {
        let writer = writer("sink_${topic}");
        let table = writer.destination_table("users").unwrap();
        assert_eq!(table, TableId::new("sink_users"));
    }

    #[test]
    fn test_destination_table_parses_qualified_names() {
        let writer = writer("staging.${topic}");
        let table = writer.destination_table("users").unwrap();
        assert_eq!(table, TableId::with_schema("staging", "users"));
    }

    #[test]
    fn test_empty_destination_table_rejected() {
        let writer = writer("${topic}");
        let err = writer.destination_table("").unwrap_err();
        assert!(err.to_string().contains("is empty"));
    }

    #[test]
    fn test_write_of_no_records_is_noop() {
        let mut writer = writer("${topic}");
        let flushed = writer.write(Vec::new()).unwrap();
        assert!(flushed.is_empty());
    }
}
