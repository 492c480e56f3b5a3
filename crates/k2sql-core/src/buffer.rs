//! Per-table record buffering and batched flush.
//!
//! A buffer accumulates records for one destination table, keeps every batch
//! schema-homogeneous, triggers a flush when the configured threshold is
//! reached or the schema pair changes, and verifies execution counts against
//! the insert-mode-specific success criteria. Flushed records are handed
//! back to the caller for offset bookkeeping; a failed flush leaves the
//! buffered records intact so the caller may retry.

use crate::config::{InsertMode, SinkConfig};
use crate::connection::{BatchResult, DbConnection, PreparedStatement};
use crate::dialect::{DatabaseDialect, DialectError, StatementBinder};
use crate::error::ExecutionError;
use crate::metadata::FieldsMetadata;
use crate::record::{SchemaPair, SinkRecord};
use crate::structure::TableStructure;
use crate::table::{ColumnId, TableDefinition, TableId};
use crate::{Error, Result};
use indexmap::IndexSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Everything that depends on the record schema, rebuilt whenever the bound
/// schema pair changes.
struct SchemaEpoch {
    schema_pair: SchemaPair,
    fields_metadata: FieldsMetadata,
    table_definition: TableDefinition,
}

/// Buffered records for one destination table.
pub struct BufferedRecords {
    table_id: TableId,
    config: Arc<SinkConfig>,
    dialect: Arc<dyn DatabaseDialect>,
    records: Vec<SinkRecord>,
    tombstone_records: Vec<SinkRecord>,
    epoch: Option<SchemaEpoch>,
}

impl BufferedRecords {
    /// Create an empty buffer for `table_id`.
    pub fn new(
        table_id: TableId,
        config: Arc<SinkConfig>,
        dialect: Arc<dyn DatabaseDialect>,
    ) -> Self {
        Self {
            table_id,
            config,
            dialect,
            records: Vec::new(),
            tombstone_records: Vec::new(),
            epoch: None,
        }
    }

    /// Number of buffered records across both sequences.
    pub fn len(&self) -> usize {
        self.records.len() + self.tombstone_records.len()
    }

    /// Whether both sequences are empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one record, flushing first when the schema pair changes and
    /// afterwards when the batch-size threshold is reached.
    ///
    /// Returns the records flushed as a result of this call, possibly empty.
    pub fn add(
        &mut self,
        record: SinkRecord,
        structure: &mut TableStructure,
        connection: &mut dyn DbConnection,
    ) -> Result<Vec<SinkRecord>> {
        if record.is_tombstone() && !self.config.delete_enabled {
            return Err(Error::Config(format!(
                "received a tombstone record for table '{}' but delete support is \
                 disabled; enable delete_enabled or filter tombstones upstream",
                self.table_id
            )));
        }

        let schema_pair = record.schema_pair();
        debug!(
            table = %self.table_id,
            buffered = self.records.len(),
            "buffered records in list"
        );

        if self.epoch.is_none() {
            self.re_initialize(schema_pair.clone(), structure, connection)?;
        }

        // Tombstones skip the schema pair check: their value schema may
        // trail the current epoch without making the batch heterogeneous.
        let matches_epoch = self
            .epoch
            .as_ref()
            .map(|e| e.schema_pair == schema_pair)
            .unwrap_or(false);

        if record.is_tombstone() || matches_epoch {
            if record.is_tombstone() {
                self.tombstone_records.push(record);
            } else {
                self.records.push(record);
            }
            if self.len() >= self.config.batch_size {
                debug!(
                    table = %self.table_id,
                    regular = self.records.len(),
                    tombstones = self.tombstone_records.len(),
                    batch_size = self.config.batch_size,
                    "flushing buffered records after reaching the configured batch size"
                );
                return self.flush(connection);
            }
            Ok(Vec::new())
        } else {
            // Every batch must share one schema pair: flush the buffered
            // records, reset the epoch and re-attempt the add.
            debug!(
                table = %self.table_id,
                "flushing buffered records due to unequal schema pairs"
            );
            let mut flushed = self.flush(connection)?;
            self.epoch = None;
            flushed.extend(self.add(record, structure, connection)?);
            Ok(flushed)
        }
    }

    /// Flush both sequences, verify the execution results, clear the buffer
    /// and return the flushed records in their original relative order.
    pub fn flush(&mut self, connection: &mut dyn DbConnection) -> Result<Vec<SinkRecord>> {
        if self.is_empty() {
            debug!(table = %self.table_id, "records and tombstone records are empty");
            return Ok(Vec::new());
        }
        let Some(epoch) = &self.epoch else {
            return Ok(Vec::new());
        };

        let mut insert: Option<(Box<dyn PreparedStatement>, Box<dyn StatementBinder>)> = None;
        if !self.records.is_empty() {
            let sql = if self.config.insert_mode == InsertMode::Multi {
                self.multi_insert_sql(epoch)?
            } else {
                self.insert_sql(epoch)?
            };
            debug!(
                table = %self.table_id,
                mode = %self.config.insert_mode,
                records = self.records.len(),
                sql = %sql,
                "prepared SQL for insert mode"
            );
            let statement = connection.prepare(&sql)?;
            let binder = self.dialect.value_binder(
                self.config.pk_mode,
                &epoch.schema_pair,
                &epoch.fields_metadata,
                self.config.insert_mode,
            );
            insert = Some((statement, binder));
        }

        let mut delete: Option<(Box<dyn PreparedStatement>, Box<dyn StatementBinder>)> = None;
        if !self.tombstone_records.is_empty() {
            let sql = self.delete_sql(epoch)?;
            debug!(
                table = %self.table_id,
                tombstones = self.tombstone_records.len(),
                sql = %sql,
                "prepared SQL for tombstones"
            );
            let statement = connection.prepare(&sql)?;
            let binder = self.dialect.value_binder(
                self.config.pk_mode,
                &epoch.schema_pair,
                &epoch.fields_metadata,
                self.config.insert_mode,
            );
            delete = Some((statement, binder));
        }

        if let Some((statement, binder)) = &mut insert {
            debug!(count = self.records.len(), "binding buffered records");
            if self.config.insert_mode == InsertMode::Multi {
                // All records share one statement; record N starts where the
                // parameters of record N-1 stopped.
                let mut index = 1;
                for record in &self.records {
                    index = binder.bind_record_at(statement.as_mut(), index, record)?;
                }
                statement.add_batch()?;
            } else {
                for record in &self.records {
                    binder.bind_record(statement.as_mut(), record)?;
                }
            }
        }
        if let Some((statement, binder)) = &mut delete {
            for record in &self.tombstone_records {
                binder.bind_tombstone_record(statement.as_mut(), record)?;
            }
        }

        if let Some((statement, _)) = &mut insert {
            debug!(mode = %self.config.insert_mode, "executing regular record batch");
            let results = statement.execute_batch().map_err(Error::from)?;
            self.verify_successful_executions(&results, self.records.len(), "regular")?;
        }
        if let Some((statement, _)) = &mut delete {
            debug!("executing tombstone record batch");
            let results = statement.execute_batch().map_err(Error::from)?;
            self.verify_successful_executions(
                &results,
                self.tombstone_records.len(),
                "tombstone",
            )?;
        }

        let mut flushed = std::mem::take(&mut self.records);
        flushed.append(&mut self.tombstone_records);
        Ok(flushed)
    }

    /// Re-initialize everything that depends on the record schema.
    fn re_initialize(
        &mut self,
        schema_pair: SchemaPair,
        structure: &mut TableStructure,
        connection: &mut dyn DbConnection,
    ) -> Result<()> {
        let fields_metadata = FieldsMetadata::extract(
            &self.table_id.table,
            self.config.pk_mode,
            &self.config.pk_fields,
            &self.config.fields_whitelist,
            &schema_pair,
        )?;
        structure.create_or_amend_if_necessary(
            &self.config,
            connection,
            &self.table_id,
            &fields_metadata,
        )?;
        let table_definition = structure.table_definition_for(&self.table_id, connection)?;
        self.epoch = Some(SchemaEpoch {
            schema_pair,
            fields_metadata,
            table_definition,
        });
        Ok(())
    }

    fn verify_successful_executions(
        &self,
        results: &[BatchResult],
        batch_len: usize,
        record_type: &'static str,
    ) -> Result<()> {
        let mut total: u64 = 0;
        let mut success_no_info = false;
        for result in results {
            match result {
                BatchResult::Rows(n) => total += n,
                BatchResult::SuccessNoInfo => success_no_info = true,
                BatchResult::Failed => {}
            }
        }

        if total as usize != batch_len && !success_no_info {
            match self.config.insert_mode {
                InsertMode::Insert | InsertMode::Multi => {
                    return Err(ExecutionError::CountMismatch {
                        table: self.table_id.to_string(),
                        mode: self.config.insert_mode,
                        record_type,
                        expected: batch_len,
                        actual: total,
                    }
                    .into());
                }
                InsertMode::Upsert | InsertMode::Update => {
                    debug!(
                        mode = %self.config.insert_mode,
                        record_type,
                        records = batch_len,
                        total,
                        "update count differs from batch size"
                    );
                }
            }
        }

        if success_no_info {
            info!(
                mode = %self.config.insert_mode,
                record_type,
                records = batch_len,
                "batch executed, but no count of the affected rows is available"
            );
        }
        Ok(())
    }

    fn insert_sql(&self, epoch: &SchemaEpoch) -> Result<String> {
        let key_columns = self.as_columns(&epoch.fields_metadata.key_field_names);
        let non_key_columns = self.as_columns(&epoch.fields_metadata.non_key_field_names);
        match self.config.insert_mode {
            InsertMode::Insert => self
                .dialect
                .build_insert_statement(
                    &self.table_id,
                    Some(&epoch.table_definition),
                    &key_columns,
                    &non_key_columns,
                )
                .map_err(|e| self.dialect_error(e)),
            InsertMode::Upsert => {
                if key_columns.is_empty() {
                    return Err(Error::Config(format!(
                        "Write to table '{}' in upsert mode requires key field names to \
                         be known, check the primary key configuration",
                        self.table_id
                    )));
                }
                self.dialect
                    .build_upsert_statement(
                        &self.table_id,
                        Some(&epoch.table_definition),
                        &key_columns,
                        &non_key_columns,
                    )
                    .map_err(|e| self.dialect_error(e))
            }
            InsertMode::Update => self
                .dialect
                .build_update_statement(
                    &self.table_id,
                    Some(&epoch.table_definition),
                    &key_columns,
                    &non_key_columns,
                )
                .map_err(|e| self.dialect_error(e)),
            InsertMode::Multi => Err(Error::Config(format!(
                "invalid insert mode '{}' for a single-row statement",
                self.config.insert_mode
            ))),
        }
    }

    fn multi_insert_sql(&self, epoch: &SchemaEpoch) -> Result<String> {
        let key_columns = self.as_columns(&epoch.fields_metadata.key_field_names);
        let non_key_columns = self.as_columns(&epoch.fields_metadata.non_key_field_names);
        self.dialect
            .build_multi_insert_statement(
                &self.table_id,
                self.records.len(),
                &key_columns,
                &non_key_columns,
            )
            .map_err(|e| self.dialect_error(e))
    }

    fn delete_sql(&self, epoch: &SchemaEpoch) -> Result<String> {
        let key_columns = self.as_columns(&epoch.fields_metadata.key_field_names);
        self.dialect
            .build_delete_statement(&self.table_id, &key_columns)
            .map_err(|e| self.dialect_error(e))
    }

    fn dialect_error(&self, error: DialectError) -> Error {
        match error {
            DialectError::Unsupported { dialect, .. } => Error::Config(format!(
                "Write to table '{}' in {} mode is not supported with the {} dialect",
                self.table_id, self.config.insert_mode, dialect
            )),
            DialectError::Invalid(message) => Error::Config(message),
        }
    }

    fn as_columns(&self, names: &IndexSet<String>) -> Vec<ColumnId> {
        names
            .iter()
            .map(|name| ColumnId::new(&self.table_id, name))
            .collect()
    }
}
