//! Destination table reconciliation.
//!
//! Ensures the destination table exists and carries at least the columns the
//! current record schema requires, creating or altering it through the
//! dialect when the configuration permits. Current column definitions are
//! cached per table and refreshed after any DDL.

use crate::config::SinkConfig;
use crate::connection::DbConnection;
use crate::dialect::DatabaseDialect;
use crate::error::SchemaError;
use crate::metadata::{FieldsMetadata, SinkRecordField};
use crate::table::{TableDefinition, TableId};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A concurrent writer may add the same columns between our describe and our
/// ALTER; one re-check catches that without looping forever.
const MAX_AMEND_ATTEMPTS: usize = 2;

/// Manages destination table structure for one writer.
pub struct TableStructure {
    dialect: Arc<dyn DatabaseDialect>,
    definitions: HashMap<TableId, TableDefinition>,
}

impl TableStructure {
    /// Create a structure manager using the given dialect.
    pub fn new(dialect: Arc<dyn DatabaseDialect>) -> Self {
        Self {
            dialect,
            definitions: HashMap::new(),
        }
    }

    /// Ensure `table_id` exists with at least the columns of
    /// `fields_metadata`, creating or amending it as configuration permits.
    pub fn create_or_amend_if_necessary(
        &mut self,
        config: &SinkConfig,
        connection: &mut dyn DbConnection,
        table_id: &TableId,
        fields_metadata: &FieldsMetadata,
    ) -> Result<()> {
        if !self.definitions.contains_key(table_id) {
            match connection.describe_table(table_id)? {
                Some(definition) => {
                    self.definitions.insert(table_id.clone(), definition);
                }
                None => {
                    self.create(config, connection, table_id, fields_metadata)?;
                    return Ok(());
                }
            }
        }
        self.amend_if_necessary(
            config,
            connection,
            table_id,
            fields_metadata,
            MAX_AMEND_ATTEMPTS,
        )?;
        Ok(())
    }

    /// The cached (possibly freshly refreshed) definition of `table_id`.
    ///
    /// Does not reflect concurrent schema changes made outside this
    /// component.
    pub fn table_definition_for(
        &mut self,
        table_id: &TableId,
        connection: &mut dyn DbConnection,
    ) -> Result<TableDefinition> {
        if let Some(definition) = self.definitions.get(table_id) {
            return Ok(definition.clone());
        }
        self.refresh(table_id, connection)?;
        Ok(self.definitions[table_id].clone())
    }

    fn create(
        &mut self,
        config: &SinkConfig,
        connection: &mut dyn DbConnection,
        table_id: &TableId,
        fields_metadata: &FieldsMetadata,
    ) -> Result<()> {
        if !config.auto_create {
            return Err(SchemaError::TableMissing {
                table: table_id.to_string(),
            }
            .into());
        }
        let fields: Vec<SinkRecordField> = fields_metadata.all_fields.values().cloned().collect();
        let sql = self
            .dialect
            .build_create_table_statement(table_id, &fields)
            .map_err(|e| Error::Config(e.to_string()))?;
        info!(table = %table_id, sql = %sql, "creating table");
        connection.execute_ddl(&[sql])?;
        self.refresh(table_id, connection)
    }

    fn amend_if_necessary(
        &mut self,
        config: &SinkConfig,
        connection: &mut dyn DbConnection,
        table_id: &TableId,
        fields_metadata: &FieldsMetadata,
        attempts: usize,
    ) -> Result<bool> {
        let definition = self.definitions.get(table_id).ok_or_else(|| {
            SchemaError::TableMissing {
                table: table_id.to_string(),
            }
        })?;

        let missing: Vec<SinkRecordField> = fields_metadata
            .all_fields
            .values()
            .filter(|f| definition.column_ignore_case(&f.name).is_none())
            .cloned()
            .collect();
        if missing.is_empty() {
            debug!(table = %table_id, "table covers all required columns");
            return Ok(false);
        }

        let missing_names: Vec<String> = missing.iter().map(|f| f.name.clone()).collect();
        if !config.auto_evolve || attempts == 0 {
            return Err(SchemaError::ColumnsMissing {
                table: table_id.to_string(),
                columns: missing_names,
            }
            .into());
        }

        // New columns are added as nullable so existing rows stay valid; a
        // required field without a default cannot be expressed that way.
        for field in &missing {
            if !field.schema.optional {
                return Err(SchemaError::NonOptionalColumn {
                    table: table_id.to_string(),
                    column: field.name.clone(),
                }
                .into());
            }
        }

        let statements = self
            .dialect
            .build_alter_table_statements(table_id, &missing)
            .map_err(|e| Error::Config(e.to_string()))?;
        warn!(
            table = %table_id,
            columns = ?missing_names,
            "amending table to add missing columns"
        );
        connection.execute_ddl(&statements)?;
        self.refresh(table_id, connection)?;

        self.amend_if_necessary(config, connection, table_id, fields_metadata, attempts - 1)
    }

    fn refresh(&mut self, table_id: &TableId, connection: &mut dyn DbConnection) -> Result<()> {
        let definition = connection.describe_table(table_id)?.ok_or_else(|| {
            SchemaError::TableMissing {
                table: table_id.to_string(),
            }
        })?;
        debug!(
            table = %table_id,
            columns = definition.columns.len(),
            "refreshed table definition"
        );
        self.definitions.insert(table_id.clone(), definition);
        Ok(())
    }
}
