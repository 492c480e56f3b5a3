//! SQL dialect capability.
//!
//! Every statement the engine executes is produced through the
//! [`DatabaseDialect`] trait; the engine performs no raw SQL assembly of its
//! own. Dialects differ in identifier quoting, type mapping and upsert
//! support. A dialect that cannot express an operation reports
//! [`DialectError::Unsupported`] and the engine surfaces that as a
//! configuration failure naming the table and dialect.

mod binder;
mod postgres;
mod sqlite;

pub use binder::{DefaultStatementBinder, StatementBinder};
pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

use crate::config::{InsertMode, PrimaryKeyMode};
use crate::metadata::{FieldsMetadata, SinkRecordField};
use crate::record::SchemaPair;
use crate::table::{ColumnId, TableDefinition, TableId};
use thiserror::Error;

/// Errors produced while building statement text.
#[derive(Error, Debug)]
pub enum DialectError {
    /// The dialect cannot express the requested statement kind
    #[error("{operation} is not supported by the {dialect} dialect")]
    Unsupported {
        /// Dialect name
        dialect: String,
        /// Statement kind, e.g. "UPSERT"
        operation: String,
    },

    /// The inputs cannot produce a valid statement
    #[error("{0}")]
    Invalid(String),
}

/// Translates abstract column and table descriptors into statement text and
/// produces value binders for prepared statements.
pub trait DatabaseDialect: Send + Sync {
    /// Dialect name used in logs and error messages.
    fn name(&self) -> &'static str;

    /// Quote an identifier for this dialect.
    fn quote_identifier(&self, identifier: &str) -> String;

    /// Destination type name for a record field.
    fn sql_type(&self, field: &SinkRecordField) -> Result<String, DialectError>;

    /// CREATE TABLE covering every field; key fields become required
    /// primary-key columns.
    fn build_create_table_statement(
        &self,
        table: &TableId,
        fields: &[SinkRecordField],
    ) -> Result<String, DialectError>;

    /// ALTER TABLE statements adding each field as a nullable column.
    fn build_alter_table_statements(
        &self,
        table: &TableId,
        fields: &[SinkRecordField],
    ) -> Result<Vec<String>, DialectError>;

    /// Single-row INSERT, bound once per buffered record.
    fn build_insert_statement(
        &self,
        table: &TableId,
        definition: Option<&TableDefinition>,
        key_columns: &[ColumnId],
        non_key_columns: &[ColumnId],
    ) -> Result<String, DialectError>;

    /// Insert-or-update keyed on `key_columns`.
    fn build_upsert_statement(
        &self,
        table: &TableId,
        definition: Option<&TableDefinition>,
        key_columns: &[ColumnId],
        non_key_columns: &[ColumnId],
    ) -> Result<String, DialectError> {
        let _ = (table, definition, key_columns, non_key_columns);
        Err(DialectError::Unsupported {
            dialect: self.name().to_string(),
            operation: "UPSERT".to_string(),
        })
    }

    /// UPDATE of the non-key columns keyed on `key_columns`.
    fn build_update_statement(
        &self,
        table: &TableId,
        definition: Option<&TableDefinition>,
        key_columns: &[ColumnId],
        non_key_columns: &[ColumnId],
    ) -> Result<String, DialectError>;

    /// One INSERT carrying `row_count` rows of values.
    fn build_multi_insert_statement(
        &self,
        table: &TableId,
        row_count: usize,
        key_columns: &[ColumnId],
        non_key_columns: &[ColumnId],
    ) -> Result<String, DialectError> {
        let _ = (table, row_count, key_columns, non_key_columns);
        Err(DialectError::Unsupported {
            dialect: self.name().to_string(),
            operation: "multi-row INSERT".to_string(),
        })
    }

    /// DELETE keyed on `key_columns`.
    fn build_delete_statement(
        &self,
        table: &TableId,
        key_columns: &[ColumnId],
    ) -> Result<String, DialectError>;

    /// Binder translating buffered records into statement parameters.
    fn value_binder(
        &self,
        pk_mode: PrimaryKeyMode,
        schema_pair: &SchemaPair,
        fields_metadata: &FieldsMetadata,
        insert_mode: InsertMode,
    ) -> Box<dyn StatementBinder> {
        Box::new(DefaultStatementBinder::new(
            pk_mode,
            schema_pair.clone(),
            fields_metadata.clone(),
            insert_mode,
        ))
    }

    /// Parse a destination table name into an identifier.
    fn parse_table_identifier(&self, name: &str) -> TableId {
        TableId::parse(name)
    }
}

type Quote<'a> = &'a dyn Fn(&str) -> String;

pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(",")
}

pub(crate) fn qualified_table_name(table: &TableId, quote: Quote) -> String {
    let mut parts = Vec::with_capacity(3);
    if let Some(catalog) = &table.catalog {
        parts.push(quote(catalog));
    }
    if let Some(schema) = &table.schema {
        parts.push(quote(schema));
    }
    parts.push(quote(&table.table));
    parts.join(".")
}

pub(crate) fn column_list(columns: &[&ColumnId], quote: Quote) -> String {
    columns
        .iter()
        .map(|c| quote(&c.name))
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn generic_insert(
    table: &TableId,
    key_columns: &[ColumnId],
    non_key_columns: &[ColumnId],
    quote: Quote,
) -> Result<String, DialectError> {
    let columns: Vec<&ColumnId> = key_columns.iter().chain(non_key_columns).collect();
    if columns.is_empty() {
        return Err(DialectError::Invalid(
            "INSERT requires at least one column".to_string(),
        ));
    }
    Ok(format!(
        "INSERT INTO {}({}) VALUES({})",
        qualified_table_name(table, quote),
        column_list(&columns, quote),
        placeholders(columns.len())
    ))
}

pub(crate) fn generic_multi_insert(
    table: &TableId,
    row_count: usize,
    key_columns: &[ColumnId],
    non_key_columns: &[ColumnId],
    quote: Quote,
) -> Result<String, DialectError> {
    if row_count == 0 {
        return Err(DialectError::Invalid(
            "multi-row INSERT requires at least one row".to_string(),
        ));
    }
    let columns: Vec<&ColumnId> = key_columns.iter().chain(non_key_columns).collect();
    if columns.is_empty() {
        return Err(DialectError::Invalid(
            "INSERT requires at least one column".to_string(),
        ));
    }
    let row = format!("({})", placeholders(columns.len()));
    let rows = vec![row; row_count].join(",");
    Ok(format!(
        "INSERT INTO {}({}) VALUES {}",
        qualified_table_name(table, quote),
        column_list(&columns, quote),
        rows
    ))
}

pub(crate) fn generic_update(
    table: &TableId,
    key_columns: &[ColumnId],
    non_key_columns: &[ColumnId],
    quote: Quote,
) -> Result<String, DialectError> {
    if non_key_columns.is_empty() {
        return Err(DialectError::Invalid(
            "UPDATE requires at least one non-key column".to_string(),
        ));
    }
    let assignments = non_key_columns
        .iter()
        .map(|c| format!("{} = ?", quote(&c.name)))
        .collect::<Vec<_>>()
        .join(", ");
    let mut sql = format!(
        "UPDATE {} SET {}",
        qualified_table_name(table, quote),
        assignments
    );
    if !key_columns.is_empty() {
        let conditions = key_columns
            .iter()
            .map(|c| format!("{} = ?", quote(&c.name)))
            .collect::<Vec<_>>()
            .join(" AND ");
        sql.push_str(" WHERE ");
        sql.push_str(&conditions);
    }
    Ok(sql)
}

pub(crate) fn generic_delete(
    table: &TableId,
    key_columns: &[ColumnId],
    quote: Quote,
) -> Result<String, DialectError> {
    if key_columns.is_empty() {
        return Err(DialectError::Invalid(
            "DELETE requires at least one key column".to_string(),
        ));
    }
    let conditions = key_columns
        .iter()
        .map(|c| format!("{} = ?", quote(&c.name)))
        .collect::<Vec<_>>()
        .join(" AND ");
    Ok(format!(
        "DELETE FROM {} WHERE {}",
        qualified_table_name(table, quote),
        conditions
    ))
}
