//! SQLite family dialect.

use crate::dialect::{
    generic_delete, generic_insert, generic_multi_insert, generic_update, qualified_table_name,
    DatabaseDialect, DialectError,
};
use crate::metadata::SinkRecordField;
use crate::record::SchemaType;
use crate::table::{ColumnId, TableDefinition, TableId};

/// Dialect for SQLite destinations.
///
/// Identifiers are backtick-quoted; SQLite's type affinity collapses the
/// integer and boolean types onto NUMERIC. Upserts use `INSERT OR REPLACE`,
/// which replaces the whole conflicting row.
pub struct SqliteDialect;

impl SqliteDialect {
    fn quote(&self, identifier: &str) -> String {
        format!("`{}`", identifier)
    }
}

impl DatabaseDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        self.quote(identifier)
    }

    fn sql_type(&self, field: &SinkRecordField) -> Result<String, DialectError> {
        let name = match field.schema.schema_type {
            SchemaType::Int8
            | SchemaType::Int16
            | SchemaType::Int32
            | SchemaType::Int64
            | SchemaType::Boolean => "NUMERIC",
            SchemaType::Float32 | SchemaType::Float64 => "REAL",
            SchemaType::String => "TEXT",
            SchemaType::Bytes => "BLOB",
            SchemaType::Struct => {
                return Err(DialectError::Invalid(format!(
                    "no SQLite type mapping for struct field '{}'",
                    field.name
                )))
            }
        };
        Ok(name.to_string())
    }

    fn build_create_table_statement(
        &self,
        table: &TableId,
        fields: &[SinkRecordField],
    ) -> Result<String, DialectError> {
        if fields.is_empty() {
            return Err(DialectError::Invalid(
                "CREATE TABLE requires at least one column".to_string(),
            ));
        }
        let quote = |s: &str| self.quote(s);

        let mut lines = Vec::with_capacity(fields.len() + 1);
        for field in fields {
            let nullability = if field.primary_key { "NOT NULL" } else { "NULL" };
            lines.push(format!(
                "{} {} {}",
                self.quote(&field.name),
                self.sql_type(field)?,
                nullability
            ));
        }

        let pk_names: Vec<String> = fields
            .iter()
            .filter(|f| f.primary_key)
            .map(|f| self.quote(&f.name))
            .collect();
        if !pk_names.is_empty() {
            lines.push(format!("PRIMARY KEY({})", pk_names.join(",")));
        }

        Ok(format!(
            "CREATE TABLE {} (\n{})",
            qualified_table_name(table, &quote),
            lines.join(",\n")
        ))
    }

    fn build_alter_table_statements(
        &self,
        table: &TableId,
        fields: &[SinkRecordField],
    ) -> Result<Vec<String>, DialectError> {
        if fields.is_empty() {
            return Err(DialectError::Invalid(
                "ALTER TABLE requires at least one column".to_string(),
            ));
        }
        let quote = |s: &str| self.quote(s);
        // SQLite accepts only one ADD per ALTER statement.
        fields
            .iter()
            .map(|field| {
                Ok(format!(
                    "ALTER TABLE {} ADD {} {} NULL",
                    qualified_table_name(table, &quote),
                    self.quote(&field.name),
                    self.sql_type(field)?
                ))
            })
            .collect()
    }

    fn build_insert_statement(
        &self,
        table: &TableId,
        _definition: Option<&TableDefinition>,
        key_columns: &[ColumnId],
        non_key_columns: &[ColumnId],
    ) -> Result<String, DialectError> {
        let quote = |s: &str| self.quote(s);
        generic_insert(table, key_columns, non_key_columns, &quote)
    }

    fn build_upsert_statement(
        &self,
        table: &TableId,
        _definition: Option<&TableDefinition>,
        key_columns: &[ColumnId],
        non_key_columns: &[ColumnId],
    ) -> Result<String, DialectError> {
        if key_columns.is_empty() {
            return Err(DialectError::Invalid(
                "UPSERT requires primary key columns".to_string(),
            ));
        }
        let quote = |s: &str| self.quote(s);
        let insert = generic_insert(table, key_columns, non_key_columns, &quote)?;
        Ok(insert.replacen("INSERT INTO", "INSERT OR REPLACE INTO", 1))
    }

    fn build_update_statement(
        &self,
        table: &TableId,
        _definition: Option<&TableDefinition>,
        key_columns: &[ColumnId],
        non_key_columns: &[ColumnId],
    ) -> Result<String, DialectError> {
        let quote = |s: &str| self.quote(s);
        generic_update(table, key_columns, non_key_columns, &quote)
    }

    fn build_multi_insert_statement(
        &self,
        table: &TableId,
        row_count: usize,
        key_columns: &[ColumnId],
        non_key_columns: &[ColumnId],
    ) -> Result<String, DialectError> {
        let quote = |s: &str| self.quote(s);
        generic_multi_insert(table, row_count, key_columns, non_key_columns, &quote)
    }

    fn build_delete_statement(
        &self,
        table: &TableId,
        key_columns: &[ColumnId],
    ) -> Result<String, DialectError> {
        let quote = |s: &str| self.quote(s);
        generic_delete(table, key_columns, &quote)
    }
}
