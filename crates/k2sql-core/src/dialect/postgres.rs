//! PostgreSQL family dialect.

use crate::dialect::{
    generic_delete, generic_insert, generic_multi_insert, generic_update, qualified_table_name,
    DatabaseDialect, DialectError,
};
use crate::metadata::SinkRecordField;
use crate::record::SchemaType;
use crate::table::{ColumnId, TableDefinition, TableId};

/// Dialect for PostgreSQL destinations.
///
/// Upserts use `INSERT .. ON CONFLICT (keys) DO UPDATE SET`, which updates
/// only the non-key columns of a conflicting row.
pub struct PostgresDialect;

impl PostgresDialect {
    fn quote(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier)
    }
}

impl DatabaseDialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn quote_identifier(&self, identifier: &str) -> String {
        self.quote(identifier)
    }

    fn sql_type(&self, field: &SinkRecordField) -> Result<String, DialectError> {
        let name = match field.schema.schema_type {
            SchemaType::Int8 | SchemaType::Int16 => "SMALLINT",
            SchemaType::Int32 => "INT",
            SchemaType::Int64 => "BIGINT",
            SchemaType::Float32 => "REAL",
            SchemaType::Float64 => "DOUBLE PRECISION",
            SchemaType::Boolean => "BOOLEAN",
            SchemaType::String => "TEXT",
            SchemaType::Bytes => "BYTEA",
            SchemaType::Struct => {
                return Err(DialectError::Invalid(format!(
                    "no PostgreSQL type mapping for struct field '{}'",
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
        let additions = fields
            .iter()
            .map(|field| {
                Ok(format!(
                    "ADD {} {} NULL",
                    self.quote(&field.name),
                    self.sql_type(field)?
                ))
            })
            .collect::<Result<Vec<_>, DialectError>>()?;
        Ok(vec![format!(
            "ALTER TABLE {} {}",
            qualified_table_name(table, &quote),
            additions.join(", ")
        )])
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
        let conflict_keys = key_columns
            .iter()
            .map(|c| self.quote(&c.name))
            .collect::<Vec<_>>()
            .join(",");

        if non_key_columns.is_empty() {
            return Ok(format!(
                "{} ON CONFLICT ({}) DO NOTHING",
                insert, conflict_keys
            ));
        }
        let assignments = non_key_columns
            .iter()
            .map(|c| {
                let quoted = self.quote(&c.name);
                format!("{}=EXCLUDED.{}", quoted, quoted)
            })
            .collect::<Vec<_>>()
            .join(",");
        Ok(format!(
            "{} ON CONFLICT ({}) DO UPDATE SET {}",
            insert, conflict_keys, assignments
        ))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Schema;

    fn field(name: &str, schema_type: SchemaType, primary_key: bool) -> SinkRecordField {
        SinkRecordField {
            name: name.to_string(),
            schema: if primary_key {
                Schema::primitive(schema_type)
            } else {
                Schema::optional_primitive(schema_type)
            },
            primary_key,
        }
    }

    fn columns(table: &TableId, names: &[&str]) -> Vec<ColumnId> {
        names.iter().map(|n| ColumnId::new(table, *n)).collect()
    }

    #[test]
    fn test_type_mapping() {
        let dialect = PostgresDialect;
        assert_eq!(
            dialect.sql_type(&field("a", SchemaType::Int8, false)).unwrap(),
            "SMALLINT"
        );
        assert_eq!(
            dialect.sql_type(&field("a", SchemaType::Int32, false)).unwrap(),
            "INT"
        );
        assert_eq!(
            dialect.sql_type(&field("a", SchemaType::Int64, false)).unwrap(),
            "BIGINT"
        );
        assert_eq!(
            dialect
                .sql_type(&field("a", SchemaType::Float64, false))
                .unwrap(),
            "DOUBLE PRECISION"
        );
        assert_eq!(
            dialect.sql_type(&field("a", SchemaType::Bytes, false)).unwrap(),
            "BYTEA"
        );
    }

    #[test]
    fn test_create_table() {
        let dialect = PostgresDialect;
        let table = TableId::with_schema("public", "users");
        let sql = dialect
            .build_create_table_statement(
                &table,
                &[
                    field("id", SchemaType::Int64, true),
                    field("name", SchemaType::String, false),
                ],
            )
            .unwrap();
        assert_eq!(
            sql,
            "CREATE TABLE \"public\".\"users\" (\n\
             \"id\" BIGINT NOT NULL,\n\
             \"name\" TEXT NULL,\n\
             PRIMARY KEY(\"id\"))"
        );
    }

    #[test]
    fn test_alter_is_a_single_statement() {
        let dialect = PostgresDialect;
        let table = TableId::new("users");
        let statements = dialect
            .build_alter_table_statements(
                &table,
                &[
                    field("email", SchemaType::String, false),
                    field("age", SchemaType::Int32, false),
                ],
            )
            .unwrap();
        assert_eq!(
            statements,
            vec!["ALTER TABLE \"users\" ADD \"email\" TEXT NULL, ADD \"age\" INT NULL"]
        );
    }

    #[test]
    fn test_upsert_uses_on_conflict() {
        let dialect = PostgresDialect;
        let table = TableId::new("customer");
        let sql = dialect
            .build_upsert_statement(
                &table,
                None,
                &columns(&table, &["id"]),
                &columns(&table, &["name", "salary"]),
            )
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"customer\"(\"id\",\"name\",\"salary\") VALUES(?,?,?) \
             ON CONFLICT (\"id\") DO UPDATE SET \
             \"name\"=EXCLUDED.\"name\",\"salary\"=EXCLUDED.\"salary\""
        );
    }

    #[test]
    fn test_upsert_without_non_keys_does_nothing_on_conflict() {
        let dialect = PostgresDialect;
        let table = TableId::new("customer");
        let sql = dialect
            .build_upsert_statement(&table, None, &columns(&table, &["id"]), &[])
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"customer\"(\"id\") VALUES(?) ON CONFLICT (\"id\") DO NOTHING"
        );
    }

    #[test]
    fn test_multi_insert() {
        let dialect = PostgresDialect;
        let table = TableId::new("users");
        let sql = dialect
            .build_multi_insert_statement(
                &table,
                2,
                &columns(&table, &["id"]),
                &columns(&table, &["name"]),
            )
            .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"users\"(\"id\",\"name\") VALUES (?,?),(?,?)"
        );
    }
}
