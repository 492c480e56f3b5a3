//! Binding of buffered records to prepared-statement parameters.

use crate::config::{InsertMode, PrimaryKeyMode};
use crate::connection::{PreparedStatement, SqlParam};
use crate::metadata::FieldsMetadata;
use crate::record::{Schema, SchemaPair, SinkRecord, Value};
use crate::{Error, Result};

/// Translates buffered records into statement parameters in the order the
/// statement text expects.
pub trait StatementBinder {
    /// Bind one record as a batch entry.
    fn bind_record(
        &self,
        statement: &mut dyn PreparedStatement,
        record: &SinkRecord,
    ) -> Result<()>;

    /// Bind one record starting at parameter `index` of a multi-row
    /// statement; returns the next free parameter index.
    fn bind_record_at(
        &self,
        statement: &mut dyn PreparedStatement,
        index: usize,
        record: &SinkRecord,
    ) -> Result<usize>;

    /// Bind only the key fields of a tombstone record as a batch entry.
    fn bind_tombstone_record(
        &self,
        statement: &mut dyn PreparedStatement,
        record: &SinkRecord,
    ) -> Result<()>;
}

/// Standard binder shared by the bundled dialects.
///
/// Key fields are bound before non-key fields, except in update mode where
/// the SET-clause parameters precede the WHERE-clause keys.
pub struct DefaultStatementBinder {
    pk_mode: PrimaryKeyMode,
    schema_pair: SchemaPair,
    fields_metadata: FieldsMetadata,
    insert_mode: InsertMode,
}

impl DefaultStatementBinder {
    /// Create a binder for one schema epoch.
    pub fn new(
        pk_mode: PrimaryKeyMode,
        schema_pair: SchemaPair,
        fields_metadata: FieldsMetadata,
        insert_mode: InsertMode,
    ) -> Self {
        Self {
            pk_mode,
            schema_pair,
            fields_metadata,
            insert_mode,
        }
    }

    fn bind_fields(
        &self,
        statement: &mut dyn PreparedStatement,
        index: usize,
        record: &SinkRecord,
    ) -> Result<usize> {
        match self.insert_mode {
            InsertMode::Update => {
                let index = self.bind_non_key_fields(statement, index, record)?;
                self.bind_key_fields(statement, index, record)
            }
            _ => {
                let index = self.bind_key_fields(statement, index, record)?;
                self.bind_non_key_fields(statement, index, record)
            }
        }
    }

    fn bind_key_fields(
        &self,
        statement: &mut dyn PreparedStatement,
        mut index: usize,
        record: &SinkRecord,
    ) -> Result<usize> {
        match self.pk_mode {
            PrimaryKeyMode::None => {}
            PrimaryKeyMode::Kafka => {
                statement.bind(index, SqlParam::Text(record.topic.clone()))?;
                statement.bind(index + 1, SqlParam::Int32(record.partition))?;
                statement.bind(index + 2, SqlParam::Int64(record.offset))?;
                index += 3;
            }
            PrimaryKeyMode::RecordKey => {
                let key_schema = self.schema_pair.key_schema.as_ref().ok_or_else(|| {
                    Error::Config("record key schema is missing for pk_mode=record_key".into())
                })?;
                if key_schema.schema_type.is_primitive() {
                    statement.bind(index, to_sql_param(key_schema, record.key.as_ref())?)?;
                    index += 1;
                } else {
                    for name in &self.fields_metadata.key_field_names {
                        let field = key_schema.field(name).ok_or_else(|| {
                            Error::Config(format!("key schema has no field '{}'", name))
                        })?;
                        let value = record.key.as_ref().and_then(|k| k.field(name));
                        statement.bind(index, to_sql_param(&field.schema, value)?)?;
                        index += 1;
                    }
                }
            }
            PrimaryKeyMode::RecordValue => {
                let value_schema = self.schema_pair.value_schema.as_ref().ok_or_else(|| {
                    Error::Config("record value schema is missing for pk_mode=record_value".into())
                })?;
                for name in &self.fields_metadata.key_field_names {
                    let field = value_schema.field(name).ok_or_else(|| {
                        Error::Config(format!("value schema has no field '{}'", name))
                    })?;
                    let value = record.value.as_ref().and_then(|v| v.field(name));
                    statement.bind(index, to_sql_param(&field.schema, value)?)?;
                    index += 1;
                }
            }
        }
        Ok(index)
    }

    fn bind_non_key_fields(
        &self,
        statement: &mut dyn PreparedStatement,
        mut index: usize,
        record: &SinkRecord,
    ) -> Result<usize> {
        if self.fields_metadata.non_key_field_names.is_empty() {
            return Ok(index);
        }
        let value_schema = self
            .schema_pair
            .value_schema
            .as_ref()
            .ok_or_else(|| Error::Config("record value schema is missing".into()))?;
        for name in &self.fields_metadata.non_key_field_names {
            let field = value_schema
                .field(name)
                .ok_or_else(|| Error::Config(format!("value schema has no field '{}'", name)))?;
            let value = record.value.as_ref().and_then(|v| v.field(name));
            statement.bind(index, to_sql_param(&field.schema, value)?)?;
            index += 1;
        }
        Ok(index)
    }
}

impl StatementBinder for DefaultStatementBinder {
    fn bind_record(
        &self,
        statement: &mut dyn PreparedStatement,
        record: &SinkRecord,
    ) -> Result<()> {
        self.bind_fields(statement, 1, record)?;
        statement.add_batch()?;
        Ok(())
    }

    fn bind_record_at(
        &self,
        statement: &mut dyn PreparedStatement,
        index: usize,
        record: &SinkRecord,
    ) -> Result<usize> {
        self.bind_fields(statement, index, record)
    }

    fn bind_tombstone_record(
        &self,
        statement: &mut dyn PreparedStatement,
        record: &SinkRecord,
    ) -> Result<()> {
        self.bind_key_fields(statement, 1, record)?;
        statement.add_batch()?;
        Ok(())
    }
}

fn to_sql_param(schema: &Schema, value: Option<&Value>) -> Result<SqlParam> {
    use crate::record::SchemaType;

    let Some(value) = value else {
        return Ok(SqlParam::Null(schema.schema_type));
    };
    let param = match (schema.schema_type, value) {
        (SchemaType::Boolean, Value::Boolean(v)) => SqlParam::Boolean(*v),
        (SchemaType::Int8, Value::Int8(v)) => SqlParam::Int8(*v),
        (SchemaType::Int16, Value::Int16(v)) => SqlParam::Int16(*v),
        (SchemaType::Int32, Value::Int32(v)) => SqlParam::Int32(*v),
        (SchemaType::Int64, Value::Int64(v)) => SqlParam::Int64(*v),
        (SchemaType::Float32, Value::Float32(v)) => SqlParam::Float32(*v),
        (SchemaType::Float64, Value::Float64(v)) => SqlParam::Float64(*v),
        (SchemaType::String, Value::String(v)) => SqlParam::Text(v.clone()),
        (SchemaType::Bytes, Value::Bytes(v)) => SqlParam::Bytes(v.clone()),
        (schema_type, value) => {
            return Err(Error::Config(format!(
                "value {:?} does not match schema type {:?}",
                value, schema_type
            )))
        }
    };
    Ok(param)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::BatchResult;
    use crate::error::DatabaseError;
    use crate::record::{Field, SchemaType};

    #[derive(Default)]
    struct RecordingStatement {
        bound: Vec<(usize, SqlParam)>,
        batches: usize,
    }

    impl PreparedStatement for RecordingStatement {
        fn bind(&mut self, index: usize, param: SqlParam) -> Result<(), DatabaseError> {
            self.bound.push((index, param));
            Ok(())
        }

        fn add_batch(&mut self) -> Result<(), DatabaseError> {
            self.batches += 1;
            Ok(())
        }

        fn execute_batch(&mut self) -> Result<Vec<BatchResult>, DatabaseError> {
            Ok(vec![BatchResult::Rows(1); self.batches])
        }
    }

    fn value_schema() -> Schema {
        Schema::structure(vec![
            Field::new("id", Schema::primitive(SchemaType::Int64)),
            Field::new("name", Schema::optional_primitive(SchemaType::String)),
        ])
    }

    fn record() -> SinkRecord {
        SinkRecord {
            topic: "users".to_string(),
            partition: 2,
            offset: 100,
            key_schema: Some(Schema::primitive(SchemaType::Int64)),
            key: Some(Value::Int64(7)),
            value_schema: Some(value_schema()),
            value: Some(Value::Struct(vec![
                ("id".to_string(), Value::Int64(7)),
                ("name".to_string(), Value::String("alice".to_string())),
            ])),
        }
    }

    fn binder(pk_mode: PrimaryKeyMode, insert_mode: InsertMode) -> DefaultStatementBinder {
        let record = record();
        let schema_pair = record.schema_pair();
        let pk_fields = match pk_mode {
            PrimaryKeyMode::RecordKey | PrimaryKeyMode::RecordValue => vec!["id".to_string()],
            _ => Vec::new(),
        };
        let metadata = FieldsMetadata::extract("users", pk_mode, &pk_fields, &[], &schema_pair)
            .unwrap();
        DefaultStatementBinder::new(pk_mode, schema_pair, metadata, insert_mode)
    }

    #[test]
    fn test_insert_binds_keys_then_non_keys() {
        let binder = binder(PrimaryKeyMode::RecordKey, InsertMode::Insert);
        let mut statement = RecordingStatement::default();
        binder.bind_record(&mut statement, &record()).unwrap();

        assert_eq!(
            statement.bound,
            vec![
                (1, SqlParam::Int64(7)),
                (2, SqlParam::Text("alice".to_string())),
            ]
        );
        assert_eq!(statement.batches, 1);
    }

    #[test]
    fn test_update_binds_non_keys_first() {
        let binder = binder(PrimaryKeyMode::RecordKey, InsertMode::Update);
        let mut statement = RecordingStatement::default();
        binder.bind_record(&mut statement, &record()).unwrap();

        assert_eq!(
            statement.bound,
            vec![
                (1, SqlParam::Text("alice".to_string())),
                (2, SqlParam::Int64(7)),
            ]
        );
    }

    #[test]
    fn test_kafka_mode_binds_coordinates() {
        let binder = binder(PrimaryKeyMode::Kafka, InsertMode::Insert);
        let mut statement = RecordingStatement::default();
        binder.bind_record(&mut statement, &record()).unwrap();

        assert_eq!(
            statement.bound,
            vec![
                (1, SqlParam::Text("users".to_string())),
                (2, SqlParam::Int32(2)),
                (3, SqlParam::Int64(100)),
                (4, SqlParam::Int64(7)),
                (5, SqlParam::Text("alice".to_string())),
            ]
        );
    }

    #[test]
    fn test_multi_mode_returns_running_index() {
        let binder = binder(PrimaryKeyMode::RecordKey, InsertMode::Multi);
        let mut statement = RecordingStatement::default();

        let next = binder.bind_record_at(&mut statement, 1, &record()).unwrap();
        assert_eq!(next, 3);
        let next = binder.bind_record_at(&mut statement, next, &record()).unwrap();
        assert_eq!(next, 5);
        // Positions keep increasing; nothing was sealed as a batch entry.
        assert_eq!(statement.batches, 0);
        assert_eq!(statement.bound.len(), 4);
        assert_eq!(statement.bound[2].0, 3);
    }

    #[test]
    fn test_tombstone_binds_keys_only() {
        let binder = binder(PrimaryKeyMode::RecordKey, InsertMode::Insert);
        let mut statement = RecordingStatement::default();
        let mut tombstone = record();
        tombstone.value = None;

        binder
            .bind_tombstone_record(&mut statement, &tombstone)
            .unwrap();
        assert_eq!(statement.bound, vec![(1, SqlParam::Int64(7))]);
        assert_eq!(statement.batches, 1);
    }

    #[test]
    fn test_missing_struct_field_binds_null() {
        let binder = binder(PrimaryKeyMode::RecordKey, InsertMode::Insert);
        let mut statement = RecordingStatement::default();
        let mut record = record();
        record.value = Some(Value::Struct(vec![("id".to_string(), Value::Int64(7))]));

        binder.bind_record(&mut statement, &record).unwrap();
        assert_eq!(statement.bound[1], (2, SqlParam::Null(SchemaType::String)));
    }

    #[test]
    fn test_type_mismatch_rejected() {
        let binder = binder(PrimaryKeyMode::RecordKey, InsertMode::Insert);
        let mut statement = RecordingStatement::default();
        let mut record = record();
        record.key = Some(Value::String("not an int".to_string()));

        let err = binder.bind_record(&mut statement, &record).unwrap_err();
        assert!(err.to_string().contains("does not match schema type"));
    }
}
