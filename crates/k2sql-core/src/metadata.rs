//! Derivation of key and non-key column sets from record schemas.

use crate::config::{PrimaryKeyMode, DEFAULT_KAFKA_PK_NAMES};
use crate::record::{Schema, SchemaPair, SchemaType};
use crate::{Error, Result};
use indexmap::{IndexMap, IndexSet};

/// One record field destined for a destination column.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkRecordField {
    /// Column name
    pub name: String,
    /// Field schema
    pub schema: Schema,
    /// Whether the column is part of the primary key
    pub primary_key: bool,
}

/// Ordered key and non-key column names derived from a schema pair.
///
/// Key insertion order is primary-key order. Extraction is a pure function
/// of its inputs: resubmitting the same schema pair yields identical output.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldsMetadata {
    /// Primary-key column names, in key order
    pub key_field_names: IndexSet<String>,
    /// Non-key column names, in value-schema order
    pub non_key_field_names: IndexSet<String>,
    /// Every column, keyed by name, keys first
    pub all_fields: IndexMap<String, SinkRecordField>,
}

impl FieldsMetadata {
    /// Derive the column sets for `table_name` from a schema pair and the
    /// configured primary-key policy.
    pub fn extract(
        table_name: &str,
        pk_mode: PrimaryKeyMode,
        configured_pk_fields: &[String],
        fields_whitelist: &[String],
        schema_pair: &SchemaPair,
    ) -> Result<FieldsMetadata> {
        if let Some(value_schema) = &schema_pair.value_schema {
            if value_schema.schema_type != SchemaType::Struct {
                return Err(Error::Config(format!(
                    "Value schema must be of type Struct for table '{}'",
                    table_name
                )));
            }
        }

        let mut key_field_names = IndexSet::new();
        let mut all_fields = IndexMap::new();

        match pk_mode {
            PrimaryKeyMode::None => {}
            PrimaryKeyMode::Kafka => extract_kafka_pk(
                table_name,
                configured_pk_fields,
                &mut key_field_names,
                &mut all_fields,
            )?,
            PrimaryKeyMode::RecordKey => extract_record_key_pk(
                table_name,
                configured_pk_fields,
                schema_pair,
                &mut key_field_names,
                &mut all_fields,
            )?,
            PrimaryKeyMode::RecordValue => extract_record_value_pk(
                table_name,
                configured_pk_fields,
                schema_pair,
                &mut key_field_names,
                &mut all_fields,
            )?,
        }

        let mut non_key_field_names = IndexSet::new();
        if let Some(value_schema) = &schema_pair.value_schema {
            for field in &value_schema.fields {
                if !fields_whitelist.is_empty() && !fields_whitelist.contains(&field.name) {
                    continue;
                }
                if key_field_names.contains(&field.name) {
                    continue;
                }
                non_key_field_names.insert(field.name.clone());
                all_fields.insert(
                    field.name.clone(),
                    SinkRecordField {
                        name: field.name.clone(),
                        schema: field.schema.clone(),
                        primary_key: false,
                    },
                );
            }
        }

        if all_fields.is_empty() {
            return Err(Error::Config(format!(
                "No fields found using key and value schemas for table '{}'",
                table_name
            )));
        }

        Ok(FieldsMetadata {
            key_field_names,
            non_key_field_names,
            all_fields,
        })
    }
}

fn add_key_field(
    key_field_names: &mut IndexSet<String>,
    all_fields: &mut IndexMap<String, SinkRecordField>,
    name: &str,
    schema: Schema,
) {
    key_field_names.insert(name.to_string());
    all_fields.insert(
        name.to_string(),
        SinkRecordField {
            name: name.to_string(),
            schema,
            primary_key: true,
        },
    );
}

fn extract_kafka_pk(
    table_name: &str,
    configured_pk_fields: &[String],
    key_field_names: &mut IndexSet<String>,
    all_fields: &mut IndexMap<String, SinkRecordField>,
) -> Result<()> {
    let names: Vec<&str> = if configured_pk_fields.is_empty() {
        DEFAULT_KAFKA_PK_NAMES.to_vec()
    } else if configured_pk_fields.len() == 3 {
        configured_pk_fields.iter().map(String::as_str).collect()
    } else {
        return Err(Error::Config(format!(
            "PK mode 'kafka' requires exactly 3 configured field names \
             (topic, partition, offset) for table '{}', got {}",
            table_name,
            configured_pk_fields.len()
        )));
    };

    let types = [SchemaType::String, SchemaType::Int32, SchemaType::Int64];
    for (name, schema_type) in names.iter().zip(types) {
        add_key_field(
            key_field_names,
            all_fields,
            name,
            Schema::primitive(schema_type),
        );
    }
    Ok(())
}

fn extract_record_key_pk(
    table_name: &str,
    configured_pk_fields: &[String],
    schema_pair: &SchemaPair,
    key_field_names: &mut IndexSet<String>,
    all_fields: &mut IndexMap<String, SinkRecordField>,
) -> Result<()> {
    let key_schema = schema_pair.key_schema.as_ref().ok_or_else(|| {
        Error::Config(format!(
            "PK mode 'record_key' requires a record key schema for table '{}'",
            table_name
        ))
    })?;

    if key_schema.schema_type.is_primitive() {
        if configured_pk_fields.len() != 1 {
            return Err(Error::Config(format!(
                "PK mode 'record_key' with a primitive key schema requires exactly one \
                 configured field name for table '{}', got {:?}",
                table_name, configured_pk_fields
            )));
        }
        add_key_field(
            key_field_names,
            all_fields,
            &configured_pk_fields[0],
            key_schema.clone(),
        );
        return Ok(());
    }

    if configured_pk_fields.is_empty() {
        for field in &key_schema.fields {
            add_key_field(key_field_names, all_fields, &field.name, field.schema.clone());
        }
    } else {
        for name in configured_pk_fields {
            let field = key_schema.field(name).ok_or_else(|| {
                Error::Config(format!(
                    "PK field '{}' for table '{}' is not part of the key schema; \
                     key schema fields: {:?}",
                    name,
                    table_name,
                    key_schema.field_names().collect::<Vec<_>>()
                ))
            })?;
            add_key_field(key_field_names, all_fields, name, field.schema.clone());
        }
    }
    Ok(())
}

fn extract_record_value_pk(
    table_name: &str,
    configured_pk_fields: &[String],
    schema_pair: &SchemaPair,
    key_field_names: &mut IndexSet<String>,
    all_fields: &mut IndexMap<String, SinkRecordField>,
) -> Result<()> {
    let value_schema = schema_pair.value_schema.as_ref().ok_or_else(|| {
        Error::Config(format!(
            "PK mode 'record_value' requires a record value schema for table '{}'",
            table_name
        ))
    })?;

    if configured_pk_fields.is_empty() {
        for field in &value_schema.fields {
            add_key_field(key_field_names, all_fields, &field.name, field.schema.clone());
        }
    } else {
        for name in configured_pk_fields {
            let field = value_schema.field(name).ok_or_else(|| {
                Error::Config(format!(
                    "PK field '{}' for table '{}' is not part of the value schema; \
                     value schema fields: {:?}",
                    name,
                    table_name,
                    value_schema.field_names().collect::<Vec<_>>()
                ))
            })?;
            add_key_field(key_field_names, all_fields, name, field.schema.clone());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Field;

    fn value_schema() -> Schema {
        Schema::structure(vec![
            Field::new("id", Schema::primitive(SchemaType::Int64)),
            Field::new("name", Schema::optional_primitive(SchemaType::String)),
            Field::new("age", Schema::optional_primitive(SchemaType::Int32)),
        ])
    }

    fn pair(key: Option<Schema>, value: Option<Schema>) -> SchemaPair {
        SchemaPair {
            key_schema: key,
            value_schema: value,
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pk_mode_none() {
        let metadata = FieldsMetadata::extract(
            "users",
            PrimaryKeyMode::None,
            &[],
            &[],
            &pair(None, Some(value_schema())),
        )
        .unwrap();

        assert!(metadata.key_field_names.is_empty());
        assert_eq!(
            metadata.non_key_field_names.iter().collect::<Vec<_>>(),
            vec!["id", "name", "age"]
        );
    }

    #[test]
    fn test_pk_mode_kafka_default_names() {
        let metadata = FieldsMetadata::extract(
            "users",
            PrimaryKeyMode::Kafka,
            &[],
            &[],
            &pair(None, Some(value_schema())),
        )
        .unwrap();

        assert_eq!(
            metadata.key_field_names.iter().collect::<Vec<_>>(),
            vec!["__connect_topic", "__connect_partition", "__connect_offset"]
        );
        let topic = &metadata.all_fields["__connect_topic"];
        assert!(topic.primary_key);
        assert_eq!(topic.schema.schema_type, SchemaType::String);
        assert_eq!(
            metadata.all_fields["__connect_offset"].schema.schema_type,
            SchemaType::Int64
        );
    }

    #[test]
    fn test_pk_mode_kafka_wrong_field_count() {
        let err = FieldsMetadata::extract(
            "users",
            PrimaryKeyMode::Kafka,
            &strings(&["a", "b"]),
            &[],
            &pair(None, Some(value_schema())),
        )
        .unwrap_err();
        assert!(err.to_string().contains("exactly 3"));
    }

    #[test]
    fn test_pk_mode_record_key_primitive() {
        let metadata = FieldsMetadata::extract(
            "users",
            PrimaryKeyMode::RecordKey,
            &strings(&["id"]),
            &[],
            &pair(
                Some(Schema::primitive(SchemaType::Int64)),
                Some(value_schema()),
            ),
        )
        .unwrap();

        assert_eq!(metadata.key_field_names.iter().collect::<Vec<_>>(), vec!["id"]);
        // "id" also exists in the value schema but is claimed by the key
        assert_eq!(
            metadata.non_key_field_names.iter().collect::<Vec<_>>(),
            vec!["name", "age"]
        );
    }

    #[test]
    fn test_pk_mode_record_key_primitive_needs_one_name() {
        let err = FieldsMetadata::extract(
            "users",
            PrimaryKeyMode::RecordKey,
            &[],
            &[],
            &pair(
                Some(Schema::primitive(SchemaType::Int64)),
                Some(value_schema()),
            ),
        )
        .unwrap_err();
        assert!(err.to_string().contains("exactly one"));
    }

    #[test]
    fn test_pk_mode_record_key_struct_subset() {
        let key_schema = Schema::structure(vec![
            Field::new("tenant", Schema::primitive(SchemaType::String)),
            Field::new("id", Schema::primitive(SchemaType::Int64)),
        ]);

        let metadata = FieldsMetadata::extract(
            "users",
            PrimaryKeyMode::RecordKey,
            &strings(&["tenant"]),
            &[],
            &pair(Some(key_schema.clone()), Some(value_schema())),
        )
        .unwrap();
        assert_eq!(
            metadata.key_field_names.iter().collect::<Vec<_>>(),
            vec!["tenant"]
        );

        // Empty configured list takes every key schema field, in order.
        let metadata = FieldsMetadata::extract(
            "users",
            PrimaryKeyMode::RecordKey,
            &[],
            &[],
            &pair(Some(key_schema), Some(value_schema())),
        )
        .unwrap();
        assert_eq!(
            metadata.key_field_names.iter().collect::<Vec<_>>(),
            vec!["tenant", "id"]
        );
    }

    #[test]
    fn test_pk_mode_record_key_missing_field() {
        let key_schema = Schema::structure(vec![Field::new(
            "id",
            Schema::primitive(SchemaType::Int64),
        )]);
        let err = FieldsMetadata::extract(
            "users",
            PrimaryKeyMode::RecordKey,
            &strings(&["nope"]),
            &[],
            &pair(Some(key_schema), Some(value_schema())),
        )
        .unwrap_err();
        assert!(err.to_string().contains("not part of the key schema"));
    }

    #[test]
    fn test_pk_mode_record_value_removes_from_non_key_set() {
        let metadata = FieldsMetadata::extract(
            "users",
            PrimaryKeyMode::RecordValue,
            &strings(&["id"]),
            &[],
            &pair(None, Some(value_schema())),
        )
        .unwrap();

        assert_eq!(metadata.key_field_names.iter().collect::<Vec<_>>(), vec!["id"]);
        assert_eq!(
            metadata.non_key_field_names.iter().collect::<Vec<_>>(),
            vec!["name", "age"]
        );
        assert!(metadata.all_fields["id"].primary_key);
        assert!(!metadata.all_fields["name"].primary_key);
    }

    #[test]
    fn test_whitelist_filters_non_key_fields() {
        let metadata = FieldsMetadata::extract(
            "users",
            PrimaryKeyMode::RecordValue,
            &strings(&["id"]),
            &strings(&["name"]),
            &pair(None, Some(value_schema())),
        )
        .unwrap();
        assert_eq!(
            metadata.non_key_field_names.iter().collect::<Vec<_>>(),
            vec!["name"]
        );
    }

    #[test]
    fn test_non_struct_value_schema_rejected() {
        let err = FieldsMetadata::extract(
            "users",
            PrimaryKeyMode::None,
            &[],
            &[],
            &pair(None, Some(Schema::primitive(SchemaType::String))),
        )
        .unwrap_err();
        assert!(err.to_string().contains("must be of type Struct"));
    }

    #[test]
    fn test_no_fields_at_all_rejected() {
        let err =
            FieldsMetadata::extract("users", PrimaryKeyMode::None, &[], &[], &pair(None, None))
                .unwrap_err();
        assert!(err.to_string().contains("No fields found"));
    }

    #[test]
    fn test_extraction_is_deterministic() {
        let schema_pair = pair(
            Some(Schema::primitive(SchemaType::Int64)),
            Some(value_schema()),
        );
        let fields = strings(&["id"]);
        let first = FieldsMetadata::extract(
            "users",
            PrimaryKeyMode::RecordKey,
            &fields,
            &[],
            &schema_pair,
        )
        .unwrap();
        let second = FieldsMetadata::extract(
            "users",
            PrimaryKeyMode::RecordKey,
            &fields,
            &[],
            &schema_pair,
        )
        .unwrap();
        assert_eq!(first, second);
    }
}
