//! Record and schema model for the write engine.
//!
//! Records arrive from the change-record source carrying a key schema, a
//! value schema and their stream coordinates (topic, partition, offset).
//! A record with a null value is a tombstone and signals deletion of the
//! row identified by its key.

/// Type of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaType {
    /// 8-bit signed integer
    Int8,
    /// 16-bit signed integer
    Int16,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 32-bit float
    Float32,
    /// 64-bit float
    Float64,
    /// Boolean
    Boolean,
    /// UTF-8 string
    String,
    /// Raw bytes
    Bytes,
    /// Named fields, each with its own schema
    Struct,
}

impl SchemaType {
    /// Whether this is a primitive (non-struct) type.
    pub fn is_primitive(&self) -> bool {
        !matches!(self, SchemaType::Struct)
    }
}

/// A named field within a struct schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field name
    pub name: String,
    /// Field schema
    pub schema: Schema,
}

impl Field {
    /// Create a field.
    pub fn new(name: impl Into<String>, schema: Schema) -> Self {
        Self {
            name: name.into(),
            schema,
        }
    }
}

/// Structural schema descriptor for record keys and values.
///
/// Equality is structural; the engine performs no validation of schema
/// descriptors beyond structural equality checks.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    /// Node type
    pub schema_type: SchemaType,
    /// Whether null is an admissible value
    pub optional: bool,
    /// Fields, non-empty only for [`SchemaType::Struct`]
    pub fields: Vec<Field>,
}

impl Schema {
    /// A required primitive schema.
    pub fn primitive(schema_type: SchemaType) -> Self {
        Self {
            schema_type,
            optional: false,
            fields: Vec::new(),
        }
    }

    /// An optional primitive schema.
    pub fn optional_primitive(schema_type: SchemaType) -> Self {
        Self {
            schema_type,
            optional: true,
            fields: Vec::new(),
        }
    }

    /// A required struct schema with the given fields.
    pub fn structure(fields: Vec<Field>) -> Self {
        Self {
            schema_type: SchemaType::Struct,
            optional: false,
            fields,
        }
    }

    /// Look up a struct field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Names of all struct fields, in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// A typed record payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean value
    Boolean(bool),
    /// 8-bit integer value
    Int8(i8),
    /// 16-bit integer value
    Int16(i16),
    /// 32-bit integer value
    Int32(i32),
    /// 64-bit integer value
    Int64(i64),
    /// 32-bit float value
    Float32(f32),
    /// 64-bit float value
    Float64(f64),
    /// String value
    String(String),
    /// Bytes value
    Bytes(Vec<u8>),
    /// Struct value: field name/value pairs in declaration order
    Struct(Vec<(String, Value)>),
}

impl Value {
    /// Look up a struct field value by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }
}

/// One change record as delivered by the stream source.
///
/// Immutable once received; held inside a buffer only until flushed, then
/// handed back to the caller for offset bookkeeping.
#[derive(Debug, Clone, PartialEq)]
pub struct SinkRecord {
    /// Source topic
    pub topic: String,
    /// Source partition
    pub partition: i32,
    /// Source offset
    pub offset: i64,
    /// Key schema, if the record has a key
    pub key_schema: Option<Schema>,
    /// Key value
    pub key: Option<Value>,
    /// Value schema
    pub value_schema: Option<Schema>,
    /// Value; `None` marks a tombstone
    pub value: Option<Value>,
}

impl SinkRecord {
    /// Tombstone records are events with a null value.
    pub fn is_tombstone(&self) -> bool {
        self.value.is_none()
    }

    /// The key/value schema pair used to detect batch boundaries.
    pub fn schema_pair(&self) -> SchemaPair {
        SchemaPair {
            key_schema: self.key_schema.clone(),
            value_schema: self.value_schema.clone(),
        }
    }
}

/// A record's key and value schemas taken together.
///
/// Two pairs are equal iff both schemas are structurally equal; equality
/// decides whether two records may share a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaPair {
    /// Key schema
    pub key_schema: Option<Schema>,
    /// Value schema
    pub value_schema: Option<Schema>,
}
