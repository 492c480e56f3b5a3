//! Sink configuration.
//!
//! Configuration is loaded from TOML files; a host runtime may also build it
//! programmatically. All settings are read-only to the write engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Default synthetic key column names for [`PrimaryKeyMode::Kafka`].
pub const DEFAULT_KAFKA_PK_NAMES: [&str; 3] =
    ["__connect_topic", "__connect_partition", "__connect_offset"];

/// Insert strategy used for the regular (non-tombstone) batch.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InsertMode {
    /// Plain single-row INSERT, batched
    #[default]
    Insert,
    /// Insert-or-update keyed on the primary key columns
    Upsert,
    /// UPDATE keyed on the primary key columns
    Update,
    /// One statement carrying every buffered row's values
    Multi,
}

impl fmt::Display for InsertMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InsertMode::Insert => "insert",
            InsertMode::Upsert => "upsert",
            InsertMode::Update => "update",
            InsertMode::Multi => "multi",
        };
        f.write_str(name)
    }
}

/// How primary-key columns are derived from a record.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryKeyMode {
    /// No key columns
    #[default]
    None,
    /// Three synthetic columns from the stream coordinates (topic, partition, offset)
    Kafka,
    /// Key columns derived from the record key schema
    RecordKey,
    /// Key columns drawn from the record value schema
    RecordValue,
}

impl fmt::Display for PrimaryKeyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PrimaryKeyMode::None => "none",
            PrimaryKeyMode::Kafka => "kafka",
            PrimaryKeyMode::RecordKey => "record_key",
            PrimaryKeyMode::RecordValue => "record_value",
        };
        f.write_str(name)
    }
}

/// Sink configuration consumed by the write engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SinkConfig {
    /// Destination table name format; `${topic}` is replaced by the topic name
    #[serde(default = "default_table_name_format")]
    pub table_name_format: String,

    /// Row-count threshold that forces a flush
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Insert strategy
    #[serde(default)]
    pub insert_mode: InsertMode,

    /// Primary-key derivation policy
    #[serde(default)]
    pub pk_mode: PrimaryKeyMode,

    /// Configured primary-key field names (meaning depends on `pk_mode`)
    #[serde(default)]
    pub pk_fields: Vec<String>,

    /// If non-empty, only these value fields become non-key columns
    #[serde(default)]
    pub fields_whitelist: Vec<String>,

    /// Whether tombstone records are applied as DELETEs
    #[serde(default)]
    pub delete_enabled: bool,

    /// Whether a missing destination table may be created automatically
    #[serde(default)]
    pub auto_create: bool,

    /// Whether missing destination columns may be added automatically
    #[serde(default)]
    pub auto_evolve: bool,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            table_name_format: default_table_name_format(),
            batch_size: default_batch_size(),
            insert_mode: InsertMode::default(),
            pk_mode: PrimaryKeyMode::default(),
            pk_fields: Vec::new(),
            fields_whitelist: Vec::new(),
            delete_enabled: false,
            auto_create: false,
            auto_evolve: false,
        }
    }
}

fn default_table_name_format() -> String {
    "${topic}".to_string()
}

fn default_batch_size() -> usize {
    3000
}

impl SinkConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SinkConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate settings that are wrong for every record schema.
    ///
    /// Schema-dependent combinations are checked later, during fields
    /// metadata extraction.
    pub fn validate(&self) -> crate::Result<()> {
        if self.batch_size == 0 {
            return Err(crate::Error::Config("batch_size must be positive".into()));
        }

        match self.pk_mode {
            PrimaryKeyMode::None => {
                if !self.pk_fields.is_empty() {
                    return Err(crate::Error::Config(
                        "Primary key fields should not be set when pk_mode is 'none'".into(),
                    ));
                }
            }
            PrimaryKeyMode::Kafka => {
                if !self.pk_fields.is_empty() && self.pk_fields.len() != 3 {
                    return Err(crate::Error::Config(
                        "Primary key fields must be empty or exactly three fields \
                         (topic, partition, offset) when pk_mode is 'kafka'"
                            .into(),
                    ));
                }
            }
            PrimaryKeyMode::RecordKey | PrimaryKeyMode::RecordValue => {}
        }

        if self.delete_enabled && self.pk_mode != PrimaryKeyMode::RecordKey {
            return Err(crate::Error::Config(
                "Delete support only works with pk_mode=record_key".into(),
            ));
        }

        Ok(())
    }
}
