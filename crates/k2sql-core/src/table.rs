//! Destination table identifiers and definition snapshots.

use indexmap::IndexMap;
use std::fmt;

/// Fully qualified destination table identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableId {
    /// Catalog name, if the destination qualifies tables by catalog
    pub catalog: Option<String>,
    /// Schema (namespace) name
    pub schema: Option<String>,
    /// Table name
    pub table: String,
}

impl TableId {
    /// An unqualified table identifier.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            catalog: None,
            schema: None,
            table: table.into(),
        }
    }

    /// A schema-qualified table identifier.
    pub fn with_schema(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            catalog: None,
            schema: Some(schema.into()),
            table: table.into(),
        }
    }

    /// Parse a dot-separated identifier: `table`, `schema.table` or
    /// `catalog.schema.table`. Extra leading segments are folded into the
    /// catalog.
    pub fn parse(name: &str) -> Self {
        let parts: Vec<&str> = name.split('.').collect();
        match parts.as_slice() {
            [table] => Self::new(*table),
            [schema, table] => Self::with_schema(*schema, *table),
            [catalog @ .., schema, table] => Self {
                catalog: Some(catalog.join(".")),
                schema: Some((*schema).to_string()),
                table: (*table).to_string(),
            },
            [] => Self::new(name),
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(catalog) = &self.catalog {
            write!(f, "{}.", catalog)?;
        }
        if let Some(schema) = &self.schema {
            write!(f, "{}.", schema)?;
        }
        write!(f, "{}", self.table)
    }
}

/// Identity of one column within a destination table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnId {
    /// Owning table
    pub table: TableId,
    /// Column name
    pub name: String,
}

impl ColumnId {
    /// Create a column identity for the given table.
    pub fn new(table: &TableId, name: impl Into<String>) -> Self {
        Self {
            table: table.clone(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ColumnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.name)
    }
}

/// Definition of one existing column, as reported by the destination.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,
    /// Destination-native type name
    pub sql_type: String,
    /// Whether the column admits NULL
    pub nullable: bool,
    /// Whether the column is part of the primary key
    pub primary_key: bool,
}

/// Snapshot of a table's existing column set at a point in time.
///
/// Becomes stale once the table is altered; must be refreshed after any DDL.
#[derive(Debug, Clone, PartialEq)]
pub struct TableDefinition {
    /// Table identity
    pub id: TableId,
    /// Columns keyed by name, in destination order
    pub columns: IndexMap<String, ColumnDefinition>,
}

impl TableDefinition {
    /// A definition with the given columns.
    pub fn new(id: TableId, columns: Vec<ColumnDefinition>) -> Self {
        let columns = columns.into_iter().map(|c| (c.name.clone(), c)).collect();
        Self { id, columns }
    }

    /// Exact-case column lookup.
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        self.columns.get(name)
    }

    /// Case-insensitive column lookup; destinations differ in identifier
    /// case folding.
    pub fn column_ignore_case(&self, name: &str) -> Option<&ColumnDefinition> {
        self.column(name).or_else(|| {
            self.columns
                .values()
                .find(|c| c.name.eq_ignore_ascii_case(name))
        })
    }

    /// Column names in destination order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(|k| k.as_str())
    }
}
