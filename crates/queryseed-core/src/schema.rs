use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::types::{DataType, Dialect};

fn default_schema_version() -> String {
    crate::SCHEMA_VERSION.to_string()
}

fn default_true() -> bool {
    true
}

/// Schema snapshot used for one generation run.
///
/// Built once from a schema provider and treated as read-only afterwards.
/// Table lookups ignore case and an optional `schema.` qualifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DatabaseInfo {
    #[serde(default = "default_schema_version")]
    pub schema_version: String,
    pub dialect: Dialect,
    #[serde(default)]
    pub database: Option<String>,
    pub tables: BTreeMap<String, TableSchema>,
}

impl DatabaseInfo {
    pub fn new(dialect: Dialect, database: Option<String>) -> Self {
        Self {
            schema_version: default_schema_version(),
            dialect,
            database,
            tables: BTreeMap::new(),
        }
    }

    pub fn with_table(mut self, table: TableSchema) -> Self {
        self.insert_table(table);
        self
    }

    pub fn insert_table(&mut self, table: TableSchema) {
        self.tables.insert(table.name.clone(), table);
    }

    /// Find a table by name, ignoring case and any schema qualifier.
    pub fn table(&self, name: &str) -> Option<&TableSchema> {
        let name = unqualified(name);
        if let Some(table) = self.tables.get(name) {
            return Some(table);
        }
        self.tables
            .values()
            .find(|table| table.name.eq_ignore_ascii_case(name))
    }

    pub fn contains_table(&self, name: &str) -> bool {
        self.table(name).is_some()
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.values().map(|table| table.name.as_str())
    }
}

fn unqualified(name: &str) -> &str {
    let trimmed = name.trim().trim_matches(|c| c == '`' || c == '"');
    match trimmed.rsplit_once('.') {
        Some((_, table)) => table.trim_matches(|c| c == '`' || c == '"'),
        None => trimmed,
    }
}

/// Table definition with ordered columns and outgoing foreign keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
    #[serde(default)]
    pub foreign_keys: Vec<ForeignKeySchema>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: ColumnSchema) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_foreign_key(mut self, foreign_key: ForeignKeySchema) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }

    pub fn primary_key_columns(&self) -> Vec<&ColumnSchema> {
        self.columns
            .iter()
            .filter(|column| column.is_primary_key)
            .collect()
    }

    pub fn foreign_key_for(&self, column: &str) -> Option<&ForeignKeySchema> {
        self.foreign_keys
            .iter()
            .find(|fk| fk.column.eq_ignore_ascii_case(column))
    }

    /// Columns that receive values in generated INSERT statements.
    pub fn insertable_columns(&self) -> impl Iterator<Item = &ColumnSchema> {
        self.columns.iter().filter(|column| !column.is_identity)
    }

    pub fn references_itself(&self) -> bool {
        self.foreign_keys
            .iter()
            .any(|fk| fk.referenced_table.eq_ignore_ascii_case(&self.name))
    }
}

/// Column metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub native_type: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub numeric_precision: Option<u32>,
    #[serde(default)]
    pub numeric_scale: Option<u32>,
    #[serde(default)]
    pub is_primary_key: bool,
    /// Auto-increment or identity; never receives a generated value.
    #[serde(default)]
    pub is_identity: bool,
    #[serde(default = "default_true")]
    pub is_nullable: bool,
    #[serde(default)]
    pub is_unique: bool,
    #[serde(default)]
    pub default: Option<String>,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            native_type: None,
            max_length: None,
            numeric_precision: None,
            numeric_scale: None,
            is_primary_key: false,
            is_identity: false,
            is_nullable: true,
            is_unique: false,
            default: None,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self.is_nullable = false;
        self
    }

    pub fn identity(mut self) -> Self {
        self.is_identity = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.is_nullable = false;
        self
    }

    pub fn unique(mut self) -> Self {
        self.is_unique = true;
        self
    }

    pub fn max_length(mut self, length: u32) -> Self {
        self.max_length = Some(length);
        self
    }

    pub fn precision(mut self, precision: u32, scale: u32) -> Self {
        self.numeric_precision = Some(precision);
        self.numeric_scale = Some(scale);
        self
    }

    pub fn native(mut self, native_type: impl Into<String>) -> Self {
        self.native_type = Some(native_type.into());
        self
    }

    /// True when generated values must not repeat within a table.
    pub fn requires_unique_values(&self) -> bool {
        self.is_primary_key || self.is_unique
    }
}

/// Foreign key from one column of the owning table to a parent column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ForeignKeySchema {
    #[serde(default)]
    pub name: Option<String>,
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

impl ForeignKeySchema {
    pub fn new(
        column: impl Into<String>,
        referenced_table: impl Into<String>,
        referenced_column: impl Into<String>,
    ) -> Self {
        Self {
            name: None,
            column: column.into(),
            referenced_table: referenced_table.into(),
            referenced_column: referenced_column.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lookup_ignores_case_and_qualifier() {
        let info = DatabaseInfo::new(Dialect::MySql, Some("shop".to_string())).with_table(
            TableSchema::new("Users").with_column(ColumnSchema::new("id", DataType::Integer)),
        );

        assert!(info.table("users").is_some());
        assert!(info.table("shop.USERS").is_some());
        assert!(info.table("`shop`.`users`").is_some());
        assert!(info.table("orders").is_none());
    }

    #[test]
    fn identity_columns_are_not_insertable() {
        let table = TableSchema::new("users")
            .with_column(ColumnSchema::new("id", DataType::Integer).primary_key().identity())
            .with_column(ColumnSchema::new("name", DataType::String));

        let names: Vec<&str> = table.insertable_columns().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["name"]);
        assert_eq!(table.primary_key_columns().len(), 1);
    }
}
