use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::schema::DatabaseInfo;

/// Non-fatal inconsistency found in a schema snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaIssue {
    pub table: String,
    pub column: Option<String>,
    pub message: String,
}

/// Validate internal consistency of a schema snapshot.
///
/// Hard errors:
/// - table key differs from the table name
/// - duplicate column names (case-insensitive)
/// - foreign key column missing from its own table
///
/// Foreign keys to a missing table or column are returned as issues; the
/// generator treats those columns as unconstrained scalars.
pub fn validate_database_info(info: &DatabaseInfo) -> Result<Vec<SchemaIssue>> {
    let mut issues = Vec::new();

    for (key, table) in &info.tables {
        if !key.eq_ignore_ascii_case(&table.name) {
            return Err(Error::InvalidSchema(format!(
                "table key '{key}' does not match table name '{}'",
                table.name
            )));
        }

        let mut columns = BTreeSet::new();
        for column in &table.columns {
            if !columns.insert(column.name.to_ascii_lowercase()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicate column name: {}.{}",
                    table.name, column.name
                )));
            }
        }

        for fk in &table.foreign_keys {
            if !columns.contains(&fk.column.to_ascii_lowercase()) {
                return Err(Error::InvalidSchema(format!(
                    "foreign key column not found: {}.{}",
                    table.name, fk.column
                )));
            }

            let message = match info.table(&fk.referenced_table) {
                None => Some(format!(
                    "referenced table not in snapshot: {}",
                    fk.referenced_table
                )),
                Some(parent) if parent.column(&fk.referenced_column).is_none() => Some(format!(
                    "referenced column not found: {}.{}",
                    parent.name, fk.referenced_column
                )),
                Some(_) => None,
            };

            if let Some(message) = message {
                warn!(table = %table.name, column = %fk.column, "{message}");
                issues.push(SchemaIssue {
                    table: table.name.clone(),
                    column: Some(fk.column.clone()),
                    message,
                });
            }
        }
    }

    Ok(issues)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSchema, ForeignKeySchema, TableSchema};
    use crate::types::{DataType, Dialect};

    #[test]
    fn rejects_duplicate_columns() {
        let info = DatabaseInfo::new(Dialect::MySql, None).with_table(
            TableSchema::new("users")
                .with_column(ColumnSchema::new("id", DataType::Integer))
                .with_column(ColumnSchema::new("ID", DataType::Integer)),
        );

        let err = validate_database_info(&info).unwrap_err();
        assert!(err.to_string().contains("duplicate column name"));
    }

    #[test]
    fn rejects_missing_fk_column() {
        let info = DatabaseInfo::new(Dialect::MySql, None).with_table(
            TableSchema::new("users")
                .with_column(ColumnSchema::new("id", DataType::Integer))
                .with_foreign_key(ForeignKeySchema::new("company_id", "companies", "id")),
        );

        assert!(validate_database_info(&info).is_err());
    }

    #[test]
    fn missing_parent_is_an_issue() {
        let info = DatabaseInfo::new(Dialect::MySql, None).with_table(
            TableSchema::new("users")
                .with_column(ColumnSchema::new("company_id", DataType::Integer))
                .with_foreign_key(ForeignKeySchema::new("company_id", "companies", "id")),
        );

        let issues = validate_database_info(&info).unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].column.as_deref(), Some("company_id"));
    }
}
