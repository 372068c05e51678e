use std::collections::BTreeSet;

use queryseed_core::DatabaseInfo;
use tracing::{debug, warn};

/// Keep the hinted tables and every table reachable through their foreign keys.
///
/// An empty hint keeps everything. Hinted names missing from the snapshot
/// are logged and skipped.
pub fn restrict_to_tables(info: DatabaseInfo, hint: &[String]) -> DatabaseInfo {
    if hint.is_empty() {
        return info;
    }

    let mut keep: BTreeSet<String> = BTreeSet::new();
    let mut pending: Vec<String> = Vec::new();
    for name in hint {
        match info.table(name) {
            Some(table) => pending.push(table.name.clone()),
            None => warn!(table = %name, "hinted table not found in schema"),
        }
    }

    while let Some(name) = pending.pop() {
        if !keep.insert(name.to_lowercase()) {
            continue;
        }
        let Some(table) = info.table(&name) else {
            continue;
        };
        for fk in &table.foreign_keys {
            if let Some(parent) = info.table(&fk.referenced_table) {
                pending.push(parent.name.clone());
            }
        }
    }

    let mut restricted = DatabaseInfo::new(info.dialect, info.database.clone());
    restricted.schema_version = info.schema_version.clone();
    for table in info.tables.into_values() {
        if keep.contains(&table.name.to_lowercase()) {
            restricted.insert_table(table);
        }
    }
    debug!(tables = restricted.tables.len(), "schema narrowed to hinted tables");
    restricted
}

#[cfg(test)]
mod tests {
    use queryseed_core::{ColumnSchema, DataType, Dialect, ForeignKeySchema, TableSchema};

    use super::*;

    fn info() -> DatabaseInfo {
        let id = || ColumnSchema::new("id", DataType::Integer).primary_key();
        DatabaseInfo::new(Dialect::MySql, None)
            .with_table(TableSchema::new("companies").with_column(id()))
            .with_table(
                TableSchema::new("users")
                    .with_column(id())
                    .with_column(ColumnSchema::new("company_id", DataType::Integer))
                    .with_foreign_key(ForeignKeySchema::new("company_id", "companies", "id")),
            )
            .with_table(
                TableSchema::new("orders")
                    .with_column(id())
                    .with_column(ColumnSchema::new("user_id", DataType::Integer))
                    .with_foreign_key(ForeignKeySchema::new("user_id", "users", "id")),
            )
            .with_table(TableSchema::new("audit_log").with_column(id()))
    }

    #[test]
    fn hint_pulls_in_referenced_tables() {
        let restricted = restrict_to_tables(info(), &["ORDERS".to_string(), "ghost".to_string()]);
        let names: Vec<&str> = restricted.table_names().collect();
        assert_eq!(names.len(), 3);
        assert!(restricted.contains_table("companies"));
        assert!(!restricted.contains_table("audit_log"));
    }

    #[test]
    fn empty_hint_keeps_everything() {
        assert_eq!(restrict_to_tables(info(), &[]).tables.len(), 4);
    }
}
