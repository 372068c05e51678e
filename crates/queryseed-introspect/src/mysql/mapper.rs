use std::collections::BTreeMap;

use queryseed_core::{ColumnSchema, DataType, DatabaseInfo, Dialect, ForeignKeySchema, TableSchema};
use tracing::debug;

use crate::options::IntrospectOptions;

use super::queries::{RawColumn, RawForeignKey, RawTable, RawUniqueColumn};

pub fn map_column(raw: RawColumn) -> ColumnSchema {
    let data_type = DataType::from_native(&raw.column_type);
    let numeric = matches!(data_type, DataType::Decimal | DataType::Float);
    ColumnSchema {
        name: raw.name,
        data_type,
        native_type: Some(raw.column_type),
        max_length: if data_type.is_textual() {
            raw.character_max_length.and_then(|len| u32::try_from(len).ok())
        } else {
            None
        },
        numeric_precision: raw
            .numeric_precision
            .filter(|_| numeric)
            .and_then(|value| u32::try_from(value).ok()),
        numeric_scale: raw
            .numeric_scale
            .filter(|_| numeric)
            .and_then(|value| u32::try_from(value).ok()),
        is_primary_key: raw.column_key.eq_ignore_ascii_case("PRI"),
        is_identity: raw.extra.to_ascii_lowercase().contains("auto_increment"),
        is_nullable: raw.is_nullable.eq_ignore_ascii_case("YES"),
        is_unique: raw.column_key.eq_ignore_ascii_case("UNI"),
        default: raw.default,
    }
}

/// Assemble a snapshot from the raw catalog rows.
///
/// Only single-column unique constraints mark a column unique; composite
/// ones do not constrain any column on its own.
pub fn map_database(
    database: Option<String>,
    tables: Vec<RawTable>,
    columns: Vec<RawColumn>,
    uniques: Vec<RawUniqueColumn>,
    foreign_keys: Vec<RawForeignKey>,
    opts: &IntrospectOptions,
) -> DatabaseInfo {
    let mut by_name: BTreeMap<String, TableSchema> = tables
        .into_iter()
        .filter(|table| opts.include_views || !table.table_type.eq_ignore_ascii_case("VIEW"))
        .map(|table| (table.name.clone(), TableSchema::new(table.name)))
        .collect();

    for raw in columns {
        if let Some(table) = by_name.get_mut(&raw.table_name) {
            table.columns.push(map_column(raw));
        }
    }

    let mut unique_sets: BTreeMap<(String, String), Vec<String>> = BTreeMap::new();
    for raw in uniques {
        unique_sets
            .entry((raw.table_name, raw.constraint_name))
            .or_default()
            .push(raw.column_name);
    }
    for ((table_name, constraint), columns) in unique_sets {
        let [column_name] = columns.as_slice() else {
            debug!(table = %table_name, constraint = %constraint, "composite unique constraint skipped");
            continue;
        };
        let column = by_name
            .get_mut(&table_name)
            .and_then(|table| {
                table
                    .columns
                    .iter_mut()
                    .find(|column| column.name.eq_ignore_ascii_case(column_name))
            });
        if let Some(column) = column {
            column.is_unique = true;
        }
    }

    for raw in foreign_keys {
        if let Some(table) = by_name.get_mut(&raw.table_name) {
            table.foreign_keys.push(ForeignKeySchema {
                name: Some(raw.constraint_name),
                column: raw.column_name,
                referenced_table: raw.referenced_table,
                referenced_column: raw.referenced_column,
            });
        }
    }

    let mut info = DatabaseInfo::new(Dialect::MySql, database);
    for table in by_name.into_values() {
        info.insert_table(table);
    }
    info
}
