use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime};
use queryseed_core::{ColumnSchema, DataType, Dialect, GeneratedStatement, TableSchema};

use crate::errors::GenerationError;
use crate::model::GeneratedRow;
use crate::temporal::{Temporal, is_date_shaped, parse_temporal};
use crate::values::GeneratedValue;

const RESERVED: &[&str] = &[
    "access", "add", "all", "alter", "and", "any", "as", "asc", "between", "by", "case",
    "check", "column", "comment", "create", "current", "date", "default", "delete", "desc",
    "distinct", "drop", "else", "exists", "file", "from", "grant", "group", "having", "in",
    "index", "insert", "interval", "into", "is", "join", "key", "level", "like", "limit",
    "lock", "mode", "not", "null", "number", "of", "on", "option", "or", "order", "rank",
    "range", "read", "rows", "select", "session", "set", "size", "start", "table", "then",
    "to", "trigger", "uid", "union", "unique", "update", "user", "values", "view", "when",
    "where", "with",
];

/// Assemble one `INSERT` without a trailing semicolon.
///
/// `values` line up with `columns`; identity columns are dropped from both.
pub fn build_insert_statement(
    table: &str,
    columns: &[ColumnSchema],
    values: &[GeneratedValue],
    dialect: Dialect,
) -> String {
    let pairs: Vec<(&ColumnSchema, &GeneratedValue)> = columns
        .iter()
        .zip(values.iter())
        .filter(|(column, _)| !column.is_identity)
        .collect();
    let table_name = quote_table(table, dialect);

    if pairs.is_empty() {
        return match (dialect, columns.iter().find(|column| column.is_identity)) {
            (Dialect::MySql, _) => format!("INSERT INTO {table_name} () VALUES ()"),
            (Dialect::Postgres, _) | (Dialect::Oracle, None) => {
                format!("INSERT INTO {table_name} DEFAULT VALUES")
            }
            (Dialect::Oracle, Some(identity)) => format!(
                "INSERT INTO {table_name} ({}) VALUES (DEFAULT)",
                quote_identifier(&identity.name, dialect)
            ),
        };
    }

    let names: Vec<String> = pairs
        .iter()
        .map(|(column, _)| quote_identifier(&column.name, dialect))
        .collect();
    let literals: Vec<String> = pairs
        .iter()
        .map(|(column, value)| render_literal(value, Some(column), dialect))
        .collect();
    format!(
        "INSERT INTO {table_name} ({}) VALUES ({})",
        names.join(", "),
        literals.join(", ")
    )
}

/// `INSERT` for a generated row in the table's column order; missing values are `NULL`.
pub fn build_row_insert(table: &TableSchema, row: &GeneratedRow, dialect: Dialect) -> String {
    let values: Vec<GeneratedValue> = table
        .columns
        .iter()
        .map(|column| row.get(&column.name).cloned().unwrap_or(GeneratedValue::Null))
        .collect();
    build_insert_statement(&table.name, &table.columns, &values, dialect)
}

/// SQL literal for a value in the target dialect.
///
/// Date-shaped text is recognized whatever the column type says, so a
/// mislabeled column still gets a valid date literal.
pub fn render_literal(
    value: &GeneratedValue,
    column: Option<&ColumnSchema>,
    dialect: Dialect,
) -> String {
    match value {
        GeneratedValue::Null => "NULL".to_string(),
        GeneratedValue::Bool(flag) => render_bool(*flag, dialect),
        GeneratedValue::Int(number) => number.to_string(),
        GeneratedValue::Float(number) => render_float(*number, column),
        GeneratedValue::Text(text) => {
            if is_date_shaped(text) {
                match parse_temporal(text) {
                    Some(Temporal::Date(date)) => render_date(date, dialect),
                    Some(Temporal::DateTime(datetime)) => render_timestamp(datetime, dialect),
                    None => quote_string(text, dialect),
                }
            } else if column.is_some_and(|column| column.data_type == DataType::Boolean) {
                match value.as_bool() {
                    Some(flag) => render_bool(flag, dialect),
                    None => quote_string(text, dialect),
                }
            } else {
                quote_string(text, dialect)
            }
        }
        GeneratedValue::Uuid(text) => quote_string(text, dialect),
        GeneratedValue::Date(date) => render_date(*date, dialect),
        GeneratedValue::Timestamp(datetime) => render_timestamp(*datetime, dialect),
        GeneratedValue::Time(time) => quote_string(&time.format("%H:%M:%S").to_string(), dialect),
    }
}

fn render_bool(flag: bool, dialect: Dialect) -> String {
    match (dialect, flag) {
        (Dialect::Oracle, true) => "1".to_string(),
        (Dialect::Oracle, false) => "0".to_string(),
        (_, true) => "TRUE".to_string(),
        (_, false) => "FALSE".to_string(),
    }
}

fn render_float(number: f64, column: Option<&ColumnSchema>) -> String {
    if !number.is_finite() {
        return "NULL".to_string();
    }
    let scale = column
        .filter(|column| column.data_type == DataType::Decimal)
        .map(|column| column.numeric_scale.unwrap_or(2));
    match scale {
        Some(scale) => format!("{number:.*}", scale as usize),
        None => number.to_string(),
    }
}

fn render_date(date: NaiveDate, dialect: Dialect) -> String {
    let text = date.format("%Y-%m-%d").to_string();
    match dialect {
        Dialect::Oracle => format!("TO_DATE('{text}', 'YYYY-MM-DD')"),
        _ => format!("'{text}'"),
    }
}

fn render_timestamp(datetime: NaiveDateTime, dialect: Dialect) -> String {
    let text = datetime.format("%Y-%m-%d %H:%M:%S").to_string();
    match dialect {
        Dialect::Oracle => format!("TO_TIMESTAMP('{text}', 'YYYY-MM-DD HH24:MI:SS')"),
        _ => format!("'{text}'"),
    }
}

/// Single-quoted string; MySQL also escapes backslashes.
pub fn quote_string(text: &str, dialect: Dialect) -> String {
    let escaped = match dialect {
        Dialect::MySql => text.replace('\\', "\\\\").replace('\'', "''"),
        _ => text.replace('\'', "''"),
    };
    format!("'{escaped}'")
}

/// Quote an identifier only when it is not a plain word or is reserved.
pub fn quote_identifier(name: &str, dialect: Dialect) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    let reserved = RESERVED.iter().any(|word| word.eq_ignore_ascii_case(name));
    if plain && !reserved {
        return name.to_string();
    }
    match dialect {
        Dialect::MySql => format!("`{}`", name.replace('`', "``")),
        _ => format!("\"{}\"", name.replace('"', "\"\"")),
    }
}

fn quote_table(name: &str, dialect: Dialect) -> String {
    name.split('.')
        .map(|part| quote_identifier(part, dialect))
        .collect::<Vec<_>>()
        .join(".")
}

/// Script with every statement terminated, in priority order.
///
/// Best-effort rows carry their unmet constraints as comments.
pub fn render_script(statements: &[GeneratedStatement], dialect: Dialect) -> String {
    let mut ordered: Vec<&GeneratedStatement> = statements.iter().collect();
    ordered.sort_by_key(|statement| statement.priority);

    let mut script = format!(
        "-- queryseed inserts ({dialect})\n-- {} statements\n",
        ordered.len()
    );
    for statement in ordered {
        for warning in &statement.warnings {
            script.push_str(&format!(
                "-- best effort: {}.{} {}\n",
                statement.table,
                warning.column,
                warning.message.replace('\n', " ")
            ));
        }
        script.push_str(&statement.sql);
        script.push_str(";\n");
    }
    script
}

/// Write the rendered script, returning the bytes written.
pub fn write_script(
    path: &Path,
    statements: &[GeneratedStatement],
    dialect: Dialect,
) -> Result<u64, GenerationError> {
    let script = render_script(statements, dialect);
    let mut writer = BufWriter::new(File::create(path)?);
    writer.write_all(script.as_bytes())?;
    writer.flush()?;
    Ok(script.len() as u64)
}
