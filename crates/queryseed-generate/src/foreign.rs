use std::collections::{BTreeMap, HashSet};

use crate::model::GeneratedRow;
use crate::values::GeneratedValue;

/// Values of parent tables, available to child foreign keys.
#[derive(Debug, Default)]
pub struct ForeignPools {
    column_values: BTreeMap<String, BTreeMap<String, Vec<GeneratedValue>>>,
    cursor: BTreeMap<String, usize>,
}

impl ForeignPools {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register values already stored in the database.
    pub fn ingest_existing(&mut self, table: &str, column: &str, values: &[GeneratedValue]) {
        let pool = self.pool_mut(table, column);
        pool.extend(values.iter().filter(|value| !value.is_null()).cloned());
    }

    /// Register every non-null value of an accepted row.
    pub fn ingest_row(&mut self, row: &GeneratedRow) {
        let table = row.table.to_lowercase();
        let columns = self.column_values.entry(table).or_default();
        for (column, value) in &row.values {
            if !value.is_null() {
                columns.entry(column.clone()).or_default().push(value.clone());
            }
        }
    }

    pub fn has_values(&self, table: &str, column: &str) -> bool {
        !self.values(table, column).is_empty()
    }

    pub fn values(&self, table: &str, column: &str) -> &[GeneratedValue] {
        self.column_values
            .get(&table.to_lowercase())
            .and_then(|columns| columns.get(&column.to_lowercase()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Round-robin pick from a parent column.
    ///
    /// Starting at the cursor for `cursor_key`, the first value `accept`
    /// approves wins; when none does, the value under the cursor is used.
    pub fn pick<F>(
        &mut self,
        parent_table: &str,
        parent_column: &str,
        cursor_key: &str,
        accept: F,
    ) -> Option<GeneratedValue>
    where
        F: Fn(&GeneratedValue) -> bool,
    {
        let values = self
            .column_values
            .get(&parent_table.to_lowercase())
            .and_then(|columns| columns.get(&parent_column.to_lowercase()))?;
        if values.is_empty() {
            return None;
        }
        let len = values.len();
        let idx = self.cursor.entry(cursor_key.to_lowercase()).or_insert(0);
        let start = *idx % len;
        let chosen = (0..len)
            .map(|offset| (start + offset) % len)
            .find(|candidate| accept(&values[*candidate]))
            .unwrap_or(start);
        *idx = (chosen + 1) % len;
        Some(values[chosen].clone())
    }

    fn pool_mut(&mut self, table: &str, column: &str) -> &mut Vec<GeneratedValue> {
        self.column_values
            .entry(table.to_lowercase())
            .or_default()
            .entry(column.to_lowercase())
            .or_default()
    }
}

/// Values taken by unique columns, including rows already stored.
#[derive(Debug, Default)]
pub struct KeyRegistry {
    taken: BTreeMap<String, HashSet<String>>,
    max_int: BTreeMap<String, i64>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Integer keys start above `rows` when existing values are unknown.
    pub fn reserve_below(&mut self, table: &str, column: &str, rows: u64) {
        let floor = i64::try_from(rows).unwrap_or(i64::MAX);
        let max = self.max_int.entry(slot(table, column)).or_insert(0);
        *max = (*max).max(floor);
    }

    pub fn is_taken(&self, table: &str, column: &str, value: &GeneratedValue) -> bool {
        self.taken
            .get(&slot(table, column))
            .is_some_and(|keys| keys.contains(&value.key()))
    }

    pub fn claim(&mut self, table: &str, column: &str, value: &GeneratedValue) {
        if value.is_null() {
            return;
        }
        let key = slot(table, column);
        if let Some(number) = integral(value) {
            let max = self.max_int.entry(key.clone()).or_insert(0);
            *max = (*max).max(number);
        }
        self.taken.entry(key).or_default().insert(value.key());
    }

    /// Smallest integer above every claimed one.
    pub fn next_free_int(&self, table: &str, column: &str) -> i64 {
        let key = slot(table, column);
        let mut next = self.max_int.get(&key).copied().unwrap_or(0).saturating_add(1);
        let taken = self.taken.get(&key);
        while taken.is_some_and(|keys| keys.contains(&next.to_string())) {
            next = next.saturating_add(1);
        }
        next
    }
}

fn slot(table: &str, column: &str) -> String {
    format!("{}.{}", table.to_lowercase(), column.to_lowercase())
}

fn integral(value: &GeneratedValue) -> Option<i64> {
    match value {
        GeneratedValue::Int(number) => Some(*number),
        GeneratedValue::Float(number) if number.fract() == 0.0 && number.is_finite() => {
            Some(*number as i64)
        }
        _ => None,
    }
}
