use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use queryseed_query::{ConstraintSet, QueryAnalysis, QueryParser};
use serde::{Deserialize, Serialize};

use crate::retry::RetryPolicy;
use crate::values::GeneratedValue;

/// Options for the generation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateOptions {
    /// Seed for every per-table and per-row random stream.
    pub seed: u64,
    /// Pull in parent tables the query does not mention.
    pub include_parents: bool,
    pub retry: RetryPolicy,
    /// Reference instant for date windows; current UTC time when unset.
    pub now: Option<NaiveDateTime>,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            seed: 42,
            include_parents: true,
            retry: RetryPolicy::default(),
            now: None,
        }
    }
}

/// Rows already present in the target database.
#[derive(Debug, Clone, Default)]
pub struct ExistingData {
    row_counts: BTreeMap<String, u64>,
    keys: BTreeMap<String, BTreeMap<String, Vec<GeneratedValue>>>,
}

impl ExistingData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_row_count(mut self, table: &str, rows: u64) -> Self {
        self.set_row_count(table, rows);
        self
    }

    pub fn set_row_count(&mut self, table: &str, rows: u64) {
        self.row_counts.insert(table.to_lowercase(), rows);
    }

    /// Register key values that already exist, e.g. `companies.id`.
    pub fn with_values(mut self, table: &str, column: &str, values: Vec<GeneratedValue>) -> Self {
        self.keys
            .entry(table.to_lowercase())
            .or_default()
            .entry(column.to_lowercase())
            .or_default()
            .extend(values);
        self
    }

    pub fn row_count(&self, table: &str) -> u64 {
        self.row_counts
            .get(&table.to_lowercase())
            .copied()
            .unwrap_or(0)
    }

    pub fn values(&self, table: &str, column: &str) -> &[GeneratedValue] {
        self.keys
            .get(&table.to_lowercase())
            .and_then(|columns| columns.get(&column.to_lowercase()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn columns(&self, table: &str) -> impl Iterator<Item = (&str, &[GeneratedValue])> {
        self.keys
            .get(&table.to_lowercase())
            .into_iter()
            .flat_map(|columns| columns.iter())
            .map(|(column, values)| (column.as_str(), values.as_slice()))
    }
}

/// Everything a run needs besides the schema.
#[derive(Debug, Clone, Default)]
pub struct GenerationRequest {
    /// Rows every table should end up with.
    pub desired_rows: u64,
    /// Per-table overrides of `desired_rows`, keyed by lowercase name.
    pub table_rows: BTreeMap<String, u64>,
    pub constraints: ConstraintSet,
    pub analysis: QueryAnalysis,
    pub existing: ExistingData,
}

impl GenerationRequest {
    pub fn from_query(parser: &dyn QueryParser, sql: &str, desired_rows: u64) -> Self {
        Self {
            desired_rows,
            table_rows: BTreeMap::new(),
            constraints: parser.extract_constraints(sql),
            analysis: parser.analyze(sql),
            existing: ExistingData::default(),
        }
    }

    pub fn with_table_rows(mut self, table: &str, rows: u64) -> Self {
        self.table_rows.insert(table.to_lowercase(), rows);
        self
    }

    pub fn with_existing(mut self, existing: ExistingData) -> Self {
        self.existing = existing;
        self
    }

    /// Rows the table should end up with.
    pub fn requested_rows(&self, table: &str) -> u64 {
        self.table_rows
            .get(&table.to_lowercase())
            .copied()
            .unwrap_or(self.desired_rows)
    }

    /// `desired - current`, never negative.
    pub fn rows_to_generate(&self, table: &str) -> u64 {
        self.requested_rows(table)
            .saturating_sub(self.existing.row_count(table))
    }
}

/// One generated row, keyed by lowercase column name.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedRow {
    pub table: String,
    pub attempt: u32,
    pub values: BTreeMap<String, GeneratedValue>,
}

impl GeneratedRow {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            attempt: 1,
            values: BTreeMap::new(),
        }
    }

    pub fn get(&self, column: &str) -> Option<&GeneratedValue> {
        self.values.get(&column.to_lowercase())
    }

    pub fn set(&mut self, column: &str, value: GeneratedValue) {
        self.values.insert(column.to_lowercase(), value);
    }

    pub fn with(mut self, column: &str, value: GeneratedValue) -> Self {
        self.set(column, value);
        self
    }
}

/// Summary of a generated table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableReport {
    pub table: String,
    pub priority: usize,
    pub auto_included: bool,
    pub rows_requested: u64,
    pub rows_existing: u64,
    pub rows_generated: u64,
    pub retries: u64,
    pub best_effort_rows: u64,
}

/// Structured generation issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationIssue {
    pub level: String,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
}

impl GenerationIssue {
    pub fn warning(code: &str, message: impl Into<String>) -> Self {
        Self {
            level: "warning".to_string(),
            code: code.to_string(),
            message: message.into(),
            table: None,
            column: None,
            constraint: None,
        }
    }

    pub fn for_table(mut self, table: &str) -> Self {
        self.table = Some(table.to_string());
        self
    }

    pub fn for_column(mut self, column: &str) -> Self {
        self.column = Some(column.to_string());
        self
    }

    pub fn for_constraint(mut self, constraint: &str) -> Self {
        self.constraint = Some(constraint.to_string());
        self
    }
}

/// Report for a generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub run_id: String,
    pub seed: u64,
    pub now: NaiveDateTime,
    pub order: Vec<String>,
    pub tables: Vec<TableReport>,
    pub rows_total: u64,
    pub retries_total: u64,
    pub best_effort_rows: u64,
    pub ai_values: u64,
    pub fallback_values: u64,
    pub warnings_by_code: BTreeMap<String, u64>,
    pub warnings: Vec<GenerationIssue>,
}

impl GenerationReport {
    pub fn new(run_id: String, seed: u64, now: NaiveDateTime) -> Self {
        Self {
            run_id,
            seed,
            now,
            order: Vec::new(),
            tables: Vec::new(),
            rows_total: 0,
            retries_total: 0,
            best_effort_rows: 0,
            ai_values: 0,
            fallback_values: 0,
            warnings_by_code: BTreeMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn record_warning(&mut self, issue: GenerationIssue) {
        *self.warnings_by_code.entry(issue.code.clone()).or_insert(0) += 1;
        self.warnings.push(issue);
    }

    pub fn warning_count(&self, code: &str) -> u64 {
        self.warnings_by_code.get(code).copied().unwrap_or(0)
    }

    pub fn table(&self, name: &str) -> Option<&TableReport> {
        self.tables
            .iter()
            .find(|table| table.table.eq_ignore_ascii_case(name))
    }
}
