use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use queryseed_core::{DatabaseInfo, Dialect, GeneratedStatement, Result};

/// Source of schema snapshots.
#[async_trait]
pub trait SchemaProvider {
    /// Returns the dialect the snapshot describes.
    fn dialect(&self) -> Dialect;

    /// Load the schema. A non-empty `table_hint` narrows the snapshot to
    /// those tables and every table they reference.
    async fn database_info(&self, table_hint: &[String]) -> Result<DatabaseInfo>;
}

/// Runs generated statements and answers row-count questions.
///
/// Statements run one by one in the order given; transactions are the
/// caller's business.
#[async_trait]
pub trait StatementExecutor {
    async fn execute_statements(&self, statements: &[GeneratedStatement])
    -> Result<ExecutionSummary>;

    async fn count_rows(&self, table: &str) -> Result<u64>;

    /// Rows returned by an arbitrary `SELECT`.
    async fn count_query_rows(&self, sql: &str) -> Result<u64>;

    /// Up to `limit` non-null values of a column, as text.
    async fn column_values(&self, table: &str, column: &str, limit: u32) -> Result<Vec<String>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableExecution {
    pub statements: u64,
    pub rows_inserted: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatementFailure {
    pub table: String,
    /// Position of the statement in the executed sequence.
    pub index: usize,
    pub message: String,
}

/// Per-table outcome of [`StatementExecutor::execute_statements`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExecutionSummary {
    pub tables: BTreeMap<String, TableExecution>,
    pub failures: Vec<StatementFailure>,
}

impl ExecutionSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn rows_inserted(&self) -> u64 {
        self.tables.values().map(|table| table.rows_inserted).sum()
    }

    pub fn record_success(&mut self, table: &str, rows: u64) {
        let entry = self.tables.entry(table.to_string()).or_default();
        entry.statements += 1;
        entry.rows_inserted += rows;
    }

    pub fn record_failure(&mut self, table: &str, index: usize, message: impl Into<String>) {
        let entry = self.tables.entry(table.to_string()).or_default();
        entry.statements += 1;
        entry.failed += 1;
        self.failures.push(StatementFailure {
            table: table.to_string(),
            index,
            message: message.into(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_rows_and_failures_per_table() {
        let mut summary = ExecutionSummary::default();
        summary.record_success("companies", 1);
        summary.record_success("companies", 1);
        summary.record_failure("users", 2, "duplicate entry");

        assert!(!summary.is_success());
        assert_eq!(summary.rows_inserted(), 2);
        assert_eq!(summary.tables["companies"].statements, 2);
        assert_eq!(summary.tables["users"].failed, 1);
        assert_eq!(summary.failures[0].index, 2);
    }
}
