use serde::{Deserialize, Serialize};

/// Constraint left unsatisfied on a row accepted best-effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementWarning {
    pub column: String,
    pub constraint: String,
    pub message: String,
}

/// INSERT statement ready for export or execution.
///
/// `priority` is the table's position in the dependency order; executing
/// statements by ascending priority never violates a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedStatement {
    pub table: String,
    pub sql: String,
    pub priority: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<StatementWarning>,
}

impl GeneratedStatement {
    pub fn new(table: impl Into<String>, sql: impl Into<String>, priority: usize) -> Self {
        Self {
            table: table.into(),
            sql: sql.into(),
            priority,
            warnings: Vec::new(),
        }
    }

    pub fn is_best_effort(&self) -> bool {
        !self.warnings.is_empty()
    }
}
