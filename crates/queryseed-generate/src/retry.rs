use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of constraint a violation or retry budget refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Comparison,
    Like,
    Between,
    In,
    Null,
    Boolean,
    Date,
    Unique,
}

impl ConstraintKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ConstraintKind::Comparison => "comparison",
            ConstraintKind::Like => "like",
            ConstraintKind::Between => "between",
            ConstraintKind::In => "in",
            ConstraintKind::Null => "null",
            ConstraintKind::Boolean => "boolean",
            ConstraintKind::Date => "date",
            ConstraintKind::Unique => "unique",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const DEFAULT_ATTEMPTS: u32 = 5;

/// Bounded regeneration budget for a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts per row, the first build included.
    pub max_attempts: u32,
    /// Budgets for specific constraint kinds.
    pub overrides: BTreeMap<ConstraintKind, u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_ATTEMPTS,
            overrides: BTreeMap::new(),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_override(mut self, kind: ConstraintKind, attempts: u32) -> Self {
        self.overrides.insert(kind, attempts);
        self
    }

    /// Budget for a row whose latest violations have the given kinds.
    ///
    /// The largest budget among the kinds wins; never below one attempt.
    pub fn attempts_for<I>(&self, kinds: I) -> u32
    where
        I: IntoIterator<Item = ConstraintKind>,
    {
        kinds
            .into_iter()
            .map(|kind| self.overrides.get(&kind).copied().unwrap_or(self.max_attempts))
            .max()
            .unwrap_or(self.max_attempts)
            .max(1)
    }
}
