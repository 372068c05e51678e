use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Comparison operator as written in the query, after normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ComparisonOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
}

impl ComparisonOp {
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim() {
            "=" => Some(ComparisonOp::Eq),
            "!=" | "<>" => Some(ComparisonOp::NotEq),
            ">" => Some(ComparisonOp::Gt),
            ">=" => Some(ComparisonOp::Ge),
            "<" => Some(ComparisonOp::Lt),
            "<=" => Some(ComparisonOp::Le),
            _ => None,
        }
    }

    /// Operator to use when the operands swap sides (`5 < x` is `x > 5`).
    pub fn reversed(self) -> Self {
        match self {
            ComparisonOp::Gt => ComparisonOp::Lt,
            ComparisonOp::Ge => ComparisonOp::Le,
            ComparisonOp::Lt => ComparisonOp::Gt,
            ComparisonOp::Le => ComparisonOp::Ge,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::NotEq => "!=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Ge => ">=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Le => "<=",
        }
    }

    /// Evaluate the operator against an ordering of `left` relative to `right`.
    pub fn holds(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::*;
        match self {
            ComparisonOp::Eq => ordering == Equal,
            ComparisonOp::NotEq => ordering != Equal,
            ComparisonOp::Gt => ordering == Greater,
            ComparisonOp::Ge => ordering != Less,
            ComparisonOp::Lt => ordering == Less,
            ComparisonOp::Le => ordering != Greater,
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clause a typed constraint was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintSource {
    Where,
    Having,
    JoinOn,
}

/// Position of a condition inside an `OR`: operand `branch` of disjunction
/// `group`. A disjunction holds when every condition of one branch holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct OrBranch {
    pub group: u32,
    pub branch: u32,
}

/// Literal operand of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SqlLiteral {
    Text(String),
    Number(String),
    /// `DATE '...'`, `TIMESTAMP '...'` or `TO_DATE('...')`.
    Date(String),
    Boolean(bool),
    Null,
}

impl SqlLiteral {
    /// Literal text without SQL quoting.
    pub fn text(&self) -> String {
        match self {
            SqlLiteral::Text(value) | SqlLiteral::Number(value) | SqlLiteral::Date(value) => {
                value.clone()
            }
            SqlLiteral::Boolean(value) => value.to_string(),
            SqlLiteral::Null => "NULL".to_string(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            SqlLiteral::Number(value) => value.parse().ok(),
            SqlLiteral::Text(value) => value.trim().parse().ok(),
            SqlLiteral::Boolean(value) => Some(if *value { 1.0 } else { 0.0 }),
            _ => None,
        }
    }
}

/// `col OP literal` from WHERE, HAVING or an ON filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ValueConstraint {
    pub alias: String,
    pub column: String,
    pub operator: ComparisonOp,
    pub value: SqlLiteral,
    pub source: ConstraintSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<OrBranch>,
}

/// How a join condition was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JoinConditionSource {
    /// The key equality that links the joined table.
    JoinKey,
    /// Any further AND-chained condition inside the same ON.
    JoinFilter,
    /// Column-to-column equality in WHERE (implicit join).
    WhereJoin,
}

/// Right-hand side of a join condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JoinTarget {
    Column { alias: String, column: String },
    Literal { value: SqlLiteral },
    /// Condition kept as text (LIKE, IN, IS NULL inside an ON).
    Expression { text: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JoinCondition {
    pub alias: String,
    pub column: String,
    pub operator: Option<ComparisonOp>,
    pub target: JoinTarget,
    pub source: JoinConditionSource,
}

impl JoinCondition {
    /// Column pair when this is an equality between two columns.
    pub fn column_pair(&self) -> Option<((&str, &str), (&str, &str))> {
        match (&self.target, self.operator) {
            (JoinTarget::Column { alias, column }, Some(ComparisonOp::Eq)) => Some((
                (self.alias.as_str(), self.column.as_str()),
                (alias.as_str(), column.as_str()),
            )),
            _ => None,
        }
    }

    pub fn is_key_equality(&self) -> bool {
        matches!(
            self.source,
            JoinConditionSource::JoinKey | JoinConditionSource::WhereJoin
        ) && self.column_pair().is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum LikeKind {
    StartsWith,
    EndsWith,
    Contains,
    /// No wildcard at all; behaves like equality.
    Exact,
    /// Wildcards in the middle or `_` placeholders.
    Pattern,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct LikeConstraint {
    pub alias: String,
    pub column: String,
    pub pattern: String,
    pub kind: LikeKind,
    /// Fixed text the value must carry (pattern without the edge wildcards).
    pub literal: String,
    pub negated: bool,
    pub source: ConstraintSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<OrBranch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RangeType {
    Numeric,
    Date,
    String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BetweenConstraint {
    pub alias: String,
    pub column: String,
    pub low: String,
    pub high: String,
    pub value_type: RangeType,
    pub negated: bool,
    pub source: ConstraintSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<OrBranch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "values", rename_all = "snake_case")]
pub enum InValues {
    Numeric(Vec<String>),
    Text(Vec<String>),
    /// Raw subquery text; never evaluated.
    Subquery(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct InConstraint {
    pub alias: String,
    pub column: String,
    pub values: InValues,
    pub negated: bool,
    pub source: ConstraintSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<OrBranch>,
}

impl InConstraint {
    pub fn is_subquery(&self) -> bool {
        matches!(self.values, InValues::Subquery(_))
    }

    /// Listed members, empty for a subquery.
    pub fn members(&self) -> &[String] {
        match &self.values {
            InValues::Numeric(values) | InValues::Text(values) => values,
            InValues::Subquery(_) => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NullConstraint {
    pub alias: String,
    pub column: String,
    pub is_null: bool,
    pub source: ConstraintSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<OrBranch>,
}

/// `[NOT] EXISTS (subquery)`; alias and column stay empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExistsConstraint {
    pub alias: String,
    pub column: String,
    pub negated: bool,
    pub subquery: String,
    pub source: ConstraintSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<OrBranch>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BooleanConstraint {
    pub alias: String,
    pub column: String,
    pub value: bool,
    /// Spelling used in the query (`TRUE`, `1`, `FALSE`, `0`).
    pub literal: String,
    pub source: ConstraintSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<OrBranch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DateConstraintKind {
    YearEquals,
    DateInterval,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DateTag {
    /// `>=` or `>`: value lies at or after the boundary.
    DateWithin,
    /// `<=` or `<`: value lies at or before the boundary.
    DateCompare,
    DateEquals,
}

impl DateTag {
    pub fn from_op(op: ComparisonOp) -> Option<Self> {
        match op {
            ComparisonOp::Ge | ComparisonOp::Gt => Some(DateTag::DateWithin),
            ComparisonOp::Le | ComparisonOp::Lt => Some(DateTag::DateCompare),
            ComparisonOp::Eq => Some(DateTag::DateEquals),
            ComparisonOp::NotEq => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum IntervalDirection {
    Past,
    Future,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntervalUnit {
    Second,
    Minute,
    Hour,
    Day,
    Week,
    Month,
    Quarter,
    Year,
}

impl IntervalUnit {
    /// Parse a unit keyword, accepting plural spellings (`DAYS`).
    pub fn parse(token: &str) -> Option<Self> {
        let upper = token.trim().to_ascii_uppercase();
        let singular = upper.strip_suffix('S').unwrap_or(&upper);
        match singular {
            "SECOND" => Some(IntervalUnit::Second),
            "MINUTE" => Some(IntervalUnit::Minute),
            "HOUR" => Some(IntervalUnit::Hour),
            "DAY" => Some(IntervalUnit::Day),
            "WEEK" => Some(IntervalUnit::Week),
            "MONTH" => Some(IntervalUnit::Month),
            "QUARTER" => Some(IntervalUnit::Quarter),
            "YEAR" => Some(IntervalUnit::Year),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IntervalUnit::Second => "SECOND",
            IntervalUnit::Minute => "MINUTE",
            IntervalUnit::Hour => "HOUR",
            IntervalUnit::Day => "DAY",
            IntervalUnit::Week => "WEEK",
            IntervalUnit::Month => "MONTH",
            IntervalUnit::Quarter => "QUARTER",
            IntervalUnit::Year => "YEAR",
        }
    }
}

/// Offset from "now" in a date expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Interval {
    pub amount: i64,
    pub unit: IntervalUnit,
    pub direction: IntervalDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DateConstraint {
    pub alias: String,
    pub column: String,
    pub kind: DateConstraintKind,
    /// Operator after moving the column to the left-hand side.
    pub operator: ComparisonOp,
    pub tag: DateTag,
    /// Year for `YEAR_EQUALS`, `{amount}_{unit}` for `DATE_INTERVAL`.
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<Interval>,
    pub source: ConstraintSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<OrBranch>,
}

/// Everything a query's filters require from its source tables.
///
/// Collections keep query order. Every item carries its owning alias
/// (empty when the column was unqualified) and column name.
/// Conditions found under an `OR` also carry their [`OrBranch`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ConstraintSet {
    #[serde(default)]
    pub values: Vec<ValueConstraint>,
    #[serde(default)]
    pub joins: Vec<JoinCondition>,
    #[serde(default)]
    pub likes: Vec<LikeConstraint>,
    #[serde(default)]
    pub betweens: Vec<BetweenConstraint>,
    #[serde(default)]
    pub ins: Vec<InConstraint>,
    #[serde(default)]
    pub nulls: Vec<NullConstraint>,
    #[serde(default)]
    pub exists: Vec<ExistsConstraint>,
    #[serde(default)]
    pub booleans: Vec<BooleanConstraint>,
    #[serde(default)]
    pub dates: Vec<DateConstraint>,
}

impl ConstraintSet {
    pub fn len(&self) -> usize {
        self.values.len()
            + self.joins.len()
            + self.likes.len()
            + self.betweens.len()
            + self.ins.len()
            + self.nulls.len()
            + self.exists.len()
            + self.booleans.len()
            + self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All constraints owned by `alias` (case-insensitive). Join conditions
    /// match when either side uses the alias.
    pub fn for_alias(&self, alias: &str) -> ConstraintSet {
        self.retain_matching(|owner, _| owner.eq_ignore_ascii_case(alias))
    }

    /// All constraints on `column` owned by `alias`.
    pub fn for_column(&self, alias: &str, column: &str) -> ConstraintSet {
        self.retain_matching(|owner, name| {
            owner.eq_ignore_ascii_case(alias) && name.eq_ignore_ascii_case(column)
        })
    }

    /// Copy of the set keeping items whose `(alias, column)` satisfies `keep`.
    pub fn retain_matching<F>(&self, mut keep: F) -> ConstraintSet
    where
        F: FnMut(&str, &str) -> bool,
    {
        ConstraintSet {
            values: filter(&self.values, |c| keep(&c.alias, &c.column)),
            joins: filter(&self.joins, |c| {
                keep(&c.alias, &c.column)
                    || matches!(&c.target, JoinTarget::Column { alias, column } if keep(alias, column))
            }),
            likes: filter(&self.likes, |c| keep(&c.alias, &c.column)),
            betweens: filter(&self.betweens, |c| keep(&c.alias, &c.column)),
            ins: filter(&self.ins, |c| keep(&c.alias, &c.column)),
            nulls: filter(&self.nulls, |c| keep(&c.alias, &c.column)),
            exists: filter(&self.exists, |c| keep(&c.alias, &c.column)),
            booleans: filter(&self.booleans, |c| keep(&c.alias, &c.column)),
            dates: filter(&self.dates, |c| keep(&c.alias, &c.column)),
        }
    }

    /// Distinct non-empty aliases referenced by any constraint, in first-seen order.
    pub fn aliases(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        let mut push = |alias: &str| {
            if !alias.is_empty() && !seen.iter().any(|a| a.eq_ignore_ascii_case(alias)) {
                seen.push(alias.to_string());
            }
        };
        self.values.iter().for_each(|c| push(&c.alias));
        for join in &self.joins {
            push(&join.alias);
            if let JoinTarget::Column { alias, .. } = &join.target {
                push(alias);
            }
        }
        self.likes.iter().for_each(|c| push(&c.alias));
        self.betweens.iter().for_each(|c| push(&c.alias));
        self.ins.iter().for_each(|c| push(&c.alias));
        self.nulls.iter().for_each(|c| push(&c.alias));
        self.booleans.iter().for_each(|c| push(&c.alias));
        self.dates.iter().for_each(|c| push(&c.alias));
        seen
    }

    /// `(alias, column)` pairs constrained by anything other than a join.
    pub fn constrained_columns(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = Vec::new();
        let mut push = |alias: &str, column: &str| {
            let exists = pairs.iter().any(|(a, c)| {
                a.eq_ignore_ascii_case(alias) && c.eq_ignore_ascii_case(column)
            });
            if !column.is_empty() && !exists {
                pairs.push((alias.to_string(), column.to_string()));
            }
        };
        self.values.iter().for_each(|c| push(&c.alias, &c.column));
        self.likes.iter().for_each(|c| push(&c.alias, &c.column));
        self.betweens.iter().for_each(|c| push(&c.alias, &c.column));
        self.ins.iter().for_each(|c| push(&c.alias, &c.column));
        self.nulls.iter().for_each(|c| push(&c.alias, &c.column));
        self.booleans.iter().for_each(|c| push(&c.alias, &c.column));
        self.dates.iter().for_each(|c| push(&c.alias, &c.column));
        pairs
    }
}

fn filter<T: Clone>(items: &[T], mut keep: impl FnMut(&T) -> bool) -> Vec<T> {
    items.iter().filter(|item| keep(item)).cloned().collect()
}
