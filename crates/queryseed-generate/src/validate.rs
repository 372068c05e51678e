use std::cmp::Ordering;

use chrono::{Datelike, NaiveDateTime};
use queryseed_core::TableSchema;
use queryseed_query::{
    ComparisonOp, ConstraintSet, DateConstraint, DateConstraintKind, InValues, OrBranch,
    RangeType, SqlLiteral, like_matches,
};
use serde::Serialize;

use crate::model::GeneratedRow;
use crate::retry::ConstraintKind;
use crate::scope::{ColumnConstraints, TableConstraints};
use crate::temporal::{Temporal, parse_datetime, parse_temporal, shift};
use crate::values::GeneratedValue;

/// A constraint the row does not satisfy.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Violation {
    pub column: String,
    pub kind: ConstraintKind,
    /// Readable form of the requirement, e.g. `LIKE '%VNEXT%'`.
    pub expected: String,
    pub actual: String,
}

impl Violation {
    fn new(column: &str, kind: ConstraintKind, expected: String, actual: &GeneratedValue) -> Self {
        Self {
            column: column.to_string(),
            kind,
            expected,
            actual: if actual.is_null() {
                "NULL".to_string()
            } else {
                actual.to_text()
            },
        }
    }

    pub fn message(&self) -> String {
        format!(
            "{} expected {} but got {}",
            self.column, self.expected, self.actual
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    pub violations: Vec<Violation>,
}

impl ValidationOutcome {
    fn from_violations(violations: Vec<Violation>) -> Self {
        Self {
            is_valid: violations.is_empty(),
            violations,
        }
    }
}

/// Checks generated rows against extracted constraints. Pure.
#[derive(Debug, Clone, Copy)]
pub struct RowValidator {
    now: NaiveDateTime,
}

impl RowValidator {
    /// `now` anchors interval constraints such as `>= NOW() - INTERVAL 30 DAY`.
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now }
    }

    pub fn validate(
        &self,
        row: &GeneratedRow,
        alias: &str,
        constraints: &ConstraintSet,
        table: &TableSchema,
    ) -> ValidationOutcome {
        let aliases = [alias.to_string(), table.name.clone()];
        self.validate_scoped(row, &aliases, constraints, table)
    }

    /// Validate against every alias the table appears under.
    pub fn validate_scoped(
        &self,
        row: &GeneratedRow,
        aliases: &[String],
        constraints: &ConstraintSet,
        table: &TableSchema,
    ) -> ValidationOutcome {
        let scoped = TableConstraints::collect(constraints, aliases, table);
        self.validate_table(row, &scoped)
    }

    /// Unconditional constraints must all hold. An `OR` group holds when
    /// every constraint of one of its branches does; otherwise the
    /// violations of its first branch are reported.
    pub fn validate_table(&self, row: &GeneratedRow, scoped: &TableConstraints<'_>) -> ValidationOutcome {
        let unconditional = scoped.retain_branches(&|tag: Option<OrBranch>| tag.is_none());
        let mut violations = self.check_columns(row, &unconditional);

        for (group, branches) in scoped.disjunctions() {
            let mut first_failure = None;
            let mut held = false;
            for branch in branches {
                let only_branch = scoped.retain_branches(&|tag: Option<OrBranch>| {
                    tag.is_some_and(|tag| tag.group == group && tag.branch == branch)
                });
                let found = self.check_columns(row, &only_branch);
                if found.is_empty() {
                    held = true;
                    break;
                }
                first_failure.get_or_insert(found);
            }
            if !held {
                violations.extend(first_failure.unwrap_or_default());
            }
        }

        ValidationOutcome::from_violations(violations)
    }

    fn check_columns(&self, row: &GeneratedRow, scoped: &TableConstraints<'_>) -> Vec<Violation> {
        let mut violations = Vec::new();
        for (column, constraints) in scoped.columns() {
            let value = row.get(column).unwrap_or(&GeneratedValue::Null);
            violations.extend(self.check_column(column, value, constraints));
        }
        violations
    }

    /// Violations of one value against its column's constraints.
    pub fn check_column(
        &self,
        column: &str,
        value: &GeneratedValue,
        constraints: &ColumnConstraints<'_>,
    ) -> Vec<Violation> {
        let mut violations = Vec::new();
        let mut fail = |kind: ConstraintKind, expected: String| {
            violations.push(Violation::new(column, kind, expected, value));
        };

        for item in &constraints.nulls {
            if item.is_null != value.is_null() {
                let expected = if item.is_null { "IS NULL" } else { "IS NOT NULL" };
                fail(ConstraintKind::Null, expected.to_string());
            }
        }

        for item in &constraints.values {
            let holds = match &item.value {
                SqlLiteral::Null => match item.operator {
                    ComparisonOp::Eq => value.is_null(),
                    ComparisonOp::NotEq => !value.is_null(),
                    _ => false,
                },
                literal => compare_literal(value, literal)
                    .is_some_and(|ordering| item.operator.holds(ordering)),
            };
            if !holds {
                fail(
                    ConstraintKind::Comparison,
                    format!("{} {}", item.operator, describe_literal(&item.value)),
                );
            }
        }

        for item in &constraints.likes {
            let matched = !value.is_null() && like_matches(&item.pattern, &value.to_text());
            if value.is_null() || matched == item.negated {
                let not = if item.negated { "NOT " } else { "" };
                fail(ConstraintKind::Like, format!("{not}LIKE '{}'", item.pattern));
            }
        }

        for item in &constraints.betweens {
            let inside = between(value, &item.low, &item.high, item.value_type);
            if inside.is_none_or(|inside| inside == item.negated) {
                let not = if item.negated { "NOT " } else { "" };
                fail(
                    ConstraintKind::Between,
                    format!("{not}BETWEEN {} AND {}", item.low, item.high),
                );
            }
        }

        for item in &constraints.ins {
            if item.is_subquery() {
                continue;
            }
            let member = !value.is_null() && is_member(value, &item.values);
            if value.is_null() || member == item.negated {
                let not = if item.negated { "NOT " } else { "" };
                fail(
                    ConstraintKind::In,
                    format!("{not}IN ({})", item.members().join(", ")),
                );
            }
        }

        for item in &constraints.booleans {
            if value.as_bool() != Some(item.value) {
                let expected = if item.value { "TRUE" } else { "FALSE" };
                fail(ConstraintKind::Boolean, format!("= {expected}"));
            }
        }

        for item in &constraints.dates {
            if !self.date_holds(value, item) {
                fail(ConstraintKind::Date, describe_date(item));
            }
        }

        violations
    }

    fn date_holds(&self, value: &GeneratedValue, constraint: &DateConstraint) -> bool {
        let Some(actual) = value.as_datetime() else {
            return false;
        };
        match constraint.kind {
            DateConstraintKind::YearEquals => constraint.year.is_some_and(|year| actual.year() == year),
            DateConstraintKind::DateInterval => {
                let Some(target) = constraint
                    .interval
                    .as_ref()
                    .and_then(|interval| shift(self.now, interval))
                else {
                    return false;
                };
                let date_only =
                    matches!(value, GeneratedValue::Date(_)) || constraint.operator == ComparisonOp::Eq;
                let ordering = if date_only {
                    actual.date().cmp(&target.date())
                } else {
                    actual.cmp(&target)
                };
                constraint.operator.holds(ordering)
            }
        }
    }
}

/// Order `value` relative to a query literal, `None` when incomparable.
pub fn compare_literal(value: &GeneratedValue, literal: &SqlLiteral) -> Option<Ordering> {
    if value.is_null() {
        return None;
    }
    match literal {
        SqlLiteral::Null => None,
        SqlLiteral::Boolean(expected) => value.as_bool().map(|actual| actual.cmp(expected)),
        SqlLiteral::Number(number) => {
            let expected: f64 = number.parse().ok()?;
            value.as_f64()?.partial_cmp(&expected)
        }
        SqlLiteral::Date(text) => compare_temporal(value, text),
        SqlLiteral::Text(text) => match value {
            GeneratedValue::Date(_) | GeneratedValue::Timestamp(_) => compare_temporal(value, text),
            GeneratedValue::Int(_) | GeneratedValue::Float(_) => {
                let expected: f64 = text.trim().parse().ok()?;
                value.as_f64()?.partial_cmp(&expected)
            }
            GeneratedValue::Bool(actual) => {
                let expected = GeneratedValue::Text(text.clone()).as_bool()?;
                Some(actual.cmp(&expected))
            }
            _ => Some(value.to_text().as_str().cmp(text.as_str())),
        },
    }
}

fn compare_temporal(value: &GeneratedValue, text: &str) -> Option<Ordering> {
    let actual = value.as_datetime()?;
    match parse_temporal(text)? {
        Temporal::Date(date) if matches!(value, GeneratedValue::Date(_)) => {
            Some(actual.date().cmp(&date))
        }
        Temporal::Date(date) => Some(actual.cmp(&date.and_time(chrono::NaiveTime::MIN))),
        Temporal::DateTime(expected) => Some(actual.cmp(&expected)),
    }
}

fn between(value: &GeneratedValue, low: &str, high: &str, range: RangeType) -> Option<bool> {
    if value.is_null() {
        return None;
    }
    match range {
        RangeType::Numeric => {
            let actual = value.as_f64()?;
            let low: f64 = low.trim().parse().ok()?;
            let high: f64 = high.trim().parse().ok()?;
            Some(actual >= low && actual <= high)
        }
        RangeType::Date => {
            let actual = value.as_datetime()?;
            let low = parse_datetime(low)?;
            let high = parse_datetime(high)?;
            if matches!(value, GeneratedValue::Date(_)) {
                Some(actual.date() >= low.date() && actual.date() <= high.date())
            } else {
                Some(actual >= low && actual <= high)
            }
        }
        RangeType::String => {
            let actual = value.to_text();
            Some(actual.as_str() >= low && actual.as_str() <= high)
        }
    }
}

fn is_member(value: &GeneratedValue, values: &InValues) -> bool {
    match values {
        InValues::Numeric(members) => value.as_f64().is_some_and(|actual| {
            members
                .iter()
                .filter_map(|member| member.trim().parse::<f64>().ok())
                .any(|member| (member - actual).abs() < 1e-9)
        }),
        InValues::Text(members) => {
            let text = value.to_text();
            members.iter().any(|member| {
                *member == text
                    || compare_literal(value, &SqlLiteral::Text(member.clone()))
                        == Some(Ordering::Equal)
            })
        }
        InValues::Subquery(_) => true,
    }
}

fn describe_literal(literal: &SqlLiteral) -> String {
    match literal {
        SqlLiteral::Text(text) | SqlLiteral::Date(text) => format!("'{text}'"),
        SqlLiteral::Number(number) => number.clone(),
        SqlLiteral::Boolean(flag) => flag.to_string().to_uppercase(),
        SqlLiteral::Null => "NULL".to_string(),
    }
}

fn describe_date(constraint: &DateConstraint) -> String {
    match constraint.kind {
        DateConstraintKind::YearEquals => format!("YEAR = {}", constraint.value),
        DateConstraintKind::DateInterval => {
            let sign = match constraint.interval.map(|interval| interval.direction) {
                Some(queryseed_query::IntervalDirection::Future) => "+",
                _ => "-",
            };
            format!("{} NOW {sign} {}", constraint.operator, constraint.value)
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use queryseed_core::{ColumnSchema, DataType};
    use queryseed_query::extract_all_constraints;

    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn products() -> TableSchema {
        TableSchema::new("products")
            .with_column(ColumnSchema::new("id", DataType::Integer).primary_key())
            .with_column(ColumnSchema::new("title", DataType::String))
            .with_column(ColumnSchema::new("price", DataType::Decimal).precision(10, 2))
            .with_column(ColumnSchema::new("status", DataType::String))
            .with_column(ColumnSchema::new("released_on", DataType::Date))
            .with_column(ColumnSchema::new("active", DataType::Boolean))
    }

    #[test]
    fn accepts_a_satisfying_row() {
        let set = extract_all_constraints(
            "SELECT * FROM products p WHERE p.title LIKE '%VNEXT%' AND p.price BETWEEN 100 AND 500 \
             AND p.status IN ('new', 'hot') AND p.active = 1 AND YEAR(p.released_on) = 2024",
        );
        let row = GeneratedRow::new("products")
            .with("id", GeneratedValue::Int(1))
            .with("title", GeneratedValue::Text("VNEXT Solutions Ltd".to_string()))
            .with("price", GeneratedValue::Float(250.5))
            .with("status", GeneratedValue::Text("hot".to_string()))
            .with("active", GeneratedValue::Bool(true))
            .with(
                "released_on",
                GeneratedValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            );

        let outcome = RowValidator::new(now()).validate(&row, "p", &set, &products());
        assert!(outcome.is_valid, "{:?}", outcome.violations);
    }

    #[test]
    fn reports_each_violated_constraint() {
        let set = extract_all_constraints(
            "SELECT * FROM products p WHERE p.title LIKE '%VNEXT%' AND p.price BETWEEN 100 AND 500 \
             AND p.status NOT IN ('archived') AND p.released_on >= DATE_SUB(NOW(), INTERVAL 30 DAY)",
        );
        let row = GeneratedRow::new("products")
            .with("title", GeneratedValue::Text("Acme".to_string()))
            .with("price", GeneratedValue::Float(99.99))
            .with("status", GeneratedValue::Text("archived".to_string()))
            .with(
                "released_on",
                GeneratedValue::Date(NaiveDate::from_ymd_opt(2024, 4, 1).unwrap()),
            );

        let outcome = RowValidator::new(now()).validate(&row, "p", &set, &products());
        let kinds: Vec<ConstraintKind> = outcome.violations.iter().map(|v| v.kind).collect();
        assert!(!outcome.is_valid);
        assert_eq!(
            kinds,
            vec![
                ConstraintKind::Between,
                ConstraintKind::Date,
                ConstraintKind::In,
                ConstraintKind::Like,
            ]
        );
        assert!(outcome.violations[3].message().contains("LIKE '%VNEXT%'"));
    }

    #[test]
    fn subquery_in_is_always_satisfied_and_null_fails_filters() {
        let set = extract_all_constraints(
            "SELECT * FROM products WHERE id IN (SELECT product_id FROM orders) AND status = 'new'",
        );
        let row = GeneratedRow::new("products").with("id", GeneratedValue::Int(7));
        let outcome = RowValidator::new(now()).validate(&row, "", &set, &products());
        assert_eq!(outcome.violations.len(), 1);
        assert_eq!(outcome.violations[0].column, "status");
        assert_eq!(outcome.violations[0].actual, "NULL");
    }

    #[test]
    fn one_satisfied_or_branch_is_enough() {
        let set = extract_all_constraints(
            "SELECT * FROM products p WHERE p.active = 1 AND (p.status = 'new' OR p.status = 'hot')",
        );
        let row = |status: &str| {
            GeneratedRow::new("products")
                .with("status", GeneratedValue::Text(status.to_string()))
                .with("active", GeneratedValue::Bool(true))
        };
        let validator = RowValidator::new(now());

        assert!(validator.validate(&row("new"), "p", &set, &products()).is_valid);
        assert!(validator.validate(&row("hot"), "p", &set, &products()).is_valid);

        let outcome = validator.validate(&row("archived"), "p", &set, &products());
        assert_eq!(outcome.violations.len(), 1);
        assert_eq!(outcome.violations[0].expected, "= 'new'");
    }
}
