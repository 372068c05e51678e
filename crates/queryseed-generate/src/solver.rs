use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use queryseed_core::{ColumnSchema, DataType};
use queryseed_query::like::tokenize;
use queryseed_query::{
    ComparisonOp, DateConstraint, DateConstraintKind, LikeKind, LikeToken, RangeType, SqlLiteral,
};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::fallback::{SemanticKind, companion_text, semantic_kind, truncate_chars};
use crate::scope::ColumnConstraints;
use crate::temporal::{parse_datetime, shift, year_bounds};
use crate::values::GeneratedValue;

/// Builds values that satisfy the positive constraints of a column.
///
/// Negative filters (`!=`, `NOT IN`, `NOT LIKE`, `NOT BETWEEN`) are left to
/// the validator; a failing value is regenerated with a fresh stream.
#[derive(Debug, Clone, Copy)]
pub struct ConstraintSolver {
    now: NaiveDateTime,
}

impl ConstraintSolver {
    pub fn new(now: NaiveDateTime) -> Self {
        Self { now }
    }

    /// `None` when nothing constrains the value positively.
    pub fn solve(
        &self,
        table: &str,
        column: &ColumnSchema,
        constraints: &ColumnConstraints<'_>,
        row_index: u64,
        rng: &mut ChaCha8Rng,
    ) -> Option<GeneratedValue> {
        if constraints.requires_null() {
            return Some(GeneratedValue::Null);
        }

        if let Some(item) = constraints
            .values
            .iter()
            .find(|item| item.operator == ComparisonOp::Eq)
        {
            return Some(match &item.value {
                SqlLiteral::Null => GeneratedValue::Null,
                SqlLiteral::Boolean(flag) => boolean_value(column, *flag, &flag.to_string()),
                literal => coerce(column, &literal.text()),
            });
        }

        if let Some(item) = constraints.booleans.first() {
            return Some(boolean_value(column, item.value, &item.literal));
        }

        if let Some(value) = self.pick_member(column, constraints, row_index) {
            return Some(value);
        }

        if column.data_type.is_textual() {
            if let Some(text) = compose_like(table, column, constraints, rng) {
                return Some(GeneratedValue::Text(text));
            }
        }

        let temporal = !constraints.dates.is_empty()
            || matches!(column.data_type, DataType::Date | DataType::DateTime);
        if temporal {
            if let Some(value) = self.solve_temporal(column, constraints, rng) {
                return Some(value);
            }
        }

        if let Some(value) = solve_numeric(column, constraints, rng) {
            return Some(value);
        }

        constraints
            .betweens
            .iter()
            .find(|item| !item.negated && item.value_type == RangeType::String)
            .map(|item| GeneratedValue::Text(item.low.clone()))
    }

    /// Rotate through the allowed `IN` members, skipping excluded ones.
    fn pick_member(
        &self,
        column: &ColumnSchema,
        constraints: &ColumnConstraints<'_>,
        row_index: u64,
    ) -> Option<GeneratedValue> {
        let list = constraints
            .ins
            .iter()
            .find(|item| !item.negated && !item.is_subquery())?;
        let excluded = |member: &str| {
            constraints
                .ins
                .iter()
                .filter(|item| item.negated)
                .any(|item| item.members().iter().any(|other| other == member))
                || constraints.values.iter().any(|item| {
                    item.operator == ComparisonOp::NotEq && item.value.text() == member
                })
        };
        let allowed: Vec<&String> = list
            .members()
            .iter()
            .filter(|member| !excluded(member))
            .collect();
        let members: Vec<&String> = if allowed.is_empty() {
            list.members().iter().collect()
        } else {
            allowed
        };
        if members.is_empty() {
            return None;
        }
        let idx = (row_index % members.len() as u64) as usize;
        Some(coerce(column, members[idx]))
    }

    fn solve_temporal(
        &self,
        column: &ColumnSchema,
        constraints: &ColumnConstraints<'_>,
        rng: &mut ChaCha8Rng,
    ) -> Option<GeneratedValue> {
        let day_grained = column.data_type == DataType::Date;
        let step = if day_grained {
            TimeDelta::days(1)
        } else {
            TimeDelta::seconds(1)
        };
        let mut window = Window::default();

        for item in &constraints.dates {
            self.apply_date_constraint(&mut window, item, day_grained, step);
        }
        for item in &constraints.values {
            let bound = match &item.value {
                SqlLiteral::Date(text) | SqlLiteral::Text(text) => parse_datetime(text),
                _ => None,
            };
            if let Some(bound) = bound {
                window.apply(item.operator, bound, step);
            }
        }
        for item in &constraints.betweens {
            if item.negated || item.value_type != RangeType::Date {
                continue;
            }
            if let (Some(low), Some(high)) = (parse_datetime(&item.low), parse_datetime(&item.high)) {
                window.raise(low);
                window.lower(high);
            }
        }

        if window.is_open() {
            return None;
        }
        let (low, high) = window.close(self.now);
        let value = if day_grained {
            let first = ceil_day(low);
            let last = high.date();
            let span = (last - first).num_days().max(0);
            GeneratedValue::Date(first + TimeDelta::days(rng.random_range(0..=span)))
        } else {
            let span = (high - low).num_seconds().max(0);
            GeneratedValue::Timestamp(low + TimeDelta::seconds(rng.random_range(0..=span)))
        };

        Some(match column.data_type {
            DataType::Date | DataType::DateTime => value,
            _ => GeneratedValue::Text(value.to_text()),
        })
    }

    fn apply_date_constraint(
        &self,
        window: &mut Window,
        item: &DateConstraint,
        day_grained: bool,
        step: TimeDelta,
    ) {
        match item.kind {
            DateConstraintKind::YearEquals => {
                if let Some((start, end)) = item.year.and_then(year_bounds) {
                    window.raise(start);
                    window.lower(end);
                }
            }
            DateConstraintKind::DateInterval => {
                let Some(target) = item
                    .interval
                    .as_ref()
                    .and_then(|interval| shift(self.now, interval))
                else {
                    return;
                };
                let target = if day_grained {
                    target.date().and_time(NaiveTime::MIN)
                } else {
                    target
                };
                if item.operator == ComparisonOp::Eq {
                    let day = target.date();
                    window.raise(day.and_time(NaiveTime::MIN));
                    window.lower(end_of_day(day));
                } else {
                    window.apply(item.operator, target, step);
                }
            }
        }
    }
}

/// Closed interval built from lower and upper bounds.
#[derive(Debug, Default, Clone, Copy)]
struct Window {
    low: Option<NaiveDateTime>,
    high: Option<NaiveDateTime>,
}

impl Window {
    fn raise(&mut self, bound: NaiveDateTime) {
        self.low = Some(self.low.map_or(bound, |low| low.max(bound)));
    }

    fn lower(&mut self, bound: NaiveDateTime) {
        self.high = Some(self.high.map_or(bound, |high| high.min(bound)));
    }

    fn apply(&mut self, op: ComparisonOp, bound: NaiveDateTime, step: TimeDelta) {
        match op {
            ComparisonOp::Eq => {
                self.raise(bound);
                self.lower(bound);
            }
            ComparisonOp::Ge => self.raise(bound),
            ComparisonOp::Gt => self.raise(bound + step),
            ComparisonOp::Le => self.lower(bound),
            ComparisonOp::Lt => self.lower(bound - step),
            ComparisonOp::NotEq => {}
        }
    }

    fn is_open(&self) -> bool {
        self.low.is_none() && self.high.is_none()
    }

    /// Fill a missing side relative to `now`; a contradiction collapses to `low`.
    fn close(self, now: NaiveDateTime) -> (NaiveDateTime, NaiveDateTime) {
        match (self.low, self.high) {
            (Some(low), Some(high)) if low <= high => (low, high),
            (Some(low), Some(_)) => (low, low),
            (Some(low), None) if low <= now => (low, now),
            (Some(low), None) => (low, low + TimeDelta::days(30)),
            (None, Some(high)) => (high - TimeDelta::days(365), high),
            (None, None) => (now - TimeDelta::days(365), now),
        }
    }
}

fn end_of_day(day: NaiveDate) -> NaiveDateTime {
    day.and_hms_opt(23, 59, 59)
        .unwrap_or_else(|| day.and_time(NaiveTime::MIN))
}

fn ceil_day(value: NaiveDateTime) -> NaiveDate {
    if value.time() == NaiveTime::MIN {
        value.date()
    } else {
        value.date() + TimeDelta::days(1)
    }
}

#[derive(Debug, Clone, Copy)]
struct Bound {
    value: f64,
    inclusive: bool,
}

fn solve_numeric(
    column: &ColumnSchema,
    constraints: &ColumnConstraints<'_>,
    rng: &mut ChaCha8Rng,
) -> Option<GeneratedValue> {
    let mut low: Option<Bound> = None;
    let mut high: Option<Bound> = None;
    let mut raise = |bound: Bound| {
        if low.is_none_or(|current| bound.value > current.value) {
            low = Some(bound);
        }
    };
    let mut lower = |bound: Bound| {
        if high.is_none_or(|current| bound.value < current.value) {
            high = Some(bound);
        }
    };

    for item in &constraints.values {
        let Some(number) = numeric_literal(&item.value) else {
            continue;
        };
        match item.operator {
            ComparisonOp::Ge => raise(Bound { value: number, inclusive: true }),
            ComparisonOp::Gt => raise(Bound { value: number, inclusive: false }),
            ComparisonOp::Le => lower(Bound { value: number, inclusive: true }),
            ComparisonOp::Lt => lower(Bound { value: number, inclusive: false }),
            ComparisonOp::Eq | ComparisonOp::NotEq => {}
        }
    }
    for item in &constraints.betweens {
        if item.negated || item.value_type != RangeType::Numeric {
            continue;
        }
        if let (Ok(from), Ok(to)) = (item.low.trim().parse::<f64>(), item.high.trim().parse::<f64>()) {
            raise(Bound { value: from, inclusive: true });
            lower(Bound { value: to, inclusive: true });
        }
    }

    if low.is_none() && high.is_none() {
        return None;
    }

    let scale = match column.data_type {
        DataType::Integer | DataType::Boolean => 0,
        _ => column.numeric_scale.unwrap_or(2).min(6),
    };
    let factor = 10_f64.powi(scale as i32);
    let first = low.map(|bound| {
        let scaled = bound.value * factor;
        let edge = (scaled - 1e-9).ceil();
        if !bound.inclusive && (edge - scaled).abs() < 1e-9 {
            edge as i64 + 1
        } else {
            edge as i64
        }
    });
    let last = high.map(|bound| {
        let scaled = bound.value * factor;
        let edge = (scaled + 1e-9).floor();
        if !bound.inclusive && (edge - scaled).abs() < 1e-9 {
            edge as i64 - 1
        } else {
            edge as i64
        }
    });
    let span = (1_000.0 * factor) as i64;
    let (steps_from, steps_to) = match (first, last) {
        (Some(first), Some(last)) => (first, last),
        (Some(first), None) => (first, first.saturating_add(span)),
        (None, Some(last)) if last > factor as i64 => ((last - span).max(factor as i64), last),
        (None, Some(last)) => (last.saturating_sub(span), last),
        (None, None) => return None,
    };
    let steps = if steps_to >= steps_from {
        rng.random_range(steps_from..=steps_to)
    } else {
        steps_from
    };

    Some(if scale == 0 && column.data_type != DataType::Float {
        GeneratedValue::Int(steps)
    } else {
        GeneratedValue::Float(steps as f64 / factor)
    })
}

fn numeric_literal(literal: &SqlLiteral) -> Option<f64> {
    match literal {
        SqlLiteral::Number(_) => literal.as_f64(),
        SqlLiteral::Text(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Text built around the fixed parts of the positive LIKE patterns.
fn compose_like(
    table: &str,
    column: &ColumnSchema,
    constraints: &ColumnConstraints<'_>,
    rng: &mut ChaCha8Rng,
) -> Option<String> {
    let likes: Vec<_> = constraints.likes.iter().filter(|item| !item.negated).collect();
    if likes.is_empty() {
        return None;
    }
    if let Some(exact) = likes.iter().find(|item| item.kind == LikeKind::Exact) {
        return Some(exact.literal.clone());
    }
    let kind = semantic_kind(table, &column.name);
    if let Some(pattern) = likes.iter().find(|item| item.kind == LikeKind::Pattern) {
        return Some(fill_pattern(&pattern.pattern, kind, rng));
    }

    let longest = |wanted: LikeKind| {
        likes
            .iter()
            .filter(|item| item.kind == wanted && !item.literal.is_empty())
            .map(|item| item.literal.as_str())
            .max_by_key(|literal| literal.len())
    };
    let start = longest(LikeKind::StartsWith);
    let end = longest(LikeKind::EndsWith);
    let contains: Vec<&str> = likes
        .iter()
        .filter(|item| item.kind == LikeKind::Contains && !item.literal.is_empty())
        .map(|item| item.literal.as_str())
        .filter(|literal| !start.is_some_and(|s| s.contains(literal)))
        .filter(|literal| !end.is_some_and(|e| e.contains(literal)))
        .collect();

    let mut text = String::new();
    if let Some(start) = start {
        text.push_str(start);
    }
    for part in &contains {
        join_word(&mut text, part);
    }
    let minimal = {
        let mut minimal = text.clone();
        if let Some(end) = end {
            minimal.push_str(end);
        }
        minimal
    };

    match end {
        Some(end) if end.starts_with('@') || end.starts_with('.') => {
            if text.is_empty() {
                text = companion_text(SemanticKind::Username, rng);
            }
            text = text.replace(' ', ".");
            text.push_str(end);
        }
        Some(end) => {
            if text.is_empty() {
                text = companion_text(kind, rng);
            }
            join_word(&mut text, end);
        }
        None => {
            let filler = companion_text(kind, rng);
            join_word(&mut text, &filler);
        }
    }

    match column.max_length {
        Some(max) if text.chars().count() > max as usize => {
            Some(truncate_chars(&minimal, Some(max)))
        }
        _ => Some(text),
    }
}

fn join_word(text: &mut String, word: &str) {
    let glue = text
        .chars()
        .last()
        .is_some_and(|last| last.is_alphanumeric())
        && word.chars().next().is_some_and(|first| first.is_alphanumeric());
    if glue {
        text.push(' ');
    }
    text.push_str(word);
}

/// Replace `_` with a letter and inner `%` with a word.
fn fill_pattern(pattern: &str, kind: SemanticKind, rng: &mut ChaCha8Rng) -> String {
    let tokens = tokenize(pattern);
    let last_fixed = tokens.iter().rposition(|token| *token != LikeToken::Any);
    let mut text = String::new();
    for (idx, token) in tokens.iter().enumerate() {
        match token {
            LikeToken::Char(ch) => text.push(*ch),
            LikeToken::One => text.push(char::from(b'a' + rng.random_range(0..26u8))),
            LikeToken::Any => {
                let inner = !text.is_empty() && last_fixed.is_some_and(|last| idx < last);
                if inner {
                    text.push_str(&companion_text(kind, rng).replace(' ', ""));
                }
            }
        }
    }
    text
}

fn boolean_value(column: &ColumnSchema, flag: bool, literal: &str) -> GeneratedValue {
    match column.data_type {
        DataType::Integer | DataType::Decimal | DataType::Float => {
            GeneratedValue::Int(i64::from(flag))
        }
        DataType::String | DataType::Other => GeneratedValue::Text(boolean_spelling(flag, literal)),
        _ => GeneratedValue::Bool(flag),
    }
}

/// Spell `flag` in the same family as the query literal (`1`/`0` or `TRUE`/`FALSE`).
fn boolean_spelling(flag: bool, literal: &str) -> String {
    let literal = literal.trim();
    let numeric = literal.chars().all(|ch| ch.is_ascii_digit()) && !literal.is_empty();
    let word = match (numeric, flag) {
        (true, true) => "1",
        (true, false) => "0",
        (false, true) => "TRUE",
        (false, false) => "FALSE",
    };
    if !numeric && literal.chars().any(|ch| ch.is_ascii_lowercase()) {
        word.to_ascii_lowercase()
    } else {
        word.to_string()
    }
}

/// Convert literal text to the column's value type.
pub fn coerce(column: &ColumnSchema, text: &str) -> GeneratedValue {
    let trimmed = text.trim();
    let parsed = match column.data_type {
        DataType::Integer => trimmed
            .parse::<i64>()
            .ok()
            .or_else(|| trimmed.parse::<f64>().ok().map(|value| value.round() as i64))
            .map(GeneratedValue::Int),
        DataType::Decimal | DataType::Float => {
            trimmed.parse::<f64>().ok().map(GeneratedValue::Float)
        }
        DataType::Boolean => GeneratedValue::Text(trimmed.to_string())
            .as_bool()
            .map(GeneratedValue::Bool),
        DataType::Date => parse_datetime(trimmed).map(|value| GeneratedValue::Date(value.date())),
        DataType::DateTime => parse_datetime(trimmed).map(GeneratedValue::Timestamp),
        DataType::Time => NaiveTime::parse_from_str(trimmed, "%H:%M:%S")
            .ok()
            .map(GeneratedValue::Time),
        DataType::Uuid => Some(GeneratedValue::Uuid(trimmed.to_string())),
        DataType::String | DataType::Other | DataType::Binary => None,
    };
    parsed.unwrap_or_else(|| GeneratedValue::Text(text.to_string()))
}

#[cfg(test)]
mod tests {
    use queryseed_core::TableSchema;
    use queryseed_query::{ConstraintSet, extract_all_constraints, like_matches};
    use rand::SeedableRng;

    use super::*;
    use crate::scope::TableConstraints;
    use crate::validate::RowValidator;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 6, 15)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn table() -> TableSchema {
        TableSchema::new("companies")
            .with_column(ColumnSchema::new("id", DataType::Integer).primary_key())
            .with_column(ColumnSchema::new("name", DataType::String).max_length(100))
            .with_column(ColumnSchema::new("email", DataType::String))
            .with_column(ColumnSchema::new("revenue", DataType::Decimal).precision(12, 2))
            .with_column(ColumnSchema::new("employees", DataType::Integer))
            .with_column(ColumnSchema::new("tier", DataType::String))
            .with_column(ColumnSchema::new("founded_on", DataType::Date))
            .with_column(ColumnSchema::new("updated_at", DataType::DateTime))
            .with_column(ColumnSchema::new("active", DataType::Boolean))
            .with_column(ColumnSchema::new("code", DataType::String))
    }

    fn solve_all(set: &ConstraintSet, rows: u64) -> Vec<(String, GeneratedValue)> {
        let table = table();
        let scoped = TableConstraints::collect(set, &["c".to_string()], &table);
        let solver = ConstraintSolver::new(now());
        let validator = RowValidator::new(now());
        let mut out = Vec::new();
        for row in 0..rows {
            let mut rng = ChaCha8Rng::seed_from_u64(row);
            for (name, constraints) in scoped.columns() {
                let column = table.column(name).unwrap();
                let value = solver
                    .solve(&table.name, column, constraints, row, &mut rng)
                    .unwrap();
                let violations = validator.check_column(name, &value, constraints);
                assert!(violations.is_empty(), "{name}: {violations:?}");
                out.push((name.to_string(), value));
            }
        }
        out
    }

    #[test]
    fn satisfies_mixed_filters() {
        let set = extract_all_constraints(
            "SELECT * FROM companies c WHERE c.name LIKE '%VNEXT%' AND c.revenue BETWEEN 100 AND 500 \
             AND c.employees > 10 AND c.employees <= 20 AND c.tier IN ('gold', 'silver') \
             AND c.active = TRUE AND YEAR(c.founded_on) = 2023 \
             AND c.updated_at >= DATE_SUB(NOW(), INTERVAL 30 DAY) AND c.email LIKE '%@example.com'",
        );
        let values = solve_all(&set, 6);
        let names: Vec<&GeneratedValue> = values
            .iter()
            .filter(|(name, _)| name == "name")
            .map(|(_, value)| value)
            .collect();
        assert!(names.iter().all(|value| value.to_text().starts_with("VNEXT ")));
    }

    #[test]
    fn rotates_in_members_by_row() {
        let set = extract_all_constraints("SELECT * FROM companies c WHERE c.tier IN ('gold', 'silver')");
        let tiers: Vec<String> = solve_all(&set, 4)
            .into_iter()
            .map(|(_, value)| value.to_text())
            .collect();
        assert_eq!(tiers, vec!["gold", "silver", "gold", "silver"]);
    }

    #[test]
    fn fills_inner_wildcards() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let text = fill_pattern("A_C%Z", SemanticKind::Word, &mut rng);
        assert!(like_matches("A_C%Z", &text), "{text}");
    }

    #[test]
    fn exclusive_integer_bounds_stay_inside() {
        let set = extract_all_constraints("SELECT * FROM companies c WHERE c.employees > 4 AND c.employees < 6");
        let values = solve_all(&set, 3);
        assert!(values.iter().all(|(_, value)| *value == GeneratedValue::Int(5)));
    }

    #[test]
    fn negated_flags_on_text_columns_keep_the_query_spelling() {
        for (filter, expected) in [
            ("c.code != 1", "0"),
            ("c.code <> 0", "1"),
            ("c.code != TRUE", "FALSE"),
            ("c.code <> FALSE", "TRUE"),
        ] {
            let set = extract_all_constraints(&format!("SELECT * FROM companies c WHERE {filter}"));
            let values = solve_all(&set, 2);
            assert!(
                values.iter().all(|(_, value)| value.to_text() == expected),
                "{filter}: {values:?}"
            );
        }
    }

    #[test]
    fn datetime_between_dates_stops_at_midnight_of_the_upper_day() {
        let set = extract_all_constraints(
            "SELECT * FROM companies c WHERE c.updated_at BETWEEN '2024-06-01' AND '2024-06-02'",
        );
        let low = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        let high = NaiveDate::from_ymd_opt(2024, 6, 2)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();

        let values = solve_all(&set, 20);
        assert_eq!(values.len(), 20);
        for (_, value) in values {
            let at = value.as_datetime().unwrap();
            assert!(low <= at && at <= high, "{at}");
        }
    }
}
