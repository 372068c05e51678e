use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{debug, trace};

use crate::clauses::{ClauseKind, split_clauses, split_on_body, split_tagged_conditions};
use crate::lexer::{self, MaskedSql, split_top_level_commas};
use crate::like::classify_like;
use crate::model::{
    BetweenConstraint, BooleanConstraint, ComparisonOp, ConstraintSet, ConstraintSource,
    DateConstraint, DateConstraintKind, DateTag, ExistsConstraint, InConstraint, InValues,
    Interval, IntervalDirection, IntervalUnit, JoinCondition, JoinConditionSource, JoinTarget,
    LikeConstraint, NullConstraint, OrBranch, RangeType, SqlLiteral, ValueConstraint,
};

const IDENT: &str = r"[A-Za-z_][\w$#]*";
const NOW_FN: &str = r"(?:NOW\s*\(\s*\)|CURDATE\s*\(\s*\)|CURRENT_DATE(?:\s*\(\s*\))?|CURRENT_TIMESTAMP(?:\s*\(\s*\))?|SYSDATE(?:\s*\(\s*\))?|SYSTIMESTAMP|LOCALTIMESTAMP(?:\s*\(\s*\))?|GETDATE\s*\(\s*\))";
const UNIT: &str = r"(?:SECOND|MINUTE|HOUR|DAY|WEEK|MONTH|QUARTER|YEAR)S?";

static COLUMN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"^(?:({IDENT})\.)?({IDENT})$")).unwrap());
static EXISTS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^(NOT\s+)?EXISTS\s*\(\s*@(\d+)\s*\)$").unwrap());
static IS_NULL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?is)^(?:({IDENT})\.)?({IDENT})\s+IS\s+(NOT\s+)?NULL$")).unwrap()
});
static IS_BOOL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^(?:({IDENT})\.)?({IDENT})\s+IS\s+(NOT\s+)?(TRUE|FALSE)$"
    ))
    .unwrap()
});
static LIKE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^(?:({IDENT})\.)?({IDENT})\s+(NOT\s+)?LIKE\s+'(\d+)'(?:\s+ESCAPE\s+'\d+')?$"
    ))
    .unwrap()
});
static BETWEEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^(?:({IDENT})\.)?({IDENT})\s+(NOT\s+)?BETWEEN\s+(.+?)\s+AND\s+(.+)$"
    ))
    .unwrap()
});
static IN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^(?:({IDENT})\.)?({IDENT})\s+(NOT\s+)?IN\s*\((.*)\)$"
    ))
    .unwrap()
});
static YEAR_FN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^(?:YEAR\s*\(|EXTRACT\s*\(\s*YEAR\s+FROM\s+)\s*(?:({IDENT})\.)?({IDENT})\s*\)$"
    ))
    .unwrap()
});
static DATE_FN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^(DATE_ADD|DATE_SUB|ADDDATE|SUBDATE)\s*\(\s*{NOW_FN}\s*,\s*INTERVAL\s+(-?\d+|'\d+')\s+({UNIT})\s*\)$"
    ))
    .unwrap()
});
static NOW_INTERVAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^{NOW_FN}\s*([+-])\s*INTERVAL\s+(\d+|'\d+')\s+({UNIT})$"
    ))
    .unwrap()
});
static NOW_DAYS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"(?is)^{NOW_FN}\s*([+-])\s*(\d+)$")).unwrap());
static ADD_MONTHS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^ADD_MONTHS\s*\(\s*{NOW_FN}\s*,\s*(-?\d+)\s*\)$"
    ))
    .unwrap()
});
static NOW_ONLY_RE: Lazy<Regex> = Lazy::new(|| Regex::new(&format!(r"(?is)^{NOW_FN}$")).unwrap());
static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^-?\d+(?:\.\d+)?(?:[eE][+-]?\d+)?$").unwrap());
static TYPED_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^(?:DATE|TIMESTAMP)\s*'(\d+)'$").unwrap());
static TO_DATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)^TO_(?:DATE|TIMESTAMP)\s*\(\s*'(\d+)'\s*(?:,\s*'\d+'\s*)?\)$").unwrap()
});
static DATE_SHAPE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}(?:[ T]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?)?$").unwrap()
});

const RESERVED: &[&str] = &[
    "TRUE",
    "FALSE",
    "NULL",
    "NOT",
    "AND",
    "OR",
    "CURRENT_DATE",
    "CURRENT_TIMESTAMP",
    "SYSDATE",
    "SYSTIMESTAMP",
    "LOCALTIMESTAMP",
];

/// Extract every recognizable constraint from a `SELECT` statement.
///
/// Never fails: empty or malformed SQL yields an empty set.
pub fn extract_all_constraints(sql: &str) -> ConstraintSet {
    let masked = lexer::mask(sql);
    let mut set = ConstraintSet::default();
    let mut groups = 0;

    for clause in split_clauses(&masked.text) {
        match clause.kind {
            ClauseKind::Where => collect_filters(
                &masked,
                clause.body,
                ConstraintSource::Where,
                &mut groups,
                &mut set,
            ),
            ClauseKind::Having => collect_filters(
                &masked,
                clause.body,
                ConstraintSource::Having,
                &mut groups,
                &mut set,
            ),
            ClauseKind::On => collect_join_on(&masked, clause.body, &mut groups, &mut set),
            _ => {}
        }
    }

    debug!(constraints = set.len(), "extracted constraints");
    set
}

/// Parsed shape of a single condition.
enum Condition {
    Value(ValueConstraint),
    Boolean(BooleanConstraint),
    Like(LikeConstraint),
    Between(BetweenConstraint),
    In(InConstraint),
    Null(NullConstraint),
    Exists(ExistsConstraint),
    Date(DateConstraint),
    Columns {
        left: ColumnRef,
        operator: ComparisonOp,
        right: ColumnRef,
    },
}

#[derive(Debug, Clone)]
struct ColumnRef {
    alias: String,
    column: String,
}

impl Condition {
    fn owner(&self) -> (&str, &str) {
        match self {
            Condition::Value(c) => (&c.alias, &c.column),
            Condition::Boolean(c) => (&c.alias, &c.column),
            Condition::Like(c) => (&c.alias, &c.column),
            Condition::Between(c) => (&c.alias, &c.column),
            Condition::In(c) => (&c.alias, &c.column),
            Condition::Null(c) => (&c.alias, &c.column),
            Condition::Exists(c) => (&c.alias, &c.column),
            Condition::Date(c) => (&c.alias, &c.column),
            Condition::Columns { left, .. } => (&left.alias, &left.column),
        }
    }

    fn in_branch(mut self, tag: Option<OrBranch>) -> Self {
        match &mut self {
            Condition::Value(c) => c.branch = tag,
            Condition::Boolean(c) => c.branch = tag,
            Condition::Like(c) => c.branch = tag,
            Condition::Between(c) => c.branch = tag,
            Condition::In(c) => c.branch = tag,
            Condition::Null(c) => c.branch = tag,
            Condition::Exists(c) => c.branch = tag,
            Condition::Date(c) => c.branch = tag,
            Condition::Columns { .. } => {}
        }
        self
    }

    fn push_into(self, set: &mut ConstraintSet) {
        match self {
            Condition::Value(c) => set.values.push(c),
            Condition::Boolean(c) => set.booleans.push(c),
            Condition::Like(c) => set.likes.push(c),
            Condition::Between(c) => set.betweens.push(c),
            Condition::In(c) => set.ins.push(c),
            Condition::Null(c) => set.nulls.push(c),
            Condition::Exists(c) => set.exists.push(c),
            Condition::Date(c) => set.dates.push(c),
            Condition::Columns { .. } => {}
        }
    }
}

fn collect_filters(
    masked: &MaskedSql,
    body: &str,
    source: ConstraintSource,
    groups: &mut u32,
    set: &mut ConstraintSet,
) {
    for part in split_tagged_conditions(body, groups) {
        let text = part.text;
        match classify(masked, text, source).map(|condition| condition.in_branch(part.branch)) {
            Some(Condition::Columns {
                left,
                operator,
                right,
            }) => set.joins.push(JoinCondition {
                alias: left.alias,
                column: left.column,
                operator: Some(operator),
                target: JoinTarget::Column {
                    alias: right.alias,
                    column: right.column,
                },
                source: JoinConditionSource::WhereJoin,
            }),
            Some(condition) => condition.push_into(set),
            None => trace!(condition = %masked.restore(text), "condition not recognized"),
        }
    }
}

fn collect_join_on(masked: &MaskedSql, body: &str, groups: &mut u32, set: &mut ConstraintSet) {
    let mut key_seen = false;
    let (body, _) = split_on_body(body);

    for part in split_tagged_conditions(body, groups) {
        let text = part.text;
        let Some(condition) = classify(masked, text, ConstraintSource::JoinOn)
            .map(|condition| condition.in_branch(part.branch))
        else {
            trace!(condition = %masked.restore(text), "join condition not recognized");
            continue;
        };

        match condition {
            Condition::Columns {
                left,
                operator,
                right,
            } => {
                let source = if !key_seen && operator == ComparisonOp::Eq {
                    key_seen = true;
                    JoinConditionSource::JoinKey
                } else {
                    JoinConditionSource::JoinFilter
                };
                set.joins.push(JoinCondition {
                    alias: left.alias,
                    column: left.column,
                    operator: Some(operator),
                    target: JoinTarget::Column {
                        alias: right.alias,
                        column: right.column,
                    },
                    source,
                });
            }
            other => {
                let (alias, column) = other.owner();
                let (operator, target) = match &other {
                    Condition::Value(value) => (
                        Some(value.operator),
                        JoinTarget::Literal {
                            value: value.value.clone(),
                        },
                    ),
                    Condition::Boolean(flag) => (
                        Some(ComparisonOp::Eq),
                        JoinTarget::Literal {
                            value: SqlLiteral::Boolean(flag.value),
                        },
                    ),
                    _ => (
                        None,
                        JoinTarget::Expression {
                            text: masked.restore(text),
                        },
                    ),
                };
                set.joins.push(JoinCondition {
                    alias: alias.to_string(),
                    column: column.to_string(),
                    operator,
                    target,
                    source: JoinConditionSource::JoinFilter,
                });
                other.push_into(set);
            }
        }
    }
}

fn classify(masked: &MaskedSql, text: &str, source: ConstraintSource) -> Option<Condition> {
    if let Some(caps) = EXISTS_RE.captures(text) {
        let subquery = masked.subquery(&format!("@{}", &caps[2]))?.to_string();
        return Some(Condition::Exists(ExistsConstraint {
            alias: String::new(),
            column: String::new(),
            negated: caps.get(1).is_some(),
            subquery,
            source,
            branch: None,
        }));
    }

    if let Some(caps) = IS_NULL_RE.captures(text) {
        let column = column_from(&caps, 1, 2)?;
        return Some(Condition::Null(NullConstraint {
            alias: column.alias,
            column: column.column,
            is_null: caps.get(3).is_none(),
            source,
            branch: None,
        }));
    }

    if let Some(caps) = IS_BOOL_RE.captures(text) {
        let column = column_from(&caps, 1, 2)?;
        let literal = caps[4].to_ascii_uppercase();
        let value = (literal == "TRUE") != caps.get(3).is_some();
        return Some(Condition::Boolean(BooleanConstraint {
            alias: column.alias,
            column: column.column,
            value,
            literal,
            source,
            branch: None,
        }));
    }

    if let Some(caps) = LIKE_RE.captures(text) {
        let column = column_from(&caps, 1, 2)?;
        let pattern = masked.literal(&format!("'{}'", &caps[4]))?.to_string();
        let (kind, literal) = classify_like(&pattern);
        return Some(Condition::Like(LikeConstraint {
            alias: column.alias,
            column: column.column,
            pattern,
            kind,
            literal,
            negated: caps.get(3).is_some(),
            source,
            branch: None,
        }));
    }

    if let Some(caps) = BETWEEN_RE.captures(text) {
        let column = column_from(&caps, 1, 2)?;
        let low = parse_literal(masked, &caps[4])?;
        let high = parse_literal(masked, &caps[5])?;
        return Some(Condition::Between(BetweenConstraint {
            alias: column.alias,
            column: column.column,
            value_type: range_type(&low, &high),
            low: low.text(),
            high: high.text(),
            negated: caps.get(3).is_some(),
            source,
            branch: None,
        }));
    }

    if let Some(caps) = IN_RE.captures(text) {
        let column = column_from(&caps, 1, 2)?;
        let values = parse_in_values(masked, &caps[4])?;
        return Some(Condition::In(InConstraint {
            alias: column.alias,
            column: column.column,
            values,
            negated: caps.get(3).is_some(),
            source,
            branch: None,
        }));
    }

    let (left, operator, right) = split_comparison(text)?;
    classify_comparison(masked, left, operator, right, source)
}

fn classify_comparison(
    masked: &MaskedSql,
    left: &str,
    operator: ComparisonOp,
    right: &str,
    source: ConstraintSource,
) -> Option<Condition> {
    if let Some(column) = parse_column(left) {
        if let Some(other) = parse_column(right) {
            return Some(Condition::Columns {
                left: column,
                operator,
                right: other,
            });
        }
        if let Some(interval) = parse_date_expression(masked, right) {
            return date_interval(column, operator, interval, source);
        }
        let literal = parse_literal(masked, right)?;
        return Some(value_condition(column, operator, literal, right, source));
    }

    if let Some(column) = parse_column(right) {
        let reversed = operator.reversed();
        if let Some(interval) = parse_date_expression(masked, left) {
            return date_interval(column, reversed, interval, source);
        }
        let literal = parse_literal(masked, left)?;
        return Some(value_condition(column, reversed, literal, left, source));
    }

    if let Some(caps) = YEAR_FN_RE.captures(left) {
        return year_condition(masked, column_from(&caps, 1, 2)?, operator, right, source);
    }
    if let Some(caps) = YEAR_FN_RE.captures(right) {
        let column = column_from(&caps, 1, 2)?;
        return year_condition(masked, column, operator.reversed(), left, source);
    }

    None
}

fn value_condition(
    column: ColumnRef,
    operator: ComparisonOp,
    literal: SqlLiteral,
    token: &str,
    source: ConstraintSource,
) -> Condition {
    let flag = match &literal {
        SqlLiteral::Boolean(value) => Some(*value),
        SqlLiteral::Number(value) if value == "1" => Some(true),
        SqlLiteral::Number(value) if value == "0" => Some(false),
        _ => None,
    };

    match (flag, operator) {
        (Some(value), ComparisonOp::Eq | ComparisonOp::NotEq) => {
            Condition::Boolean(BooleanConstraint {
                alias: column.alias,
                column: column.column,
                value: value == (operator == ComparisonOp::Eq),
                literal: token.trim().to_ascii_uppercase(),
                source,
                branch: None,
            })
        }
        _ => Condition::Value(ValueConstraint {
            alias: column.alias,
            column: column.column,
            operator,
            value: literal,
            source,
            branch: None,
        }),
    }
}

fn date_interval(
    column: ColumnRef,
    operator: ComparisonOp,
    interval: Interval,
    source: ConstraintSource,
) -> Option<Condition> {
    let tag = DateTag::from_op(operator)?;
    Some(Condition::Date(DateConstraint {
        alias: column.alias,
        column: column.column,
        kind: DateConstraintKind::DateInterval,
        operator,
        tag,
        value: format!("{}_{}", interval.amount, interval.unit.as_str()),
        year: None,
        interval: Some(interval),
        source,
        branch: None,
    }))
}

fn year_condition(
    masked: &MaskedSql,
    column: ColumnRef,
    operator: ComparisonOp,
    value: &str,
    source: ConstraintSource,
) -> Option<Condition> {
    if operator != ComparisonOp::Eq {
        return None;
    }
    let year: i32 = parse_literal(masked, value)?.text().trim().parse().ok()?;
    Some(Condition::Date(DateConstraint {
        alias: column.alias,
        column: column.column,
        kind: DateConstraintKind::YearEquals,
        operator,
        tag: DateTag::DateEquals,
        value: year.to_string(),
        year: Some(year),
        interval: None,
        source,
        branch: None,
    }))
}

/// Find the first top-level comparison operator.
fn split_comparison(text: &str) -> Option<(&str, ComparisonOp, &str)> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut idx = 0;

    while idx < bytes.len() {
        match bytes[idx] {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b'<' | b'>' | b'=' | b'!' if depth == 0 => {
                let width = match bytes.get(idx + 1) {
                    Some(b'=') if bytes[idx] != b'=' => 2,
                    Some(b'>') if bytes[idx] == b'<' => 2,
                    _ => 1,
                };
                let token = &text[idx..idx + width];
                let operator = ComparisonOp::parse(token)?;
                let left = text[..idx].trim();
                let right = text[idx + width..].trim();
                if left.is_empty() || right.is_empty() {
                    return None;
                }
                return Some((left, operator, right));
            }
            _ => {}
        }
        idx += 1;
    }

    None
}

fn parse_column(text: &str) -> Option<ColumnRef> {
    let caps = COLUMN_RE.captures(text.trim())?;
    column_from(&caps, 1, 2)
}

fn column_from(caps: &Captures, alias_group: usize, column_group: usize) -> Option<ColumnRef> {
    let column = caps.get(column_group)?.as_str();
    let alias = caps.get(alias_group).map(|m| m.as_str()).unwrap_or("");
    if alias.is_empty() && RESERVED.iter().any(|word| word.eq_ignore_ascii_case(column)) {
        return None;
    }
    Some(ColumnRef {
        alias: alias.to_string(),
        column: column.to_string(),
    })
}

fn parse_literal(masked: &MaskedSql, token: &str) -> Option<SqlLiteral> {
    let token = lexer::strip_outer_parens(token.trim());
    if token.starts_with('\'') {
        return masked
            .literal(token)
            .map(|value| SqlLiteral::Text(value.to_string()));
    }
    if NUMBER_RE.is_match(token) {
        return Some(SqlLiteral::Number(token.to_string()));
    }
    if let Some(caps) = TYPED_DATE_RE
        .captures(token)
        .or_else(|| TO_DATE_RE.captures(token))
    {
        let value = masked.literal(&format!("'{}'", &caps[1]))?;
        return Some(SqlLiteral::Date(value.to_string()));
    }
    match token.to_ascii_uppercase().as_str() {
        "TRUE" => Some(SqlLiteral::Boolean(true)),
        "FALSE" => Some(SqlLiteral::Boolean(false)),
        "NULL" => Some(SqlLiteral::Null),
        _ => None,
    }
}

fn range_type(low: &SqlLiteral, high: &SqlLiteral) -> RangeType {
    let is_date = |literal: &SqlLiteral| match literal {
        SqlLiteral::Date(_) => true,
        SqlLiteral::Text(value) => DATE_SHAPE_RE.is_match(value.trim()),
        _ => false,
    };
    match (low, high) {
        (SqlLiteral::Number(_), SqlLiteral::Number(_)) => RangeType::Numeric,
        _ if is_date(low) && is_date(high) => RangeType::Date,
        _ => RangeType::String,
    }
}

fn parse_in_values(masked: &MaskedSql, body: &str) -> Option<InValues> {
    let trimmed = body.trim();
    if trimmed.starts_with('@') {
        let subquery = masked.subquery(trimmed)?;
        return Some(InValues::Subquery(subquery.to_string()));
    }

    let literals: Vec<SqlLiteral> = split_top_level_commas(trimmed)
        .into_iter()
        .filter_map(|item| parse_literal(masked, item))
        .filter(|literal| *literal != SqlLiteral::Null)
        .collect();
    if literals.is_empty() {
        return None;
    }

    let numeric = literals
        .iter()
        .all(|literal| matches!(literal, SqlLiteral::Number(_)));
    let values = literals.iter().map(SqlLiteral::text).collect();
    Some(if numeric {
        InValues::Numeric(values)
    } else {
        InValues::Text(values)
    })
}

/// Recognize an expression relative to the current time.
fn parse_date_expression(masked: &MaskedSql, text: &str) -> Option<Interval> {
    let text = text.trim();

    if let Some(caps) = DATE_FN_RE.captures(text) {
        let function = caps[1].to_ascii_uppercase();
        let amount = parse_amount(masked, &caps[2])?;
        let unit = IntervalUnit::parse(&caps[3])?;
        let forward = matches!(function.as_str(), "DATE_ADD" | "ADDDATE");
        return Some(interval(amount, unit, forward));
    }

    if let Some(caps) = NOW_INTERVAL_RE.captures(text) {
        let amount = parse_amount(masked, &caps[2])?;
        let unit = IntervalUnit::parse(&caps[3])?;
        return Some(interval(amount, unit, &caps[1] == "+"));
    }

    if let Some(caps) = NOW_DAYS_RE.captures(text) {
        let amount = caps[2].parse().ok()?;
        return Some(interval(amount, IntervalUnit::Day, &caps[1] == "+"));
    }

    if let Some(caps) = ADD_MONTHS_RE.captures(text) {
        let amount = caps[1].parse().ok()?;
        return Some(interval(amount, IntervalUnit::Month, true));
    }

    if NOW_ONLY_RE.is_match(text) {
        return Some(interval(0, IntervalUnit::Day, false));
    }

    None
}

fn parse_amount(masked: &MaskedSql, token: &str) -> Option<i64> {
    let raw = if token.starts_with('\'') {
        masked.literal(token)?
    } else {
        token
    };
    raw.trim().parse().ok()
}

/// Normalize a signed offset: a negative amount flips the direction.
fn interval(amount: i64, unit: IntervalUnit, forward: bool) -> Interval {
    let forward = if amount < 0 { !forward } else { forward };
    Interval {
        amount: amount.abs(),
        unit,
        direction: if forward {
            IntervalDirection::Future
        } else {
            IntervalDirection::Past
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{InValues, LikeKind};

    #[test]
    fn empty_and_malformed_sql_yield_empty_set() {
        assert!(extract_all_constraints("").is_empty());
        assert_eq!(extract_all_constraints("SELEC * FRM WHERE (((").len(), 0);
        assert!(extract_all_constraints("SELECT * FROM users").is_empty());
    }

    #[test]
    fn extracts_comparisons_in_both_orders() {
        let set = extract_all_constraints(
            "SELECT * FROM products p WHERE p.price > 100 AND 500 >= p.price AND p.status <> 'archived'",
        );
        assert_eq!(set.values.len(), 3);
        assert_eq!(set.values[0].operator, ComparisonOp::Gt);
        assert_eq!(set.values[1].operator, ComparisonOp::Le);
        assert_eq!(set.values[1].value, SqlLiteral::Number("500".to_string()));
        assert_eq!(set.values[2].operator, ComparisonOp::NotEq);
        assert_eq!(set.values[2].value, SqlLiteral::Text("archived".to_string()));
    }

    #[test]
    fn lifts_boolean_spellings() {
        let set = extract_all_constraints(
            "SELECT * FROM u WHERE u.a = TRUE AND u.b = 1 AND u.c = FALSE AND u.d = 0 AND u.e IS NOT FALSE",
        );
        assert!(set.values.is_empty());
        let values: Vec<bool> = set.booleans.iter().map(|b| b.value).collect();
        assert_eq!(values, vec![true, true, false, false, true]);
        assert_eq!(set.booleans[1].literal, "1");
    }

    #[test]
    fn classifies_like_between_and_in() {
        let set = extract_all_constraints(
            "SELECT * FROM companies c JOIN products p ON p.company_id = c.id \
             WHERE c.name LIKE '%VNEXT%' AND c.code NOT LIKE 'X%' \
             AND p.price BETWEEN 100 AND 500 AND p.created BETWEEN '2024-01-01' AND '2024-12-31' \
             AND p.status IN ('new', 'hot') AND p.id NOT IN (1, 2, 3) \
             AND c.id IN (SELECT company_id FROM blocked WHERE reason = 'fraud')",
        );

        assert_eq!(set.likes[0].kind, LikeKind::Contains);
        assert_eq!(set.likes[0].literal, "VNEXT");
        assert!(set.likes[1].negated);
        assert_eq!(set.betweens[0].value_type, RangeType::Numeric);
        assert_eq!(set.betweens[0].low, "100");
        assert_eq!(set.betweens[1].value_type, RangeType::Date);
        assert_eq!(
            set.ins[0].values,
            InValues::Text(vec!["new".to_string(), "hot".to_string()])
        );
        assert!(set.ins[1].negated);
        assert!(matches!(set.ins[1].values, InValues::Numeric(_)));
        assert_eq!(
            set.ins[2].values,
            InValues::Subquery("SELECT company_id FROM blocked WHERE reason = 'fraud'".to_string())
        );
    }

    #[test]
    fn extracts_date_constraints() {
        let set = extract_all_constraints(
            "SELECT * FROM orders o WHERE YEAR(o.ordered_at) = 2024 \
             AND o.created_at >= DATE_SUB(NOW(), INTERVAL 30 DAYS) \
             AND DATE_ADD(CURDATE(), INTERVAL 7 DAY) >= o.due_at \
             AND o.shipped_at > SYSDATE - 14",
        );

        assert_eq!(set.dates.len(), 4);
        assert_eq!(set.dates[0].kind, DateConstraintKind::YearEquals);
        assert_eq!(set.dates[0].year, Some(2024));

        assert_eq!(set.dates[1].tag, DateTag::DateWithin);
        assert_eq!(set.dates[1].value, "30_DAY");
        assert_eq!(
            set.dates[1].interval.map(|i| i.direction),
            Some(IntervalDirection::Past)
        );

        assert_eq!(set.dates[2].operator, ComparisonOp::Le);
        assert_eq!(set.dates[2].tag, DateTag::DateCompare);
        assert_eq!(set.dates[2].value, "7_DAY");

        assert_eq!(set.dates[3].value, "14_DAY");
    }

    #[test]
    fn separates_join_keys_from_join_filters() {
        let set = extract_all_constraints(
            "SELECT * FROM users u INNER JOIN orders o ON o.user_id = u.id AND o.status = 'paid' \
             WHERE u.country = 'PT'",
        );

        assert_eq!(set.joins.len(), 2);
        assert_eq!(set.joins[0].source, JoinConditionSource::JoinKey);
        assert_eq!(set.joins[1].source, JoinConditionSource::JoinFilter);
        assert_eq!(set.values.len(), 2);
        assert_eq!(set.values[0].source, ConstraintSource::JoinOn);
        assert_eq!(set.values[1].source, ConstraintSource::Where);
    }

    #[test]
    fn ignores_commented_conditions_and_literal_keywords() {
        let set = extract_all_constraints(
            "SELECT * FROM t WHERE t.a = 'x AND t.b = 2' -- AND t.c = 3\n /* AND t.d = 4 */",
        );
        assert_eq!(set.len(), 1);
        assert_eq!(set.values[0].value, SqlLiteral::Text("x AND t.b = 2".to_string()));
    }

    #[test]
    fn filters_by_alias_and_column() {
        let set = extract_all_constraints(
            "SELECT * FROM a x JOIN b y ON x.id = y.a_id WHERE x.n = 5 AND y.m = 6 AND k IS NULL",
        );
        assert_eq!(set.for_alias("X").values.len(), 1);
        assert_eq!(set.for_alias("x").joins.len(), 1);
        assert_eq!(set.for_column("y", "m").len(), 1);
        assert_eq!(set.for_alias("").nulls.len(), 1);
    }

    #[test]
    fn tags_disjunctions_across_clauses() {
        let set = extract_all_constraints(
            "SELECT * FROM users u JOIN orders o ON o.user_id = u.id AND (o.total > 10 OR o.total IS NULL) \
             WHERE u.active = 1 AND (u.status = 'a' OR u.status = 'b')",
        );

        assert_eq!(set.booleans[0].branch, None);
        let statuses: Vec<Option<OrBranch>> = set
            .values
            .iter()
            .filter(|value| value.column == "status")
            .map(|value| value.branch)
            .collect();
        assert_eq!(
            statuses,
            vec![
                Some(OrBranch { group: 1, branch: 0 }),
                Some(OrBranch { group: 1, branch: 1 }),
            ]
        );
        assert_eq!(set.nulls[0].branch, Some(OrBranch { group: 0, branch: 1 }));
    }
}
