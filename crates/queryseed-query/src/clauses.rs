use once_cell::sync::Lazy;
use regex::Regex;

use crate::analyze::JoinType;
use crate::lexer::{depth_map, split_top_level_commas, strip_outer_parens};
use crate::model::OrBranch;

static CLAUSE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:SELECT|FROM|WHERE|HAVING|ON|GROUP\s+BY|ORDER\s+BY|LIMIT|OFFSET|FETCH|WINDOW|FOR\s+UPDATE|UNION(?:\s+ALL)?|INTERSECT|EXCEPT|MINUS|STRAIGHT_JOIN|(?:(?:INNER|CROSS|NATURAL)\s+|(?:LEFT|RIGHT|FULL)\s+(?:OUTER\s+)?)?JOIN)\b",
    )
    .unwrap()
});
static BOOL_OP_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(?:AND|OR)\b").unwrap());
static BETWEEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bBETWEEN\b").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ClauseKind {
    Select,
    From,
    Join(JoinType),
    On,
    Where,
    Having,
    SetOperation,
    Tail,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Clause<'a> {
    pub kind: ClauseKind,
    pub body: &'a str,
}

/// Split masked SQL into top-level clauses. Keywords inside parentheses
/// (`EXTRACT(YEAR FROM x)`, function arguments) do not start a clause.
pub(crate) fn split_clauses(text: &str) -> Vec<Clause<'_>> {
    let depths = depth_map(text);
    let markers: Vec<(usize, usize, ClauseKind)> = CLAUSE_RE
        .find_iter(text)
        .filter(|m| depths[m.start()] == 0)
        .filter_map(|m| clause_kind(m.as_str()).map(|kind| (m.start(), m.end(), kind)))
        .collect();

    markers
        .iter()
        .enumerate()
        .map(|(idx, (_, end, kind))| {
            let stop = markers
                .get(idx + 1)
                .map(|(start, _, _)| *start)
                .unwrap_or(text.len());
            Clause {
                kind: *kind,
                body: text[*end..stop].trim(),
            }
        })
        .collect()
}

fn clause_kind(keyword: &str) -> Option<ClauseKind> {
    let normalized = keyword
        .split_whitespace()
        .map(str::to_ascii_uppercase)
        .collect::<Vec<_>>()
        .join(" ");

    let kind = match normalized.as_str() {
        "SELECT" => ClauseKind::Select,
        "FROM" => ClauseKind::From,
        "WHERE" => ClauseKind::Where,
        "HAVING" => ClauseKind::Having,
        "ON" => ClauseKind::On,
        "UNION" | "UNION ALL" | "INTERSECT" | "EXCEPT" | "MINUS" => ClauseKind::SetOperation,
        "JOIN" | "INNER JOIN" | "STRAIGHT_JOIN" => ClauseKind::Join(JoinType::Inner),
        "LEFT JOIN" | "LEFT OUTER JOIN" => ClauseKind::Join(JoinType::Left),
        "RIGHT JOIN" | "RIGHT OUTER JOIN" => ClauseKind::Join(JoinType::Right),
        "FULL JOIN" | "FULL OUTER JOIN" => ClauseKind::Join(JoinType::Full),
        "CROSS JOIN" => ClauseKind::Join(JoinType::Cross),
        "NATURAL JOIN" => ClauseKind::Join(JoinType::Natural),
        "GROUP BY" | "ORDER BY" | "LIMIT" | "OFFSET" | "FETCH" | "WINDOW" | "FOR UPDATE" => {
            ClauseKind::Tail
        }
        _ => return None,
    };
    Some(kind)
}

/// Separate an ON body from a comma-joined table list that follows it
/// (`JOIN b ON b.a_id = a.id, c`).
pub(crate) fn split_on_body(body: &str) -> (&str, Vec<&str>) {
    let mut parts = split_top_level_commas(body).into_iter();
    let conditions = parts.next().unwrap_or("");
    (conditions, parts.collect())
}

/// One condition of a filter body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConditionText<'a> {
    pub text: &'a str,
    /// Set when the condition sits under an `OR`.
    pub branch: Option<OrBranch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoolOp {
    And,
    Or,
}

/// Split a filter body into individual conditions, dropping `OR` structure.
pub(crate) fn split_conditions(body: &str) -> Vec<&str> {
    let mut groups = 0;
    split_tagged_conditions(body, &mut groups)
        .into_iter()
        .map(|condition| condition.text)
        .collect()
}

/// Split a filter body into individual conditions.
///
/// `AND` binds tighter than `OR`, the `AND` of a `BETWEEN` is kept and
/// parenthesized groups are flattened. Each operand of a top-level `OR`
/// becomes a branch of a new disjunction numbered from `next_group`.
/// A disjunction nested inside a branch is folded into that branch.
pub(crate) fn split_tagged_conditions<'a>(
    body: &'a str,
    next_group: &mut u32,
) -> Vec<ConditionText<'a>> {
    let mut out = Vec::new();
    collect_conditions(body, None, next_group, &mut out);
    out
}

fn collect_conditions<'a>(
    body: &'a str,
    branch: Option<OrBranch>,
    next_group: &mut u32,
    out: &mut Vec<ConditionText<'a>>,
) {
    let trimmed = body.trim();

    let disjuncts = split_top_level(trimmed, BoolOp::Or);
    if disjuncts.len() > 1 {
        let group = if branch.is_none() {
            *next_group += 1;
            Some(*next_group - 1)
        } else {
            None
        };
        for (index, part) in disjuncts.into_iter().enumerate() {
            let tag = branch.or(group.map(|group| OrBranch {
                group,
                branch: index as u32,
            }));
            collect_conditions(part, tag, next_group, out);
        }
        return;
    }

    let conjuncts = split_top_level(trimmed, BoolOp::And);
    if conjuncts.len() > 1 {
        for part in conjuncts {
            collect_conditions(part, branch, next_group, out);
        }
        return;
    }

    let inner = strip_outer_parens(trimmed);
    let compound = split_top_level(inner, BoolOp::Or).len() > 1
        || split_top_level(inner, BoolOp::And).len() > 1;
    if inner.len() < trimmed.len() && compound {
        collect_conditions(inner, branch, next_group, out);
    } else if !inner.is_empty() {
        out.push(ConditionText { text: inner, branch });
    }
}

fn split_top_level(body: &str, op: BoolOp) -> Vec<&str> {
    let depths = depth_map(body);
    let keyword = match op {
        BoolOp::And => "AND",
        BoolOp::Or => "OR",
    };
    let mut parts = Vec::new();
    let mut start = 0;
    let mut between_and_used = false;

    for m in BOOL_OP_RE.find_iter(body) {
        if depths[m.start()] > 0 || !m.as_str().eq_ignore_ascii_case(keyword) {
            continue;
        }
        if op == BoolOp::And {
            let segment = &body[start..m.start()];
            let open_between = BETWEEN_RE
                .find_iter(segment)
                .any(|b| depths[start + b.start()] == 0);
            if open_between && !between_and_used {
                between_and_used = true;
                continue;
            }
        }
        parts.push(body[start..m.start()].trim());
        start = m.end();
        between_and_used = false;
    }

    parts.push(body[start..].trim());
    parts.retain(|part| !part.is_empty());
    parts
}
