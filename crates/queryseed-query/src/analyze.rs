use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clauses::{ClauseKind, split_clauses, split_conditions, split_on_body};
use crate::extract::extract_all_constraints;
use crate::lexer::{self, MaskedSql, split_top_level_commas};

const IDENT: &str = r"[A-Za-z_][\w$#]*";

static TABLE_ITEM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^(?:({IDENT})\.)?({IDENT})(?:\s+(?:AS\s+)?({IDENT}))?(?:\s+(?:USE|FORCE|IGNORE)\s+(?:INDEX|KEY)\s*\(.*\))?$"
    ))
    .unwrap()
});
static DERIVED_ITEM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?is)^\(\s*@\d+\s*\)(?:\s+(?:AS\s+)?({IDENT}))?$")).unwrap()
});
static USING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)^(.*?)\s+USING\s*\((.*)\)$").unwrap());
static COLUMN_EQ_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?is)^(?:({IDENT})\.)?({IDENT})\s*=\s*(?:({IDENT})\.)?({IDENT})$"
    ))
    .unwrap()
});
static QUALIFIED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!(r"\b({IDENT})\.({IDENT}|\*)")).unwrap());
static BARE_PROJECTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?is)^(?:DISTINCT\s+)?({IDENT})(?:\s+(?:AS\s+)?{IDENT})?$")).unwrap()
});

const NOT_AN_ALIAS: &[&str] = &[
    "WHERE", "ON", "USING", "JOIN", "INNER", "LEFT", "RIGHT", "FULL", "CROSS", "NATURAL",
    "GROUP", "ORDER", "HAVING", "LIMIT", "UNION", "USE", "FORCE", "IGNORE",
];
const NOT_A_COLUMN: &[&str] = &[
    "NULL",
    "TRUE",
    "FALSE",
    "DISTINCT",
    "CURRENT_DATE",
    "CURRENT_TIMESTAMP",
    "SYSDATE",
    "SYSTIMESTAMP",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JoinType {
    Inner,
    Left,
    Right,
    Full,
    Cross,
    Natural,
    /// Comma-separated FROM list joined through WHERE.
    Implicit,
}

/// One occurrence of a table in the query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TableReference {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// `None` for the first table of a FROM list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_type: Option<JoinType>,
    /// Found inside an IN/EXISTS subquery or a derived table.
    #[serde(default)]
    pub from_subquery: bool,
}

/// Column equality that links two tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JoinRequirement {
    pub join_type: JoinType,
    pub left_table: String,
    pub left_column: String,
    pub right_table: String,
    pub right_column: String,
}

/// Tables, aliases and column needs of a `SELECT`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QueryAnalysis {
    pub tables: Vec<TableReference>,
    /// Lowercased alias or table name to table name.
    pub aliases: BTreeMap<String, String>,
    /// Table name to referenced columns, first spelling kept.
    pub columns: BTreeMap<String, Vec<String>>,
    /// Tables projected with `*` or `alias.*`.
    pub wildcard_tables: Vec<String>,
    /// Unqualified columns in a multi-table query.
    pub unresolved_columns: Vec<String>,
    pub joins: Vec<JoinRequirement>,
}

impl QueryAnalysis {
    /// Distinct table names in discovery order, subquery tables included.
    pub fn required_tables(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for table in &self.tables {
            if !names.iter().any(|name| name.eq_ignore_ascii_case(&table.name)) {
                names.push(table.name.clone());
            }
        }
        names
    }

    /// Table behind an alias or a table name, case-insensitive.
    pub fn resolve_alias(&self, alias: &str) -> Option<&str> {
        self.aliases
            .get(&alias.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Every alias (and the bare name) that refers to `table`.
    pub fn aliases_for(&self, table: &str) -> Vec<String> {
        self.aliases
            .iter()
            .filter(|(_, name)| name.eq_ignore_ascii_case(table))
            .map(|(alias, _)| alias.clone())
            .collect()
    }

    pub fn columns_for(&self, table: &str) -> &[String] {
        self.columns
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(table))
            .map(|(_, columns)| columns.as_slice())
            .unwrap_or(&[])
    }

    pub fn is_wildcard(&self, table: &str) -> bool {
        self.wildcard_tables
            .iter()
            .any(|name| name.eq_ignore_ascii_case(table))
    }

    fn add_column(&mut self, table: &str, column: &str) {
        let entry = self.columns.entry(table.to_string()).or_default();
        if !entry.iter().any(|existing| existing.eq_ignore_ascii_case(column)) {
            entry.push(column.to_string());
        }
    }

    fn add_alias(&mut self, alias: &str, table: &str) {
        self.aliases
            .entry(alias.to_ascii_lowercase())
            .or_insert_with(|| table.to_string());
    }
}

/// Base table names referenced by `FROM` and `JOIN`, de-duplicated.
pub fn extract_tables_from_query(sql: &str) -> Vec<String> {
    analyze_query(sql).required_tables()
}

/// Full structural analysis of a `SELECT`.
pub fn analyze_query(sql: &str) -> QueryAnalysis {
    let masked = lexer::mask(sql);
    let mut analysis = QueryAnalysis::default();

    let outer_tables = collect_references(&masked, false, &mut analysis);
    collect_columns(&masked, sql, &outer_tables, &mut analysis);

    debug!(
        tables = analysis.tables.len(),
        joins = analysis.joins.len(),
        "analyzed query"
    );
    analysis
}

/// Record table references and join requirements; returns the names of
/// tables in the top level of `masked`.
fn collect_references(
    masked: &MaskedSql,
    from_subquery: bool,
    analysis: &mut QueryAnalysis,
) -> Vec<String> {
    let mut local: Vec<String> = Vec::new();
    let mut current_join: Option<JoinType> = None;

    for clause in split_clauses(&masked.text) {
        match clause.kind {
            ClauseKind::From => {
                for (idx, item) in split_top_level_commas(clause.body).into_iter().enumerate() {
                    let join_type = (idx > 0).then_some(JoinType::Implicit);
                    add_table_item(item, join_type, from_subquery, &mut local, analysis);
                }
            }
            ClauseKind::Join(join_type) => {
                current_join = Some(join_type);
                let (item, using) = match USING_RE.captures(clause.body) {
                    Some(caps) => (
                        caps.get(1).map_or("", |m| m.as_str()),
                        caps.get(2).map(|m| m.as_str().to_string()),
                    ),
                    None => (clause.body, None),
                };
                let previous = local.last().cloned();
                let joined = add_table_item(
                    item,
                    Some(join_type),
                    from_subquery,
                    &mut local,
                    analysis,
                );
                if let (Some(columns), Some(left), Some(right)) = (using, previous, joined) {
                    for column in split_top_level_commas(&columns) {
                        analysis.joins.push(JoinRequirement {
                            join_type,
                            left_table: left.clone(),
                            left_column: column.to_string(),
                            right_table: right.clone(),
                            right_column: column.to_string(),
                        });
                    }
                }
            }
            ClauseKind::On => {
                let join_type = current_join.unwrap_or(JoinType::Inner);
                let (conditions, trailing_tables) = split_on_body(clause.body);
                collect_join_requirements(conditions, join_type, analysis);
                for item in trailing_tables {
                    add_table_item(
                        item,
                        Some(JoinType::Implicit),
                        from_subquery,
                        &mut local,
                        analysis,
                    );
                }
            }
            ClauseKind::Where => {
                collect_join_requirements(clause.body, JoinType::Implicit, analysis);
            }
            _ => {}
        }
    }

    for body in &masked.subqueries {
        let nested = lexer::mask(body);
        collect_references(&nested, true, analysis);
    }

    local
}

fn add_table_item(
    item: &str,
    join_type: Option<JoinType>,
    from_subquery: bool,
    local: &mut Vec<String>,
    analysis: &mut QueryAnalysis,
) -> Option<String> {
    let item = item.trim();
    if DERIVED_ITEM_RE.is_match(item) {
        return None;
    }
    let Some(caps) = TABLE_ITEM_RE.captures(item) else {
        debug!(item, "table reference not recognized");
        return None;
    };

    let name = caps.get(2)?.as_str().to_string();
    let schema = caps.get(1).map(|m| m.as_str().to_string());
    let alias = caps
        .get(3)
        .map(|m| m.as_str())
        .filter(|alias| !NOT_AN_ALIAS.iter().any(|kw| kw.eq_ignore_ascii_case(alias)))
        .map(str::to_string);

    analysis.add_alias(&name, &name);
    if let Some(alias) = &alias {
        analysis.add_alias(alias, &name);
    }
    analysis.tables.push(TableReference {
        name: name.clone(),
        schema,
        alias,
        join_type,
        from_subquery,
    });
    local.push(name.clone());
    Some(name)
}

fn collect_join_requirements(body: &str, join_type: JoinType, analysis: &mut QueryAnalysis) {
    for condition in split_conditions(body) {
        let Some(caps) = COLUMN_EQ_RE.captures(condition) else {
            continue;
        };
        let (Some(left_alias), Some(right_alias)) = (caps.get(1), caps.get(3)) else {
            continue;
        };
        let left = analysis.resolve_alias(left_alias.as_str()).map(str::to_string);
        let right = analysis.resolve_alias(right_alias.as_str()).map(str::to_string);
        let (Some(left_table), Some(right_table)) = (left, right) else {
            continue;
        };
        if left_alias.as_str().eq_ignore_ascii_case(right_alias.as_str()) {
            continue;
        }
        analysis.joins.push(JoinRequirement {
            join_type,
            left_table,
            left_column: caps[2].to_string(),
            right_table,
            right_column: caps[4].to_string(),
        });
    }
}

fn collect_columns(
    masked: &MaskedSql,
    sql: &str,
    outer_tables: &[String],
    analysis: &mut QueryAnalysis,
) {
    let single_table = match outer_tables {
        [only] => Some(only.clone()),
        _ => None,
    };
    let mut unqualified: Vec<String> = Vec::new();

    for clause in split_clauses(&masked.text) {
        match clause.kind {
            ClauseKind::From | ClauseKind::Join(_) | ClauseKind::SetOperation => continue,
            ClauseKind::Select => {
                for item in split_top_level_commas(clause.body) {
                    if item == "*" {
                        for table in outer_tables {
                            push_unique(&mut analysis.wildcard_tables, table);
                        }
                    } else if let Some(caps) = BARE_PROJECTION_RE.captures(item) {
                        unqualified.push(caps[1].to_string());
                    }
                }
            }
            _ => {}
        }

        for caps in QUALIFIED_RE.captures_iter(clause.body) {
            let Some(table) = analysis.resolve_alias(&caps[1]).map(str::to_string) else {
                continue;
            };
            if &caps[2] == "*" {
                push_unique(&mut analysis.wildcard_tables, &table);
            } else {
                analysis.add_column(&table, &caps[2]);
            }
        }
    }

    let constraints = extract_all_constraints(sql);
    for (alias, column) in constraints.constrained_columns() {
        if alias.is_empty() {
            unqualified.push(column);
        }
    }

    for column in unqualified {
        if NOT_A_COLUMN.iter().any(|kw| kw.eq_ignore_ascii_case(&column)) {
            continue;
        }
        match &single_table {
            Some(table) => analysis.add_column(table, &column),
            None => push_unique(&mut analysis.unresolved_columns, &column),
        }
    }
}

fn push_unique(target: &mut Vec<String>, value: &str) {
    if !target.iter().any(|existing| existing.eq_ignore_ascii_case(value)) {
        target.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_tables_through_joins_and_comma_lists() {
        let tables = extract_tables_from_query(
            "SELECT u.id FROM shop.users u LEFT OUTER JOIN orders AS o ON o.user_id = u.id, \
             companies c WHERE c.id = u.company_id",
        );
        assert_eq!(tables, vec!["users", "orders", "companies"]);
    }

    #[test]
    fn no_from_clause_gives_empty_list() {
        assert!(extract_tables_from_query("SELECT 1").is_empty());
        assert!(extract_tables_from_query("").is_empty());
    }

    #[test]
    fn ignores_tables_in_comments_and_literals() {
        let tables = extract_tables_from_query(
            "SELECT * FROM users -- JOIN secrets s\nWHERE note = 'FROM audit JOIN x'",
        );
        assert_eq!(tables, vec!["users"]);
    }

    #[test]
    fn flags_subquery_tables() {
        let analysis = analyze_query(
            "SELECT * FROM users u WHERE EXISTS (SELECT 1 FROM orders o WHERE o.user_id = u.id)",
        );
        assert_eq!(analysis.required_tables(), vec!["users", "orders"]);
        assert!(!analysis.tables[0].from_subquery);
        assert!(analysis.tables[1].from_subquery);
    }

    #[test]
    fn resolves_aliases_and_columns() {
        let analysis = analyze_query(
            "SELECT c.name, p.price FROM companies c INNER JOIN products p ON p.company_id = c.id \
             WHERE p.price BETWEEN 100 AND 500",
        );

        assert_eq!(analysis.resolve_alias("P"), Some("products"));
        assert_eq!(analysis.resolve_alias("companies"), Some("companies"));
        assert_eq!(analysis.columns_for("companies"), ["name", "id"]);
        assert_eq!(analysis.columns_for("products"), ["price", "company_id"]);
        assert_eq!(
            analysis.joins,
            vec![JoinRequirement {
                join_type: JoinType::Inner,
                left_table: "products".to_string(),
                left_column: "company_id".to_string(),
                right_table: "companies".to_string(),
                right_column: "id".to_string(),
            }]
        );
    }

    #[test]
    fn tracks_wildcards_and_unresolved_columns() {
        let single = analyze_query("SELECT * FROM users WHERE email LIKE '%@x.io'");
        assert!(single.is_wildcard("users"));
        assert_eq!(single.columns_for("users"), ["email"]);

        let multi = analyze_query("SELECT o.*, status FROM users u JOIN orders o USING (user_id)");
        assert!(multi.is_wildcard("orders"));
        assert_eq!(multi.unresolved_columns, vec!["status"]);
        assert_eq!(multi.joins[0].left_table, "users");
        assert_eq!(multi.joins[0].right_column, "user_id");
    }
}
