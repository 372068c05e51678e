use std::collections::BTreeMap;

use queryseed_core::{DatabaseInfo, DependencyOrder, resolve_insertion_order};
use tracing::debug;

use crate::errors::GenerationError;
use crate::model::GenerationRequest;

/// Planned generation task for a table.
#[derive(Debug, Clone)]
pub struct TableTask {
    pub table: String,
    /// Lowercase aliases the query uses for the table, the bare name included.
    pub aliases: Vec<String>,
    pub priority: usize,
    pub rows_requested: u64,
    pub rows_existing: u64,
    pub rows_to_generate: u64,
    pub auto_included: bool,
    pub self_referencing: bool,
}

/// Join equality on a column that is not a declared foreign key.
///
/// The later table in insertion order copies values from the earlier one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinLink {
    pub table: String,
    pub column: String,
    pub source_table: String,
    pub source_column: String,
}

#[derive(Debug, Clone)]
pub struct GenerationPlan {
    pub order: DependencyOrder,
    pub tasks: Vec<TableTask>,
    pub links: Vec<JoinLink>,
}

impl GenerationPlan {
    pub fn links_for(&self, table: &str) -> impl Iterator<Item = &JoinLink> {
        self.links
            .iter()
            .filter(move |link| link.table.eq_ignore_ascii_case(table))
    }
}

/// Resolve the insertion order and row counts for a request.
pub fn plan_tables(
    info: &DatabaseInfo,
    request: &GenerationRequest,
    include_parents: bool,
) -> Result<GenerationPlan, GenerationError> {
    let required = request.analysis.required_tables();
    if required.is_empty() {
        return Err(GenerationError::InvalidRequest(
            "query references no tables".to_string(),
        ));
    }

    let order = resolve_insertion_order(info, &required, include_parents)?;
    if order.order.is_empty() {
        return Err(GenerationError::InvalidRequest(format!(
            "none of the referenced tables exist in the schema: {}",
            required.join(", ")
        )));
    }

    let requested = requested_rows(info, request, &order);
    let mut tasks = Vec::with_capacity(order.order.len());
    for (priority, name) in order.order.iter().enumerate() {
        let rows_requested = requested
            .get(&name.to_lowercase())
            .copied()
            .unwrap_or(request.desired_rows);
        let rows_existing = request.existing.row_count(name);
        let mut aliases = request.analysis.aliases_for(name);
        let bare = name.to_lowercase();
        if !aliases.contains(&bare) {
            aliases.push(bare);
        }
        tasks.push(TableTask {
            table: name.clone(),
            aliases,
            priority,
            rows_requested,
            rows_existing,
            rows_to_generate: rows_requested.saturating_sub(rows_existing),
            auto_included: order
                .auto_included
                .iter()
                .any(|parent| parent.eq_ignore_ascii_case(name)),
            self_referencing: order.is_self_referencing(name),
        });
    }

    let links = join_links(info, request, &order);
    Ok(GenerationPlan {
        order,
        tasks,
        links,
    })
}

/// Requested rows per table; pulled-in parents follow their largest child.
fn requested_rows(
    info: &DatabaseInfo,
    request: &GenerationRequest,
    order: &DependencyOrder,
) -> BTreeMap<String, u64> {
    let mut rows: BTreeMap<String, u64> = BTreeMap::new();
    for name in &order.order {
        let auto = order
            .auto_included
            .iter()
            .any(|parent| parent.eq_ignore_ascii_case(name));
        let explicit = request.table_rows.contains_key(&name.to_lowercase());
        if !auto || explicit {
            rows.insert(name.to_lowercase(), request.requested_rows(name));
        }
    }

    // Children come after parents, so walking backwards settles grandparents last.
    for name in order.order.iter().rev() {
        let key = name.to_lowercase();
        if rows.contains_key(&key) {
            continue;
        }
        let from_children = order
            .order
            .iter()
            .filter_map(|child| info.table(child))
            .filter(|child| {
                child
                    .foreign_keys
                    .iter()
                    .any(|fk| fk.referenced_table.eq_ignore_ascii_case(name))
                    && !child.name.eq_ignore_ascii_case(name)
            })
            .filter_map(|child| rows.get(&child.name.to_lowercase()).copied())
            .max()
            .unwrap_or(request.desired_rows);
        debug!(table = %name, rows = from_children, "parent row count follows children");
        rows.insert(key, from_children);
    }
    rows
}

fn join_links(
    info: &DatabaseInfo,
    request: &GenerationRequest,
    order: &DependencyOrder,
) -> Vec<JoinLink> {
    let mut pairs: Vec<(String, String, String, String)> = request
        .analysis
        .joins
        .iter()
        .map(|join| {
            (
                join.left_table.clone(),
                join.left_column.clone(),
                join.right_table.clone(),
                join.right_column.clone(),
            )
        })
        .collect();
    for condition in &request.constraints.joins {
        if !condition.is_key_equality() {
            continue;
        }
        let Some(((left_alias, left_column), (right_alias, right_column))) =
            condition.column_pair()
        else {
            continue;
        };
        let analysis = &request.analysis;
        if let (Some(left), Some(right)) = (
            analysis.resolve_alias(left_alias),
            analysis.resolve_alias(right_alias),
        ) {
            pairs.push((
                left.to_string(),
                left_column.to_string(),
                right.to_string(),
                right_column.to_string(),
            ));
        }
    }

    let mut links: Vec<JoinLink> = Vec::new();
    for (left_table, left_column, right_table, right_column) in pairs {
        let (Some(left_pos), Some(right_pos)) =
            (order.position(&left_table), order.position(&right_table))
        else {
            continue;
        };
        if left_pos == right_pos {
            continue;
        }
        let (child, child_column, parent, parent_column) = if left_pos > right_pos {
            (&left_table, &left_column, &right_table, &right_column)
        } else {
            (&right_table, &right_column, &left_table, &left_column)
        };
        let (Some(child_schema), Some(parent_schema)) = (info.table(child), info.table(parent))
        else {
            continue;
        };
        if child_schema.column(child_column).is_none()
            || parent_schema.column(parent_column).is_none()
        {
            debug!(
                table = %child_schema.name,
                column = %child_column,
                source = %parent_schema.name,
                "join column missing from schema, link skipped"
            );
            continue;
        }
        if child_schema.foreign_key_for(child_column).is_some() {
            continue;
        }
        let link = JoinLink {
            table: child_schema.name.clone(),
            column: child_column.to_lowercase(),
            source_table: parent_schema.name.clone(),
            source_column: parent_column.to_lowercase(),
        };
        if !links.contains(&link) {
            links.push(link);
        }
    }
    links
}

#[cfg(test)]
mod tests {
    use queryseed_core::{ColumnSchema, DataType, Dialect, ForeignKeySchema, TableSchema};
    use queryseed_query::PatternParser;

    use super::*;
    use crate::model::ExistingData;

    fn schema() -> DatabaseInfo {
        DatabaseInfo::new(Dialect::MySql, None)
            .with_table(
                TableSchema::new("companies")
                    .with_column(ColumnSchema::new("id", DataType::Integer).primary_key())
                    .with_column(ColumnSchema::new("code", DataType::String)),
            )
            .with_table(
                TableSchema::new("users")
                    .with_column(ColumnSchema::new("id", DataType::Integer).primary_key())
                    .with_column(ColumnSchema::new("company_id", DataType::Integer))
                    .with_foreign_key(ForeignKeySchema::new("company_id", "companies", "id")),
            )
            .with_table(
                TableSchema::new("audits")
                    .with_column(ColumnSchema::new("id", DataType::Integer).primary_key())
                    .with_column(ColumnSchema::new("company_code", DataType::String)),
            )
    }

    #[test]
    fn parents_follow_child_rows_and_existing_rows_are_subtracted() {
        let request = GenerationRequest::from_query(&PatternParser, "SELECT * FROM users", 5)
            .with_table_rows("users", 8)
            .with_existing(ExistingData::new().with_row_count("users", 3));

        let plan = plan_tables(&schema(), &request, true).unwrap();
        let tables: Vec<(&str, u64, u64, bool)> = plan
            .tasks
            .iter()
            .map(|t| (t.table.as_str(), t.rows_requested, t.rows_to_generate, t.auto_included))
            .collect();
        assert_eq!(
            tables,
            vec![("companies", 8, 8, true), ("users", 8, 5, false)]
        );
    }

    #[test]
    fn non_key_joins_become_links() {
        let request = GenerationRequest::from_query(
            &PatternParser,
            "SELECT * FROM companies c JOIN audits a ON a.company_code = c.code \
             JOIN users u ON u.company_id = c.id",
            2,
        );
        let plan = plan_tables(&schema(), &request, true).unwrap();
        assert_eq!(
            plan.links,
            vec![JoinLink {
                table: "audits".to_string(),
                column: "company_code".to_string(),
                source_table: "companies".to_string(),
                source_column: "code".to_string(),
            }]
        );
        assert!(plan.tasks.iter().all(|task| !task.auto_included));
    }

    #[test]
    fn unknown_tables_only_is_an_invalid_request() {
        let request = GenerationRequest::from_query(&PatternParser, "SELECT * FROM ghosts", 1);
        assert!(matches!(
            plan_tables(&schema(), &request, true),
            Err(GenerationError::InvalidRequest(_))
        ));
    }
}
