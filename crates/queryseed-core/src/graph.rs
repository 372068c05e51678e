use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::schema::DatabaseInfo;

/// Summary of FK graph structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FkGraphSummary {
    pub nodes: usize,
    pub edges: usize,
    pub self_references: usize,
}

/// Report for FK dependency ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FkGraphReport {
    pub summary: FkGraphSummary,
    pub topo_order: Option<Vec<String>>,
    pub cycle: Option<Vec<String>>,
}

/// Foreign key whose parent table is absent from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MissingReference {
    pub table: String,
    pub column: String,
    pub referenced_table: String,
}

/// Insertion order for the tables of one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyOrder {
    /// Parents always precede their children.
    pub order: Vec<String>,
    /// Tables with a foreign key to themselves.
    pub self_referencing: Vec<String>,
    /// Parent tables pulled in because a required table references them.
    pub auto_included: Vec<String>,
    pub missing_references: Vec<MissingReference>,
    /// Requested tables not present in the snapshot.
    pub unknown_tables: Vec<String>,
}

impl DependencyOrder {
    pub fn position(&self, table: &str) -> Option<usize> {
        self.order
            .iter()
            .position(|name| name.eq_ignore_ascii_case(table))
    }

    pub fn is_self_referencing(&self, table: &str) -> bool {
        self.self_referencing
            .iter()
            .any(|name| name.eq_ignore_ascii_case(table))
    }
}

/// Build a deterministic FK dependency report for a whole snapshot.
pub fn build_fk_graph_report(info: &DatabaseInfo) -> FkGraphReport {
    let (graph, self_references) = build_adjacency(info);
    let nodes = graph.len();
    let edges = graph.values().map(|targets| targets.len()).sum();
    let summary = FkGraphSummary {
        nodes,
        edges,
        self_references,
    };

    match toposort(&graph) {
        Ok(order) => FkGraphReport {
            summary,
            topo_order: Some(order),
            cycle: None,
        },
        Err(cycle) => FkGraphReport {
            summary,
            topo_order: None,
            cycle: Some(cycle),
        },
    }
}

fn build_adjacency(info: &DatabaseInfo) -> (BTreeMap<String, BTreeSet<String>>, usize) {
    let mut graph: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut self_references = 0;

    for table in info.tables.values() {
        graph.entry(table.name.clone()).or_default();

        for fk in &table.foreign_keys {
            let Some(parent) = info.table(&fk.referenced_table) else {
                continue;
            };
            if parent.name == table.name {
                self_references += 1;
                continue;
            }
            graph
                .entry(parent.name.clone())
                .or_default()
                .insert(table.name.clone());
        }
    }

    (graph, self_references)
}

fn toposort(graph: &BTreeMap<String, BTreeSet<String>>) -> std::result::Result<Vec<String>, Vec<String>> {
    let mut indegree: BTreeMap<String, usize> = BTreeMap::new();

    for node in graph.keys() {
        indegree.entry(node.clone()).or_insert(0);
    }

    for targets in graph.values() {
        for target in targets {
            *indegree.entry(target.clone()).or_insert(0) += 1;
        }
    }

    let mut ready: BTreeSet<String> = indegree
        .iter()
        .filter_map(|(node, count)| (*count == 0).then(|| node.clone()))
        .collect();

    let mut order = Vec::with_capacity(graph.len());

    while let Some(node) = ready.pop_first() {
        order.push(node.clone());

        if let Some(targets) = graph.get(&node) {
            for target in targets {
                if let Some(count) = indegree.get_mut(target) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        ready.insert(target.clone());
                    }
                }
            }
        }
    }

    if order.len() == graph.len() {
        Ok(order)
    } else {
        Err(indegree
            .into_iter()
            .filter_map(|(node, count)| (count > 0).then_some(node))
            .collect())
    }
}

/// Order `required` tables so that every parent precedes its children.
///
/// Ties are broken by discovery order: required tables in the given order,
/// then parents added by `include_parents` in breadth-first order. A table
/// referencing itself does not block ordering. A cycle between distinct
/// tables fails with [`Error::DependencyCycle`].
pub fn resolve_insertion_order(
    info: &DatabaseInfo,
    required: &[String],
    include_parents: bool,
) -> Result<DependencyOrder> {
    let mut result = DependencyOrder::default();
    let mut nodes: Vec<String> = Vec::new();

    for name in required {
        match info.table(name) {
            Some(table) => push_unique(&mut nodes, &table.name),
            None => {
                warn!(table = %name, "required table not found in schema snapshot");
                push_unique(&mut result.unknown_tables, name);
            }
        }
    }

    if include_parents {
        let mut queue: VecDeque<String> = nodes.iter().cloned().collect();
        while let Some(child) = queue.pop_front() {
            let Some(table) = info.table(&child) else {
                continue;
            };
            for fk in &table.foreign_keys {
                let Some(parent) = info.table(&fk.referenced_table) else {
                    continue;
                };
                if !contains_name(&nodes, &parent.name) {
                    debug!(table = %parent.name, child = %table.name, "including parent table");
                    nodes.push(parent.name.clone());
                    result.auto_included.push(parent.name.clone());
                    queue.push_back(parent.name.clone());
                }
            }
        }
    }

    let index: HashMap<String, usize> = nodes
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.to_ascii_lowercase(), idx))
        .collect();
    let count = nodes.len();
    let mut parents: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); count];

    for (idx, name) in nodes.iter().enumerate() {
        let Some(table) = info.table(name) else {
            continue;
        };
        for fk in &table.foreign_keys {
            let Some(parent) = info.table(&fk.referenced_table) else {
                warn!(
                    table = %table.name,
                    column = %fk.column,
                    referenced_table = %fk.referenced_table,
                    "foreign key references a table missing from the snapshot"
                );
                result.missing_references.push(MissingReference {
                    table: table.name.clone(),
                    column: fk.column.clone(),
                    referenced_table: fk.referenced_table.clone(),
                });
                continue;
            };
            match index.get(&parent.name.to_ascii_lowercase()) {
                Some(&parent_idx) if parent_idx == idx => {
                    push_unique(&mut result.self_referencing, &table.name);
                }
                Some(&parent_idx) => {
                    if !parents[idx].contains(&parent_idx) {
                        parents[idx].push(parent_idx);
                        children[parent_idx].push(idx);
                    }
                }
                // Parent exists but is not part of this run.
                None => {}
            }
        }
    }

    let mut remaining: Vec<usize> = parents.iter().map(Vec::len).collect();
    let mut emitted = vec![false; count];
    let mut order = Vec::with_capacity(count);

    while order.len() < count {
        let Some(next) = (0..count).find(|&idx| !emitted[idx] && remaining[idx] == 0) else {
            break;
        };
        emitted[next] = true;
        order.push(next);
        for &child in &children[next] {
            remaining[child] = remaining[child].saturating_sub(1);
        }
    }

    if order.len() < count {
        let cycle: Vec<String> = cycle_members(&emitted, &children)
            .into_iter()
            .map(|idx| nodes[idx].clone())
            .collect();
        warn!(tables = ?cycle, "dependency cycle between required tables");
        return Err(Error::DependencyCycle(cycle));
    }

    result.order = order.into_iter().map(|idx| nodes[idx].clone()).collect();
    Ok(result)
}

/// Narrow the unordered remainder down to tables that sit on a cycle.
///
/// Tables that merely depend on a cycle have no unordered child left once
/// their own dependents are pruned, so they drop out.
fn cycle_members(emitted: &[bool], children: &[Vec<usize>]) -> Vec<usize> {
    let mut alive: Vec<bool> = emitted.iter().map(|done| !done).collect();
    loop {
        let mut changed = false;
        for idx in 0..alive.len() {
            if alive[idx] && !children[idx].iter().any(|&child| alive[child]) {
                alive[idx] = false;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    (0..alive.len()).filter(|&idx| alive[idx]).collect()
}

fn push_unique(target: &mut Vec<String>, name: &str) {
    if !contains_name(target, name) {
        target.push(name.to_string());
    }
}

fn contains_name(names: &[String], name: &str) -> bool {
    names.iter().any(|existing| existing.eq_ignore_ascii_case(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSchema, ForeignKeySchema, TableSchema};
    use crate::types::{DataType, Dialect};

    fn column(name: &str) -> ColumnSchema {
        ColumnSchema::new(name, DataType::Integer)
    }

    fn table(name: &str, fks: &[(&str, &str)]) -> TableSchema {
        let mut table = TableSchema::new(name).with_column(column("id").primary_key());
        for (fk_column, parent) in fks {
            table = table
                .with_column(column(fk_column))
                .with_foreign_key(ForeignKeySchema::new(*fk_column, *parent, "id"));
        }
        table
    }

    fn required(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn topo_order_is_deterministic() {
        let info = DatabaseInfo::new(Dialect::MySql, None)
            .with_table(table("a", &[]))
            .with_table(table("b", &[("a_id", "a")]))
            .with_table(table("c", &[("b_id", "b")]));

        let report = build_fk_graph_report(&info);
        assert_eq!(report.summary.nodes, 3);
        assert_eq!(report.summary.edges, 2);
        assert_eq!(
            report.topo_order.unwrap(),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
        assert!(report.cycle.is_none());
    }

    #[test]
    fn detects_cycle_in_report() {
        let info = DatabaseInfo::new(Dialect::MySql, None)
            .with_table(table("a", &[("b_id", "b")]))
            .with_table(table("b", &[("a_id", "a")]));

        let report = build_fk_graph_report(&info);
        assert!(report.topo_order.is_none());
        assert_eq!(report.cycle.unwrap().len(), 2);
    }

    #[test]
    fn parents_precede_children_with_discovery_tie_break() {
        let info = DatabaseInfo::new(Dialect::MySql, None)
            .with_table(table("companies", &[]))
            .with_table(table("users", &[("company_id", "companies")]))
            .with_table(table("tags", &[]));

        let order =
            resolve_insertion_order(&info, &required(&["users", "tags", "companies"]), false)
                .unwrap();
        assert_eq!(order.order, vec!["tags", "companies", "users"]);
    }

    #[test]
    fn includes_parent_tables_on_request() {
        let info = DatabaseInfo::new(Dialect::MySql, None)
            .with_table(table("companies", &[]))
            .with_table(table("users", &[("company_id", "companies")]));

        let without = resolve_insertion_order(&info, &required(&["users"]), false).unwrap();
        assert_eq!(without.order, vec!["users"]);

        let with = resolve_insertion_order(&info, &required(&["users"]), true).unwrap();
        assert_eq!(with.order, vec!["companies", "users"]);
        assert_eq!(with.auto_included, vec!["companies"]);
    }

    #[test]
    fn self_reference_does_not_block_ordering() {
        let info = DatabaseInfo::new(Dialect::MySql, None)
            .with_table(table("employees", &[("manager_id", "employees")]));

        let order = resolve_insertion_order(&info, &required(&["employees"]), true).unwrap();
        assert_eq!(order.order, vec!["employees"]);
        assert!(order.is_self_referencing("EMPLOYEES"));
    }

    #[test]
    fn cycle_between_tables_is_fatal_and_names_only_cycle_members() {
        let info = DatabaseInfo::new(Dialect::MySql, None)
            .with_table(table("a", &[("b_id", "b")]))
            .with_table(table("b", &[("a_id", "a")]))
            .with_table(table("c", &[("a_id", "a")]));

        let err = resolve_insertion_order(&info, &required(&["c", "a", "b"]), false).unwrap_err();
        match err {
            Error::DependencyCycle(tables) => assert_eq!(tables, vec!["a", "b"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_parent_is_reported_not_fatal() {
        let info = DatabaseInfo::new(Dialect::MySql, None)
            .with_table(table("orders", &[("customer_id", "customers")]));

        let order =
            resolve_insertion_order(&info, &required(&["orders", "ghost"]), true).unwrap();
        assert_eq!(order.order, vec!["orders"]);
        assert_eq!(order.missing_references.len(), 1);
        assert_eq!(order.missing_references[0].referenced_table, "customers");
        assert_eq!(order.unknown_tables, vec!["ghost"]);
    }
}
