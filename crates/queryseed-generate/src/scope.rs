use std::collections::{BTreeMap, BTreeSet};

use queryseed_core::TableSchema;
use queryseed_query::{
    BetweenConstraint, BooleanConstraint, ConstraintSet, DateConstraint, InConstraint,
    LikeConstraint, NullConstraint, OrBranch, ValueConstraint,
};
use tracing::debug;

/// Constraints that apply to one column of one table.
#[derive(Debug, Clone, Default)]
pub struct ColumnConstraints<'a> {
    pub values: Vec<&'a ValueConstraint>,
    pub likes: Vec<&'a LikeConstraint>,
    pub betweens: Vec<&'a BetweenConstraint>,
    pub ins: Vec<&'a InConstraint>,
    pub nulls: Vec<&'a NullConstraint>,
    pub booleans: Vec<&'a BooleanConstraint>,
    pub dates: Vec<&'a DateConstraint>,
}

impl<'a> ColumnConstraints<'a> {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
            && self.likes.is_empty()
            && self.betweens.is_empty()
            && self.ins.iter().all(|item| item.is_subquery())
            && self.nulls.is_empty()
            && self.booleans.is_empty()
            && self.dates.is_empty()
    }

    /// `IS NULL` required.
    pub fn requires_null(&self) -> bool {
        self.nulls.iter().any(|item| item.is_null)
    }

    /// Copy keeping the items whose `OR` position satisfies `keep`.
    pub fn retain_branches<F>(&self, keep: &F) -> ColumnConstraints<'a>
    where
        F: Fn(Option<OrBranch>) -> bool,
    {
        ColumnConstraints {
            values: pick(&self.values, |item| keep(item.branch)),
            likes: pick(&self.likes, |item| keep(item.branch)),
            betweens: pick(&self.betweens, |item| keep(item.branch)),
            ins: pick(&self.ins, |item| keep(item.branch)),
            nulls: pick(&self.nulls, |item| keep(item.branch)),
            booleans: pick(&self.booleans, |item| keep(item.branch)),
            dates: pick(&self.dates, |item| keep(item.branch)),
        }
    }

    fn branches(&self) -> impl Iterator<Item = OrBranch> + '_ {
        let values = self.values.iter().map(|item| item.branch);
        let likes = self.likes.iter().map(|item| item.branch);
        let betweens = self.betweens.iter().map(|item| item.branch);
        let ins = self
            .ins
            .iter()
            .filter(|item| !item.is_subquery())
            .map(|item| item.branch);
        let nulls = self.nulls.iter().map(|item| item.branch);
        let booleans = self.booleans.iter().map(|item| item.branch);
        let dates = self.dates.iter().map(|item| item.branch);
        values
            .chain(likes)
            .chain(betweens)
            .chain(ins)
            .chain(nulls)
            .chain(booleans)
            .chain(dates)
            .flatten()
    }
}

fn pick<'a, T>(items: &[&'a T], keep: impl Fn(&T) -> bool) -> Vec<&'a T> {
    items.iter().copied().filter(|item| keep(item)).collect()
}

/// Constraints of a table, grouped by lowercase column name.
#[derive(Debug, Clone, Default)]
pub struct TableConstraints<'a> {
    columns: BTreeMap<String, ColumnConstraints<'a>>,
}

impl<'a> TableConstraints<'a> {
    /// Select the constraints owned by `aliases` or left unqualified.
    ///
    /// Unqualified items apply when the table has the named column.
    /// Items naming a column the table lacks are dropped.
    pub fn collect(set: &'a ConstraintSet, aliases: &[String], table: &TableSchema) -> Self {
        let mut scoped = Self::default();
        let slot = |alias: &str, column: &str| -> Option<String> {
            if !alias.is_empty() && !aliases.iter().any(|a| a.eq_ignore_ascii_case(alias)) {
                return None;
            }
            match table.column(column) {
                Some(found) => Some(found.name.to_lowercase()),
                None => {
                    if !alias.is_empty() {
                        debug!(
                            table = %table.name,
                            column = %column,
                            "constraint names a column missing from the table"
                        );
                    }
                    None
                }
            }
        };

        for item in &set.values {
            if let Some(key) = slot(&item.alias, &item.column) {
                scoped.columns.entry(key).or_default().values.push(item);
            }
        }
        for item in &set.likes {
            if let Some(key) = slot(&item.alias, &item.column) {
                scoped.columns.entry(key).or_default().likes.push(item);
            }
        }
        for item in &set.betweens {
            if let Some(key) = slot(&item.alias, &item.column) {
                scoped.columns.entry(key).or_default().betweens.push(item);
            }
        }
        for item in &set.ins {
            if let Some(key) = slot(&item.alias, &item.column) {
                scoped.columns.entry(key).or_default().ins.push(item);
            }
        }
        for item in &set.nulls {
            if let Some(key) = slot(&item.alias, &item.column) {
                scoped.columns.entry(key).or_default().nulls.push(item);
            }
        }
        for item in &set.booleans {
            if let Some(key) = slot(&item.alias, &item.column) {
                scoped.columns.entry(key).or_default().booleans.push(item);
            }
        }
        for item in &set.dates {
            if let Some(key) = slot(&item.alias, &item.column) {
                scoped.columns.entry(key).or_default().dates.push(item);
            }
        }

        scoped
    }

    pub fn column(&self, name: &str) -> Option<&ColumnConstraints<'a>> {
        self.columns
            .get(&name.to_lowercase())
            .filter(|constraints| !constraints.is_empty())
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnConstraints<'a>)> {
        self.columns
            .iter()
            .map(|(name, constraints)| (name.as_str(), constraints))
    }

    pub fn is_empty(&self) -> bool {
        self.columns.values().all(ColumnConstraints::is_empty)
    }

    /// Branches present in this table for each `OR` group.
    pub fn disjunctions(&self) -> BTreeMap<u32, BTreeSet<u32>> {
        let mut groups: BTreeMap<u32, BTreeSet<u32>> = BTreeMap::new();
        for constraints in self.columns.values() {
            for tag in constraints.branches() {
                groups.entry(tag.group).or_default().insert(tag.branch);
            }
        }
        groups
    }

    /// Copy keeping the items whose `OR` position satisfies `keep`.
    pub fn retain_branches<F>(&self, keep: &F) -> TableConstraints<'a>
    where
        F: Fn(Option<OrBranch>) -> bool,
    {
        TableConstraints {
            columns: self
                .columns
                .iter()
                .map(|(name, constraints)| (name.clone(), constraints.retain_branches(keep)))
                .collect(),
        }
    }

    /// Unconditional items plus one branch of every `OR` group, chosen by
    /// rotating through the group's branches with `row_index`.
    pub fn for_row(&self, row_index: u64) -> TableConstraints<'a> {
        let chosen: BTreeMap<u32, u32> = self
            .disjunctions()
            .into_iter()
            .filter_map(|(group, branches)| {
                let branches: Vec<u32> = branches.into_iter().collect();
                let slot = (row_index % branches.len().max(1) as u64) as usize;
                branches.get(slot).map(|branch| (group, *branch))
            })
            .collect();
        self.retain_branches(&|tag: Option<OrBranch>| {
            tag.is_none_or(|tag| chosen.get(&tag.group) == Some(&tag.branch))
        })
    }
}
