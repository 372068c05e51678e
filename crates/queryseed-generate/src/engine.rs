use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::{NaiveDateTime, Timelike, Utc};
use queryseed_ai::{AiGateway, ValueHint};
use queryseed_core::{
    ColumnSchema, DataType, DatabaseInfo, DependencyOrder, GeneratedStatement, StatementWarning,
    TableSchema,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, warn};

use crate::errors::GenerationError;
use crate::fallback::FallbackGenerator;
use crate::foreign::{ForeignPools, KeyRegistry};
use crate::model::{
    GenerateOptions, GeneratedRow, GenerationIssue, GenerationReport, GenerationRequest,
    TableReport,
};
use crate::output::sql::build_row_insert;
use crate::planner::{JoinLink, TableTask, plan_tables};
use crate::retry::ConstraintKind;
use crate::scope::TableConstraints;
use crate::solver::ConstraintSolver;
use crate::validate::{RowValidator, Violation};
use crate::values::GeneratedValue;

const UNIQUE_SEARCH_LIMIT: i64 = 10_000;

/// Cooperative stop signal shared with the caller.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Result of a generation run.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub run_id: String,
    pub order: DependencyOrder,
    /// Statements in insertion order.
    pub statements: Vec<GeneratedStatement>,
    pub rows: Vec<GeneratedRow>,
    pub report: GenerationReport,
}

impl GenerationResult {
    pub fn rows_for(&self, table: &str) -> impl Iterator<Item = &GeneratedRow> {
        self.rows
            .iter()
            .filter(move |row| row.table.eq_ignore_ascii_case(table))
    }
}

/// Entry point for generating INSERT statements from a schema and a query.
#[derive(Debug, Clone)]
pub struct GenerationEngine {
    options: GenerateOptions,
    gateway: Option<Arc<AiGateway>>,
    cancellation: CancellationFlag,
    fallback: FallbackGenerator,
    run_id: Option<String>,
}

impl GenerationEngine {
    pub fn new(options: GenerateOptions) -> Self {
        Self {
            options,
            gateway: None,
            cancellation: CancellationFlag::default(),
            fallback: FallbackGenerator,
            run_id: None,
        }
    }

    /// Ask the gateway for unconstrained text before falling back.
    pub fn with_gateway(mut self, gateway: Arc<AiGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    /// Reuse an id the caller already logs under; a fresh one is drawn otherwise.
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = Some(run_id.into());
        self
    }

    pub fn options(&self) -> &GenerateOptions {
        &self.options
    }

    pub fn run(
        &self,
        info: &DatabaseInfo,
        request: &GenerationRequest,
    ) -> Result<GenerationResult, GenerationError> {
        let start = Instant::now();
        let run_id = self
            .run_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let now = self.options.now.unwrap_or_else(current_second);
        let seed = self.options.seed;

        info!(
            run_id = %run_id,
            seed,
            desired_rows = request.desired_rows,
            constraints = request.constraints.len(),
            "generation started"
        );

        let plan = plan_tables(info, request, self.options.include_parents).inspect_err(|err| {
            warn!(run_id = %run_id, error = %err, "generation failed");
        })?;

        let mut report = GenerationReport::new(run_id.clone(), seed, now);
        report.order = plan.order.order.clone();
        for name in &plan.order.unknown_tables {
            record_warning(
                &mut report,
                GenerationIssue::warning(
                    "unknown_table",
                    format!("table '{name}' is not in the schema snapshot and was skipped"),
                )
                .for_table(name),
            );
        }
        for missing in &plan.order.missing_references {
            record_warning(
                &mut report,
                GenerationIssue::warning(
                    "missing_fk_target",
                    format!(
                        "foreign key {}.{} references missing table '{}'; values are unconstrained",
                        missing.table, missing.column, missing.referenced_table
                    ),
                )
                .for_table(&missing.table)
                .for_column(&missing.column),
            );
        }

        let mut state = RunState::seeded(info, request, &plan.tasks);
        let mut statements = Vec::new();
        let mut rows = Vec::new();

        for task in &plan.tasks {
            self.check_cancelled(&run_id, &task.table)?;
            let table = info.table(&task.table).ok_or_else(|| {
                GenerationError::Schema(format!("table '{}' vanished from the snapshot", task.table))
            })?;
            let table_start = Instant::now();
            info!(
                run_id = %run_id,
                table = %table.name,
                rows = task.rows_to_generate,
                existing = task.rows_existing,
                auto_included = task.auto_included,
                "generating table"
            );

            let ctx = TableContext::new(info, table, task, request, &plan.links, seed, now);
            let output = self.generate_table(&run_id, &ctx, &mut state, &mut report)?;

            report.tables.push(TableReport {
                table: table.name.clone(),
                priority: task.priority,
                auto_included: task.auto_included,
                rows_requested: task.rows_requested,
                rows_existing: task.rows_existing,
                rows_generated: output.rows.len() as u64,
                retries: output.retries,
                best_effort_rows: output.best_effort,
            });
            report.rows_total += output.rows.len() as u64;
            report.retries_total += output.retries;
            report.best_effort_rows += output.best_effort;

            info!(
                run_id = %run_id,
                table = %table.name,
                rows_generated = output.rows.len(),
                retries = output.retries,
                best_effort = output.best_effort,
                duration_ms = table_start.elapsed().as_millis() as u64,
                "table generated"
            );
            statements.extend(output.statements);
            rows.extend(output.rows);
        }

        info!(
            run_id = %run_id,
            tables = report.tables.len(),
            rows = report.rows_total,
            warnings = report.warnings.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "generation completed"
        );

        Ok(GenerationResult {
            run_id,
            order: plan.order,
            statements,
            rows,
            report,
        })
    }

    fn check_cancelled(&self, run_id: &str, table: &str) -> Result<(), GenerationError> {
        if self.cancellation.is_cancelled() {
            warn!(run_id = %run_id, table = %table, "generation cancelled");
            return Err(GenerationError::Cancelled);
        }
        Ok(())
    }

    fn generate_table(
        &self,
        run_id: &str,
        ctx: &TableContext<'_>,
        state: &mut RunState,
        report: &mut GenerationReport,
    ) -> Result<TableOutput, GenerationError> {
        let validator = RowValidator::new(ctx.now);
        let mut output = TableOutput::default();

        for row_index in 0..ctx.task.rows_to_generate {
            self.check_cancelled(run_id, &ctx.table.name)?;

            let scoped = ctx.scoped.for_row(row_index);
            let mut attempt = 1_u32;
            let mut rng = ChaCha8Rng::seed_from_u64(hash_row_seed(ctx.table_seed, row_index, attempt));
            let mut row = GeneratedRow::new(&ctx.table.name);
            for column in &ctx.columns {
                let value =
                    self.column_value(ctx, &scoped, column, row_index, &row, &mut rng, state, report);
                row.set(&column.name, value);
            }

            let mut violations = row_violations(ctx, &validator, &row, state);
            while !violations.is_empty() {
                let budget = self
                    .options
                    .retry
                    .attempts_for(violations.iter().map(|violation| violation.kind));
                if attempt >= budget {
                    break;
                }
                attempt += 1;
                output.retries += 1;
                debug!(
                    table = %ctx.table.name,
                    row = row_index,
                    attempt,
                    violations = violations.len(),
                    "regenerating violated columns"
                );

                rng = ChaCha8Rng::seed_from_u64(hash_row_seed(ctx.table_seed, row_index, attempt));
                let violated: BTreeSet<String> = violations
                    .iter()
                    .map(|violation| violation.column.to_lowercase())
                    .collect();
                for column in &ctx.columns {
                    if violated.contains(&column.name.to_lowercase()) {
                        let value = self.column_value(
                            ctx, &scoped, column, row_index, &row, &mut rng, state, report,
                        );
                        row.set(&column.name, value);
                    }
                }
                violations = row_violations(ctx, &validator, &row, state);
            }
            row.attempt = attempt;

            let mut statement = GeneratedStatement::new(
                &ctx.table.name,
                build_row_insert(ctx.table, &row, ctx.info.dialect),
                ctx.task.priority,
            );
            if !violations.is_empty() {
                output.best_effort += 1;
                for violation in &violations {
                    statement.warnings.push(StatementWarning {
                        column: violation.column.clone(),
                        constraint: violation.kind.as_str().to_string(),
                        message: violation.message(),
                    });
                    record_warning(
                        report,
                        GenerationIssue::warning(
                            "constraint_unsatisfied",
                            format!(
                                "row {} of '{}' accepted best-effort: {}",
                                row_index + 1,
                                ctx.table.name,
                                violation.message()
                            ),
                        )
                        .for_table(&ctx.table.name)
                        .for_column(&violation.column)
                        .for_constraint(violation.kind.as_str()),
                    );
                }
            }

            for column in &ctx.columns {
                if column.requires_unique_values() {
                    if let Some(value) = row.get(&column.name) {
                        state.keys.claim(&ctx.table.name, &column.name, value);
                    }
                }
            }
            state.pools.ingest_row(&row);
            output.statements.push(statement);
            output.rows.push(row);
        }

        Ok(output)
    }

    #[allow(clippy::too_many_arguments)]
    fn column_value(
        &self,
        ctx: &TableContext<'_>,
        scoped: &TableConstraints<'_>,
        column: &ColumnSchema,
        row_index: u64,
        row: &GeneratedRow,
        rng: &mut ChaCha8Rng,
        state: &mut RunState,
        report: &mut GenerationReport,
    ) -> GeneratedValue {
        let table = ctx.table.name.as_str();
        let constraints = scoped.column(&column.name);

        if column.is_identity {
            return match column.data_type {
                DataType::Integer => {
                    GeneratedValue::Int(state.keys.next_free_int(table, &column.name))
                }
                _ => GeneratedValue::Null,
            };
        }

        if let Some(fk) = ctx.table.foreign_key_for(&column.name) {
            if let Some(parent) = ctx.info.table(&fk.referenced_table) {
                let accept = |value: &GeneratedValue| {
                    constraints.is_none_or(|constraints| {
                        RowValidator::new(ctx.now)
                            .check_column(&column.name, value, constraints)
                            .is_empty()
                    })
                };
                let cursor = format!("{table}.{}", column.name);
                if parent.name.eq_ignore_ascii_case(table) {
                    if let Some(value) =
                        state.pools.pick(table, &fk.referenced_column, &cursor, accept)
                    {
                        return value;
                    }
                    let must_fill = !column.is_nullable
                        || constraints.is_some_and(|c| c.nulls.iter().any(|item| !item.is_null));
                    if !must_fill {
                        return GeneratedValue::Null;
                    }
                    if let Some(own) = row.get(&fk.referenced_column) {
                        return own.clone();
                    }
                } else {
                    if let Some(value) =
                        state
                            .pools
                            .pick(&parent.name, &fk.referenced_column, &cursor, accept)
                    {
                        return value;
                    }
                    state.warn_once(
                        report,
                        GenerationIssue::warning(
                            "fk_parent_empty",
                            format!(
                                "no rows available in '{}' for {}.{}",
                                parent.name, table, column.name
                            ),
                        )
                        .for_table(table)
                        .for_column(&column.name),
                    );
                    if column.is_nullable {
                        return GeneratedValue::Null;
                    }
                }
            }
        }

        if let Some(link) = ctx.link_for(&column.name) {
            let accept = |value: &GeneratedValue| {
                constraints.is_none_or(|constraints| {
                    RowValidator::new(ctx.now)
                        .check_column(&column.name, value, constraints)
                        .is_empty()
                })
            };
            let cursor = format!("{table}.{}", column.name);
            if let Some(value) =
                state
                    .pools
                    .pick(&link.source_table, &link.source_column, &cursor, accept)
            {
                return value;
            }
        }

        if let Some(constraints) = constraints {
            let solver = ConstraintSolver::new(ctx.now);
            if let Some(value) = solver.solve(table, column, constraints, row_index, rng) {
                return value;
            }
        }

        if column.requires_unique_values() {
            return self.unique_value(ctx, column, row_index, rng, state);
        }

        if column.data_type.is_textual() {
            if let Some(value) = self.ai_value(ctx, column, state, report) {
                report.ai_values += 1;
                return GeneratedValue::Text(value);
            }
            report.fallback_values += 1;
        }
        self.fallback.value(table, column, ctx.now, rng)
    }

    fn unique_value(
        &self,
        ctx: &TableContext<'_>,
        column: &ColumnSchema,
        row_index: u64,
        rng: &mut ChaCha8Rng,
        state: &RunState,
    ) -> GeneratedValue {
        let table = ctx.table.name.as_str();
        if column.data_type == DataType::Integer {
            return GeneratedValue::Int(state.keys.next_free_int(table, &column.name));
        }
        let base = i64::try_from(ctx.task.rows_existing + row_index + 1).unwrap_or(i64::MAX);
        let mut sequence = base;
        loop {
            let value = self
                .fallback
                .unique_value(table, column, sequence, ctx.now, rng);
            let exhausted = sequence - base >= UNIQUE_SEARCH_LIMIT;
            if exhausted || !state.keys.is_taken(table, &column.name, &value) {
                return value;
            }
            sequence = sequence.saturating_add(1);
        }
    }

    fn ai_value(
        &self,
        ctx: &TableContext<'_>,
        column: &ColumnSchema,
        state: &mut RunState,
        report: &mut GenerationReport,
    ) -> Option<String> {
        let gateway = self.gateway.as_ref()?;
        let hint = ValueHint::new(&ctx.table.name, &column.name, column.data_type)
            .with_max_length(column.max_length);
        match gateway.try_generate_value(&hint) {
            Ok(value) => Some(value),
            Err(reason) => {
                if !state.ai_notice_logged {
                    state.ai_notice_logged = true;
                    info!(
                        table = %ctx.table.name,
                        column = %column.name,
                        reason = %reason,
                        "ai unavailable, using deterministic fallback"
                    );
                    report.record_warning(
                        GenerationIssue::warning(
                            "ai_unavailable",
                            format!("ai generation unavailable ({reason}); fallback values used"),
                        )
                        .for_table(&ctx.table.name)
                        .for_column(&column.name),
                    );
                }
                None
            }
        }
    }
}

#[derive(Default)]
struct TableOutput {
    rows: Vec<GeneratedRow>,
    statements: Vec<GeneratedStatement>,
    retries: u64,
    best_effort: u64,
}

/// State shared by every table of one run.
struct RunState {
    pools: ForeignPools,
    keys: KeyRegistry,
    warned: BTreeSet<String>,
    ai_notice_logged: bool,
}

impl RunState {
    fn seeded(info: &DatabaseInfo, request: &GenerationRequest, tasks: &[TableTask]) -> Self {
        let mut pools = ForeignPools::new();
        let mut keys = KeyRegistry::new();
        for task in tasks {
            for (column, values) in request.existing.columns(&task.table) {
                pools.ingest_existing(&task.table, column, values);
                for value in values {
                    keys.claim(&task.table, column, value);
                }
            }
            let Some(table) = info.table(&task.table) else {
                continue;
            };
            for column in &table.columns {
                if column.requires_unique_values() || column.is_identity {
                    keys.reserve_below(&table.name, &column.name, task.rows_existing);
                }
            }
        }
        Self {
            pools,
            keys,
            warned: BTreeSet::new(),
            ai_notice_logged: false,
        }
    }

    /// Record an issue once per code, table and column.
    fn warn_once(&mut self, report: &mut GenerationReport, issue: GenerationIssue) {
        let key = format!(
            "{}:{}:{}",
            issue.code,
            issue.table.as_deref().unwrap_or(""),
            issue.column.as_deref().unwrap_or("")
        );
        if self.warned.insert(key) {
            record_warning(report, issue);
        }
    }
}

struct TableContext<'a> {
    info: &'a DatabaseInfo,
    table: &'a TableSchema,
    task: &'a TableTask,
    scoped: TableConstraints<'a>,
    links: Vec<&'a JoinLink>,
    /// Keys first, then foreign keys, then the rest, each in schema order.
    columns: Vec<&'a ColumnSchema>,
    table_seed: u64,
    now: NaiveDateTime,
}

impl<'a> TableContext<'a> {
    fn new(
        info: &'a DatabaseInfo,
        table: &'a TableSchema,
        task: &'a TableTask,
        request: &'a GenerationRequest,
        links: &'a [JoinLink],
        seed: u64,
        now: NaiveDateTime,
    ) -> Self {
        let rank = |column: &ColumnSchema| {
            if column.is_primary_key {
                0
            } else if table.foreign_key_for(&column.name).is_some() {
                1
            } else {
                2
            }
        };
        let mut columns: Vec<&ColumnSchema> = table.columns.iter().collect();
        columns.sort_by_key(|column| rank(*column));

        Self {
            info,
            table,
            task,
            scoped: TableConstraints::collect(&request.constraints, &task.aliases, table),
            links: links
                .iter()
                .filter(|link| link.table.eq_ignore_ascii_case(&table.name))
                .collect(),
            columns,
            table_seed: hash_seed(seed, &table.name.to_lowercase()),
            now,
        }
    }

    fn link_for(&self, column: &str) -> Option<&'a JoinLink> {
        self.links
            .iter()
            .copied()
            .find(|link| link.column.eq_ignore_ascii_case(column))
    }
}

/// Constraint violations plus key collisions with earlier rows.
fn row_violations(
    ctx: &TableContext<'_>,
    validator: &RowValidator,
    row: &GeneratedRow,
    state: &RunState,
) -> Vec<Violation> {
    let mut violations = validator.validate_table(row, &ctx.scoped).violations;
    for column in &ctx.columns {
        if !column.requires_unique_values() || column.is_identity {
            continue;
        }
        let Some(value) = row.get(&column.name) else {
            continue;
        };
        let duplicate = state.keys.is_taken(&ctx.table.name, &column.name, value);
        let null_key = column.is_primary_key && value.is_null();
        if duplicate || null_key {
            violations.push(Violation {
                column: column.name.to_lowercase(),
                kind: ConstraintKind::Unique,
                expected: if null_key {
                    "non-null primary key".to_string()
                } else {
                    "unique value".to_string()
                },
                actual: value.to_text(),
            });
        }
    }
    violations
}

fn record_warning(report: &mut GenerationReport, issue: GenerationIssue) {
    warn!(
        code = %issue.code,
        table = issue.table.as_deref().unwrap_or(""),
        column = issue.column.as_deref().unwrap_or(""),
        constraint = issue.constraint.as_deref().unwrap_or(""),
        message = %issue.message
    );
    report.record_warning(issue);
}

fn current_second() -> NaiveDateTime {
    let now = Utc::now().naive_utc();
    now.with_nanosecond(0).unwrap_or(now)
}

fn hash_seed(seed: u64, key: &str) -> u64 {
    let mut hash = seed ^ 0xcbf29ce484222325;
    for byte in key.as_bytes() {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn hash_row_seed(table_seed: u64, row_index: u64, attempt: u32) -> u64 {
    let mut hash = table_seed ^ row_index.wrapping_mul(0x9e3779b97f4a7c15);
    hash ^= attempt as u64;
    hash = hash.wrapping_mul(0x100000001b3);
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_seeds_differ_by_attempt_and_row() {
        let table = hash_seed(42, "users");
        assert_ne!(table, hash_seed(42, "orders"));
        assert_ne!(hash_row_seed(table, 0, 1), hash_row_seed(table, 0, 2));
        assert_ne!(hash_row_seed(table, 0, 1), hash_row_seed(table, 1, 1));
        assert_eq!(hash_row_seed(table, 3, 1), hash_row_seed(table, 3, 1));
    }

    #[test]
    fn cancellation_flag_is_shared_between_clones() {
        let flag = CancellationFlag::new();
        let clone = flag.clone();
        clone.cancel();
        assert!(flag.is_cancelled());
    }
}
