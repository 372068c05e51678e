mod gemini;
mod registry;
mod settings;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Args, Parser, Subcommand};
use queryseed_ai::{AiGateway, GatewayConfig, SystemClock, TextCompletion};
use queryseed_core::{
    DatabaseInfo, Dialect, Error as CoreError, build_fk_graph_report, redact_connection_string,
    resolve_insertion_order,
};
use queryseed_generate::output::sql::write_script;
use queryseed_generate::output::write_report;
use queryseed_generate::solver::coerce;
use queryseed_generate::{
    ExistingData, GenerateOptions, GenerationEngine, GenerationError, GenerationRequest,
    RetryPolicy,
};
use queryseed_introspect::{
    ConnectionDescriptor, IntrospectOptions, MySqlExecutor, MySqlProvider, SchemaProvider,
    StatementExecutor, connect_mysql, get_database_info,
};
use queryseed_query::{PatternParser, QueryParser};
use registry::{
    RunContext, RunOptions, RunPaths, init_logging, init_run_logging, start_run,
    write_bytes_atomic, write_json_atomic,
};
use settings::{Settings, load_settings};
use thiserror::Error;
use uuid::Uuid;

use crate::gemini::GeminiCompletion;

/// Upper bound on key values read back per column from a live database.
const EXISTING_VALUE_LIMIT: u32 = 10_000;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error("settings error: {0}")]
    Settings(#[from] settings::SettingsError),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error("generation error: {0}")]
    Generation(#[from] GenerationError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

#[derive(Parser, Debug)]
#[command(
    name = "queryseed",
    version,
    about = "Generate INSERT statements that make a SELECT return rows"
)]
struct Cli {
    /// Settings file; `queryseed.toml` in the working directory is used when present.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the tables a query reads from.
    Tables(QueryArgs),
    /// Print the constraints and structure extracted from a query as JSON.
    Constraints(QueryArgs),
    /// Show the foreign-key insertion order for a query's tables.
    Order(OrderArgs),
    /// Generate INSERT statements for a query.
    Generate(GenerateArgs),
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// SQL text of the SELECT.
    #[arg(value_name = "SQL", required_unless_present = "query_file", conflicts_with = "query_file")]
    sql: Option<String>,
    /// Read the SELECT from a file instead.
    #[arg(long, value_name = "PATH")]
    query_file: Option<PathBuf>,
}

impl QueryArgs {
    fn read(&self) -> Result<String, CliError> {
        match (&self.sql, &self.query_file) {
            (Some(sql), None) => Ok(sql.clone()),
            (None, Some(path)) => Ok(std::fs::read_to_string(path)?),
            _ => Err(CliError::InvalidConfig(
                "pass the query either inline or with --query-file".to_string(),
            )),
        }
    }
}

#[derive(Args, Debug)]
struct SchemaArgs {
    /// JSON schema snapshot, or a database URL (MySQL only).
    #[arg(long, value_name = "PATH_OR_URL")]
    schema: String,
    /// Target dialect for the rendered statements.
    #[arg(long, default_value = "mysql")]
    dialect: Dialect,
}

#[derive(Args, Debug)]
struct OrderArgs {
    #[command(flatten)]
    query: QueryArgs,
    #[command(flatten)]
    schema: SchemaArgs,
    /// Do not pull in parent tables the query does not mention.
    #[arg(long, default_value_t = false)]
    no_parents: bool,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    query: QueryArgs,
    #[command(flatten)]
    schema: SchemaArgs,
    /// Rows every table should end up with.
    #[arg(long)]
    rows: Option<u64>,
    /// Per-table row count, e.g. `--table-rows companies=2`.
    #[arg(long = "table-rows", value_name = "TABLE=ROWS")]
    table_rows: Vec<String>,
    #[arg(long)]
    seed: Option<u64>,
    /// Attempts per row before it is kept as best effort.
    #[arg(long)]
    max_attempts: Option<u32>,
    /// Do not pull in parent tables the query does not mention.
    #[arg(long, default_value_t = false)]
    no_parents: bool,
    /// Never call the AI service, even when enabled in settings.
    #[arg(long, default_value_t = false)]
    no_ai: bool,
    /// Output directory for runs.
    #[arg(long)]
    run_dir: Option<PathBuf>,
    /// Also write the INSERT script here.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Run the statements against the database given by --schema.
    #[arg(long, default_value_t = false)]
    execute: bool,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;

    match cli.command {
        Command::Tables(args) => {
            init_logging()?;
            run_tables(&args)
        }
        Command::Constraints(args) => {
            init_logging()?;
            run_constraints(&args)
        }
        Command::Order(args) => {
            init_logging()?;
            run_order(args, &settings).await
        }
        Command::Generate(args) => run_generate(args, settings).await,
    }
}

fn run_tables(args: &QueryArgs) -> Result<(), CliError> {
    let sql = args.read()?;
    for table in PatternParser.extract_tables(&sql) {
        println!("{table}");
    }
    Ok(())
}

fn run_constraints(args: &QueryArgs) -> Result<(), CliError> {
    let sql = args.read()?;
    let output = serde_json::json!({
        "constraints": PatternParser.extract_constraints(&sql),
        "analysis": PatternParser.analyze(&sql),
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run_order(args: OrderArgs, settings: &Settings) -> Result<(), CliError> {
    let sql = args.query.read()?;
    let required = PatternParser.extract_tables(&sql);
    let connection: ConnectionDescriptor = args.schema.schema.parse()?;
    let info = get_database_info(args.schema.dialect, &connection, &required).await?;
    let include_parents = settings.generation.include_parents && !args.no_parents;

    let graph = build_fk_graph_report(&info);
    println!(
        "graph: {} tables, {} foreign keys, {} self references",
        graph.summary.nodes, graph.summary.edges, graph.summary.self_references
    );
    if let Some(cycle) = &graph.cycle {
        println!("cycle: {}", cycle.join(" -> "));
    }

    let order = resolve_insertion_order(&info, &required, include_parents)?;
    for (position, table) in order.order.iter().enumerate() {
        let mut marks = Vec::new();
        if order.auto_included.contains(table) {
            marks.push("auto");
        }
        if order.self_referencing.contains(table) {
            marks.push("self");
        }
        if marks.is_empty() {
            println!("{}. {table}", position + 1);
        } else {
            println!("{}. {table} ({})", position + 1, marks.join(", "));
        }
    }
    for missing in &order.missing_references {
        println!(
            "missing: {}.{} -> {}",
            missing.table, missing.column, missing.referenced_table
        );
    }
    for table in &order.unknown_tables {
        println!("unknown: {table}");
    }
    Ok(())
}

async fn run_generate(args: GenerateArgs, settings: Settings) -> Result<(), CliError> {
    let sql = args.query.read()?;
    let connection: ConnectionDescriptor = args.schema.schema.parse()?;
    let dialect = args.schema.dialect;
    if args.execute && !matches!(connection, ConnectionDescriptor::Url(_)) {
        return Err(CliError::InvalidConfig(
            "--execute needs a database URL in --schema".to_string(),
        ));
    }

    let rows = args.rows.unwrap_or(settings.generation.rows);
    let table_rows = parse_table_rows(&args.table_rows)?;
    let options = GenerateOptions {
        seed: args.seed.unwrap_or(settings.generation.seed),
        include_parents: settings.generation.include_parents && !args.no_parents,
        retry: RetryPolicy::default()
            .with_max_attempts(args.max_attempts.unwrap_or(settings.generation.max_attempts)),
        now: None,
    };
    let ai_enabled = settings.ai.enabled && !args.no_ai;

    let (schema_source, redacted) = match &connection {
        ConnectionDescriptor::Snapshot(path) => (path.display().to_string(), None),
        ConnectionDescriptor::Url(url) => {
            let redacted = redact_connection_string(url);
            (redacted.redacted.clone(), Some(redacted))
        }
    };

    let run_id = Uuid::new_v4().to_string();
    let run_ctx = RunContext {
        run_id: run_id.clone(),
        started_at: chrono::Utc::now(),
        run_dir: args.run_dir.clone().unwrap_or_else(|| settings.output.run_dir.clone()),
        query: sql.clone(),
        schema_source,
        connection: redacted,
        options: RunOptions {
            dialect: dialect.to_string(),
            seed: options.seed,
            rows,
            table_rows: table_rows.clone(),
            include_parents: options.include_parents,
            max_attempts: options.retry.max_attempts,
            ai_enabled,
            execute: args.execute,
        },
    };

    let run_paths = start_run(&run_ctx)?;
    init_run_logging(&run_paths.logs_path)?;

    tracing::info!(event = "run_started", run_id = %run_id, dialect = %dialect);
    let timer = Instant::now();

    let mut request = GenerationRequest::from_query(&PatternParser, &sql, rows);
    for (table, count) in &table_rows {
        request = request.with_table_rows(table, *count);
    }

    let required = request.analysis.required_tables();
    let (info, executor) = match &connection {
        ConnectionDescriptor::Url(url) if dialect == Dialect::MySql => {
            let pool = connect_mysql(url, &IntrospectOptions::default()).await?;
            let info = MySqlProvider::new(pool.clone()).database_info(&required).await?;
            (info, Some(MySqlExecutor::new(pool)))
        }
        _ => (get_database_info(dialect, &connection, &required).await?, None),
    };
    tracing::info!(event = "schema_loaded", tables = info.tables.len());

    if let Some(executor) = &executor {
        let existing = load_existing(executor, &info, &required, options.include_parents).await?;
        request = request.with_existing(existing);
    }

    // The AI client blocks, so the engine and its gateway live off the async workers.
    let gateway_config = ai_enabled.then(|| settings.ai.clone());
    let engine_run_id = run_id.clone();
    let result = tokio::task::spawn_blocking(move || {
        let mut engine = GenerationEngine::new(options).with_run_id(engine_run_id);
        if let Some(config) = gateway_config {
            engine = engine.with_gateway(build_gateway(&config));
        }
        engine.run(&info, &request)
    })
    .await
    .map_err(|err| CliError::InvalidConfig(format!("generation task failed: {err}")))??;

    write_script(&run_paths.inserts_path, &result.statements, dialect)?;
    write_report(&run_paths.report_path, &result.report)?;
    tracing::info!(event = "artifacts_written", path = %run_paths.root.display());

    if let Some(out) = &args.out {
        let script = std::fs::read(&run_paths.inserts_path)?;
        write_bytes_atomic(out, &script)?;
    }

    print_summary(&run_paths, &result.report);

    if args.execute {
        if let Some(executor) = &executor {
            execute_and_check(executor, &run_paths, &result.statements, &sql, rows).await?;
        }
    }

    tracing::info!(
        event = "run_finished",
        status = "success",
        duration_ms = timer.elapsed().as_millis() as u64
    );
    Ok(())
}

fn parse_table_rows(values: &[String]) -> Result<BTreeMap<String, u64>, CliError> {
    let mut table_rows = BTreeMap::new();
    for value in values {
        let parsed = value
            .split_once('=')
            .and_then(|(table, rows)| {
                let table = table.trim();
                let rows = rows.trim().parse::<u64>().ok()?;
                (!table.is_empty()).then(|| (table.to_string(), rows))
            })
            .ok_or_else(|| {
                CliError::InvalidConfig(format!("expected TABLE=ROWS, got `{value}`"))
            })?;
        table_rows.insert(parsed.0, parsed.1);
    }
    Ok(table_rows)
}

fn build_gateway(config: &GatewayConfig) -> Arc<AiGateway> {
    let key = std::env::var(&config.api_key_env)
        .ok()
        .filter(|key| !key.trim().is_empty());
    let service: Option<Arc<dyn TextCompletion>> = match key {
        Some(key) => match GeminiCompletion::new(key) {
            Ok(client) => Some(Arc::new(client)),
            Err(err) => {
                tracing::warn!(error = %err, "ai client could not be built; using fallback values");
                None
            }
        },
        None => {
            tracing::warn!(
                env = %config.api_key_env,
                "ai enabled but no api key set; using fallback values"
            );
            None
        }
    };
    Arc::new(AiGateway::new(config.clone(), service, Arc::new(SystemClock)))
}

/// Row counts and key values already in the database, so generated rows
/// top tables up instead of colliding with what is there.
async fn load_existing(
    executor: &MySqlExecutor,
    info: &DatabaseInfo,
    required: &[String],
    include_parents: bool,
) -> Result<ExistingData, CliError> {
    let order = resolve_insertion_order(info, required, include_parents)?;
    let mut existing = ExistingData::new();

    for name in &order.order {
        let Some(table) = info.table(name) else {
            continue;
        };
        let rows = executor.count_rows(&table.name).await?;
        existing.set_row_count(&table.name, rows);
        if rows == 0 {
            continue;
        }

        for column in &table.columns {
            let referenced = info.tables.values().any(|child| {
                child.foreign_keys.iter().any(|fk| {
                    fk.referenced_table.eq_ignore_ascii_case(&table.name)
                        && fk.referenced_column.eq_ignore_ascii_case(&column.name)
                })
            });
            if !(referenced || column.requires_unique_values()) {
                continue;
            }
            let values = executor
                .column_values(&table.name, &column.name, EXISTING_VALUE_LIMIT)
                .await?;
            let values = values.iter().map(|value| coerce(column, value)).collect();
            existing = existing.with_values(&table.name, &column.name, values);
        }
        tracing::info!(event = "existing_rows_counted", table = %table.name, rows);
    }
    Ok(existing)
}

async fn execute_and_check(
    executor: &MySqlExecutor,
    run_paths: &RunPaths,
    statements: &[queryseed_core::GeneratedStatement],
    sql: &str,
    desired_rows: u64,
) -> Result<(), CliError> {
    let mut ordered = statements.to_vec();
    ordered.sort_by_key(|statement| statement.priority);

    let summary = executor.execute_statements(&ordered).await?;
    write_json_atomic(&run_paths.execution_path, &summary)?;
    println!(
        "executed: {} rows inserted, {} statements failed",
        summary.rows_inserted(),
        summary.failures.len()
    );

    let returned = executor.count_query_rows(sql).await?;
    tracing::info!(event = "query_checked", desired_rows, returned);
    if returned >= desired_rows {
        println!("query now returns {returned} rows");
    } else {
        tracing::warn!(desired_rows, returned, "query returns fewer rows than requested");
        println!("query returns {returned} of {desired_rows} requested rows");
    }
    Ok(())
}

fn print_summary(run_paths: &RunPaths, report: &queryseed_generate::GenerationReport) {
    println!("run: {}", run_paths.root.display());
    for table in &report.tables {
        println!(
            "  {:<24} {:>6} generated {:>6} existing {:>4} best effort",
            table.table, table.rows_generated, table.rows_existing, table.best_effort_rows
        );
    }
    println!(
        "rows: {} (ai values {}, fallback values {}, warnings {})",
        report.rows_total,
        report.ai_values,
        report.fallback_values,
        report.warnings.len()
    );
    println!("script: {}", run_paths.inserts_path.display());
}
