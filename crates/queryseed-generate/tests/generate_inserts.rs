use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveDateTime, TimeDelta, TimeZone, Utc};
use queryseed_ai::{
    AiGateway, CompletionError, CompletionRequest, EndpointConfig, GatewayConfig, ManualClock,
    SystemClock, TextCompletion,
};
use queryseed_core::{ColumnSchema, DataType, DatabaseInfo, Dialect, ForeignKeySchema, TableSchema};
use queryseed_generate::{
    CancellationFlag, ExistingData, GenerateOptions, GeneratedValue, GenerationEngine,
    GenerationError, GenerationRequest, render_script,
};
use queryseed_query::PatternParser;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures")
        .join(path)
}

fn shop_schema() -> DatabaseInfo {
    let path = fixture("shop_schema.json");
    let contents =
        fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing json at {}", path.display()));
    serde_json::from_str(&contents).expect("parse schema")
}

fn query(name: &str) -> String {
    fs::read_to_string(fixture(&format!("queries/{name}"))).expect("read query")
}

fn pinned_now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 1)
        .and_then(|day| day.and_hms_opt(12, 0, 0))
        .expect("valid instant")
}

fn engine(seed: u64) -> GenerationEngine {
    GenerationEngine::new(GenerateOptions {
        seed,
        now: Some(pinned_now()),
        ..GenerateOptions::default()
    })
}

fn column_values(
    result: &queryseed_generate::GenerationResult,
    table: &str,
    column: &str,
) -> Vec<GeneratedValue> {
    result
        .rows_for(table)
        .map(|row| row.get(column).cloned().unwrap_or(GeneratedValue::Null))
        .collect()
}

#[test]
fn like_and_between_filters_are_satisfied() {
    let schema = shop_schema();
    let request = GenerationRequest::from_query(&PatternParser, &query("company_products.sql"), 5);

    let result = engine(7).run(&schema, &request).expect("run generation");

    let names = column_values(&result, "companies", "name");
    assert_eq!(names.len(), 5);
    for name in &names {
        let text = name.as_str().expect("company name is text");
        assert!(text.contains("VNEXT"), "name {text} misses VNEXT");
        assert!(text.chars().count() <= 120);
    }

    let prices = column_values(&result, "products", "price");
    assert_eq!(prices.len(), 5);
    for price in &prices {
        let value = price.as_f64().expect("numeric price");
        assert!((100.0..=500.0).contains(&value), "price {value} out of range");
    }
    assert_eq!(result.report.best_effort_rows, 0);

    let script = render_script(&result.statements, schema.dialect);
    assert!(script.contains("INSERT INTO companies (id, name, country, founded_at) VALUES"));
    assert!(script.contains("INSERT INTO products (sku, title, price, status) VALUES"));
}

#[test]
fn children_reuse_parent_keys() {
    let schema = shop_schema();
    let request = GenerationRequest::from_query(&PatternParser, &query("active_users.sql"), 6)
        .with_table_rows("companies", 2);

    let result = engine(42).run(&schema, &request).expect("run generation");

    let company_ids = column_values(&result, "companies", "id");
    assert_eq!(company_ids, vec![GeneratedValue::Int(1), GeneratedValue::Int(2)]);
    assert_eq!(
        column_values(&result, "companies", "country"),
        vec![
            GeneratedValue::Text("PT".to_string()),
            GeneratedValue::Text("PT".to_string())
        ]
    );

    let user_companies = column_values(&result, "users", "company_id");
    assert_eq!(user_companies.len(), 6);
    assert!(user_companies.iter().all(|id| company_ids.contains(id)));
    for id in &company_ids {
        assert!(user_companies.contains(id), "company {id:?} never referenced");
    }

    let cutoff = pinned_now() - TimeDelta::days(30);
    for row in result.rows_for("users") {
        let created = row
            .get("created_at")
            .and_then(GeneratedValue::as_datetime)
            .expect("created_at set");
        assert!(created >= cutoff && created <= pinned_now());
        assert_eq!(row.get("is_active").and_then(GeneratedValue::as_bool), Some(true));
        assert!(row.get("full_name").is_some_and(|value| !value.is_null()));
    }

    let emails = column_values(&result, "users", "email");
    let mut distinct = emails.iter().map(GeneratedValue::to_text).collect::<Vec<_>>();
    distinct.sort();
    distinct.dedup();
    assert_eq!(distinct.len(), emails.len());

    let companies_pos = result.order.position("companies").expect("companies ordered");
    let users_pos = result.order.position("users").expect("users ordered");
    assert!(companies_pos < users_pos);
}

#[test]
fn same_seed_renders_the_same_script() {
    let schema = shop_schema();
    let request = GenerationRequest::from_query(&PatternParser, &query("orders_by_user.sql"), 4);

    let first = engine(99).run(&schema, &request).expect("first run");
    let second = engine(99).run(&schema, &request).expect("second run");
    let other = engine(100).run(&schema, &request).expect("other seed");

    let script = render_script(&first.statements, Dialect::MySql);
    assert_eq!(script, render_script(&second.statements, Dialect::MySql));
    assert_ne!(script, render_script(&other.statements, Dialect::MySql));
    assert_ne!(first.run_id, second.run_id);

    let user_ids = column_values(&first, "users", "id");
    let product_ids = column_values(&first, "products", "id");
    for row in first.rows_for("orders") {
        let user = row.get("user_id").expect("user_id set");
        let product = row.get("product_id").expect("product_id set");
        assert!(user_ids.contains(user));
        assert!(product_ids.contains(product));
        let quantity = row.get("quantity").and_then(GeneratedValue::as_i64).expect("quantity");
        assert!((1..=5).contains(&quantity));
    }
    for status in column_values(&first, "products", "status") {
        assert_eq!(status, GeneratedValue::Text("active".to_string()));
    }
}

#[test]
fn self_reference_starts_with_null_manager() {
    let schema = shop_schema();
    let request = GenerationRequest::from_query(&PatternParser, &query("employees.sql"), 4);

    let result = engine(3).run(&schema, &request).expect("run generation");

    let rows: Vec<_> = result.rows_for("employees").collect();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0].get("manager_id"), Some(&GeneratedValue::Null));

    let mut seen = Vec::new();
    for row in &rows {
        let manager = row.get("manager_id").expect("manager_id set");
        if !manager.is_null() {
            assert!(seen.contains(manager), "manager {manager:?} not generated earlier");
        }
        let hired = row
            .get("hired_on")
            .and_then(GeneratedValue::as_date)
            .expect("hired_on set");
        assert_eq!(hired.year(), 2023);
        seen.push(row.get("id").cloned().expect("id set"));
    }
    assert!(result.order.is_self_referencing("employees"));
}

#[test]
fn oracle_scripts_use_date_functions() {
    let mut schema = shop_schema();
    schema.dialect = Dialect::Oracle;
    let request = GenerationRequest::from_query(&PatternParser, &query("employees.sql"), 2);

    let result = engine(3).run(&schema, &request).expect("run generation");
    let script = render_script(&result.statements, schema.dialect);

    assert!(script.starts_with("-- queryseed inserts (oracle)"));
    assert!(script.contains("TO_DATE('2023-"));
    assert_eq!(script.matches(";\n").count(), 2);
}

#[test]
fn existing_rows_reduce_what_is_generated() {
    let schema = shop_schema();
    let existing = ExistingData::new()
        .with_row_count("users", 3)
        .with_row_count("companies", 5)
        .with_values(
            "companies",
            "id",
            (10..15).map(GeneratedValue::Int).collect(),
        );
    let request = GenerationRequest::from_query(&PatternParser, "SELECT * FROM users", 5)
        .with_existing(existing);

    let result = engine(11).run(&schema, &request).expect("run generation");

    let companies = result.report.table("companies").expect("companies reported");
    assert!(companies.auto_included);
    assert_eq!(companies.rows_generated, 0);

    assert_eq!(
        column_values(&result, "users", "id"),
        vec![GeneratedValue::Int(4), GeneratedValue::Int(5)]
    );
    assert_eq!(
        column_values(&result, "users", "company_id"),
        vec![GeneratedValue::Int(10), GeneratedValue::Int(11)]
    );
    assert_eq!(result.report.rows_total, 2);
}

#[test]
fn foreign_key_cycles_abort_the_run() {
    let schema = DatabaseInfo::new(Dialect::Postgres, None)
        .with_table(
            TableSchema::new("a")
                .with_column(ColumnSchema::new("id", DataType::Integer).primary_key())
                .with_column(ColumnSchema::new("b_id", DataType::Integer).not_null())
                .with_foreign_key(ForeignKeySchema::new("b_id", "b", "id")),
        )
        .with_table(
            TableSchema::new("b")
                .with_column(ColumnSchema::new("id", DataType::Integer).primary_key())
                .with_column(ColumnSchema::new("a_id", DataType::Integer).not_null())
                .with_foreign_key(ForeignKeySchema::new("a_id", "a", "id")),
        );
    let request =
        GenerationRequest::from_query(&PatternParser, "SELECT * FROM a JOIN b ON a.b_id = b.id", 2);

    match engine(1).run(&schema, &request) {
        Err(GenerationError::DependencyCycle(tables)) => {
            assert!(tables.contains(&"a".to_string()));
            assert!(tables.contains(&"b".to_string()));
        }
        other => panic!("expected a cycle error, got {other:?}"),
    }
}

#[test]
fn cancelled_runs_stop_before_generating() {
    let flag = CancellationFlag::new();
    flag.cancel();
    let request = GenerationRequest::from_query(&PatternParser, "SELECT * FROM companies", 3);

    let result = engine(1)
        .with_cancellation(flag)
        .run(&shop_schema(), &request);
    assert!(matches!(result, Err(GenerationError::Cancelled)));
}

#[test]
fn disabled_ai_falls_back_quietly() {
    let gateway = Arc::new(AiGateway::disabled(Arc::new(SystemClock)));
    let request = GenerationRequest::from_query(&PatternParser, "SELECT * FROM companies", 3);

    let result = engine(5)
        .with_gateway(gateway)
        .run(&shop_schema(), &request)
        .expect("run generation");

    assert_eq!(result.report.ai_values, 0);
    assert_eq!(result.report.fallback_values, 6);
    assert_eq!(result.report.warning_count("ai_unavailable"), 1);
    for name in column_values(&result, "companies", "name") {
        assert!(name.as_str().is_some_and(|text| !text.is_empty()));
    }
}

struct FixedCompletion;

impl TextCompletion for FixedCompletion {
    fn complete(&self, _request: &CompletionRequest) -> Result<String, CompletionError> {
        Ok("\"Harbor Street\"\n".to_string())
    }
}

#[test]
fn ai_values_are_used_until_the_quota_runs_out() {
    let clock = Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().expect("valid instant"),
    ));
    let config = GatewayConfig {
        enabled: true,
        endpoints: vec![EndpointConfig::new("stub-model", 3, 0)],
        ..GatewayConfig::default()
    };
    let service: Arc<dyn TextCompletion> = Arc::new(FixedCompletion);
    let gateway = Arc::new(AiGateway::new(config, Some(service), clock));
    let request = GenerationRequest::from_query(&PatternParser, "SELECT * FROM companies", 4);

    let result = engine(5)
        .with_gateway(gateway)
        .run(&shop_schema(), &request)
        .expect("run generation");

    assert_eq!(result.report.ai_values, 3);
    assert_eq!(result.report.fallback_values, 5);
    assert_eq!(result.report.warning_count("ai_unavailable"), 1);
    let names = column_values(&result, "companies", "name");
    assert_eq!(names[0], GeneratedValue::Text("Harbor Street".to_string()));
    assert_eq!(names[1], GeneratedValue::Text("Harbor Street".to_string()));
}

#[test]
fn datetime_between_dates_is_satisfied_without_best_effort() {
    let schema = shop_schema();
    let request = GenerationRequest::from_query(
        &PatternParser,
        "SELECT * FROM users u WHERE u.created_at BETWEEN '2024-06-01' AND '2024-06-02'",
        20,
    );

    let result = engine(11).run(&schema, &request).expect("run generation");

    let low = NaiveDate::from_ymd_opt(2024, 6, 1)
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .expect("valid instant");
    let high = NaiveDate::from_ymd_opt(2024, 6, 2)
        .and_then(|day| day.and_hms_opt(0, 0, 0))
        .expect("valid instant");
    let created = column_values(&result, "users", "created_at");
    assert_eq!(created.len(), 20);
    for value in &created {
        let at = value.as_datetime().expect("created_at is a timestamp");
        assert!(low <= at && at <= high, "created_at {at} outside the range");
    }
    assert_eq!(result.report.best_effort_rows, 0);
}

#[test]
fn either_side_of_an_or_is_accepted() {
    let schema = shop_schema();
    let request = GenerationRequest::from_query(
        &PatternParser,
        "SELECT * FROM products p WHERE p.status = 'new' OR p.status = 'hot'",
        6,
    );

    let result = engine(5).run(&schema, &request).expect("run generation");

    let statuses: Vec<String> = column_values(&result, "products", "status")
        .iter()
        .map(GeneratedValue::to_text)
        .collect();
    assert_eq!(statuses.len(), 6);
    assert!(statuses.iter().all(|status| status == "new" || status == "hot"));
    assert!(statuses.iter().any(|status| status == "new"));
    assert!(statuses.iter().any(|status| status == "hot"));
    assert_eq!(result.report.best_effort_rows, 0);
    assert!(!result.report.warnings_by_code.contains_key("constraint_unsatisfied"));
}
