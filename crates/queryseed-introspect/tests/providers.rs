use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use queryseed_core::{Dialect, GeneratedStatement};
use queryseed_introspect::{
    ConnectionDescriptor, IntrospectOptions, MySqlExecutor, MySqlProvider, SchemaProvider,
    StatementExecutor, connect_mysql, get_database_info,
};

fn shop_snapshot() -> ConnectionDescriptor {
    ConnectionDescriptor::Snapshot(
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/shop_schema.json"),
    )
}

#[tokio::test]
async fn snapshot_is_narrowed_to_hinted_tables() -> Result<()> {
    let info = get_database_info(Dialect::Oracle, &shop_snapshot(), &["orders".to_string()]).await?;

    assert_eq!(info.dialect, Dialect::Oracle);
    let mut names: Vec<&str> = info.table_names().collect();
    names.sort();
    assert_eq!(names, vec!["companies", "orders", "products", "users"]);
    Ok(())
}

#[tokio::test]
async fn live_oracle_introspection_is_unsupported() {
    let connection = ConnectionDescriptor::Url("oracle://scott:tiger@db/ORCL".to_string());
    let err = get_database_info(Dialect::Oracle, &connection, &[])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unsupported"));
}

#[tokio::test]
async fn introspects_and_executes_against_mysql() -> Result<()> {
    let Ok(url) = env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set; skipping mysql integration test");
        return Ok(());
    };
    let pool = connect_mysql(&url, &IntrospectOptions::default())
        .await
        .context("connecting to MySQL")?;

    for sql in [
        "DROP TABLE IF EXISTS qs_users",
        "DROP TABLE IF EXISTS qs_companies",
        "CREATE TABLE qs_companies (id INT PRIMARY KEY, code VARCHAR(10) NOT NULL UNIQUE)",
        "CREATE TABLE qs_users (id INT AUTO_INCREMENT PRIMARY KEY, company_id INT NOT NULL, \
         CONSTRAINT fk_qs_users_company FOREIGN KEY (company_id) REFERENCES qs_companies(id))",
    ] {
        sqlx::query(sql).execute(&pool).await.context("preparing tables")?;
    }

    let info = MySqlProvider::new(pool.clone())
        .database_info(&["qs_users".to_string()])
        .await?;
    let users = info.table("qs_users").context("qs_users introspected")?;
    assert!(users.column("id").context("id column")?.is_identity);
    assert_eq!(
        users.foreign_key_for("company_id").map(|fk| fk.referenced_table.as_str()),
        Some("qs_companies")
    );
    assert!(info.table("qs_companies").context("parent included")?.column("code").context("code")?.is_unique);

    let executor = MySqlExecutor::new(pool);
    let summary = executor
        .execute_statements(&[
            GeneratedStatement::new("qs_companies", "INSERT INTO qs_companies (id, code) VALUES (1, 'A1')", 0),
            GeneratedStatement::new("qs_users", "INSERT INTO qs_users (company_id) VALUES (1)", 1),
            GeneratedStatement::new("qs_users", "INSERT INTO qs_users (company_id) VALUES (99)", 1),
        ])
        .await?;
    assert_eq!(summary.rows_inserted(), 2);
    assert_eq!(summary.failures.len(), 1);
    assert_eq!(executor.count_rows("qs_users").await?, 1);
    assert_eq!(
        executor
            .count_query_rows("SELECT * FROM qs_users u JOIN qs_companies c ON c.id = u.company_id;")
            .await?,
        1
    );
    assert_eq!(executor.column_values("qs_companies", "id", 10).await?, vec!["1".to_string()]);
    Ok(())
}
