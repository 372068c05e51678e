use std::time::Duration;

use async_trait::async_trait;
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use tracing::{debug, info, warn};

use queryseed_core::{DatabaseInfo, Dialect, Error, GeneratedStatement, Result};

use crate::adapter::{ExecutionSummary, SchemaProvider, StatementExecutor};
use crate::filter::restrict_to_tables;
use crate::options::IntrospectOptions;

mod mapper;
mod queries;

pub(crate) fn db_error(err: sqlx::Error) -> Error {
    Error::Db(err.to_string())
}

/// Open a pool sized by the options.
pub async fn connect_mysql(url: &str, opts: &IntrospectOptions) -> Result<MySqlPool> {
    MySqlPoolOptions::new()
        .max_connections(opts.max_connections)
        .acquire_timeout(Duration::from_secs(opts.acquire_timeout_secs))
        .connect(url)
        .await
        .map_err(db_error)
}

/// Schema provider over MySQL `information_schema`.
#[derive(Debug, Clone)]
pub struct MySqlProvider {
    pool: MySqlPool,
    options: IntrospectOptions,
}

impl MySqlProvider {
    pub fn new(pool: MySqlPool) -> Self {
        Self::with_options(pool, IntrospectOptions::default())
    }

    pub fn with_options(pool: MySqlPool, options: IntrospectOptions) -> Self {
        Self { pool, options }
    }
}

#[async_trait]
impl SchemaProvider for MySqlProvider {
    fn dialect(&self) -> Dialect {
        Dialect::MySql
    }

    async fn database_info(&self, table_hint: &[String]) -> Result<DatabaseInfo> {
        let info = introspect(&self.pool, &self.options).await?;
        Ok(restrict_to_tables(info, table_hint))
    }
}

/// Introspect the current MySQL database.
pub async fn introspect(pool: &MySqlPool, opts: &IntrospectOptions) -> Result<DatabaseInfo> {
    let database = queries::fetch_database_name(pool).await?;
    let tables = queries::list_tables(pool).await?;
    let columns = queries::list_columns(pool).await?;
    let uniques = queries::list_unique_columns(pool).await?;
    let foreign_keys = queries::list_foreign_keys(pool).await?;

    let info = mapper::map_database(database, tables, columns, uniques, foreign_keys, opts);
    info!(
        database = info.database.as_deref().unwrap_or(""),
        tables = info.tables.len(),
        "mysql schema introspected"
    );
    Ok(info)
}

/// Executes statements and counts rows over a MySQL pool.
#[derive(Debug, Clone)]
pub struct MySqlExecutor {
    pool: MySqlPool,
}

impl MySqlExecutor {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StatementExecutor for MySqlExecutor {
    async fn execute_statements(
        &self,
        statements: &[GeneratedStatement],
    ) -> Result<ExecutionSummary> {
        let mut summary = ExecutionSummary::default();
        for (index, statement) in statements.iter().enumerate() {
            match sqlx::query(&statement.sql).execute(&self.pool).await {
                Ok(done) => summary.record_success(&statement.table, done.rows_affected()),
                Err(err) => {
                    warn!(
                        table = %statement.table,
                        index,
                        error = %err,
                        "statement failed"
                    );
                    summary.record_failure(&statement.table, index, err.to_string());
                }
            }
        }
        info!(
            statements = statements.len(),
            rows = summary.rows_inserted(),
            failures = summary.failures.len(),
            "statements executed"
        );
        Ok(summary)
    }

    async fn count_rows(&self, table: &str) -> Result<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_table(table));
        let count = sqlx::query_scalar::<_, i64>(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        debug!(table = %table, rows = count, "rows counted");
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn count_query_rows(&self, sql: &str) -> Result<u64> {
        let body = sql.trim().trim_end_matches(';');
        if body.is_empty() {
            return Err(Error::Other("empty query".to_string()));
        }
        let wrapped = format!("SELECT COUNT(*) FROM ({body}) AS queryseed_count");
        let count = sqlx::query_scalar::<_, i64>(&wrapped)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn column_values(&self, table: &str, column: &str, limit: u32) -> Result<Vec<String>> {
        let column = quote_identifier(column);
        let sql = format!(
            "SELECT CAST({column} AS CHAR) FROM {} WHERE {column} IS NOT NULL LIMIT ?",
            quote_table(table)
        );
        sqlx::query_scalar::<_, String>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)
    }
}

fn quote_identifier(name: &str) -> String {
    format!("`{}`", name.trim_matches('`').replace('`', "``"))
}

fn quote_table(name: &str) -> String {
    name.split('.')
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_backticked() {
        assert_eq!(quote_table("shop.order"), "`shop`.`order`");
        assert_eq!(quote_identifier("we`ird"), "`we``ird`");
    }
}
