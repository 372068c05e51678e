use sqlx::{MySqlPool, Row};

use queryseed_core::Result;

use super::db_error;

// information_schema text columns come back as binary on some MySQL 8
// builds, so every string is cast to CHAR and every number to SIGNED.

pub async fn fetch_database_name(pool: &MySqlPool) -> Result<Option<String>> {
    sqlx::query_scalar::<_, Option<String>>("SELECT CAST(DATABASE() AS CHAR)")
        .fetch_one(pool)
        .await
        .map_err(db_error)
}

pub struct RawTable {
    pub name: String,
    pub table_type: String,
}

pub async fn list_tables(pool: &MySqlPool) -> Result<Vec<RawTable>> {
    let rows = sqlx::query(
        "SELECT CAST(TABLE_NAME AS CHAR) AS table_name, \
                CAST(TABLE_TYPE AS CHAR) AS table_type \
         FROM information_schema.TABLES \
         WHERE TABLE_SCHEMA = DATABASE() \
         ORDER BY TABLE_NAME",
    )
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    rows.into_iter()
        .map(|row| {
            Ok(RawTable {
                name: row.try_get("table_name").map_err(db_error)?,
                table_type: row.try_get("table_type").map_err(db_error)?,
            })
        })
        .collect()
}

pub struct RawColumn {
    pub table_name: String,
    pub name: String,
    pub column_type: String,
    pub is_nullable: String,
    pub default: Option<String>,
    pub character_max_length: Option<i64>,
    pub numeric_precision: Option<i64>,
    pub numeric_scale: Option<i64>,
    pub column_key: String,
    pub extra: String,
}

pub async fn list_columns(pool: &MySqlPool) -> Result<Vec<RawColumn>> {
    let rows = sqlx::query(
        "SELECT CAST(TABLE_NAME AS CHAR) AS table_name, \
                CAST(COLUMN_NAME AS CHAR) AS column_name, \
                CAST(COLUMN_TYPE AS CHAR) AS column_type, \
                CAST(IS_NULLABLE AS CHAR) AS is_nullable, \
                CAST(COLUMN_DEFAULT AS CHAR) AS column_default, \
                CAST(CHARACTER_MAXIMUM_LENGTH AS SIGNED) AS character_max_length, \
                CAST(NUMERIC_PRECISION AS SIGNED) AS numeric_precision, \
                CAST(NUMERIC_SCALE AS SIGNED) AS numeric_scale, \
                CAST(COLUMN_KEY AS CHAR) AS column_key, \
                CAST(EXTRA AS CHAR) AS extra \
         FROM information_schema.COLUMNS \
         WHERE TABLE_SCHEMA = DATABASE() \
         ORDER BY TABLE_NAME, ORDINAL_POSITION",
    )
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    rows.into_iter()
        .map(|row| {
            Ok(RawColumn {
                table_name: row.try_get("table_name").map_err(db_error)?,
                name: row.try_get("column_name").map_err(db_error)?,
                column_type: row.try_get("column_type").map_err(db_error)?,
                is_nullable: row.try_get("is_nullable").map_err(db_error)?,
                default: row.try_get("column_default").map_err(db_error)?,
                character_max_length: row.try_get("character_max_length").map_err(db_error)?,
                numeric_precision: row.try_get("numeric_precision").map_err(db_error)?,
                numeric_scale: row.try_get("numeric_scale").map_err(db_error)?,
                column_key: row.try_get("column_key").map_err(db_error)?,
                extra: row.try_get("extra").map_err(db_error)?,
            })
        })
        .collect()
}

pub struct RawUniqueColumn {
    pub table_name: String,
    pub constraint_name: String,
    pub column_name: String,
}

pub async fn list_unique_columns(pool: &MySqlPool) -> Result<Vec<RawUniqueColumn>> {
    let rows = sqlx::query(
        "SELECT CAST(tc.TABLE_NAME AS CHAR) AS table_name, \
                CAST(tc.CONSTRAINT_NAME AS CHAR) AS constraint_name, \
                CAST(kcu.COLUMN_NAME AS CHAR) AS column_name \
         FROM information_schema.TABLE_CONSTRAINTS tc \
         JOIN information_schema.KEY_COLUMN_USAGE kcu \
           ON tc.CONSTRAINT_NAME = kcu.CONSTRAINT_NAME \
          AND tc.TABLE_NAME = kcu.TABLE_NAME \
          AND tc.TABLE_SCHEMA = kcu.TABLE_SCHEMA \
         WHERE tc.TABLE_SCHEMA = DATABASE() AND tc.CONSTRAINT_TYPE = 'UNIQUE' \
         ORDER BY tc.TABLE_NAME, tc.CONSTRAINT_NAME, kcu.ORDINAL_POSITION",
    )
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    rows.into_iter()
        .map(|row| {
            Ok(RawUniqueColumn {
                table_name: row.try_get("table_name").map_err(db_error)?,
                constraint_name: row.try_get("constraint_name").map_err(db_error)?,
                column_name: row.try_get("column_name").map_err(db_error)?,
            })
        })
        .collect()
}

pub struct RawForeignKey {
    pub table_name: String,
    pub constraint_name: String,
    pub column_name: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

pub async fn list_foreign_keys(pool: &MySqlPool) -> Result<Vec<RawForeignKey>> {
    let rows = sqlx::query(
        "SELECT CAST(TABLE_NAME AS CHAR) AS table_name, \
                CAST(CONSTRAINT_NAME AS CHAR) AS constraint_name, \
                CAST(COLUMN_NAME AS CHAR) AS column_name, \
                CAST(REFERENCED_TABLE_NAME AS CHAR) AS referenced_table, \
                CAST(REFERENCED_COLUMN_NAME AS CHAR) AS referenced_column \
         FROM information_schema.KEY_COLUMN_USAGE \
         WHERE TABLE_SCHEMA = DATABASE() AND REFERENCED_TABLE_NAME IS NOT NULL \
         ORDER BY TABLE_NAME, CONSTRAINT_NAME, ORDINAL_POSITION",
    )
    .fetch_all(pool)
    .await
    .map_err(db_error)?;

    rows.into_iter()
        .map(|row| {
            Ok(RawForeignKey {
                table_name: row.try_get("table_name").map_err(db_error)?,
                constraint_name: row.try_get("constraint_name").map_err(db_error)?,
                column_name: row.try_get("column_name").map_err(db_error)?,
                referenced_table: row.try_get("referenced_table").map_err(db_error)?,
                referenced_column: row.try_get("referenced_column").map_err(db_error)?,
            })
        })
        .collect()
}
