use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use queryseed_core::{DatabaseInfo, Dialect, Error, Result, validate_database_info};
use tracing::{info, warn};

use crate::adapter::SchemaProvider;
use crate::filter::restrict_to_tables;

/// Schema provider backed by a JSON snapshot on disk.
#[derive(Debug, Clone)]
pub struct JsonSnapshotProvider {
    path: PathBuf,
    dialect: Option<Dialect>,
}

impl JsonSnapshotProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            dialect: None,
        }
    }

    /// Render for `dialect` whatever the snapshot was captured from.
    pub fn with_dialect(mut self, dialect: Dialect) -> Self {
        self.dialect = Some(dialect);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parse and validate a snapshot file.
pub fn load_snapshot(path: &Path) -> Result<DatabaseInfo> {
    let contents = fs::read_to_string(path)
        .map_err(|err| Error::Other(format!("failed to read {}: {err}", path.display())))?;
    let info: DatabaseInfo = serde_json::from_str(&contents).map_err(|err| {
        Error::InvalidSchema(format!("failed to parse {}: {err}", path.display()))
    })?;
    for issue in validate_database_info(&info)? {
        warn!(
            table = %issue.table,
            column = issue.column.as_deref().unwrap_or(""),
            message = %issue.message,
            "schema snapshot issue"
        );
    }
    Ok(info)
}

#[async_trait]
impl SchemaProvider for JsonSnapshotProvider {
    fn dialect(&self) -> Dialect {
        self.dialect.unwrap_or_default()
    }

    async fn database_info(&self, table_hint: &[String]) -> Result<DatabaseInfo> {
        let mut info = load_snapshot(&self.path)?;
        if let Some(dialect) = self.dialect {
            info.dialect = dialect;
        }
        info!(
            path = %self.path.display(),
            tables = info.tables.len(),
            dialect = %info.dialect,
            "schema snapshot loaded"
        );
        Ok(restrict_to_tables(info, table_hint))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../fixtures/shop_schema.json")
    }

    #[test]
    fn loads_the_shop_fixture() {
        let info = load_snapshot(&fixture()).unwrap();
        assert_eq!(info.dialect, Dialect::MySql);
        assert_eq!(info.database.as_deref(), Some("shop"));
        assert!(info.table("users").unwrap().foreign_key_for("company_id").is_some());
    }

    #[test]
    fn missing_files_are_reported() {
        let err = load_snapshot(Path::new("/nonexistent/schema.json")).unwrap_err();
        assert!(err.to_string().contains("schema.json"));
    }
}
