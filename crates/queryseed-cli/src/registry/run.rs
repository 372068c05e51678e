use std::collections::BTreeMap;
use std::fs::{OpenOptions, create_dir_all};
use std::path::PathBuf;
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;

use queryseed_core::RedactedConnection;

use super::{RegistryResult, write_json_atomic};

/// Serializable options for runs.
#[derive(Debug, Clone, Serialize)]
pub struct RunOptions {
    pub dialect: String,
    pub seed: u64,
    pub rows: u64,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub table_rows: BTreeMap<String, u64>,
    pub include_parents: bool,
    pub max_attempts: u32,
    pub ai_enabled: bool,
    pub execute: bool,
}

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub run_dir: PathBuf,
    pub query: String,
    /// Snapshot path, or the redacted form of a database URL.
    pub schema_source: String,
    pub connection: Option<RedactedConnection>,
    pub options: RunOptions,
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
pub struct RunConfig {
    pub run_id: String,
    pub started_at: String,
    pub query: String,
    pub schema_source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection: Option<RedactedConnection>,
    pub options: RunOptions,
    pub git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub inserts_path: PathBuf,
    pub report_path: PathBuf,
    pub execution_path: PathBuf,
    pub logs_path: PathBuf,
}

pub fn start_run(ctx: &RunContext) -> RegistryResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let root = ctx.run_dir.join(format!("{timestamp}__run_{}", ctx.run_id));

    create_dir_all(&root)?;

    let config = RunConfig {
        run_id: ctx.run_id.clone(),
        started_at: ctx.started_at.to_rfc3339(),
        query: ctx.query.clone(),
        schema_source: ctx.schema_source.clone(),
        connection: ctx.connection.clone(),
        options: ctx.options.clone(),
        git: collect_git_info(),
    };
    write_json_atomic(&root.join("config.json"), &config)?;

    let logs_path = root.join("logs.ndjson");
    OpenOptions::new().create(true).append(true).open(&logs_path)?;

    Ok(RunPaths {
        inserts_path: root.join("inserts.sql"),
        report_path: root.join("report.json"),
        execution_path: root.join("execution.json"),
        logs_path,
        root,
    })
}

pub fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn run_directory_holds_config_and_log() {
        let run_dir = std::env::temp_dir().join(format!("queryseed-runs-{}", uuid::Uuid::new_v4()));
        let ctx = RunContext {
            run_id: "abc".to_string(),
            started_at: Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 0).unwrap(),
            run_dir: run_dir.clone(),
            query: "SELECT * FROM users".to_string(),
            schema_source: "fixtures/shop_schema.json".to_string(),
            connection: None,
            options: RunOptions {
                dialect: "mysql".to_string(),
                seed: 7,
                rows: 3,
                table_rows: BTreeMap::new(),
                include_parents: true,
                max_attempts: 5,
                ai_enabled: false,
                execute: false,
            },
        };

        let paths = start_run(&ctx).unwrap();

        assert_eq!(paths.root, run_dir.join("2025-06-01T12-30-00Z__run_abc"));
        assert!(paths.logs_path.exists());
        let config: serde_json::Value =
            serde_json::from_slice(&std::fs::read(paths.root.join("config.json")).unwrap()).unwrap();
        assert_eq!(config["options"]["seed"], 7);
        assert_eq!(config["schema_source"], "fixtures/shop_schema.json");
        assert!(config.get("connection").is_none());
        std::fs::remove_dir_all(run_dir).unwrap();
    }
}
