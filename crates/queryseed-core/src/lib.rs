//! Core contracts and helpers for queryseed.
//!
//! This crate defines the schema snapshot types, the dialect tag, the
//! foreign-key dependency resolver and the statement type shared by the
//! generator, the adapters and the CLI.

pub mod error;
pub mod graph;
pub mod redaction;
pub mod schema;
pub mod statement;
pub mod types;
pub mod validation;

pub use error::{Error, Result};
pub use graph::{
    DependencyOrder, FkGraphReport, FkGraphSummary, MissingReference, build_fk_graph_report,
    resolve_insertion_order,
};
pub use redaction::{RedactedConnection, redact_connection_string};
pub use schema::{ColumnSchema, DatabaseInfo, ForeignKeySchema, TableSchema};
pub use statement::{GeneratedStatement, StatementWarning};
pub use types::{DataType, Dialect};
pub use validation::{SchemaIssue, validate_database_info};

/// Current contract version for `schema.json` snapshots.
pub const SCHEMA_VERSION: &str = "0.1";
