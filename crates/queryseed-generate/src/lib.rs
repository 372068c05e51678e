//! Constraint-aware INSERT generation for queryseed.
//!
//! The engine walks tables in foreign-key order, builds rows that satisfy
//! the constraints extracted from a `SELECT`, validates them, and renders
//! dialect-specific `INSERT` statements.

pub mod engine;
pub mod errors;
pub mod fallback;
pub mod foreign;
pub mod model;
pub mod output;
pub mod planner;
pub mod retry;
pub mod scope;
pub mod solver;
pub mod temporal;
pub mod validate;
pub mod values;

pub use engine::{CancellationFlag, GenerationEngine, GenerationResult};
pub use errors::GenerationError;
pub use model::{
    ExistingData, GenerateOptions, GeneratedRow, GenerationIssue, GenerationReport,
    GenerationRequest, TableReport,
};
pub use output::sql::{build_insert_statement, render_literal, render_script};
pub use retry::{ConstraintKind, RetryPolicy};
pub use validate::{RowValidator, ValidationOutcome, Violation};
pub use values::GeneratedValue;
