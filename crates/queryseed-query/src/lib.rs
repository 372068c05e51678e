//! Pattern-based SQL understanding for queryseed.
//!
//! Turns a `SELECT` statement into a [`ConstraintSet`] and a
//! [`QueryAnalysis`]. Scanning is best-effort: constructs that are not
//! recognized produce fewer constraints, never an error.

pub mod analyze;
mod clauses;
pub mod extract;
pub mod lexer;
pub mod like;
pub mod model;
pub mod parser;
pub mod schema;

pub use analyze::{
    JoinRequirement, JoinType, QueryAnalysis, TableReference, analyze_query,
    extract_tables_from_query,
};
pub use extract::extract_all_constraints;
pub use like::{LikeToken, classify_like, like_matches};
pub use model::{
    BetweenConstraint, BooleanConstraint, ComparisonOp, ConstraintSet, ConstraintSource,
    DateConstraint, DateConstraintKind, DateTag, ExistsConstraint, InConstraint, InValues,
    Interval, IntervalDirection, IntervalUnit, JoinCondition, JoinConditionSource, JoinTarget,
    LikeConstraint, LikeKind, NullConstraint, OrBranch, RangeType, SqlLiteral, ValueConstraint,
};
pub use parser::{PatternParser, QueryParser};
pub use schema::constraint_set_json_schema;
