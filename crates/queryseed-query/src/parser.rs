use crate::analyze::{QueryAnalysis, analyze_query, extract_tables_from_query};
use crate::extract::extract_all_constraints;
use crate::model::ConstraintSet;

/// Source of query structure for the generator.
///
/// The pattern scanner is the only implementation today; a grammar-based
/// parser can slot in behind the same calls.
pub trait QueryParser: Send + Sync {
    fn extract_constraints(&self, sql: &str) -> ConstraintSet;

    fn extract_tables(&self, sql: &str) -> Vec<String>;

    fn analyze(&self, sql: &str) -> QueryAnalysis;
}

/// Case-insensitive tagged-pattern scanner.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternParser;

impl QueryParser for PatternParser {
    fn extract_constraints(&self, sql: &str) -> ConstraintSet {
        extract_all_constraints(sql)
    }

    fn extract_tables(&self, sql: &str) -> Vec<String> {
        extract_tables_from_query(sql)
    }

    fn analyze(&self, sql: &str) -> QueryAnalysis {
        analyze_query(sql)
    }
}
