use std::fs;
use std::path::Path;

use jsonschema::JSONSchema;
use queryseed_query::{
    ConstraintSource, DateConstraintKind, InValues, JoinConditionSource, LikeKind, PatternParser,
    QueryParser, RangeType, constraint_set_json_schema,
};

fn load_query(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../../fixtures/queries")
        .join(name);
    fs::read_to_string(&path).unwrap_or_else(|_| panic!("missing query at {}", path.display()))
}

#[test]
fn company_products_query_yields_expected_constraints() {
    let parser = PatternParser;
    let sql = load_query("company_products.sql");
    let set = parser.extract_constraints(&sql);

    let like = &set.likes[0];
    assert_eq!((like.alias.as_str(), like.column.as_str()), ("c", "name"));
    assert_eq!(like.kind, LikeKind::Contains);
    assert_eq!(like.literal, "VNEXT");

    let between = &set.betweens[0];
    assert_eq!((between.alias.as_str(), between.column.as_str()), ("p", "price"));
    assert_eq!(between.value_type, RangeType::Numeric);
    assert_eq!((between.low.as_str(), between.high.as_str()), ("100", "500"));

    let key = set
        .joins
        .iter()
        .find(|join| join.source == JoinConditionSource::JoinKey)
        .expect("join key");
    assert_eq!(key.column_pair(), Some((("p", "company_id"), ("c", "id"))));

    assert_eq!(
        parser.extract_tables(&sql),
        vec!["companies".to_string(), "products".to_string()]
    );
}

#[test]
fn active_users_query_covers_every_collection() {
    let set = PatternParser.extract_constraints(&load_query("active_users.sql"));

    assert_eq!(set.booleans.len(), 1);
    assert!(set.booleans[0].value);
    assert_eq!(set.nulls.len(), 1);
    assert!(!set.nulls[0].is_null);
    assert_eq!(set.dates[0].kind, DateConstraintKind::DateInterval);
    assert_eq!(set.dates[0].value, "30_DAY");
    assert!(matches!(set.ins[0].values, InValues::Text(_)));
    assert!(set.exists[0].negated);
    assert!(set.exists[0].subquery.to_uppercase().starts_with("SELECT"));
    assert!(
        set.values
            .iter()
            .any(|value| value.source == ConstraintSource::JoinOn)
    );
}

#[test]
fn serialized_constraint_set_matches_its_json_schema() {
    let set = PatternParser.extract_constraints(&load_query("active_users.sql"));
    let instance = serde_json::to_value(&set).expect("serialize constraints");
    let schema = serde_json::to_value(constraint_set_json_schema()).expect("serialize schema");
    let compiled = JSONSchema::compile(&schema).expect("compile schema");

    assert!(compiled.is_valid(&instance));
}
