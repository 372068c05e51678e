use queryseed_core::{DatabaseInfo, Dialect};

#[test]
fn serializes_snapshot_deterministically() {
    let info = DatabaseInfo::new(Dialect::Oracle, Some("hr".to_string()));

    let json = serde_json::to_string_pretty(&info).expect("serialize snapshot");
    let expected = r#"{
  "schema_version": "0.1",
  "dialect": "oracle",
  "database": "hr",
  "tables": {}
}"#;
    assert_eq!(json, expected);
}

#[test]
fn column_flags_default_when_omitted() {
    let raw = r#"{
  "dialect": "mysql",
  "tables": {
    "users": {
      "name": "users",
      "columns": [{ "name": "email", "data_type": "string", "max_length": 120 }]
    }
  }
}"#;
    let info: DatabaseInfo = serde_json::from_str(raw).expect("parse snapshot");
    let column = info.table("users").and_then(|t| t.column("email")).expect("column");

    assert_eq!(info.schema_version, "0.1");
    assert!(column.is_nullable);
    assert!(!column.is_primary_key);
    assert!(!column.is_identity);
    assert_eq!(column.max_length, Some(120));
}
