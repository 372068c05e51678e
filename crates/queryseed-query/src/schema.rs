use schemars::schema::RootSchema;
use schemars::schema_for;

use crate::model::ConstraintSet;

/// Emit the JSON Schema for a serialized `ConstraintSet`.
pub fn constraint_set_json_schema() -> RootSchema {
    schema_for!(ConstraintSet)
}
