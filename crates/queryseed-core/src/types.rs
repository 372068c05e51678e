use std::fmt;
use std::str::FromStr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Logical column type, independent of the engine's native spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    String,
    Integer,
    Decimal,
    Float,
    Date,
    DateTime,
    Time,
    Boolean,
    Uuid,
    Binary,
    Other,
}

impl DataType {
    /// Map a native type (`varchar(255)`, `NUMBER(10,2)`, `tinyint(1)`) to a logical type.
    pub fn from_native(native: &str) -> Self {
        let lower = native.trim().to_ascii_lowercase();
        let base = lower
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or("");

        match base {
            "tinyint" if lower.starts_with("tinyint(1)") => DataType::Boolean,
            "bit" if lower == "bit" || lower == "bit(1)" => DataType::Boolean,
            "bool" | "boolean" => DataType::Boolean,
            "char" | "varchar" | "varchar2" | "nchar" | "nvarchar" | "nvarchar2" | "character"
            | "text" | "tinytext" | "mediumtext" | "longtext" | "clob" | "nclob" | "enum"
            | "set" | "json" | "jsonb" | "string" | "citext" => DataType::String,
            "tinyint" | "smallint" | "mediumint" | "int" | "integer" | "bigint" | "int2"
            | "int4" | "int8" | "serial" | "bigserial" | "smallserial" | "pls_integer"
            | "binary_integer" | "year" => DataType::Integer,
            "number" => match numeric_args(&lower) {
                Some((_, Some(scale))) if scale > 0 => DataType::Decimal,
                Some(_) => DataType::Integer,
                None => DataType::Decimal,
            },
            "decimal" | "numeric" | "dec" | "money" => DataType::Decimal,
            "float" | "double" | "real" | "binary_float" | "binary_double" | "float4"
            | "float8" => DataType::Float,
            "date" => DataType::Date,
            "datetime" | "datetime2" | "timestamp" | "timestamptz" | "smalldatetime" => {
                DataType::DateTime
            }
            "time" | "timetz" => DataType::Time,
            "uuid" | "uniqueidentifier" => DataType::Uuid,
            "blob" | "tinyblob" | "mediumblob" | "longblob" | "binary" | "varbinary"
            | "bytea" | "raw" | "bit" => DataType::Binary,
            _ => DataType::Other,
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, DataType::Integer | DataType::Decimal | DataType::Float)
    }

    pub fn is_temporal(self) -> bool {
        matches!(self, DataType::Date | DataType::DateTime | DataType::Time)
    }

    /// Types whose values are free-form text and benefit from semantic generation.
    pub fn is_textual(self) -> bool {
        matches!(self, DataType::String | DataType::Other)
    }
}

fn numeric_args(native: &str) -> Option<(u32, Option<u32>)> {
    let open = native.find('(')?;
    let close = native[open..].find(')')? + open;
    let mut parts = native[open + 1..close].split(',');
    let precision = parts.next()?.trim().parse().ok()?;
    let scale = parts.next().and_then(|part| part.trim().parse().ok());
    Some((precision, scale))
}

/// Target SQL dialect for literal rendering and schema providers.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum Dialect {
    #[default]
    #[serde(rename = "mysql")]
    MySql,
    #[serde(rename = "oracle")]
    Oracle,
    #[serde(rename = "postgres")]
    Postgres,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Oracle => "oracle",
            Dialect::Postgres => "postgres",
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Dialect::MySql),
            "oracle" => Ok(Dialect::Oracle),
            "postgres" | "postgresql" | "pg" => Ok(Dialect::Postgres),
            other => Err(Error::Unsupported(format!("unknown dialect '{other}'"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_native_types() {
        assert_eq!(DataType::from_native("varchar(255)"), DataType::String);
        assert_eq!(DataType::from_native("VARCHAR2(100 CHAR)"), DataType::String);
        assert_eq!(DataType::from_native("tinyint(1)"), DataType::Boolean);
        assert_eq!(DataType::from_native("tinyint(4)"), DataType::Integer);
        assert_eq!(DataType::from_native("NUMBER(10,2)"), DataType::Decimal);
        assert_eq!(DataType::from_native("NUMBER(10)"), DataType::Integer);
        assert_eq!(DataType::from_native("NUMBER"), DataType::Decimal);
        assert_eq!(DataType::from_native("decimal(12,2)"), DataType::Decimal);
        assert_eq!(DataType::from_native("datetime"), DataType::DateTime);
        assert_eq!(
            DataType::from_native("timestamp with time zone"),
            DataType::DateTime
        );
        assert_eq!(DataType::from_native("DATE"), DataType::Date);
        assert_eq!(DataType::from_native("geometry"), DataType::Other);
    }

    #[test]
    fn parses_dialects() {
        assert_eq!("MySQL".parse::<Dialect>().unwrap(), Dialect::MySql);
        assert_eq!("oracle".parse::<Dialect>().unwrap(), Dialect::Oracle);
        assert_eq!("postgresql".parse::<Dialect>().unwrap(), Dialect::Postgres);
        assert!("sqlite".parse::<Dialect>().is_err());
    }
}
