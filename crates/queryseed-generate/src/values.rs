use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Generated value for a column.
#[derive(Debug, Clone, PartialEq)]
pub enum GeneratedValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Uuid(String),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
}

impl GeneratedValue {
    pub fn is_null(&self) -> bool {
        matches!(self, GeneratedValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            GeneratedValue::Int(value) => Some(*value as f64),
            GeneratedValue::Float(value) => Some(*value),
            GeneratedValue::Bool(value) => Some(if *value { 1.0 } else { 0.0 }),
            GeneratedValue::Text(value) => value.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            GeneratedValue::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            GeneratedValue::Bool(value) => Some(*value),
            GeneratedValue::Int(value) => Some(*value != 0),
            GeneratedValue::Float(value) => Some(*value != 0.0),
            GeneratedValue::Text(value) => match value.trim().to_ascii_lowercase().as_str() {
                "true" | "t" | "1" | "y" | "yes" => Some(true),
                "false" | "f" | "0" | "n" | "no" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            GeneratedValue::Text(value) | GeneratedValue::Uuid(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            GeneratedValue::Date(value) => Some(*value),
            GeneratedValue::Timestamp(value) => Some(value.date()),
            GeneratedValue::Text(value) => crate::temporal::parse_datetime(value).map(|dt| dt.date()),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            GeneratedValue::Date(value) => Some(value.and_time(NaiveTime::MIN)),
            GeneratedValue::Timestamp(value) => Some(*value),
            GeneratedValue::Text(value) => crate::temporal::parse_datetime(value),
            _ => None,
        }
    }

    /// Canonical text used for matching, LIKE checks and key bookkeeping.
    pub fn to_text(&self) -> String {
        match self {
            GeneratedValue::Null => String::new(),
            GeneratedValue::Bool(value) => value.to_string(),
            GeneratedValue::Int(value) => value.to_string(),
            GeneratedValue::Float(value) => value.to_string(),
            GeneratedValue::Text(value) | GeneratedValue::Uuid(value) => value.clone(),
            GeneratedValue::Date(value) => value.format("%Y-%m-%d").to_string(),
            GeneratedValue::Time(value) => value.format("%H:%M:%S").to_string(),
            GeneratedValue::Timestamp(value) => value.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Identity of the value for uniqueness and pool lookups.
    pub fn key(&self) -> String {
        match self {
            GeneratedValue::Null => "<null>".to_string(),
            GeneratedValue::Float(value) if value.fract() == 0.0 && value.is_finite() => {
                format!("{}", *value as i64)
            }
            other => other.to_text(),
        }
    }
}
