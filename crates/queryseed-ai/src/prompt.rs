use queryseed_core::DataType;

/// What the generator knows about the column it needs a value for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueHint {
    pub table: String,
    pub column: String,
    pub data_type: DataType,
    pub max_length: Option<u32>,
}

impl ValueHint {
    pub fn new(table: impl Into<String>, column: impl Into<String>, data_type: DataType) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
            data_type,
            max_length: None,
        }
    }

    pub fn with_max_length(mut self, max_length: Option<u32>) -> Self {
        self.max_length = max_length;
        self
    }
}

pub fn build_prompt(hint: &ValueHint) -> String {
    let mut prompt = format!(
        "Generate one realistic value for the column \"{}\" of the table \"{}\" ({:?}).",
        hint.column, hint.table, hint.data_type
    );
    if let Some(limit) = hint.max_length {
        prompt.push_str(&format!(" At most {limit} characters."));
    }
    prompt.push_str(" Reply with the value only, no quotes and no explanation.");
    prompt
}

/// Reduce a completion to a single bare value.
///
/// Keeps the first non-empty line, drops wrapping quotes or backticks and
/// truncates to the column length.
pub fn clean_completion(raw: &str, max_length: Option<u32>) -> Option<String> {
    let line = raw.lines().map(str::trim).find(|line| !line.is_empty())?;
    let mut value = line;
    for (open, close) in [('"', '"'), ('\'', '\''), ('`', '`')] {
        if value.len() >= 2 && value.starts_with(open) && value.ends_with(close) {
            value = value[1..value.len() - 1].trim();
        }
    }
    if value.is_empty() {
        return None;
    }

    let value = match max_length {
        Some(limit) => value.chars().take(limit as usize).collect(),
        None => value.to_string(),
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_names_column_and_limit() {
        let hint = ValueHint::new("companies", "name", DataType::String).with_max_length(Some(40));
        let prompt = build_prompt(&hint);
        assert!(prompt.contains("\"name\""));
        assert!(prompt.contains("\"companies\""));
        assert!(prompt.contains("At most 40 characters"));
    }

    #[test]
    fn cleans_quotes_and_extra_lines() {
        assert_eq!(
            clean_completion("\n  \"Nordwind Logistics\"\nHere is your value", None),
            Some("Nordwind Logistics".to_string())
        );
        assert_eq!(clean_completion("`abc`", Some(2)), Some("ab".to_string()));
        assert_eq!(clean_completion("   \n ''", None), None);
    }
}
