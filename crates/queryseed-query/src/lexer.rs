use once_cell::sync::Lazy;
use regex::{Captures, Regex};

static LITERAL_TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"'(\d+)'").unwrap());
static SUBQUERY_TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"@(\d+)").unwrap());
static PLACEHOLDER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"'(\d+)'|@(\d+)").unwrap());
static SUBQUERY_START_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\(\s*(?:SELECT|WITH)\b").unwrap());

/// SQL text with string literals and subqueries replaced by placeholders.
///
/// A literal becomes `'N'` where `N` indexes [`MaskedSql::literals`]; a
/// parenthesized subquery becomes `(@N)` indexing [`MaskedSql::subqueries`].
/// Identifier quotes are dropped when the quoted name is a plain word.
#[derive(Debug, Clone, Default)]
pub struct MaskedSql {
    pub text: String,
    /// Unescaped literal contents.
    pub literals: Vec<String>,
    /// Raw subquery bodies with literals restored.
    pub subqueries: Vec<String>,
}

impl MaskedSql {
    /// Contents of a `'N'` literal placeholder.
    pub fn literal(&self, token: &str) -> Option<&str> {
        let caps = LITERAL_TOKEN_RE.captures(token.trim())?;
        let idx: usize = caps.get(1)?.as_str().parse().ok()?;
        self.literals.get(idx).map(String::as_str)
    }

    /// Body of a `@N` subquery placeholder.
    pub fn subquery(&self, token: &str) -> Option<&str> {
        let caps = SUBQUERY_TOKEN_RE.captures(token.trim())?;
        let idx: usize = caps.get(1)?.as_str().parse().ok()?;
        self.subqueries.get(idx).map(String::as_str)
    }

    /// Put literals and subqueries back into a fragment of [`MaskedSql::text`].
    pub fn restore(&self, fragment: &str) -> String {
        PLACEHOLDER_RE
            .replace_all(fragment, |caps: &Captures| {
                if let Some(idx) = caps.get(1).and_then(|m| m.as_str().parse::<usize>().ok()) {
                    if let Some(value) = self.literals.get(idx) {
                        return quote_literal(value);
                    }
                }
                if let Some(idx) = caps.get(2).and_then(|m| m.as_str().parse::<usize>().ok()) {
                    if let Some(body) = self.subqueries.get(idx) {
                        return body.clone();
                    }
                }
                caps[0].to_string()
            })
            .into_owned()
    }
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn restore_literals(fragment: &str, literals: &[String]) -> String {
    LITERAL_TOKEN_RE
        .replace_all(fragment, |caps: &Captures| {
            caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|idx| literals.get(idx))
                .map(|value| quote_literal(value))
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Remove `--` and `/* */` comments, leaving quoted text untouched.
pub fn strip_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' | '"' | '`' => {
                out.push(ch);
                copy_quoted(ch, &mut chars, &mut out);
            }
            '-' if chars.peek() == Some(&'-') => {
                for next in chars.by_ref() {
                    if next == '\n' {
                        out.push('\n');
                        break;
                    }
                }
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                out.push(' ');
            }
            other => out.push(other),
        }
    }

    out
}

fn copy_quoted(
    quote: char,
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
    out: &mut String,
) {
    while let Some(ch) = chars.next() {
        out.push(ch);
        if quote == '\'' && ch == '\\' {
            if let Some(escaped) = chars.next() {
                out.push(escaped);
            }
            continue;
        }
        if ch == quote {
            if chars.peek() == Some(&quote) {
                if let Some(doubled) = chars.next() {
                    out.push(doubled);
                }
                continue;
            }
            return;
        }
    }
}

/// Strip comments, then mask literals and subqueries.
pub fn mask(sql: &str) -> MaskedSql {
    let stripped = strip_comments(sql);
    let (text, literals) = mask_literals(&stripped);
    let (text, subqueries) = mask_subqueries(&text);
    let subqueries = subqueries
        .into_iter()
        .map(|body| restore_literals(&body, &literals))
        .collect();

    MaskedSql {
        text,
        literals,
        subqueries,
    }
}

fn mask_literals(sql: &str) -> (String, Vec<String>) {
    let mut out = String::with_capacity(sql.len());
    let mut literals = Vec::new();
    let mut chars = sql.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '\'' => {
                drop_national_prefix(&mut out);
                let mut value = String::new();
                while let Some(next) = chars.next() {
                    match next {
                        '\\' => match chars.next() {
                            Some('n') => value.push('\n'),
                            Some('t') => value.push('\t'),
                            Some(escaped) => value.push(escaped),
                            None => value.push('\\'),
                        },
                        '\'' if chars.peek() == Some(&'\'') => {
                            chars.next();
                            value.push('\'');
                        }
                        '\'' => break,
                        other => value.push(other),
                    }
                }
                out.push_str(&format!("'{}'", literals.len()));
                literals.push(value);
            }
            '"' | '`' => {
                let mut name = String::new();
                for next in chars.by_ref() {
                    if next == ch {
                        break;
                    }
                    name.push(next);
                }
                let plain = !name.is_empty()
                    && name.chars().all(|c| c.is_alphanumeric() || c == '_' || c == '$');
                if plain {
                    out.push_str(&name);
                } else {
                    out.push(ch);
                    out.push_str(&name);
                    out.push(ch);
                }
            }
            other => out.push(other),
        }
    }

    (out, literals)
}

fn drop_national_prefix(out: &mut String) {
    if !(out.ends_with('N') || out.ends_with('n')) {
        return;
    }
    let before = out[..out.len() - 1].chars().next_back();
    if before.is_none_or(|c| !(c.is_alphanumeric() || c == '_')) {
        out.pop();
    }
}

fn mask_subqueries(text: &str) -> (String, Vec<String>) {
    let bytes = text.as_bytes();
    let mut out = String::with_capacity(text.len());
    let mut bodies = Vec::new();
    let mut copied = 0;
    let mut idx = 0;

    while idx < bytes.len() {
        if bytes[idx] == b'(' && SUBQUERY_START_RE.is_match(&text[idx..]) {
            if let Some(close) = matching_paren(bytes, idx) {
                out.push_str(&text[copied..idx]);
                out.push_str(&format!("(@{})", bodies.len()));
                bodies.push(text[idx + 1..close].trim().to_string());
                idx = close + 1;
                copied = idx;
                continue;
            }
        }
        idx += 1;
    }

    out.push_str(&text[copied..]);
    (out, bodies)
}

/// Index of the `)` closing the `(` at `open`.
pub(crate) fn matching_paren(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, byte) in bytes[open..].iter().enumerate() {
        match byte {
            b'(' => depth += 1,
            b')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parenthesis depth before each byte of `text`.
pub(crate) fn depth_map(text: &str) -> Vec<usize> {
    let mut depth = 0usize;
    text.bytes()
        .map(|byte| {
            let current = depth;
            match byte {
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                _ => {}
            }
            current
        })
        .collect()
}

/// Split on top-level commas.
pub(crate) fn split_top_level_commas(text: &str) -> Vec<&str> {
    let depths = depth_map(text);
    let mut parts = Vec::new();
    let mut start = 0;
    for (idx, byte) in text.bytes().enumerate() {
        if byte == b',' && depths[idx] == 0 {
            parts.push(text[start..idx].trim());
            start = idx + 1;
        }
    }
    let tail = text[start..].trim();
    if !tail.is_empty() || !parts.is_empty() {
        parts.push(tail);
    }
    parts.retain(|part| !part.is_empty());
    parts
}

/// Remove parentheses wrapping the whole fragment.
pub(crate) fn strip_outer_parens(mut text: &str) -> &str {
    loop {
        let trimmed = text.trim();
        if !trimmed.starts_with('(') {
            return trimmed;
        }
        match matching_paren(trimmed.as_bytes(), 0) {
            Some(close) if close == trimmed.len() - 1 => text = &trimmed[1..close],
            _ => return trimmed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_comments_but_not_literals() {
        let sql = "SELECT a -- trailing\nFROM t /* block */ WHERE b = '--keep' AND c = '/*x*/'";
        let stripped = strip_comments(sql);
        assert!(!stripped.contains("trailing"));
        assert!(!stripped.contains("block"));
        assert!(stripped.contains("'--keep'"));
        assert!(stripped.contains("'/*x*/'"));
    }

    #[test]
    fn masks_literals_and_subqueries() {
        let masked = mask(
            "SELECT * FROM t WHERE name = 'O''Brien' AND id IN (SELECT x FROM y WHERE z = 'q')",
        );
        assert_eq!(masked.literals[0], "O'Brien");
        assert!(masked.text.contains("name = '0'"));
        assert!(masked.text.contains("IN (@0)"));
        assert_eq!(masked.subqueries[0], "SELECT x FROM y WHERE z = 'q'");
        assert_eq!(masked.literal("'0'"), Some("O'Brien"));
    }

    #[test]
    fn unquotes_plain_identifiers() {
        let masked = mask("SELECT `u`.`name` FROM \"users\" u");
        assert_eq!(masked.text, "SELECT u.name FROM users u");
    }

    #[test]
    fn restores_fragments() {
        let masked = mask("WHERE a = 'x' AND EXISTS (SELECT 1 FROM b WHERE c = 'it''s')");
        let restored = masked.restore(&masked.text);
        assert_eq!(
            restored,
            "WHERE a = 'x' AND EXISTS (SELECT 1 FROM b WHERE c = 'it''s')"
        );
    }
}
