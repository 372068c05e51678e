use crate::model::LikeKind;

/// One element of a LIKE pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LikeToken {
    /// `%`: any run of characters, possibly empty.
    Any,
    /// `_`: exactly one character.
    One,
    Char(char),
}

/// Split a LIKE pattern into tokens; `\` escapes the next character.
pub fn tokenize(pattern: &str) -> Vec<LikeToken> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '%' => tokens.push(LikeToken::Any),
            '_' => tokens.push(LikeToken::One),
            '\\' => match chars.next() {
                Some(escaped) => tokens.push(LikeToken::Char(escaped)),
                None => tokens.push(LikeToken::Char('\\')),
            },
            other => tokens.push(LikeToken::Char(other)),
        }
    }
    tokens
}

/// Classify a pattern by its edge wildcards and return the fixed text it carries.
pub fn classify_like(pattern: &str) -> (LikeKind, String) {
    let tokens = tokenize(pattern);
    let start = tokens
        .iter()
        .position(|t| *t != LikeToken::Any)
        .unwrap_or(tokens.len());
    let end = tokens
        .iter()
        .rposition(|t| *t != LikeToken::Any)
        .map(|idx| idx + 1)
        .unwrap_or(start);
    let core = &tokens[start..end.max(start)];
    if core.is_empty() && !tokens.is_empty() {
        return (LikeKind::Contains, String::new());
    }

    let leading = start > 0;
    let trailing = end < tokens.len();
    let plain = core.iter().all(|t| matches!(t, LikeToken::Char(_)));
    let literal: String = core
        .iter()
        .filter_map(|t| match t {
            LikeToken::Char(c) => Some(*c),
            _ => None,
        })
        .collect();

    if !plain {
        return (LikeKind::Pattern, literal);
    }

    let kind = match (leading, trailing) {
        (false, false) => LikeKind::Exact,
        (false, true) => LikeKind::StartsWith,
        (true, false) => LikeKind::EndsWith,
        (true, true) => LikeKind::Contains,
    };
    (kind, literal)
}

/// Full LIKE match with `%` and `_`, case-sensitive.
pub fn like_matches(pattern: &str, value: &str) -> bool {
    let tokens = tokenize(pattern);
    let chars: Vec<char> = value.chars().collect();

    // dp[j]: tokens[..i] match chars[..j]
    let mut dp = vec![false; chars.len() + 1];
    dp[0] = true;
    for token in &tokens {
        let mut next = vec![false; chars.len() + 1];
        match token {
            LikeToken::Any => {
                let mut reachable = false;
                for j in 0..=chars.len() {
                    reachable |= dp[j];
                    next[j] = reachable;
                }
            }
            LikeToken::One => {
                for j in 1..=chars.len() {
                    next[j] = dp[j - 1];
                }
            }
            LikeToken::Char(expected) => {
                for j in 1..=chars.len() {
                    next[j] = dp[j - 1] && chars[j - 1] == *expected;
                }
            }
        }
        dp = next;
    }
    dp[chars.len()]
}
