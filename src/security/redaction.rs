//! Secret scrubbing for outbound tool results.
//!
//! Two passes over a JSON value: scalar values under sensitive keys are
//! replaced wholesale, and every remaining string is scanned for well-known
//! token shapes (JWTs, API keys, bearer tokens). Both passes leave
//! `[REDACTED]` untouched, so redaction is idempotent.

use serde_json::Value;
use std::borrow::Cow;
use std::ops::Range;

pub const REDACTED: &str = "[REDACTED]";

const SENSITIVE_KEY_PARTS: [&str; 18] = [
    "pass",
    "token",
    "secret",
    "api_key",
    "api-key",
    "apikey",
    "auth",
    "cookie",
    "session",
    "bearer",
    "credential",
    "otp",
    "ssn",
    "credit",
    "card",
    "cvv",
    "private_key",
    "privatekey",
];

/// Case-insensitive substring match against the sensitive key vocabulary.
pub fn is_sensitive_key(key: &str) -> bool {
    let key = key.to_ascii_lowercase();
    SENSITIVE_KEY_PARTS.iter().any(|part| key.contains(part))
}

/// Redact `value` in place.
pub fn redact_value(value: &mut Value) {
    redact_node(value, false);
}

/// Redacted copy of `value`.
pub fn redacted(value: &Value) -> Value {
    let mut copy = value.clone();
    redact_value(&mut copy);
    copy
}

fn redact_node(value: &mut Value, sensitive: bool) {
    match value {
        Value::String(s) => {
            if sensitive {
                if s.as_str() != REDACTED {
                    *s = REDACTED.to_string();
                }
            } else if let Cow::Owned(scrubbed) = redact_text(s) {
                *s = scrubbed;
            }
        }
        Value::Number(_) if sensitive => *value = Value::String(REDACTED.to_string()),
        Value::Array(items) => {
            for item in items {
                redact_node(item, sensitive);
            }
        }
        Value::Object(map) => {
            for (key, child) in map.iter_mut() {
                redact_node(child, is_sensitive_key(key));
            }
        }
        Value::Null | Value::Bool(_) | Value::Number(_) => {}
    }
}

// ─── Token scanning ──────────────────────────────────────────────────────────

struct TokenRule {
    marker: &'static str,
    /// Minimum characters after the marker
    min_len: usize,
    is_token_char: fn(char) -> bool,
    /// Keep the marker text and redact only what follows it
    keep_marker: bool,
    validate: Option<fn(&str) -> bool>,
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_')
}

fn is_jwt_char(c: char) -> bool {
    is_key_char(c) || c == '.'
}

fn is_bearer_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~' | '+' | '/' | '=')
}

fn is_upper_alnum(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit()
}

fn looks_like_jwt(token: &str) -> bool {
    let token = token.trim_end_matches('.');
    let parts: Vec<&str> = token.split('.').collect();
    parts.len() == 3 && parts.iter().all(|p| !p.is_empty())
}

/// Slack tokens: `xox` followed by a kind letter and a dash.
fn looks_like_slack(token: &str) -> bool {
    matches!(
        token.as_bytes().get(3..5),
        Some([b'a' | b'b' | b'p' | b'o' | b's' | b'r', b'-'])
    )
}

const RULES: [TokenRule; 11] = [
    TokenRule {
        marker: "eyJ",
        min_len: 10,
        is_token_char: is_jwt_char,
        keep_marker: false,
        validate: Some(looks_like_jwt),
    },
    TokenRule {
        marker: "sk-",
        min_len: 16,
        is_token_char: is_key_char,
        keep_marker: false,
        validate: None,
    },
    TokenRule {
        marker: "ghp_",
        min_len: 20,
        is_token_char: is_key_char,
        keep_marker: false,
        validate: None,
    },
    TokenRule {
        marker: "gho_",
        min_len: 20,
        is_token_char: is_key_char,
        keep_marker: false,
        validate: None,
    },
    TokenRule {
        marker: "ghu_",
        min_len: 20,
        is_token_char: is_key_char,
        keep_marker: false,
        validate: None,
    },
    TokenRule {
        marker: "ghs_",
        min_len: 20,
        is_token_char: is_key_char,
        keep_marker: false,
        validate: None,
    },
    TokenRule {
        marker: "ghr_",
        min_len: 20,
        is_token_char: is_key_char,
        keep_marker: false,
        validate: None,
    },
    TokenRule {
        marker: "github_pat_",
        min_len: 20,
        is_token_char: is_key_char,
        keep_marker: false,
        validate: None,
    },
    TokenRule {
        marker: "xox",
        min_len: 10,
        is_token_char: is_key_char,
        keep_marker: false,
        validate: Some(looks_like_slack),
    },
    TokenRule {
        marker: "AKIA",
        min_len: 16,
        is_token_char: is_upper_alnum,
        keep_marker: false,
        validate: None,
    },
    TokenRule {
        marker: "Bearer ",
        min_len: 8,
        is_token_char: is_bearer_char,
        keep_marker: true,
        validate: None,
    },
];

fn token_end(input: &str, from: usize, is_token_char: fn(char) -> bool) -> usize {
    input[from..]
        .char_indices()
        .find(|(_, c)| !is_token_char(*c))
        .map_or(input.len(), |(i, _)| from + i)
}

fn at_word_start(input: &str, start: usize) -> bool {
    input[..start]
        .chars()
        .next_back()
        .is_none_or(|c| !c.is_ascii_alphanumeric() && c != '_')
}

fn rule_matches(input: &str, rule: &TokenRule, out: &mut Vec<Range<usize>>) {
    let mut search_from = 0;
    while let Some(rel) = input[search_from..].find(rule.marker) {
        let start = search_from + rel;
        let content_start = start + rule.marker.len();
        let end = token_end(input, content_start, rule.is_token_char);
        search_from = content_start;

        if !at_word_start(input, start) || end - content_start < rule.min_len {
            continue;
        }
        if let Some(validate) = rule.validate
            && !validate(&input[start..end])
        {
            continue;
        }
        out.push(if rule.keep_marker {
            content_start..end
        } else {
            start..end
        });
        search_from = end;
    }
}

/// Replace token-shaped secrets inside free text.
pub fn redact_text(input: &str) -> Cow<'_, str> {
    let mut ranges = Vec::new();
    for rule in &RULES {
        rule_matches(input, rule, &mut ranges);
    }
    if ranges.is_empty() {
        return Cow::Borrowed(input);
    }

    ranges.sort_by_key(|r| r.start);
    let mut out = String::with_capacity(input.len());
    let mut cursor = 0;
    for range in ranges {
        if range.start < cursor {
            // Overlaps a range already replaced.
            cursor = cursor.max(range.end);
            continue;
        }
        out.push_str(&input[cursor..range.start]);
        out.push_str(REDACTED);
        cursor = range.end;
    }
    out.push_str(&input[cursor..]);
    Cow::Owned(out)
}
