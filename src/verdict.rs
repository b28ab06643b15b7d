//! Validation of model output into a typed verdict
//!
//! The model is asked for `{"prohibited_in": [...], "restricted_in": [...]}`
//! but may wrap it in markdown fences, surround it with prose, or echo the
//! relaxed literal style (bare keys, single quotes). All of those are
//! accepted; anything that does not yield two lists of ISO alpha-2 codes is
//! rejected as malformed.

use serde::{Deserialize, Serialize};

use crate::error::CompletionError;

/// Countries the model reported for the queried item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingVerdict {
    pub prohibited_in: Vec<String>,
    pub restricted_in: Vec<String>,
}

#[derive(Deserialize)]
struct RawVerdict {
    prohibited_in: Vec<String>,
    restricted_in: Vec<String>,
}

impl ShippingVerdict {
    /// Parse and validate raw model text
    pub fn parse(raw: &str) -> Result<Self, CompletionError> {
        let cleaned = strip_fences(raw);
        let candidate = extract_object(cleaned)
            .ok_or_else(|| CompletionError::malformed("no JSON object in response", raw))?;

        let parsed: RawVerdict = match serde_json::from_str(candidate) {
            Ok(v) => v,
            Err(strict_err) => serde_json::from_str(&relax(candidate)).map_err(|_| {
                CompletionError::malformed(format!("invalid verdict JSON: {}", strict_err), raw)
            })?,
        };

        Ok(Self {
            prohibited_in: normalize_codes(parsed.prohibited_in, raw)?,
            restricted_in: normalize_codes(parsed.restricted_in, raw)?,
        })
    }

    pub fn is_clear(&self) -> bool {
        self.prohibited_in.is_empty() && self.restricted_in.is_empty()
    }
}

fn strip_fences(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

fn extract_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Rewrite the relaxed literal style into strict JSON: quote bare keys and
/// turn single-quoted strings into double-quoted ones.
fn relax(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    let mut chars = text.chars().peekable();
    let mut in_double = false;

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_double = !in_double;
                out.push(c);
            }
            '\\' if in_double => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '\'' if !in_double => {
                out.push('"');
                while let Some(inner) = chars.next() {
                    match inner {
                        '\'' => break,
                        '\\' => match chars.next() {
                            // \' needs no escape once the string is double-quoted
                            Some('\'') => out.push('\''),
                            Some(next) => {
                                out.push('\\');
                                out.push(next);
                            }
                            None => out.push_str("\\\\"),
                        },
                        '"' => out.push_str("\\\""),
                        _ => out.push(inner),
                    }
                }
                out.push('"');
            }
            c if !in_double && (c.is_ascii_alphabetic() || c == '_') => {
                let mut ident = String::from(c);
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        ident.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match ident.as_str() {
                    "true" | "false" | "null" => out.push_str(&ident),
                    _ => {
                        out.push('"');
                        out.push_str(&ident);
                        out.push('"');
                    }
                }
            }
            _ => out.push(c),
        }
    }

    out
}

fn normalize_codes(codes: Vec<String>, raw: &str) -> Result<Vec<String>, CompletionError> {
    codes
        .into_iter()
        .map(|code| {
            let code = code.trim().to_ascii_uppercase();
            if code.len() == 2 && code.chars().all(|c| c.is_ascii_alphabetic()) {
                Ok(code)
            } else {
                Err(CompletionError::malformed(
                    format!("'{}' is not an ISO 3166-1 alpha-2 code", code),
                    raw,
                ))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strict_json() {
        let verdict =
            ShippingVerdict::parse(r#"{"prohibited_in": ["IN"], "restricted_in": ["CN", "US"]}"#)
                .unwrap();
        assert_eq!(verdict.prohibited_in, vec!["IN"]);
        assert_eq!(verdict.restricted_in, vec!["CN", "US"]);
        assert!(!verdict.is_clear());
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "```json\n{\"prohibited_in\": [], \"restricted_in\": [\"cn\"]}\n```";
        let verdict = ShippingVerdict::parse(raw).unwrap();
        assert!(verdict.prohibited_in.is_empty());
        assert_eq!(verdict.restricted_in, vec!["CN"]);
    }

    #[test]
    fn test_parse_relaxed_literal_style() {
        let verdict = ShippingVerdict::parse("{prohibited_in: ['IN'], restricted_in: ['CN']}").unwrap();
        assert_eq!(verdict.prohibited_in, vec!["IN"]);
        assert_eq!(verdict.restricted_in, vec!["CN"]);
    }

    #[test]
    fn test_parse_json_surrounded_by_prose() {
        let raw = "Here you go:\n{\"prohibited_in\": [\"PK\"], \"restricted_in\": []}\nStay safe.";
        assert_eq!(ShippingVerdict::parse(raw).unwrap().prohibited_in, vec!["PK"]);
    }

    #[test]
    fn test_empty_lists_are_clear() {
        let verdict = ShippingVerdict::parse(r#"{"prohibited_in": [], "restricted_in": []}"#).unwrap();
        assert!(verdict.is_clear());
    }

    #[test]
    fn test_plain_prose_is_malformed() {
        let err = ShippingVerdict::parse("I cannot help with that.").unwrap_err();
        match err {
            CompletionError::MalformedOutput { raw, .. } => {
                assert_eq!(raw, "I cannot help with that.")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_missing_field_is_malformed() {
        assert!(matches!(
            ShippingVerdict::parse(r#"{"prohibited_in": ["IN"]}"#),
            Err(CompletionError::MalformedOutput { .. })
        ));
    }

    #[test]
    fn test_country_names_are_rejected() {
        let err = ShippingVerdict::parse(r#"{"prohibited_in": ["India"], "restricted_in": []}"#)
            .unwrap_err();
        assert!(err.to_string().contains("INDIA"));
    }

    #[test]
    fn test_relax_keeps_escaped_quotes_in_strings() {
        let relaxed = relax(r#"{note: "say \"hi\"", list: ['a']}"#);
        let value: serde_json::Value = serde_json::from_str(&relaxed).unwrap();
        assert_eq!(value["note"], "say \"hi\"");
        assert_eq!(value["list"][0], "a");
    }

    #[test]
    fn test_relax_handles_escapes_in_single_quotes() {
        let relaxed = relax(r#"{note: 'it\'s "fine"', path: 'a\\b'}"#);
        let value: serde_json::Value = serde_json::from_str(&relaxed).unwrap();
        assert_eq!(value["note"], "it's \"fine\"");
        assert_eq!(value["path"], "a\\b");
    }

    #[test]
    fn test_single_quoted_reply_with_escaped_apostrophe() {
        let verdict = ShippingVerdict::parse(
            r#"{'prohibited_in': ['IN'], 'restricted_in': ['cn'], 'reason': 'India\'s ban'}"#,
        )
        .unwrap();
        assert_eq!(verdict.prohibited_in, vec!["IN"]);
        assert_eq!(verdict.restricted_in, vec!["CN"]);
    }
}
