//! Dynamic argument/environment template grammar: `value::'Label'`
//! (required) and `value::'Label';;'default'` (optional with a default).
//! Anything not matching the `value::` prefix is a fixed literal.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// One parsed `args`/`environment` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgToken {
    /// A literal value, passed through unchanged.
    Fixed(String),
    /// A user-fillable slot, with an optional default applied when the
    /// user leaves the field blank.
    Slot { label: String, default: Option<String> },
}

/// Parse a single raw `args`/`environment` value into its template token.
/// Grammar: `value::'Label'` or `value::'Label';;'default'`. Labels and
/// defaults are single-quoted; no escaping is supported (the grammar is
/// deliberately closed).
pub fn parse(raw: &str) -> Result<ArgToken> {
    let Some(rest) = raw.strip_prefix("value::") else {
        return Ok(ArgToken::Fixed(raw.to_string()));
    };

    let (label, after_label) = parse_quoted(rest).ok_or_else(|| Error::MalformedTemplate {
        field: raw.to_string(),
        reason: "expected a single-quoted label after 'value::'".into(),
    })?;

    let default = match after_label.strip_prefix(";;") {
        None if after_label.is_empty() => None,
        None => {
            return Err(Error::MalformedTemplate {
                field: raw.to_string(),
                reason: format!("unexpected trailing content '{after_label}'"),
            });
        },
        Some(default_part) => {
            let (default, tail) = parse_quoted(default_part).ok_or_else(|| Error::MalformedTemplate {
                field: raw.to_string(),
                reason: "expected a single-quoted default after ';;'".into(),
            })?;
            if !tail.is_empty() {
                return Err(Error::MalformedTemplate {
                    field: raw.to_string(),
                    reason: format!("unexpected trailing content '{tail}'"),
                });
            }
            Some(default)
        },
    };

    Ok(ArgToken::Slot { label, default })
}

/// Parses a leading `'...'` quoted span, returning its content and
/// whatever remains after the closing quote.
fn parse_quoted(s: &str) -> Option<(String, &str)> {
    let body = s.strip_prefix('\'')?;
    let end = body.find('\'')?;
    Some((body[..end].to_string(), &body[end + 1..]))
}

/// Resolve a parsed token against user-supplied slot values, applying the
/// default iff the user left the field blank.
pub fn resolve(token: &ArgToken, user_values: &HashMap<String, String>) -> Option<String> {
    match token {
        ArgToken::Fixed(value) => Some(value.clone()),
        ArgToken::Slot { label, default } => {
            match user_values.get(label).map(String::as_str) {
                Some(value) if !value.trim().is_empty() => Some(value.to_string()),
                _ => default.clone(),
            }
        },
    }
}

/// Parse and resolve every value in a list in one pass, dropping any slot
/// whose resolution yields `None` (required slot left blank, no default).
pub fn resolve_all(raw_values: &[String], user_values: &HashMap<String, String>) -> Result<Vec<String>> {
    raw_values
        .iter()
        .map(|raw| parse(raw).map(|token| resolve(&token, user_values)))
        .filter_map(|r| match r {
            Ok(Some(value)) => Some(Ok(value)),
            Ok(None) => None,
            Err(e) => Some(Err(e)),
        })
        .collect()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_value_passes_through() {
        assert_eq!(parse("--verbose").unwrap(), ArgToken::Fixed("--verbose".into()));
    }

    #[test]
    fn required_slot_parses_label() {
        assert_eq!(
            parse("value::'API Key'").unwrap(),
            ArgToken::Slot { label: "API Key".into(), default: None }
        );
    }

    #[test]
    fn optional_slot_parses_default() {
        assert_eq!(
            parse("value::'Port';;'8080'").unwrap(),
            ArgToken::Slot { label: "Port".into(), default: Some("8080".into()) }
        );
    }

    #[test]
    fn malformed_slot_is_an_error() {
        assert!(parse("value::Port").is_err());
        assert!(parse("value::'Port';;8080").is_err());
    }

    #[test]
    fn resolve_prefers_user_value_over_default() {
        let token = parse("value::'Port';;'8080'").unwrap();
        let mut values = HashMap::new();
        values.insert("Port".to_string(), "9090".to_string());
        assert_eq!(resolve(&token, &values).as_deref(), Some("9090"));
    }

    #[test]
    fn resolve_falls_back_to_default_when_blank() {
        let token = parse("value::'Port';;'8080'").unwrap();
        let mut values = HashMap::new();
        values.insert("Port".to_string(), "   ".to_string());
        assert_eq!(resolve(&token, &values).as_deref(), Some("8080"));
    }

    #[test]
    fn resolve_required_slot_with_no_value_drops() {
        let raw = vec!["value::'Token'".to_string(), "--fixed".to_string()];
        let resolved = resolve_all(&raw, &HashMap::new()).unwrap();
        assert_eq!(resolved, vec!["--fixed".to_string()]);
    }
}
