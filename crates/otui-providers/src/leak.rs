//! Leak parsers for models that emit tool calls as text inside content
//! instead of (or in addition to) the adapter's native tool-call channel.
//!
//! Three shapes are recognized, tried in order:
//! 1. A JSON object or array containing `{"name", "arguments"|"param"|"parameters"|"input"}`.
//! 2. XML `<tool_call><name>…</name><arguments>…</arguments></tool_call>` or `<function_call>…</function_call>`.
//! 3. Qwen's `<function=NAME><parameter=K>V</parameter>…</function>`.
//!
//! Only surfaced when no native tool call was produced in the same turn.
//! `clean_leaked` always strips `<system-reminder>…</system-reminder>`
//! wrappers regardless of whether a leak matched.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::ToolCall;

fn build_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("built-in leak pattern must be valid regex: {e}"))
}

static TOOL_CALL_XML: Lazy<Regex> =
    Lazy::new(|| build_regex(r"(?s)<tool_call>\s*<name>(?P<name>.*?)</name>\s*<arguments>(?P<args>.*?)</arguments>\s*</tool_call>"));

static FUNCTION_CALL_XML: Lazy<Regex> = Lazy::new(|| build_regex(r"(?s)<function_call>(?P<body>.*?)</function_call>"));

static QWEN_FUNCTION: Lazy<Regex> = Lazy::new(|| build_regex(r"(?s)<function=(?P<name>[^>]+)>(?P<params>.*?)</function>"));

static QWEN_PARAMETER: Lazy<Regex> = Lazy::new(|| build_regex(r"(?s)<parameter=(?P<key>[^>]+)>(?P<value>.*?)</parameter>"));

static SYSTEM_REMINDER: Lazy<Regex> = Lazy::new(|| build_regex(r"(?s)<system-reminder>.*?</system-reminder>"));

/// A leaked call plus the byte span it occupied, so the caller can strip
/// exactly the matched substring and nothing else.
struct Leaked {
    call: ToolCall,
    span: (usize, usize),
}

/// Parse the first leaked tool call out of `content`, if any.
pub fn parse_leaked(content: &str) -> Option<ToolCall> {
    find_leaked(content).map(|l| l.call)
}

/// Strip the first leaked call's matched substring (if any) and every
/// `<system-reminder>` wrapper from `content`.
pub fn clean_leaked(content: &str) -> String {
    let mut cleaned = match find_leaked(content) {
        Some(leaked) => {
            let mut s = String::with_capacity(content.len());
            s.push_str(&content[..leaked.span.0]);
            s.push_str(&content[leaked.span.1..]);
            s
        },
        None => content.to_string(),
    };
    cleaned = SYSTEM_REMINDER.replace_all(&cleaned, "").into_owned();
    cleaned.trim().to_string()
}

/// Resolves one turn's fully-accumulated text into the tool call it leaked
/// (if any, and only when `search_for_leak` is true — a native tool call in
/// the same turn always wins) and the text that should actually be
/// displayed and persisted: the leaked substring stripped out, with
/// `<system-reminder>…</system-reminder>` wrappers always removed
/// regardless of whether a leak was found.
pub fn leak_and_clean(content: &str, search_for_leak: bool) -> (Option<ToolCall>, String) {
    if search_for_leak
        && let Some(leaked) = find_leaked(content)
    {
        let mut stripped = String::with_capacity(content.len());
        stripped.push_str(&content[..leaked.span.0]);
        stripped.push_str(&content[leaked.span.1..]);
        let cleaned = SYSTEM_REMINDER.replace_all(&stripped, "").trim().to_string();
        return (Some(leaked.call), cleaned);
    }
    let cleaned = SYSTEM_REMINDER.replace_all(content, "").trim().to_string();
    (None, cleaned)
}

fn find_leaked(content: &str) -> Option<Leaked> {
    parse_json_leak(content)
        .or_else(|| parse_tool_call_xml(content))
        .or_else(|| parse_function_call_xml(content))
        .or_else(|| parse_qwen_function(content))
}

fn extract_call_from_value(v: &serde_json::Value) -> Option<ToolCall> {
    let obj = v.as_object()?;
    let name = obj.get("name")?.as_str()?.to_string();
    let arguments = obj
        .get("arguments")
        .or_else(|| obj.get("param"))
        .or_else(|| obj.get("parameters"))
        .or_else(|| obj.get("input"))
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));
    Some(ToolCall { id: format!("leaked-{name}"), name, arguments })
}

fn parse_json_leak(content: &str) -> Option<Leaked> {
    let (start, end, value) = find_balanced_json(content)?;
    let call = match &value {
        serde_json::Value::Object(_) => extract_call_from_value(&value)?,
        serde_json::Value::Array(items) => items.iter().find_map(extract_call_from_value)?,
        _ => return None,
    };
    Some(Leaked { call, span: (start, end) })
}

/// Scan `content` for the first JSON object or array literal, matching
/// braces with string-aware depth counting, and return its span plus the
/// parsed value.
fn find_balanced_json(content: &str) -> Option<(usize, usize, serde_json::Value)> {
    let bytes = content.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' || bytes[i] == b'[' {
            if let Some(end) = scan_balanced(bytes, i) {
                if let Ok(value) = serde_json::from_str::<serde_json::Value>(&content[i..end]) {
                    return Some((i, end, value));
                }
            }
        }
        i += 1;
    }
    None
}

fn scan_balanced(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;
    for (offset, &c) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escape {
                escape = false;
            } else if c == b'\\' {
                escape = true;
            } else if c == b'"' {
                in_string = false;
            }
            continue;
        }
        match c {
            b'"' => in_string = true,
            b'{' | b'[' => depth += 1,
            b'}' | b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(offset + 1);
                }
            },
            _ => {},
        }
    }
    None
}

fn parse_tool_call_xml(content: &str) -> Option<Leaked> {
    let m = TOOL_CALL_XML.captures(content)?;
    let whole = m.get(0)?;
    let name = m.name("name")?.as_str().trim().to_string();
    let args_text = m.name("args")?.as_str().trim();
    let arguments = serde_json::from_str(args_text).unwrap_or_else(|_| serde_json::json!({}));
    Some(Leaked {
        call: ToolCall { id: format!("leaked-{name}"), name, arguments },
        span: (whole.start(), whole.end()),
    })
}

fn parse_function_call_xml(content: &str) -> Option<Leaked> {
    let m = FUNCTION_CALL_XML.captures(content)?;
    let whole = m.get(0)?;
    let body = m.name("body")?.as_str().trim();
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    let call = extract_call_from_value(&value)?;
    Some(Leaked { call, span: (whole.start(), whole.end()) })
}

fn parse_qwen_function(content: &str) -> Option<Leaked> {
    let m = QWEN_FUNCTION.captures(content)?;
    let whole = m.get(0)?;
    let name = m.name("name")?.as_str().trim().to_string();
    let params_text = m.name("params")?.as_str();

    let mut arguments = serde_json::Map::new();
    for cap in QWEN_PARAMETER.captures_iter(params_text) {
        let key = cap.name("key").map(|v| v.as_str().trim().to_string()).unwrap_or_default();
        let value = cap.name("value").map(|v| v.as_str().trim().to_string()).unwrap_or_default();
        if !key.is_empty() {
            arguments.insert(key, serde_json::Value::String(value));
        }
    }

    Some(Leaked {
        call: ToolCall { id: format!("leaked-{name}"), name, arguments: serde_json::Value::Object(arguments) },
        span: (whole.start(), whole.end()),
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_leaked_json_array_and_cleans_residue() {
        let content = r#"[{"name":"srv__ping","arguments":{}}]"#;
        let call = parse_leaked(content).expect("should find a leaked call");
        assert_eq!(call.name, "srv__ping");
        assert_eq!(call.arguments, serde_json::json!({}));
        assert_eq!(clean_leaked(content), "");
    }

    #[test]
    fn parses_leaked_json_object_with_param_key() {
        let content = r#"sure, calling now {"name":"fs.read","param":{"path":"/tmp/x"}} done"#;
        let call = parse_leaked(content).expect("should find a leaked call");
        assert_eq!(call.name, "fs.read");
        assert_eq!(call.arguments, serde_json::json!({"path": "/tmp/x"}));
        assert_eq!(clean_leaked(content), "sure, calling now  done");
    }

    #[test]
    fn parses_tool_call_xml() {
        let content = "<tool_call><name>fs.read</name><arguments>{\"path\":\"/x\"}</arguments></tool_call>";
        let call = parse_leaked(content).expect("should find a leaked call");
        assert_eq!(call.name, "fs.read");
        assert_eq!(call.arguments, serde_json::json!({"path": "/x"}));
        assert_eq!(clean_leaked(content), "");
    }

    #[test]
    fn parses_qwen_function_syntax_across_lines() {
        let content = "<function=shell.run>\n<parameter=cmd>ls -la</parameter>\n</function>";
        let call = parse_leaked(content).expect("should find a leaked call");
        assert_eq!(call.name, "shell.run");
        assert_eq!(call.arguments, serde_json::json!({"cmd": "ls -la"}));
        assert_eq!(clean_leaked(content), "");
    }

    #[test]
    fn strips_system_reminder_wrappers_regardless_of_leak() {
        let content = "hello <system-reminder>internal note</system-reminder> world";
        assert!(parse_leaked(content).is_none());
        assert_eq!(clean_leaked(content), "hello  world");
    }

    #[test]
    fn no_false_positive_on_plain_text() {
        assert!(parse_leaked("just a normal reply with no tool calls in it").is_none());
    }
}
