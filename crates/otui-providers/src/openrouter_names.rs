//! OpenRouter-specific tool-name mangling. The API only allows
//! `[A-Za-z0-9_-]` in tool names, so the dotted `<plugin>.<tool>` namespace
//! is rewritten with `__` before the schema is sent, and reversed on every
//! returned tool call.

/// Last `/`-delimited segment of a model id; OpenRouter prefixes every
/// model with its vendor (`anthropic/claude-3.5-sonnet`).
pub fn strip_provider_prefix(model_id: &str) -> &str {
    model_id.rsplit('/').next().unwrap_or(model_id)
}

pub fn convert_tool_name_for_openrouter(name: &str) -> String {
    name.replace('.', "__")
}

pub fn restore_tool_name_from_openrouter(name: &str) -> String {
    name.replace("__", ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_vendor_prefix() {
        assert_eq!(strip_provider_prefix("anthropic/claude-3.5-sonnet"), "claude-3.5-sonnet");
        assert_eq!(strip_provider_prefix("claude-3.5-sonnet"), "claude-3.5-sonnet");
    }

    #[test]
    fn name_mangling_round_trips() {
        let original = "fs-server.read_file";
        let mangled = convert_tool_name_for_openrouter(original);
        assert_eq!(mangled, "fs-server__read_file");
        assert_eq!(restore_tool_name_from_openrouter(&mangled), original);
    }
}
