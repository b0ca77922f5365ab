//! `{{OTUI_*}}` environment token substitution, applied to a starting
//! plugin's `env` overlay before the process is spawned.

/// Inputs available for `{{OTUI_*}}` substitution when starting a plugin.
pub struct SubstitutionContext<'a> {
    pub session_id: &'a str,
    pub session_name: &'a str,
    pub data_dir: &'a str,
    pub user: &'a str,
}

/// Sanitizes a data directory path for embedding in an env var: `/`, `\`,
/// and space become `-`, then leading/trailing `-` are stripped.
pub fn sanitize_data_dir(data_dir: &str) -> String {
    let replaced: String = data_dir.chars().map(|c| if matches!(c, '/' | '\\' | ' ') { '-' } else { c }).collect();
    replaced.trim_matches('-').to_string()
}

/// Replace every `{{OTUI_*}}` token in `value` with its substitution.
/// Unknown tokens are left untouched.
pub fn substitute(value: &str, ctx: &SubstitutionContext<'_>) -> String {
    value
        .replace("{{OTUI_SESSION_ID}}", ctx.session_id)
        .replace("{{OTUI_SESSION_NAME}}", ctx.session_name)
        .replace("{{OTUI_DATA_DIR}}", &sanitize_data_dir(ctx.data_dir))
        .replace("{{OTUI_USER}}", ctx.user)
}

/// Apply [`substitute`] to every value in an env map, leaving keys as-is.
pub fn substitute_env(
    env: &std::collections::HashMap<String, String>,
    ctx: &SubstitutionContext<'_>,
) -> std::collections::HashMap<String, String> {
    env.iter().map(|(k, v)| (k.clone(), substitute(v, ctx))).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> SubstitutionContext<'static> {
        SubstitutionContext { session_id: "abc", session_name: "My Chat", data_dir: "/home/user/.otui data", user: "alice" }
    }

    #[test]
    fn substitutes_session_id_exactly() {
        assert_eq!(substitute("SESSION={{OTUI_SESSION_ID}}", &ctx()), "SESSION=abc");
    }

    #[test]
    fn sanitizes_slashes_backslashes_and_spaces() {
        assert_eq!(sanitize_data_dir("/home/user/.otui data"), "home-user-.otui-data");
    }

    #[test]
    fn leaves_unknown_tokens_untouched() {
        assert_eq!(substitute("{{NOT_A_TOKEN}}", &ctx()), "{{NOT_A_TOKEN}}");
    }

    #[test]
    fn substitute_env_applies_to_every_value() {
        let mut env = std::collections::HashMap::new();
        env.insert("SESSION".to_string(), "{{OTUI_SESSION_ID}}".to_string());
        env.insert("USER".to_string(), "{{OTUI_USER}}".to_string());
        let resolved = substitute_env(&env, &ctx());
        assert_eq!(resolved.get("SESSION").map(String::as_str), Some("abc"));
        assert_eq!(resolved.get("USER").map(String::as_str), Some("alice"));
    }
}
