/// Replace `${ENV_VAR}` placeholders in config file text before parsing.
///
/// Unresolvable variables are left as-is.
pub fn substitute_env(input: &str) -> String {
    substitute_env_with(input, |name| std::env::var(name).ok())
}

fn substitute_env_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_name = String::new();
            let mut closed = false;
            for c in chars.by_ref() {
                if c == '}' {
                    closed = true;
                    break;
                }
                var_name.push(c);
            }
            if closed && !var_name.is_empty() {
                match lookup(&var_name) {
                    Some(val) => result.push_str(&val),
                    None => {
                        result.push_str("${");
                        result.push_str(&var_name);
                        result.push('}');
                    },
                }
            } else {
                result.push_str("${");
                result.push_str(&var_name);
            }
        } else {
            result.push(ch);
        }
    }

    result
}

/// The three `OTUI_*` environment overrides, read together and validated
/// as an all-or-nothing group.
#[derive(Debug, Clone)]
pub struct EnvOverrides {
    pub ollama_host: String,
    pub ollama_model: String,
    pub data_dir: String,
}

impl EnvOverrides {
    /// Reads `OTUI_OLLAMA_HOST`/`OTUI_OLLAMA_MODEL`/`OTUI_DATA_DIR`.
    ///
    /// Returns `Ok(None)` if none are set, `Ok(Some(..))` if all three are
    /// set, and an error naming the missing variable if only some are set.
    pub fn read() -> crate::error::Result<Option<Self>> {
        Self::read_from(|name| std::env::var(name).ok())
    }

    fn read_from(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> crate::error::Result<Option<Self>> {
        let host = lookup("OTUI_OLLAMA_HOST");
        let model = lookup("OTUI_OLLAMA_MODEL");
        let data_dir = lookup("OTUI_DATA_DIR");

        match (host, model, data_dir) {
            (None, None, None) => Ok(None),
            (Some(host), Some(model), Some(data_dir)) => Ok(Some(Self {
                ollama_host: host,
                ollama_model: model,
                data_dir,
            })),
            (host, model, data_dir) => {
                let missing = if host.is_none() {
                    "OTUI_OLLAMA_HOST"
                } else if model.is_none() {
                    "OTUI_OLLAMA_MODEL"
                } else {
                    "OTUI_DATA_DIR"
                };
                Err(crate::error::Error::EnvOverrideIncomplete { missing })
            },
        }
    }
}

/// `OTUI_DEBUG ∈ {1,true}` toggles debug logging.
pub fn debug_enabled() -> bool {
    matches!(
        std::env::var("OTUI_DEBUG").ok().as_deref(),
        Some("1") | Some("true")
    )
}
