//! Qwen-family models leak XML when handed tool instructions on OpenRouter;
//! they are blacklisted from the tool-instruction layer rather than fixed
//! with yet another leak-parser pattern. Keyed on a substring match of the
//! model name — whether other families need the same treatment is a
//! model-quality call, not something this module decides.

const BLACKLIST_SUBSTRINGS: &[&str] = &["qwen"];

pub fn is_qwen_blacklisted(model_name: &str) -> bool {
    let lower = model_name.to_lowercase();
    BLACKLIST_SUBSTRINGS.iter().any(|s| lower.contains(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_qwen_family_case_insensitively() {
        assert!(is_qwen_blacklisted("qwen/qwen-2.5-72b-instruct"));
        assert!(is_qwen_blacklisted("Qwen2.5-Coder-32B"));
    }

    #[test]
    fn does_not_match_unrelated_models() {
        assert!(!is_qwen_blacklisted("anthropic/claude-3.5-sonnet"));
        assert!(!is_qwen_blacklisted("meta-llama/llama-3.1-70b"));
    }
}
