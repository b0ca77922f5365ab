//! Config migration rules, applied to a freshly-parsed [`UserConfig`]
//! before it is handed to the rest of the application.

use tracing::debug;

use crate::schema::UserConfig;

/// Apply all migration rules in order, mutating `config` in place.
pub fn migrate(config: &mut UserConfig) {
    migrate_legacy_ollama_default_model(config);
    infer_default_provider(config);
    mirror_last_used_provider(config);
    fill_multi_step_defaults(config);
}

/// (1) Legacy `ollama.default_model` is promoted to top-level
/// `default_model` if the latter is unset.
fn migrate_legacy_ollama_default_model(config: &mut UserConfig) {
    if config.default_model.is_some() {
        config.ollama = None;
        return;
    }
    if let Some(legacy) = config.ollama.take()
        && let Some(model) = legacy.default_model
    {
        debug!(model, "migrating legacy ollama.default_model to top-level default_model");
        config.default_model = Some(model);
    }
}

/// (2) Missing `default_provider` is inferred from the first enabled
/// provider, else `"ollama"`.
fn infer_default_provider(config: &mut UserConfig) {
    if config.default_provider.is_some() {
        return;
    }
    let mut names: Vec<&String> = config
        .providers
        .iter()
        .filter(|(_, p)| p.enabled)
        .map(|(name, _)| name)
        .collect();
    names.sort();
    config.default_provider = Some(names.first().map(|s| s.to_string()).unwrap_or_else(|| "ollama".to_string()));
}

/// (3) Missing `last_used_provider` mirrors `default_provider`.
fn mirror_last_used_provider(config: &mut UserConfig) {
    if config.last_used_provider.is_none() {
        config.last_used_provider = config.default_provider.clone();
    }
}

/// (4) Missing `enable_multi_step`/`max_iterations` get their defaults
/// (`true`, `10`) filled in explicitly so the persisted file is self
/// documenting after the first migration.
fn fill_multi_step_defaults(config: &mut UserConfig) {
    if config.enable_multi_step.is_none() {
        config.enable_multi_step = Some(true);
    }
    if config.max_iterations.is_none() {
        config.max_iterations = Some(10);
    }
}
