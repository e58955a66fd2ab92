//! Environment overrides for config values.
//!
//! Recognised variables:
//! - `SLASHFORGE_LOG_LEVEL` → `logging.level`
//! - `SLASHFORGE_LOG_DIR` → `logging.dir`
//! - `SLASHFORGE_TRACEBACKS` → `errors.tracebacksToUser` (`true`/`false`/`1`/`0`)
//! - `SLASHFORGE_OWNERS` → `owners` (comma-separated ids, replaces the list)

use anyhow::{Context, Result};
use std::collections::HashMap;

use crate::schema::{ErrorsConfig, LoggingConfig, SlashForgeConfig};

/// Error returned for env values that cannot be parsed.
#[derive(Debug, thiserror::Error)]
#[error("Invalid value {value:?} for env var {var_name}: expected {expected}")]
pub struct InvalidEnvValueError {
    pub var_name: String,
    pub value: String,
    pub expected: &'static str,
}

/// Overlay overrides from the process environment.
pub fn apply_env_overrides(config: SlashForgeConfig) -> Result<SlashForgeConfig> {
    apply_env_overrides_with(config, &std::env::vars().collect())
}

/// Overlay overrides from a provided map (useful for testing).
pub fn apply_env_overrides_with(
    mut config: SlashForgeConfig,
    env: &HashMap<String, String>,
) -> Result<SlashForgeConfig> {
    if let Some(level) = non_empty(env, "SLASHFORGE_LOG_LEVEL") {
        config.logging.get_or_insert_with(LoggingConfig::default).level = Some(level.to_string());
    }

    if let Some(dir) = non_empty(env, "SLASHFORGE_LOG_DIR") {
        config.logging.get_or_insert_with(LoggingConfig::default).dir = Some(dir.to_string());
    }

    if let Some(raw) = non_empty(env, "SLASHFORGE_TRACEBACKS") {
        let enabled = parse_bool(raw).ok_or_else(|| InvalidEnvValueError {
            var_name: "SLASHFORGE_TRACEBACKS".into(),
            value: raw.to_string(),
            expected: "a boolean",
        })?;
        config.errors.get_or_insert_with(ErrorsConfig::default).tracebacks_to_user = Some(enabled);
    }

    if let Some(raw) = non_empty(env, "SLASHFORGE_OWNERS") {
        config.owners = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<u64>()
                    .with_context(|| format!("SLASHFORGE_OWNERS entry {s:?} is not a user id"))
            })
            .collect::<Result<Vec<_>>>()?;
    }

    Ok(config)
}

fn non_empty<'a>(env: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn overrides_logging_and_tracebacks() {
        let config = apply_env_overrides_with(
            SlashForgeConfig::default(),
            &env(&[("SLASHFORGE_LOG_LEVEL", "debug"), ("SLASHFORGE_TRACEBACKS", "1")]),
        )
        .unwrap();
        assert_eq!(config.logging().level(), "debug");
        assert!(config.errors().tracebacks_to_user());
    }

    #[test]
    fn owners_replace_file_list() {
        let mut base = SlashForgeConfig::default();
        base.owners = vec![1];
        let config =
            apply_env_overrides_with(base, &env(&[("SLASHFORGE_OWNERS", "10, 20,")])).unwrap();
        assert_eq!(config.owners, vec![10, 20]);
    }

    #[test]
    fn rejects_unparseable_values() {
        let result = apply_env_overrides_with(
            SlashForgeConfig::default(),
            &env(&[("SLASHFORGE_TRACEBACKS", "sometimes")]),
        );
        assert!(result.unwrap_err().to_string().contains("SLASHFORGE_TRACEBACKS"));

        let result = apply_env_overrides_with(
            SlashForgeConfig::default(),
            &env(&[("SLASHFORGE_OWNERS", "abc")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn blank_values_are_ignored() {
        let config = apply_env_overrides_with(
            SlashForgeConfig::default(),
            &env(&[("SLASHFORGE_LOG_LEVEL", "  ")]),
        )
        .unwrap();
        assert!(config.logging.is_none());
    }
}
