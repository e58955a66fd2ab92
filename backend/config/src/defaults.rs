//! Config defaults: applies platform values to a parsed config.

use crate::schema::{DispatchConfig, ErrorMessages, ErrorsConfig, LoggingConfig, SlashForgeConfig};

/// Platform acknowledgement window.
pub const DEFAULT_ACK_WINDOW_MS: u64 = 3_000;

/// Platform follow-up window once deferred (15 minutes).
pub const DEFAULT_EXTENDED_WINDOW_SECS: u64 = 900;

/// Autocomplete shares the acknowledgement budget and cannot defer.
pub const DEFAULT_AUTOCOMPLETE_BUDGET_MS: u64 = 3_000;

/// Platform cap on choices and suggestions.
pub const DEFAULT_MAX_CHOICES: usize = 25;

pub const DEFAULT_LOG_LEVEL: &str = "info";

pub const DEFAULT_MSG_CHECK_FAILED: &str = "You do not have permission to use this command.";
pub const DEFAULT_MSG_ON_COOLDOWN: &str =
    "This command is on cooldown. Try again in {retry_after}s.";
pub const DEFAULT_MSG_INVALID_ARGUMENT: &str = "Invalid value for `{option}`: {reason}.";
pub const DEFAULT_MSG_UNKNOWN_COMMAND: &str = "The command `{command}` is not available here.";
pub const DEFAULT_MSG_INTERNAL: &str = "Something went wrong while running this command.";

/// Apply all defaults to a freshly loaded config.
pub fn apply_all_defaults(config: SlashForgeConfig) -> SlashForgeConfig {
    let config = apply_dispatch_defaults(config);
    let config = apply_error_defaults(config);
    apply_logging_defaults(config)
}

fn apply_dispatch_defaults(mut config: SlashForgeConfig) -> SlashForgeConfig {
    let dispatch = config.dispatch.get_or_insert_with(DispatchConfig::default);
    dispatch.ack_window_ms.get_or_insert(DEFAULT_ACK_WINDOW_MS);
    dispatch.extended_window_secs.get_or_insert(DEFAULT_EXTENDED_WINDOW_SECS);
    dispatch.autocomplete_budget_ms.get_or_insert(DEFAULT_AUTOCOMPLETE_BUDGET_MS);
    dispatch.max_choices.get_or_insert(DEFAULT_MAX_CHOICES);
    config
}

fn apply_error_defaults(mut config: SlashForgeConfig) -> SlashForgeConfig {
    let errors = config.errors.get_or_insert_with(ErrorsConfig::default);
    errors.tracebacks_to_user.get_or_insert(false);
    errors.ephemeral.get_or_insert(true);

    let messages = errors.messages.get_or_insert_with(ErrorMessages::default);
    messages
        .check_failed
        .get_or_insert_with(|| DEFAULT_MSG_CHECK_FAILED.to_string());
    messages
        .on_cooldown
        .get_or_insert_with(|| DEFAULT_MSG_ON_COOLDOWN.to_string());
    messages
        .invalid_argument
        .get_or_insert_with(|| DEFAULT_MSG_INVALID_ARGUMENT.to_string());
    messages
        .unknown_command
        .get_or_insert_with(|| DEFAULT_MSG_UNKNOWN_COMMAND.to_string());
    messages.internal.get_or_insert_with(|| DEFAULT_MSG_INTERNAL.to_string());
    config
}

fn apply_logging_defaults(mut config: SlashForgeConfig) -> SlashForgeConfig {
    let logging = config.logging.get_or_insert_with(LoggingConfig::default);
    logging.level.get_or_insert_with(|| DEFAULT_LOG_LEVEL.to_string());
    logging.json.get_or_insert(false);
    config
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_every_section() {
        let config = apply_all_defaults(SlashForgeConfig::default());
        let dispatch = config.dispatch.as_ref().unwrap();
        assert_eq!(dispatch.ack_window_ms, Some(DEFAULT_ACK_WINDOW_MS));
        assert_eq!(dispatch.max_choices, Some(DEFAULT_MAX_CHOICES));
        let messages = config.errors.as_ref().unwrap().messages.as_ref().unwrap();
        assert_eq!(messages.internal.as_deref(), Some(DEFAULT_MSG_INTERNAL));
        assert_eq!(config.logging.as_ref().unwrap().level.as_deref(), Some("info"));
    }

    #[test]
    fn keeps_explicit_values() {
        let mut config = SlashForgeConfig::default();
        config.dispatch = Some(DispatchConfig {
            ack_window_ms: Some(1_000),
            ..Default::default()
        });
        let config = apply_all_defaults(config);
        let dispatch = config.dispatch.unwrap();
        assert_eq!(dispatch.ack_window_ms, Some(1_000));
        assert_eq!(dispatch.extended_window_secs, Some(DEFAULT_EXTENDED_WINDOW_SECS));
    }
}
