//! SlashForge runtime configuration schema.
//!
//! Every section is optional in the file; `defaults::apply_all_defaults`
//! fills the gaps, and the accessor methods fall back to the same constants
//! so a hand-built config behaves identically.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::defaults::{
    DEFAULT_ACK_WINDOW_MS, DEFAULT_AUTOCOMPLETE_BUDGET_MS, DEFAULT_EXTENDED_WINDOW_SECS,
    DEFAULT_LOG_LEVEL, DEFAULT_MAX_CHOICES, DEFAULT_MSG_CHECK_FAILED, DEFAULT_MSG_INTERNAL,
    DEFAULT_MSG_INVALID_ARGUMENT, DEFAULT_MSG_ON_COOLDOWN, DEFAULT_MSG_UNKNOWN_COMMAND,
};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlashForgeConfig {
    /// Response windows and autocomplete budget
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatch: Option<DispatchConfig>,

    /// Default error handler behaviour
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<ErrorsConfig>,

    /// User ids treated as bot owners by the `is_owner` check
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owners: Vec<u64>,

    /// Logging configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

impl SlashForgeConfig {
    pub fn dispatch(&self) -> DispatchConfig {
        self.dispatch.clone().unwrap_or_default()
    }

    pub fn errors(&self) -> ErrorsConfig {
        self.errors.clone().unwrap_or_default()
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchConfig {
    /// Window from receipt in which the command must respond or defer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack_window_ms: Option<u64>,
    /// Window from receipt once the command has deferred
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extended_window_secs: Option<u64>,
    /// Budget for an autocomplete handler to produce suggestions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autocomplete_budget_ms: Option<u64>,
    /// Maximum suggestions forwarded per autocomplete response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_choices: Option<usize>,
}

impl DispatchConfig {
    pub fn ack_window(&self) -> Duration {
        Duration::from_millis(self.ack_window_ms.unwrap_or(DEFAULT_ACK_WINDOW_MS))
    }

    pub fn extended_window(&self) -> Duration {
        Duration::from_secs(self.extended_window_secs.unwrap_or(DEFAULT_EXTENDED_WINDOW_SECS))
    }

    pub fn autocomplete_budget(&self) -> Duration {
        Duration::from_millis(self.autocomplete_budget_ms.unwrap_or(DEFAULT_AUTOCOMPLETE_BUDGET_MS))
    }

    pub fn max_choices(&self) -> usize {
        self.max_choices.unwrap_or(DEFAULT_MAX_CHOICES)
    }
}

// ---------------------------------------------------------------------------
// Error reporting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorsConfig {
    /// Append the formatted error chain to the generic failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracebacks_to_user: Option<bool>,
    /// Send default error messages as ephemeral
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ephemeral: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub messages: Option<ErrorMessages>,
}

impl ErrorsConfig {
    pub fn tracebacks_to_user(&self) -> bool {
        self.tracebacks_to_user.unwrap_or(false)
    }

    pub fn ephemeral(&self) -> bool {
        self.ephemeral.unwrap_or(true)
    }

    pub fn messages(&self) -> ErrorMessages {
        self.messages.clone().unwrap_or_default()
    }
}

/// Message templates used by the default error handler.
///
/// Placeholders: `{retry_after}` (seconds, two decimals) in `onCooldown`;
/// `{option}` and `{reason}` in `invalidArgument`; `{command}` in
/// `unknownCommand`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessages {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_failed: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_cooldown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invalid_argument: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unknown_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal: Option<String>,
}

impl ErrorMessages {
    pub fn check_failed(&self) -> &str {
        self.check_failed.as_deref().unwrap_or(DEFAULT_MSG_CHECK_FAILED)
    }

    pub fn on_cooldown(&self) -> &str {
        self.on_cooldown.as_deref().unwrap_or(DEFAULT_MSG_ON_COOLDOWN)
    }

    pub fn invalid_argument(&self) -> &str {
        self.invalid_argument.as_deref().unwrap_or(DEFAULT_MSG_INVALID_ARGUMENT)
    }

    pub fn unknown_command(&self) -> &str {
        self.unknown_command.as_deref().unwrap_or(DEFAULT_MSG_UNKNOWN_COMMAND)
    }

    pub fn internal(&self) -> &str {
        self.internal.as_deref().unwrap_or(DEFAULT_MSG_INTERNAL)
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    /// Directory for daily-rolling NDJSON logs; console only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    /// Emit console output as JSON instead of human-readable lines
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<bool>,
}

impl LoggingConfig {
    pub fn level(&self) -> &str {
        self.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn json(&self) -> bool {
        self.json.unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_yaml() {
        let yaml = r#"
dispatch:
  ackWindowMs: 2500
  extendedWindowSecs: 600
errors:
  tracebacksToUser: true
  messages:
    checkFailed: "Nope."
owners: [42, 43]
"#;
        let config: SlashForgeConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.dispatch().ack_window(), Duration::from_millis(2500));
        assert_eq!(config.dispatch().extended_window(), Duration::from_secs(600));
        assert!(config.errors().tracebacks_to_user());
        assert_eq!(config.errors().messages().check_failed(), "Nope.");
        assert_eq!(config.owners, vec![42, 43]);
    }

    #[test]
    fn accessors_fall_back_to_platform_windows() {
        let config = SlashForgeConfig::default();
        assert_eq!(config.dispatch().ack_window(), Duration::from_secs(3));
        assert_eq!(config.dispatch().extended_window(), Duration::from_secs(15 * 60));
        assert_eq!(config.dispatch().max_choices(), 25);
        assert!(!config.errors().tracebacks_to_user());
        assert!(config.errors().ephemeral());
    }
}
