//! Config validation: schema checks with user-friendly error messages.

use crate::defaults::DEFAULT_MAX_CHOICES;
use crate::schema::SlashForgeConfig;
use thiserror::Error;

/// Longest follow-up window the platform honours.
const PLATFORM_EXTENDED_WINDOW_SECS: u64 = 15 * 60;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// A config validation error with field path and message.
#[derive(Debug, Error)]
#[error("Config validation error at '{path}': {message}")]
pub struct ConfigValidationError {
    pub path: String,
    pub message: String,
}

/// A collection of validation errors found in one pass.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    fn error(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }

    fn warn(&mut self, path: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            path: path.into(),
            message: message.into(),
        });
    }
}

/// Validate the config and return a report of all errors and warnings.
pub fn validate(config: &SlashForgeConfig) -> ValidationReport {
    let mut report = ValidationReport::default();
    validate_dispatch(config, &mut report);
    validate_errors(config, &mut report);
    validate_logging(config, &mut report);
    report
}

fn validate_dispatch(config: &SlashForgeConfig, report: &mut ValidationReport) {
    let dispatch = config.dispatch();
    let ack = dispatch.ack_window();
    let extended = dispatch.extended_window();

    if ack.is_zero() {
        report.error("dispatch.ackWindowMs", "must be > 0");
    }
    if extended <= ack {
        report.error(
            "dispatch.extendedWindowSecs",
            "must be longer than the acknowledgement window",
        );
    }
    if extended.as_secs() > PLATFORM_EXTENDED_WINDOW_SECS {
        report.warn(
            "dispatch.extendedWindowSecs",
            "exceeds the platform's 15 minute token lifetime; late follow-ups will fail",
        );
    }
    if dispatch.autocomplete_budget().is_zero() {
        report.error("dispatch.autocompleteBudgetMs", "must be > 0");
    } else if dispatch.autocomplete_budget() > ack {
        report.warn(
            "dispatch.autocompleteBudgetMs",
            "exceeds the acknowledgement window; the platform will already show no suggestions",
        );
    }

    let max_choices = dispatch.max_choices();
    if max_choices == 0 || max_choices > DEFAULT_MAX_CHOICES {
        report.error(
            "dispatch.maxChoices",
            format!("must be between 1 and {DEFAULT_MAX_CHOICES}"),
        );
    }
}

fn validate_errors(config: &SlashForgeConfig, report: &mut ValidationReport) {
    let messages = config.errors().messages();
    let templates = [
        ("errors.messages.checkFailed", messages.check_failed(), &[][..]),
        ("errors.messages.onCooldown", messages.on_cooldown(), &["{retry_after}"][..]),
        ("errors.messages.invalidArgument", messages.invalid_argument(), &["{reason}"][..]),
        ("errors.messages.unknownCommand", messages.unknown_command(), &[][..]),
        ("errors.messages.internal", messages.internal(), &[][..]),
    ];

    for (path, template, placeholders) in templates {
        if template.trim().is_empty() {
            report.error(path, "message template cannot be empty");
            continue;
        }
        for placeholder in placeholders {
            if !template.contains(placeholder) {
                report.warn(path, format!("template does not mention {placeholder}"));
            }
        }
    }
}

fn validate_logging(config: &SlashForgeConfig, report: &mut ValidationReport) {
    let logging = config.logging();
    // EnvFilter directives like "slashforge_commands=debug" are also valid.
    let level = logging.level();
    if !level.contains('=') && !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str()) {
        report.warn("logging.level", format!("unrecognised level '{level}'"));
    }
    if let Some(dir) = &logging.dir {
        if dir.trim().is_empty() {
            report.error("logging.dir", "cannot be empty when set");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::defaults::apply_all_defaults;
    use crate::schema::{DispatchConfig, ErrorMessages, ErrorsConfig};

    #[test]
    fn defaults_are_valid() {
        let report = validate(&apply_all_defaults(SlashForgeConfig::default()));
        assert!(report.is_valid(), "{:?}", report.errors);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);
    }

    #[test]
    fn rejects_zero_ack_window() {
        let mut config = SlashForgeConfig::default();
        config.dispatch = Some(DispatchConfig {
            ack_window_ms: Some(0),
            ..Default::default()
        });
        let report = validate(&config);
        assert!(report.errors.iter().any(|e| e.path == "dispatch.ackWindowMs"));
    }

    #[test]
    fn rejects_too_many_choices() {
        let mut config = SlashForgeConfig::default();
        config.dispatch = Some(DispatchConfig {
            max_choices: Some(30),
            ..Default::default()
        });
        assert!(!validate(&config).is_valid());
    }

    #[test]
    fn warns_when_cooldown_template_drops_placeholder() {
        let mut config = SlashForgeConfig::default();
        config.errors = Some(ErrorsConfig {
            messages: Some(ErrorMessages {
                on_cooldown: Some("Slow down.".into()),
                ..Default::default()
            }),
            ..Default::default()
        });
        let report = validate(&config);
        assert!(report.is_valid());
        assert!(report
            .warnings
            .iter()
            .any(|w| w.path == "errors.messages.onCooldown"));
    }

    #[test]
    fn warns_on_extended_window_past_platform_limit() {
        let mut config = SlashForgeConfig::default();
        config.dispatch = Some(DispatchConfig {
            extended_window_secs: Some(3600),
            ..Default::default()
        });
        let report = validate(&config);
        assert!(report
            .warnings
            .iter()
            .any(|w| w.path == "dispatch.extendedWindowSecs"));
    }
}
