use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entity::EntityKind;
use crate::types::Snowflake;

/// Every failure the command engine can surface.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("invalid command shape at '{path}': {reason}")]
    InvalidShape { path: String, reason: String },

    #[error("command '{name}' is already registered in an overlapping scope")]
    DuplicateCommand { name: String },

    #[error("unknown command: {path}")]
    UnknownCommand { path: String },

    #[error("invalid value for option '{option}': {reason}")]
    ArgumentValidation { option: String, reason: String },

    #[error("could not resolve {kind} {id} for option '{option}': {reason}")]
    EntityResolution {
        option: String,
        id: Snowflake,
        kind: EntityKind,
        reason: String,
    },

    #[error("check #{index} ({check}) failed")]
    CheckFailed {
        index: usize,
        check: String,
        reason: Option<String>,
    },

    #[error("on cooldown, retry after {:.2}s", .retry_after.as_secs_f64())]
    OnCooldown { retry_after: Duration },

    #[error("interaction has already been responded to")]
    AlreadyResponded,

    #[error("interaction response window has expired")]
    AlreadyExpired,

    #[error("command '{command}' failed: {source}")]
    Internal {
        command: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("response transport failed: {0}")]
    Transport(#[source] anyhow::Error),
}

impl CommandError {
    pub fn invalid_shape(path: impl Into<String>, reason: impl Into<String>) -> Self {
        CommandError::InvalidShape { path: path.into(), reason: reason.into() }
    }

    pub fn invalid_argument(option: impl Into<String>, reason: impl Into<String>) -> Self {
        CommandError::ArgumentValidation { option: option.into(), reason: reason.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::InvalidShape { .. } => ErrorKind::InvalidShape,
            CommandError::DuplicateCommand { .. } => ErrorKind::DuplicateCommand,
            CommandError::UnknownCommand { .. } => ErrorKind::UnknownCommand,
            CommandError::ArgumentValidation { .. } => ErrorKind::ArgumentValidation,
            CommandError::EntityResolution { .. } => ErrorKind::EntityResolution,
            CommandError::CheckFailed { .. } => ErrorKind::CheckFailed,
            CommandError::OnCooldown { .. } => ErrorKind::OnCooldown,
            CommandError::AlreadyResponded => ErrorKind::AlreadyResponded,
            CommandError::AlreadyExpired => ErrorKind::AlreadyExpired,
            CommandError::Internal { .. } | CommandError::Transport(_) => ErrorKind::Internal,
        }
    }
}

/// Fieldless discriminant of [`CommandError`], used for routing and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidShape,
    DuplicateCommand,
    UnknownCommand,
    ArgumentValidation,
    EntityResolution,
    CheckFailed,
    OnCooldown,
    AlreadyResponded,
    AlreadyExpired,
    Internal,
}

impl ErrorKind {
    /// Kinds the invoker caused and should be told about in plain words.
    pub fn is_user_facing(self) -> bool {
        matches!(
            self,
            ErrorKind::CheckFailed | ErrorKind::OnCooldown | ErrorKind::ArgumentValidation
        )
    }

    /// Kinds raised while building the tree rather than while dispatching.
    pub fn is_registration(self) -> bool {
        matches!(self, ErrorKind::InvalidShape | ErrorKind::DuplicateCommand)
    }

    /// Response-lifecycle misuse: logged, never retried.
    pub fn is_lifecycle(self) -> bool {
        matches!(self, ErrorKind::AlreadyResponded | ErrorKind::AlreadyExpired)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_else(|| format!("{:?}", self));
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_classify_user_facing_failures() {
        let err = CommandError::CheckFailed { index: 0, check: "is_owner".into(), reason: None };
        assert_eq!(err.kind(), ErrorKind::CheckFailed);
        assert!(err.kind().is_user_facing());
        assert!(!ErrorKind::EntityResolution.is_user_facing());
        assert!(ErrorKind::DuplicateCommand.is_registration());
    }

    #[test]
    fn cooldown_message_shows_retry_after() {
        let err = CommandError::OnCooldown { retry_after: Duration::from_millis(1500) };
        assert_eq!(err.to_string(), "on cooldown, retry after 1.50s");
    }

    #[test]
    fn internal_errors_keep_their_cause() {
        let err = CommandError::Internal {
            command: "tag".into(),
            source: anyhow::anyhow!("database unavailable"),
        };
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(err.to_string().contains("database unavailable"));
    }

    #[test]
    fn kind_display_is_snake_case() {
        assert_eq!(ErrorKind::OnCooldown.to_string(), "on_cooldown");
        assert_eq!(ErrorKind::ArgumentValidation.to_string(), "argument_validation");
    }
}
