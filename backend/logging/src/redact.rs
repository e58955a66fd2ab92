//! Log Redaction Layer
//!
//! Interaction tokens authorise responses on the invoker's behalf for up to
//! fifteen minutes, so they never reach logs or error trackers in full.

use regex::Regex;
use std::sync::LazyLock;

/// Characters of a token kept visible for correlation.
const TOKEN_PREFIX_LEN: usize = 6;

static BEARER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(Bot|Bearer)\s+[A-Za-z0-9\-\._~+/]+=*").unwrap());
static INTERACTION_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"aW50ZXJhY3Rpb246[A-Za-z0-9_\-\.]{8,}").unwrap());
static WEBHOOK_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(/webhooks/\d+/)[A-Za-z0-9_\-\.]{16,}").unwrap()
});

/// Mask an interaction token, keeping a short prefix for log correlation.
pub fn redact_token(token: &str) -> String {
    let prefix: String = token.chars().take(TOKEN_PREFIX_LEN).collect();
    if token.chars().count() <= TOKEN_PREFIX_LEN {
        return "***".to_string();
    }
    format!("{prefix}***")
}

/// Redacts credentials and interaction tokens embedded in free-form text.
pub fn redact_sensitive_data(input: &str) -> String {
    let redacted = BEARER_RE.replace_all(input, "$1 [REDACTED_TOKEN]");
    let redacted = INTERACTION_TOKEN_RE.replace_all(&redacted, "[REDACTED_INTERACTION]");
    WEBHOOK_URL_RE
        .replace_all(&redacted, "${1}[REDACTED_INTERACTION]")
        .into_owned()
}
