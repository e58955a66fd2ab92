use slashforge_core::{ErrorReport, ObservabilitySink};
use tracing::error;

use crate::redact::redact_sensitive_data;

/// Observability sink that writes error reports to the tracing pipeline.
///
/// Used when no external error tracker is configured; the JSON file layer
/// then doubles as the error log.
#[derive(Debug, Default, Clone)]
pub struct TracingObservabilitySink;

impl ObservabilitySink for TracingObservabilitySink {
    fn name(&self) -> &str {
        "tracing"
    }

    fn report(&self, report: &ErrorReport) {
        let chain: Vec<String> = report.chain.iter().map(|c| redact_sensitive_data(c)).collect();
        error!(
            target: "slashforge_errors",
            id = %report.id,
            kind = %report.kind,
            command = report.command.as_deref().unwrap_or("-"),
            invoker = ?report.invoker,
            token = report.token.as_deref().unwrap_or("-"),
            chain = ?chain,
            "{}",
            redact_sensitive_data(&report.message)
        );
    }
}
