//! `slashforge-config`: runtime configuration for the command engine.
//!
//! Provides:
//! - Typed config schema (dispatch windows, error reporting, owners, logging)
//! - YAML loading with a defaults fallback for first runs
//! - `SLASHFORGE_*` environment overrides
//! - Default value application
//! - Validation with path-qualified errors and warnings

pub mod defaults;
pub mod env;
pub mod io;
pub mod schema;
pub mod validation;

pub use defaults::apply_all_defaults;
pub use env::{apply_env_overrides, apply_env_overrides_with};
pub use io::{config_dir, config_file_path, load_config};
pub use schema::{DispatchConfig, ErrorMessages, ErrorsConfig, LoggingConfig, SlashForgeConfig};
pub use validation::{validate, ConfigValidationError, ValidationReport};

use anyhow::{bail, Result};
use std::path::Path;

/// Load, overlay env overrides, apply defaults and validate a config file.
///
/// This is the main entry point for loading a config at runtime. Validation
/// warnings are logged; errors abort the load.
pub async fn load_and_prepare(path: &Path) -> Result<SlashForgeConfig> {
    let config = load_config(path).await?;
    let config = apply_env_overrides(config)?;
    let config = apply_all_defaults(config);

    let report = validate(&config);
    for warning in &report.warnings {
        tracing::warn!(path = %warning.path, message = %warning.message, "Config warning");
    }
    for error in &report.errors {
        tracing::error!(path = %error.path, message = %error.message, "Config error");
    }
    if let Some(first) = report.errors.into_iter().next() {
        bail!(first);
    }

    Ok(config)
}
