//! Configuration loading: TOML file → validated [`StageConfig`].
//!
//! The types and their bounds live in `stage_common::config`; this module
//! only does file I/O, parsing, and the validate call.

use std::path::Path;

use thiserror::Error;

use stage_common::config::StageConfig;

/// Configuration loading/validation error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("config I/O error: {0}")]
    Io(String),
    /// TOML parse error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Parameter bounds violation.
    #[error("config validation: {0}")]
    Validation(String),
}

/// Load and validate the stage configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<StageConfig, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("failed to read {}: {e}", path.display())))?;
    parse_config(&text)
}

/// Parse and validate a TOML document.
pub fn parse_config(text: &str) -> Result<StageConfig, ConfigError> {
    let config: StageConfig =
        toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
    config.validate().map_err(ConfigError::Validation)?;
    Ok(config)
}

// ─── Tests ──────────────────────────────────────────────────────────
