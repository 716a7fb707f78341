//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::VtraceConfig;
use std::path::Path;

/// File name looked up in a project directory.
pub const CONFIG_FILE_NAME: &str = "vtrace.toml";

/// Loads and validates `vtrace.toml` from `dir`.
///
/// A missing file yields the default configuration; any other I/O failure
/// is an error.
pub fn load_config(dir: &Path) -> Result<VtraceConfig, ConfigError> {
    let path = dir.join(CONFIG_FILE_NAME);
    if !path.exists() {
        return Ok(VtraceConfig::default());
    }
    load_config_file(&path)
}

/// Loads and validates a configuration from an explicit file path.
pub fn load_config_file(path: &Path) -> Result<VtraceConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    load_config_from_str(&content)
}

/// Parses and validates a configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<VtraceConfig, ConfigError> {
    let config: VtraceConfig =
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &VtraceConfig) -> Result<(), ConfigError> {
    let trace = &config.trace;
    if trace.version.trim().is_empty() {
        return Err(ConfigError::Invalid {
            key: "trace.version",
            message: "must not be empty".to_string(),
        });
    }
    if trace
        .output
        .as_ref()
        .is_some_and(|p| p.as_os_str().is_empty())
    {
        return Err(ConfigError::Invalid {
            key: "trace.output",
            message: "must not be empty".to_string(),
        });
    }
    Ok(())
}
