//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::directives::{parse_directives, DirectiveError};
use crate::config::schema::{RealIpConfig, ServerConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Directive error: {0}")]
    Directive(#[from] DirectiveError),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<ServerConfig, ConfigError> {
    let config: ServerConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<ServerConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Load a `[real_ip]` section from an Apache-style directive file.
pub fn load_directives(path: &Path) -> Result<RealIpConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    Ok(parse_directives(&content)?)
}

/// Where a server's configuration comes from.
///
/// A directive file, when given, replaces the `[real_ip]` section of the TOML
/// file (or of the defaults when there is no TOML file).
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    pub config: Option<PathBuf>,
    pub directives: Option<PathBuf>,
}

impl ConfigSource {
    /// Load, merge and validate.
    pub fn load(&self) -> Result<ServerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => ServerConfig::default(),
        };

        if let Some(path) = &self.directives {
            config.real_ip = load_directives(path)?;
            validate_config(&config).map_err(ConfigError::Validation)?;
        }

        Ok(config)
    }

    /// Files to watch for changes.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.config
            .iter()
            .chain(self.directives.iter())
            .cloned()
            .collect()
    }
}
