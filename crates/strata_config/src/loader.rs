//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::ProjectConfig;
use std::collections::HashSet;
use std::path::Path;

/// Name of the project configuration file.
pub const CONFIG_FILE: &str = "strata.toml";

/// Loads and validates `strata.toml` from a project directory.
pub fn load_config(project_dir: &Path) -> Result<ProjectConfig, ConfigError> {
    let content = std::fs::read_to_string(project_dir.join(CONFIG_FILE))?;
    load_config_from_str(&content)
}

/// Parses and validates a `strata.toml` configuration from a string.
pub fn load_config_from_str(content: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates required fields and the aggregate layer reference.
///
/// Base-layer references are deliberately not checked here: a bad reference
/// only excludes the offending layer, which the layer graph reports when it
/// registers the definitions.
fn validate_config(config: &ProjectConfig) -> Result<(), ConfigError> {
    if config.project.name.is_empty() {
        return Err(ConfigError::MissingField("project.name".to_string()));
    }
    if config.project.version.is_empty() {
        return Err(ConfigError::MissingField("project.version".to_string()));
    }
    for (i, layer) in config.layers.iter().enumerate() {
        if layer.name.trim().is_empty() {
            return Err(ConfigError::MissingField(format!("layers[{i}].name")));
        }
        if layer.source_dirs.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "layer '{}' has no source directories",
                layer.name
            )));
        }
    }
    if let Some(aggregate) = &config.build.aggregate_layer {
        let names: HashSet<&str> = config.layers.iter().map(|l| l.name.as_str()).collect();
        if !names.contains(aggregate.as_str()) {
            return Err(ConfigError::UnknownLayer(aggregate.clone()));
        }
    }
    Ok(())
}
