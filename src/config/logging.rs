//! Logging configuration

use super::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Pretty-printed logs for humans
    #[default]
    Pretty,
    /// JSON logs for machine parsing
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

/// Modules that accept a `component_levels` override, as `hazard::<name>`
pub const COMPONENTS: &[&str] = &[
    "backend",
    "detector",
    "node",
    "reactor",
    "router",
    "scheduler",
    "sim",
    "transport",
];

const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    /// Per-module levels keyed by [`COMPONENTS`] entries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component_levels: Option<HashMap<String, String>>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            component_levels: None,
        }
    }
}

impl LoggingConfig {
    /// Reject overrides for modules that do not exist or levels tracing does
    /// not know. Checked in key order so the reported field is stable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let Some(levels) = &self.component_levels else {
            return Ok(());
        };
        let mut entries: Vec<_> = levels.iter().collect();
        entries.sort();
        for (component, level) in entries {
            let field = format!("logging.component_levels.{}", component);
            if !COMPONENTS.contains(&component.as_str()) {
                return Err(ConfigError::invalid(
                    field,
                    format!("unknown component, expected one of: {}", COMPONENTS.join(", ")),
                ));
            }
            if !LEVELS.contains(&level.to_lowercase().as_str()) {
                return Err(ConfigError::invalid(
                    field,
                    format!("unknown level '{}'", level),
                ));
            }
        }
        Ok(())
    }
}
