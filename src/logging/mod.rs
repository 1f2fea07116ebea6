//! Structured logging helpers
//!
//! Every role logs through `tracing` with structured fields (`agent_id`,
//! `lane`, `hazard_agent`). This module builds the subscriber filter from
//! [`LoggingConfig`](crate::config::LoggingConfig) and mints run ids.

pub mod run_id;

pub use run_id::generate_run_id;

/// Build filter directives string from LoggingConfig
///
/// Constructs a tracing filter string that includes the base log level
/// and any component-specific log levels configured in the LoggingConfig.
/// Components are sorted so the result is stable.
///
/// # Examples
///
/// ```
/// use hazard::config::logging::{LogFormat, LoggingConfig};
/// use hazard::logging::build_filter_directives;
/// use std::collections::HashMap;
///
/// let mut component_levels = HashMap::new();
/// component_levels.insert("detector".to_string(), "debug".to_string());
///
/// let config = LoggingConfig {
///     level: "info".to_string(),
///     format: LogFormat::Pretty,
///     component_levels: Some(component_levels),
/// };
///
/// let filter_str = build_filter_directives(&config);
/// assert_eq!(filter_str, "info,hazard::detector=debug");
/// ```
pub fn build_filter_directives(config: &crate::config::LoggingConfig) -> String {
    let mut filter_str = config.level.clone();

    if let Some(component_levels) = &config.component_levels {
        let mut components: Vec<_> = component_levels.iter().collect();
        components.sort();
        for (component, level) in components {
            filter_str.push_str(&format!(",hazard::{}={}", component, level));
        }
    }

    filter_str
}
