//! Config command handlers

use crate::cli::{ConfigInitArgs, ConfigValidateArgs};
use crate::config::RelayConfig;
use std::fs;

const EXAMPLE_CONFIG: &str = include_str!("../../hazard.example.toml");

/// Handle `hazard config init` command
///
/// Writes the starter scenario and returns a description of it.
pub fn handle_config_init(args: &ConfigInitArgs) -> Result<String, Box<dyn std::error::Error>> {
    if args.output.exists() && !args.force {
        return Err(format!(
            "File already exists: {}. Use --force to overwrite.",
            args.output.display()
        )
        .into());
    }

    let scenario: RelayConfig = toml::from_str(EXAMPLE_CONFIG)?;
    fs::write(&args.output, EXAMPLE_CONFIG)?;

    let accident = scenario
        .simulation
        .accident
        .as_ref()
        .map(|a| format!("{} stops at {}s", a.vehicle, a.at_seconds))
        .unwrap_or_else(|| "no accident".to_string());
    Ok(format!(
        "✓ Configuration file created: {}\n  Scenario: {} segment(s), {} vehicle(s), {}.\n  Edit the [simulation] tables to describe your road network.",
        args.output.display(),
        scenario.simulation.segments.len(),
        scenario.simulation.vehicles.len(),
        accident
    ))
}

/// Handle `hazard config validate` command
///
/// Returns a one-line description of the scenario on success.
pub fn handle_config_validate(
    args: &ConfigValidateArgs,
) -> Result<String, Box<dyn std::error::Error>> {
    let config = RelayConfig::load(Some(&args.config))?;
    config.validate()?;

    Ok(format!(
        "✓ {} is valid: {} segment(s), {} vehicle(s), {} transport, {}s run",
        args.config.display(),
        config.simulation.segments.len(),
        config.simulation.vehicles.len(),
        config.transport.kind,
        config.simulation.duration_seconds
    ))
}
