//! Configuration module for the hazard relay
//!
//! Provides layered configuration loading from files, environment variables, and defaults.
//!
//! # Configuration Precedence
//!
//! 1. CLI arguments (highest priority)
//! 2. Environment variables (`HAZARD_*`)
//! 3. Configuration file (TOML)
//! 4. Default values (lowest priority)
//!
//! # Example
//!
//! ```rust
//! use hazard::config::RelayConfig;
//!
//! let config = RelayConfig::default();
//! assert_eq!(config.detector.min_stop_time_seconds, 3.0);
//!
//! let toml = r#"
//! [reactor]
//! arrival_distance_threshold = 150.0
//! "#;
//! let config: RelayConfig = toml::from_str(toml).unwrap();
//! assert_eq!(config.reactor.arrival_distance_threshold, 150.0);
//! assert_eq!(config.reactor.check_interval_seconds, 1.0);
//! ```

pub mod detector;
pub mod error;
pub mod logging;
pub mod reactor;
pub mod router;
pub mod simulation;
pub mod transport;

pub use detector::DetectorConfig;
pub use error::ConfigError;
pub use logging::{LogFormat, LoggingConfig};
pub use reactor::ReactorConfig;
pub use router::RouterConfig;
pub use simulation::{AccidentConfig, SegmentConfig, SimulationConfig, VehicleConfig};
pub use transport::{TransportConfig, TransportKind};

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Unified configuration for a relay run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Roadside stop detection
    pub detector: DetectorConfig,
    /// Hazard relay and affected-set selection
    pub router: RouterConfig,
    /// On-vehicle maneuvering
    pub reactor: ReactorConfig,
    /// Datagram transport between roles
    pub transport: TransportConfig,
    /// Road network, vehicles and run length
    pub simulation: SimulationConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

impl RelayConfig {
    /// Load configuration from a TOML file
    ///
    /// If path is None, returns default configuration.
    /// If path doesn't exist, returns NotFound error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => {
                if !p.exists() {
                    return Err(ConfigError::NotFound(p.to_path_buf()));
                }
                let content = std::fs::read_to_string(p)?;
                toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))
            }
            None => Ok(Self::default()),
        }
    }

    /// Apply environment variable overrides
    ///
    /// Invalid values are silently ignored (previous values are kept).
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(level) = std::env::var("HAZARD_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("HAZARD_LOG_FORMAT") {
            if let Ok(f) = format.parse() {
                self.logging.format = f;
            }
        }
        if let Ok(kind) = std::env::var("HAZARD_TRANSPORT") {
            if let Ok(k) = kind.parse() {
                self.transport.kind = k;
            }
        }
        if let Ok(duration) = std::env::var("HAZARD_DURATION") {
            if let Ok(d) = duration.parse::<f64>() {
                if d > 0.0 {
                    self.simulation.duration_seconds = d;
                }
            }
        }

        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logging.validate()?;

        positive("detector.poll_interval_seconds", self.detector.poll_interval_seconds)?;
        positive("detector.stopped_speed_threshold", self.detector.stopped_speed_threshold)?;
        positive("detector.min_stop_time_seconds", self.detector.min_stop_time_seconds)?;
        non_negative("detector.initial_delay_seconds", self.detector.initial_delay_seconds)?;
        if self.detector.poll_interval_seconds > self.detector.min_stop_time_seconds {
            return Err(ConfigError::invalid(
                "detector.poll_interval_seconds",
                "must not exceed min_stop_time_seconds",
            ));
        }

        if self.router.assumed_lane_count == 0 {
            return Err(ConfigError::invalid(
                "router.assumed_lane_count",
                "must be at least 1",
            ));
        }

        positive("reactor.check_interval_seconds", self.reactor.check_interval_seconds)?;
        positive("reactor.arrival_distance_threshold", self.reactor.arrival_distance_threshold)?;
        if let Some(max) = self.reactor.max_maneuver_seconds {
            positive("reactor.max_maneuver_seconds", max)?;
        }

        for (field, every) in [
            ("transport.drop_every", self.transport.drop_every),
            ("transport.duplicate_every", self.transport.duplicate_every),
        ] {
            if every == Some(0) {
                return Err(ConfigError::invalid(field, "must be at least 1"));
            }
        }

        self.validate_simulation()
    }

    fn validate_simulation(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        positive("simulation.duration_seconds", sim.duration_seconds)?;
        positive("simulation.step_seconds", sim.step_seconds)?;

        let mut segments = HashSet::new();
        for (i, segment) in sim.segments.iter().enumerate() {
            if segment.id.is_empty() {
                return Err(ConfigError::invalid(
                    format!("simulation.segments[{}].id", i),
                    "cannot be empty",
                ));
            }
            if !segments.insert(segment.id.as_str()) {
                return Err(ConfigError::invalid(
                    format!("simulation.segments[{}].id", i),
                    format!("duplicate segment '{}'", segment.id),
                ));
            }
            if segment.lanes == 0 {
                return Err(ConfigError::invalid(
                    format!("simulation.segments[{}].lanes", i),
                    "must be at least 1",
                ));
            }
            positive(&format!("simulation.segments[{}].length", i), segment.length)?;
        }
        for (i, segment) in sim.segments.iter().enumerate() {
            if let Some(next) = &segment.next {
                if !segments.contains(next.as_str()) {
                    return Err(ConfigError::invalid(
                        format!("simulation.segments[{}].next", i),
                        format!("unknown segment '{}'", next),
                    ));
                }
            }
        }

        let mut vehicles = HashSet::new();
        for (i, vehicle) in sim.vehicles.iter().enumerate() {
            if vehicle.id.is_empty() {
                return Err(ConfigError::invalid(
                    format!("simulation.vehicles[{}].id", i),
                    "cannot be empty",
                ));
            }
            if !vehicles.insert(vehicle.id.as_str()) {
                return Err(ConfigError::invalid(
                    format!("simulation.vehicles[{}].id", i),
                    format!("duplicate vehicle '{}'", vehicle.id),
                ));
            }
            let Some(segment) = sim.segments.iter().find(|s| s.id == vehicle.segment) else {
                return Err(ConfigError::invalid(
                    format!("simulation.vehicles[{}].segment", i),
                    format!("unknown segment '{}'", vehicle.segment),
                ));
            };
            if vehicle.lane >= segment.lanes {
                return Err(ConfigError::invalid(
                    format!("simulation.vehicles[{}].lane", i),
                    format!("segment '{}' has {} lane(s)", segment.id, segment.lanes),
                ));
            }
            non_negative(&format!("simulation.vehicles[{}].speed", i), vehicle.speed)?;
        }

        if let Some(accident) = &sim.accident {
            if !vehicles.contains(accident.vehicle.as_str()) {
                return Err(ConfigError::invalid(
                    "simulation.accident.vehicle",
                    format!("unknown vehicle '{}'", accident.vehicle),
                ));
            }
            non_negative("simulation.accident.at_seconds", accident.at_seconds)?;
        }

        Ok(())
    }
}

fn positive(field: &str, value: f64) -> Result<(), ConfigError> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, "must be a positive number"))
    }
}

fn non_negative(field: &str, value: f64) -> Result<(), ConfigError> {
    if value >= 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, "must not be negative"))
    }
}

/// Seconds as a `Duration`, clamping negative or non-finite values to zero.
pub(crate) fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_relay_config_defaults() {
        let config = RelayConfig::default();
        assert_eq!(config.detector.stopped_speed_threshold, 0.1);
        assert_eq!(config.reactor.arrival_distance_threshold, 200.0);
        assert_eq!(config.transport.kind, TransportKind::Loopback);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_parse_minimal_toml() {
        let toml = r#"
        [detector]
        min_stop_time_seconds = 5.0
        "#;

        let config: RelayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.detector.min_stop_time_seconds, 5.0);
        assert_eq!(config.detector.poll_interval_seconds, 1.0);
    }

    #[test]
    fn test_config_parse_full_toml() {
        let toml = include_str!("../../hazard.example.toml");
        let config: RelayConfig = toml::from_str(toml).unwrap();
        assert!(config.validate().is_ok());
        assert!(!config.simulation.vehicles.is_empty());
    }

    #[test]
    fn test_config_parse_vehicles_array() {
        let toml = r#"
        [simulation]
        segments = [{ id = "a", lanes = 3 }]

        [[simulation.vehicles]]
        id = "car1"
        segment = "a"
        lane = 2
        speed = 8.0

        [[simulation.vehicles]]
        id = "car2"
        segment = "a"
        position = 40.0
        speed = 9.0
        route = "r1"
        "#;

        let config: RelayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.simulation.vehicles.len(), 2);
        assert_eq!(config.simulation.vehicles[1].route, "r1");
        assert_eq!(config.simulation.segments[0].lanes, 3);
    }

    #[test]
    fn test_config_load_from_file() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[router]\nassumed_lane_count = 3").unwrap();

        let config = RelayConfig::load(Some(temp.path())).unwrap();
        assert_eq!(config.router.assumed_lane_count, 3);
    }

    #[test]
    fn test_config_missing_file_error() {
        let result = RelayConfig::load(Some(Path::new("/nonexistent/hazard.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_config_invalid_toml_error() {
        let temp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp.path(), "[detector\npoll").unwrap();

        let result = RelayConfig::load(Some(temp.path()));
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_config_env_overrides() {
        std::env::set_var("HAZARD_TRANSPORT", "udp");
        std::env::set_var("HAZARD_DURATION", "12.5");
        std::env::set_var("HAZARD_LOG_FORMAT", "yaml");
        let config = RelayConfig::default().with_env_overrides();
        std::env::remove_var("HAZARD_TRANSPORT");
        std::env::remove_var("HAZARD_DURATION");
        std::env::remove_var("HAZARD_LOG_FORMAT");

        assert_eq!(config.transport.kind, TransportKind::Udp);
        assert_eq!(config.simulation.duration_seconds, 12.5);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    fn field_of(result: Result<(), ConfigError>) -> String {
        match result {
            Err(ConfigError::Validation { field, .. }) => field,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_validate_poll_longer_than_dwell() {
        let mut config = RelayConfig::default();
        config.detector.poll_interval_seconds = 4.0;
        assert_eq!(field_of(config.validate()), "detector.poll_interval_seconds");
    }

    #[test]
    fn test_validate_non_positive_threshold() {
        let mut config = RelayConfig::default();
        config.reactor.arrival_distance_threshold = 0.0;
        assert_eq!(field_of(config.validate()), "reactor.arrival_distance_threshold");

        let mut config = RelayConfig::default();
        config.detector.stopped_speed_threshold = f64::NAN;
        assert_eq!(field_of(config.validate()), "detector.stopped_speed_threshold");
    }

    #[test]
    fn test_validate_zero_drop_every() {
        let mut config = RelayConfig::default();
        config.transport.drop_every = Some(0);
        assert_eq!(field_of(config.validate()), "transport.drop_every");
    }

    #[test]
    fn test_validate_vehicle_on_unknown_segment() {
        let mut config = RelayConfig::default();
        config.simulation.vehicles[1].segment = "nowhere".into();
        assert_eq!(field_of(config.validate()), "simulation.vehicles[1].segment");
    }

    #[test]
    fn test_validate_vehicle_lane_out_of_range() {
        let mut config = RelayConfig::default();
        config.simulation.vehicles[2].lane = 2;
        assert_eq!(field_of(config.validate()), "simulation.vehicles[2].lane");
    }

    #[test]
    fn test_validate_duplicate_vehicle() {
        let mut config = RelayConfig::default();
        config.simulation.vehicles[3].id = "veh0".into();
        assert_eq!(field_of(config.validate()), "simulation.vehicles[3].id");
    }

    #[test]
    fn test_validate_unknown_accident_vehicle() {
        let mut config = RelayConfig::default();
        config.simulation.accident = Some(AccidentConfig {
            vehicle: "ghost".into(),
            at_seconds: 1.0,
        });
        assert_eq!(field_of(config.validate()), "simulation.accident.vehicle");
    }

    #[test]
    fn test_validate_unknown_next_segment() {
        let mut config = RelayConfig::default();
        config.simulation.segments[0].next = Some("missing".into());
        assert_eq!(field_of(config.validate()), "simulation.segments[0].next");
    }

    #[test]
    fn test_seconds_clamps_invalid() {
        assert_eq!(seconds(-1.0), Duration::ZERO);
        assert_eq!(seconds(f64::NAN), Duration::ZERO);
        assert_eq!(seconds(0.5), Duration::from_millis(500));
    }
}
