//! Simulation scenario configuration
//!
//! The default scenario is a single two-lane road with one vehicle that stops
//! at t = 5 s and four vehicles driving towards it.

use super::seconds;
use crate::backend::{RoadSegment, VehicleSpec};
use crate::protocol::{AgentId, Position, RouteId, SegmentId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub duration_seconds: f64,
    /// Kinematics integration step
    pub step_seconds: f64,
    pub segments: Vec<SegmentConfig>,
    pub vehicles: Vec<VehicleConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accident: Option<AccidentConfig>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        let vehicle = |id: &str, lane: u32, position: f64| VehicleConfig {
            id: id.to_string(),
            segment: "main".to_string(),
            lane,
            position,
            speed: 12.0,
            route: "main_route".to_string(),
        };

        Self {
            duration_seconds: 60.0,
            step_seconds: 0.1,
            segments: vec![SegmentConfig {
                id: "main".to_string(),
                ..Default::default()
            }],
            vehicles: vec![
                vehicle("acc0", 0, 400.0),
                vehicle("veh0", 0, 200.0),
                vehicle("veh1", 0, 100.0),
                vehicle("veh2", 1, 150.0),
                vehicle("veh3", 0, 0.0),
            ],
            accident: Some(AccidentConfig {
                vehicle: "acc0".to_string(),
                at_seconds: 5.0,
            }),
        }
    }
}

impl SimulationConfig {
    pub fn duration(&self) -> Duration {
        seconds(self.duration_seconds)
    }

    pub fn step(&self) -> Duration {
        seconds(self.step_seconds)
    }
}

/// A straight road segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    pub id: String,
    pub length: f64,
    pub lanes: u32,
    pub origin_x: f64,
    pub origin_y: f64,
    pub lane_width: f64,
    /// Segment vehicles continue onto
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            length: 2000.0,
            lanes: 2,
            origin_x: 0.0,
            origin_y: 0.0,
            lane_width: 3.2,
            next: None,
        }
    }
}

impl From<&SegmentConfig> for RoadSegment {
    fn from(config: &SegmentConfig) -> Self {
        RoadSegment {
            id: SegmentId::new(&config.id),
            length: config.length,
            lanes: config.lanes,
            origin: Position::new(config.origin_x, config.origin_y),
            lane_width: config.lane_width,
            next: config.next.as_deref().map(SegmentId::from),
        }
    }
}

/// Initial placement of a vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleConfig {
    pub id: String,
    pub segment: String,
    #[serde(default)]
    pub lane: u32,
    /// Offset along the segment
    #[serde(default)]
    pub position: f64,
    /// Cruising speed in m/s
    pub speed: f64,
    #[serde(default = "default_route")]
    pub route: String,
}

fn default_route() -> String {
    "default".to_string()
}

impl From<&VehicleConfig> for VehicleSpec {
    fn from(config: &VehicleConfig) -> Self {
        VehicleSpec {
            id: AgentId::new(&config.id),
            segment: SegmentId::new(&config.segment),
            lane: config.lane,
            lane_position: config.position,
            speed: config.speed,
            route: RouteId::new(&config.route),
        }
    }
}

/// Stop one vehicle in its lane at a fixed time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccidentConfig {
    pub vehicle: String,
    pub at_seconds: f64,
}

impl AccidentConfig {
    pub fn at(&self) -> Duration {
        seconds(self.at_seconds)
    }
}
