//! Shared test utilities for the hazard relay integration tests.
//!
//! Builders for road networks, vehicles and configs, plus a kinematics
//! backend whose speeds can be scripted between polls.

#![allow(dead_code)]

use hazard::backend::{InMemoryBackend, RoadSegment, VehicleBackend, VehicleSpec};
use hazard::config::{
    AccidentConfig, DetectorConfig, RelayConfig, SegmentConfig, VehicleConfig,
};
use hazard::protocol::{AgentId, Position, RouteId, SegmentId};
use std::sync::Arc;

/// A two-lane, 1 km segment starting at the origin.
pub fn segment(id: &str) -> RoadSegment {
    RoadSegment {
        id: SegmentId::new(id),
        length: 1000.0,
        lanes: 2,
        origin: Position::new(0.0, 0.0),
        lane_width: 3.2,
        next: None,
    }
}

pub fn vehicle(id: &str, segment: &str, lane: u32, lane_position: f64, speed: f64) -> VehicleSpec {
    VehicleSpec {
        id: AgentId::new(id),
        segment: SegmentId::new(segment),
        lane,
        lane_position,
        speed,
        route: RouteId::new("r0"),
    }
}

/// Backend holding segment `S` and the given vehicles.
pub fn backend_with(vehicles: Vec<VehicleSpec>) -> Arc<InMemoryBackend> {
    let backend = InMemoryBackend::new();
    backend.add_segment(segment("S")).unwrap();
    for spec in vehicles {
        backend.add_vehicle(spec).unwrap();
    }
    Arc::new(backend)
}

/// Set one vehicle's speed, panicking if it is unknown.
pub fn set_speed(backend: &InMemoryBackend, agent: &str, speed: f64) {
    backend.set_speed(&AgentId::new(agent), speed).unwrap();
}

/// Detector config with a custom threshold and dwell time.
pub fn detector_config(threshold: f64, min_stop: f64) -> DetectorConfig {
    DetectorConfig {
        poll_interval_seconds: 1.0,
        initial_delay_seconds: 0.0,
        stopped_speed_threshold: threshold,
        min_stop_time_seconds: min_stop,
        monitored_segments: Vec::new(),
    }
}

/// A short scenario: one vehicle stops at `accident_at` in lane 0 ahead of
/// three vehicles driving towards it.
pub fn short_scenario(duration: f64, accident_at: f64) -> RelayConfig {
    let mut config = RelayConfig::default();
    config.detector.poll_interval_seconds = 0.1;
    config.detector.initial_delay_seconds = 0.1;
    config.detector.min_stop_time_seconds = 0.5;
    config.reactor.check_interval_seconds = 0.2;
    config.simulation.duration_seconds = duration;
    config.simulation.segments = vec![SegmentConfig {
        id: "road".to_string(),
        ..Default::default()
    }];

    let vehicle = |id: &str, lane: u32, position: f64| VehicleConfig {
        id: id.to_string(),
        segment: "road".to_string(),
        lane,
        position,
        speed: 12.0,
        route: "default".to_string(),
    };
    config.simulation.vehicles = vec![
        vehicle("stopper", 0, 500.0),
        vehicle("a", 0, 300.0),
        vehicle("b", 1, 250.0),
        vehicle("c", 0, 100.0),
    ];
    config.simulation.accident = Some(AccidentConfig {
        vehicle: "stopper".to_string(),
        at_seconds: accident_at,
    });
    config
}
