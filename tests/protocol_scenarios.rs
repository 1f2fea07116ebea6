//! Protocol scenarios driven directly through the role state machines.
//!
//! No transport or runtime timers: each test advances a virtual clock and
//! calls the roles the way their nodes would.

mod common;

use common::{backend_with, detector_config, set_speed, vehicle};
use hazard::backend::VehicleBackend;
use hazard::config::{ReactorConfig, RouterConfig};
use hazard::detector::Detector;
use hazard::metrics::RunStats;
use hazard::protocol::{AgentId, HazardReport, LaneId, ManeuverCommand, Position};
use hazard::reactor::{Admission, Reactor, ReactorState};
use hazard::router::{Dispatch, Router};
use hazard::transport::AddressBook;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

fn at(start: Instant, seconds: u64) -> Instant {
    start + Duration::from_secs(seconds)
}

fn addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

// =============================================================================
// Debounce
// =============================================================================

#[test]
fn debounce_reports_once_after_dwell_time() {
    let backend = backend_with(vec![vehicle("V1", "S", 0, 100.0, 2.0)]);
    let stats = Arc::new(RunStats::new());
    let mut detector = Detector::new(backend.clone(), detector_config(0.5, 2.0), stats.clone());
    let start = Instant::now();

    // 2.0, 0.3, 0.2, 0.1 sampled once a second; the stop begins with the
    // first slow sample at t=1
    let speeds = [2.0, 0.3, 0.2, 0.1];
    let mut reports_at = Vec::new();
    let mut reported_positions = Vec::new();
    for (t, speed) in speeds.iter().enumerate() {
        set_speed(&backend, "V1", *speed);
        for report in detector.poll(at(start, t as u64)) {
            reports_at.push(t);
            reported_positions.push(report.position);
        }
    }

    assert_eq!(reports_at, vec![3]);
    let stopped_at = backend.kinematics(&AgentId::new("V1")).unwrap().position;
    assert_eq!(reported_positions, vec![stopped_at]);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.stop_candidates, 1);
    assert_eq!(snapshot.hazards_reported, 1);
}

#[test]
fn debounce_three_second_dwell_waits_for_full_interval() {
    let backend = backend_with(vec![vehicle("V1", "S", 0, 100.0, 2.0)]);
    let stats = Arc::new(RunStats::new());
    let mut detector = Detector::new(backend.clone(), detector_config(0.5, 3.0), stats.clone());
    let start = Instant::now();

    let speeds = [2.0, 0.3, 0.2, 0.1, 0.1, 0.0, 0.0];
    let mut reports_at = Vec::new();
    for (t, speed) in speeds.iter().enumerate() {
        set_speed(&backend, "V1", *speed);
        if !detector.poll(at(start, t as u64)).is_empty() {
            reports_at.push(t);
        }
    }

    // Slow since t=1, so the dwell is satisfied at t=4 and never again
    assert_eq!(reports_at, vec![4]);
    assert_eq!(stats.snapshot().hazards_reported, 1);
}

#[test]
fn debounce_resume_before_dwell_clears_candidate() {
    let backend = backend_with(vec![vehicle("V1", "S", 0, 100.0, 0.3)]);
    let stats = Arc::new(RunStats::new());
    let mut detector = Detector::new(backend.clone(), detector_config(0.5, 3.0), stats.clone());
    let start = Instant::now();
    let agent = AgentId::new("V1");

    set_speed(&backend, "V1", 0.3);
    assert!(detector.poll(at(start, 0)).is_empty());
    assert!(detector.candidate(&agent).is_some());

    set_speed(&backend, "V1", 0.2);
    assert!(detector.poll(at(start, 1)).is_empty());
    assert!(detector.candidate(&agent).is_some());

    set_speed(&backend, "V1", 0.6);
    assert!(detector.poll(at(start, 2)).is_empty());
    assert!(detector.candidate(&agent).is_none());

    // Stays quiet as long as the vehicle keeps moving
    for t in 3..10 {
        assert!(detector.poll(at(start, t)).is_empty());
    }
    assert_eq!(stats.snapshot().hazards_reported, 0);
}

#[test]
fn debounce_reports_a_second_stop_after_moving_again() {
    let backend = backend_with(vec![vehicle("V1", "S", 0, 100.0, 0.0)]);
    let stats = Arc::new(RunStats::new());
    let mut detector = Detector::new(backend.clone(), detector_config(0.5, 2.0), stats.clone());
    let start = Instant::now();

    let speeds = [0.0, 0.0, 0.0, 5.0, 0.0, 0.0, 0.0];
    let mut reports_at = Vec::new();
    for (t, speed) in speeds.iter().enumerate() {
        set_speed(&backend, "V1", *speed);
        if !detector.poll(at(start, t as u64)).is_empty() {
            reports_at.push(t);
        }
    }

    assert_eq!(reports_at, vec![2, 6]);
}

// =============================================================================
// Relay
// =============================================================================

fn router_for(
    backend: Arc<dyn VehicleBackend>,
    agents: &[(&str, u16)],
    stats: Arc<RunStats>,
) -> Router {
    let addresses = Arc::new(AddressBook::new());
    for (agent, port) in agents {
        addresses.register(AgentId::new(*agent), addr(*port));
    }
    Router::new(backend, addresses, &RouterConfig::default(), stats)
}

fn report_for(backend: &dyn VehicleBackend, agent: &str) -> HazardReport {
    let k = backend.kinematics(&AgentId::new(agent)).unwrap();
    HazardReport {
        agent_id: AgentId::new(agent),
        lane: k.lane,
        position: k.position,
        lane_position: k.lane_position,
        detected_at: chrono::Utc::now(),
    }
}

#[test]
fn relay_selects_only_vehicles_behind_the_hazard() {
    let backend = backend_with(vec![
        vehicle("H", "S", 0, 100.0, 0.0),
        vehicle("A", "S", 0, 50.0, 10.0),
        vehicle("B", "S", 0, 150.0, 10.0),
    ]);
    let stats = Arc::new(RunStats::new());
    let mut router = router_for(
        backend.clone(),
        &[("H", 5000), ("A", 5001), ("B", 5002)],
        stats.clone(),
    );

    let dispatch = router.on_hazard_report(&report_for(backend.as_ref(), "H"));

    let recipients: Vec<_> = dispatch
        .commands()
        .iter()
        .map(|o| o.recipient.as_str().to_string())
        .collect();
    assert_eq!(recipients, vec!["A"]);

    let command = &dispatch.commands()[0].command;
    assert_eq!(dispatch.commands()[0].address, addr(5001));
    assert_eq!(command.hazard_agent, AgentId::new("H"));
    assert_eq!(command.origin_lane, LaneId::new("S_0"));
    assert_eq!(command.target_lane, LaneId::new("S_1"));
}

#[test]
fn relay_duplicate_report_forwards_once() {
    let backend = backend_with(vec![
        vehicle("V1", "S", 1, 400.0, 0.0),
        vehicle("A", "S", 0, 50.0, 10.0),
        vehicle("B", "S", 1, 150.0, 10.0),
        vehicle("C", "S", 0, 350.0, 10.0),
    ]);
    let stats = Arc::new(RunStats::new());
    let mut router = router_for(
        backend.clone(),
        &[("A", 5001), ("B", 5002), ("C", 5003)],
        stats.clone(),
    );
    let report = report_for(backend.as_ref(), "V1");

    let first = router.on_hazard_report(&report);
    assert_eq!(first.commands().len(), 3);
    assert_eq!(router.forwarded_count(), 3);

    let second = router.on_hazard_report(&report);
    assert!(matches!(second, Dispatch::Duplicate));
    assert_eq!(router.forwarded_count(), 3);

    assert!(router.has_reported(&AgentId::new("V1")));
    assert_eq!(stats.snapshot().reports_discarded, 1);
}

#[test]
fn relay_skips_vehicles_without_address() {
    let backend = backend_with(vec![
        vehicle("H", "S", 0, 500.0, 0.0),
        vehicle("A", "S", 0, 50.0, 10.0),
        vehicle("ghost", "S", 0, 60.0, 10.0),
    ]);
    let stats = Arc::new(RunStats::new());
    let mut router = router_for(backend.clone(), &[("A", 5001)], stats.clone());

    let dispatch = router.on_hazard_report(&report_for(backend.as_ref(), "H"));

    match dispatch {
        Dispatch::Forwarded { commands, skipped } => {
            assert_eq!(commands.len(), 1);
            assert_eq!(skipped.len(), 1);
        }
        other => panic!("Expected Forwarded, got {:?}", other),
    }
    assert_eq!(stats.snapshot().forwards_skipped, 1);
}

// =============================================================================
// Reaction
// =============================================================================

fn command_from(hazard: &str, origin: &str, target: &str, x: f64) -> ManeuverCommand {
    ManeuverCommand {
        hazard_agent: AgentId::new(hazard),
        origin_lane: LaneId::new(origin),
        target_lane: LaneId::new(target),
        hazard_position: Position::new(x, 0.0),
        issued_at: chrono::Utc::now(),
    }
}

#[test]
fn reactor_second_command_is_ignored_while_maneuvering() {
    let backend = backend_with(vec![vehicle("A", "S", 0, 50.0, 10.0)]);
    let stats = Arc::new(RunStats::new());
    let mut reactor = Reactor::new(
        AgentId::new("A"),
        backend.clone(),
        ReactorConfig::default(),
        stats.clone(),
    );
    let now = Instant::now();

    let first = reactor.on_command(&command_from("H", "S_0", "S_1", 100.0), now);
    let second = reactor.on_command(&command_from("H2", "S_0", "S_1", 120.0), now);

    assert_eq!(first, Admission::Started);
    assert_eq!(second, Admission::Rejected);
    let maneuver = reactor.state().maneuver().unwrap();
    assert_eq!(maneuver.hazard_agent, AgentId::new("H"));

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.maneuvers_started, 1);
    assert_eq!(snapshot.maneuvers_rejected, 1);
}

#[test]
fn reactor_changes_lane_and_completes_after_passing() {
    let backend = backend_with(vec![vehicle("A", "S", 0, 50.0, 10.0)]);
    let stats = Arc::new(RunStats::new());
    let config = ReactorConfig {
        arrival_distance_threshold: 20.0,
        ..Default::default()
    };
    let mut reactor = Reactor::new(AgentId::new("A"), backend.clone(), config, stats.clone());
    let start = Instant::now();

    assert_eq!(
        reactor.on_command(&command_from("H", "S_0", "S_1", 100.0), start),
        Admission::Started
    );

    // The penalty moves the vehicle to lane 1 on the next step
    backend.step(1.0);
    let k = backend.kinematics(&AgentId::new("A")).unwrap();
    assert_eq!(k.lane, LaneId::new("S_1"));

    // Alongside the hazard: still maneuvering
    backend.step(4.0);
    reactor.check_position(at(start, 5));
    assert!(reactor.state().maneuver().is_some());

    // 30 m past it on the evasion lane
    backend.step(3.0);
    reactor.check_position(at(start, 8));
    assert_eq!(*reactor.state(), ReactorState::Normal);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.maneuvers_completed, 1);
    assert_eq!(snapshot.maneuvers_abandoned, 0);
}

#[test]
fn reactor_ignores_commands_after_accident() {
    let backend = backend_with(vec![vehicle("A", "S", 0, 50.0, 10.0)]);
    let stats = Arc::new(RunStats::new());
    let mut reactor = Reactor::new(
        AgentId::new("A"),
        backend.clone(),
        ReactorConfig::default(),
        stats.clone(),
    );

    reactor.trigger_accident().unwrap();
    assert_eq!(*reactor.state(), ReactorState::Stopped);
    assert_eq!(backend.kinematics(&AgentId::new("A")).unwrap().speed, 0.0);

    let admission = reactor.on_command(&command_from("H", "S_0", "S_1", 100.0), Instant::now());
    assert_eq!(admission, Admission::Rejected);
}
