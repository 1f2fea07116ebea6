//! End-to-end tests over the node actors and the loopback network.
//!
//! Runs under paused tokio time so timers fire deterministically.

mod common;

use common::{backend_with, detector_config, short_scenario, vehicle};
use hazard::backend::{InMemoryBackend, VehicleBackend};
use hazard::config::{ReactorConfig, RouterConfig};
use hazard::detector::Detector;
use hazard::metrics::{EventSink, RunStats};
use hazard::node::{DetectorNode, ReactorNode, RouterNode};
use hazard::protocol::{AgentId, LaneId};
use hazard::reactor::{Reactor, ReactorState};
use hazard::router::Router;
use hazard::transport::{AddressBook, FaultPlan, LoopbackNetwork, Transport};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

struct Harness {
    network: Arc<LoopbackNetwork>,
    stats: Arc<RunStats>,
    cancel: CancellationToken,
    detector: JoinHandle<Detector>,
    router: JoinHandle<Router>,
    reactors: Vec<JoinHandle<Reactor>>,
}

impl Harness {
    /// One detector, one router, and a reactor for every vehicle except the
    /// stopped one.
    fn start(backend: Arc<InMemoryBackend>, faults: FaultPlan, stopped: &str) -> Self {
        let network = LoopbackNetwork::new(faults);
        let stats = Arc::new(RunStats::new());
        let sink: Arc<dyn EventSink> = stats.clone();
        let addresses = Arc::new(AddressBook::new());
        let cancel = CancellationToken::new();

        let (router_tx, router_inbox) = network.endpoint();
        let router_addr = router_tx.local_addr();
        let router = Router::new(
            backend.clone(),
            addresses.clone(),
            &RouterConfig::default(),
            sink.clone(),
        );
        let router =
            RouterNode::new(router, Arc::new(router_tx), router_inbox, sink.clone())
                .start(cancel.clone());

        let (detector_tx, _detector_inbox) = network.endpoint();
        let detector = Detector::new(backend.clone(), detector_config(0.5, 2.0), sink.clone());
        let detector = DetectorNode::new(detector, Arc::new(detector_tx), router_addr, sink.clone())
            .start(cancel.clone());

        let mut reactors = Vec::new();
        for agent in backend.agents() {
            if agent.as_str() == stopped {
                continue;
            }
            let (transport, inbox) = network.endpoint();
            let local_addr = transport.local_addr();
            addresses.register(agent.clone(), local_addr);
            let reactor = Reactor::new(
                agent,
                backend.clone(),
                ReactorConfig {
                    arrival_distance_threshold: 50.0,
                    ..Default::default()
                },
                sink.clone(),
            );
            reactors.push(ReactorNode::new(reactor, inbox, local_addr, sink.clone()).start(cancel.clone()));
        }

        Self {
            network,
            stats,
            cancel,
            detector,
            router,
            reactors,
        }
    }

    async fn stop(self) -> (Detector, Router, Vec<Reactor>) {
        self.cancel.cancel();
        let detector = self.detector.await.unwrap();
        let router = self.router.await.unwrap();
        let mut reactors = Vec::new();
        for handle in self.reactors {
            reactors.push(handle.await.unwrap());
        }
        (detector, router, reactors)
    }
}

fn stopped_ahead_of_two() -> Arc<InMemoryBackend> {
    backend_with(vec![
        vehicle("H", "S", 0, 300.0, 0.0),
        vehicle("A", "S", 0, 100.0, 10.0),
        vehicle("B", "S", 1, 50.0, 10.0),
    ])
}

#[tokio::test(start_paused = true)]
async fn stopped_vehicle_is_relayed_to_upstream_reactors() {
    let backend = stopped_ahead_of_two();
    let harness = Harness::start(backend.clone(), FaultPlan::default(), "H");

    tokio::time::sleep(Duration::from_secs(5)).await;
    let stats = harness.stats.clone();
    let (detector, router, reactors) = harness.stop().await;

    assert!(router.has_reported(&AgentId::new("H")));
    assert_eq!(router.forwarded_count(), 2);
    assert!(detector.candidate(&AgentId::new("H")).is_some());
    for reactor in &reactors {
        assert!(
            matches!(reactor.state(), ReactorState::Maneuvering(m) if m.target_lane == LaneId::new("S_1")),
            "{} should be maneuvering",
            reactor.agent()
        );
    }

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.hazards_reported, 1);
    assert_eq!(snapshot.commands_forwarded, 2);
    assert_eq!(snapshot.maneuvers_started, 2);
    assert!(snapshot.mean_command_delay_ms.is_some());
}

#[tokio::test(start_paused = true)]
async fn duplicated_datagrams_do_not_double_dispatch() {
    let backend = stopped_ahead_of_two();
    let harness = Harness::start(
        backend.clone(),
        FaultPlan {
            duplicate_every: Some(1),
            ..Default::default()
        },
        "H",
    );

    tokio::time::sleep(Duration::from_secs(5)).await;
    let stats = harness.stats.clone();
    let (_detector, router, _reactors) = harness.stop().await;

    assert_eq!(router.forwarded_count(), 2);
    let snapshot = stats.snapshot();
    assert_eq!(snapshot.hazards_reported, 1);
    assert_eq!(snapshot.reports_discarded, 1);
    assert_eq!(snapshot.maneuvers_started, 2);
    assert_eq!(snapshot.maneuvers_rejected, 2);
}

#[tokio::test(start_paused = true)]
async fn lost_report_is_not_retransmitted() {
    let backend = stopped_ahead_of_two();
    let harness = Harness::start(
        backend.clone(),
        FaultPlan {
            drop_every: Some(1),
            ..Default::default()
        },
        "H",
    );

    tokio::time::sleep(Duration::from_secs(10)).await;
    let network = harness.network.clone();
    let stats = harness.stats.clone();
    let (_detector, router, reactors) = harness.stop().await;

    assert_eq!(network.sent_count(), 1);
    assert_eq!(network.delivered_count(), 0);
    assert!(!router.has_reported(&AgentId::new("H")));
    assert!(reactors.iter().all(|r| r.state().is_normal()));
    assert_eq!(stats.snapshot().hazards_reported, 1);
}

#[tokio::test(start_paused = true)]
async fn maneuver_completes_once_past_the_hazard() {
    let backend = backend_with(vec![
        vehicle("H", "S", 0, 300.0, 0.0),
        vehicle("A", "S", 0, 280.0, 1.0),
    ]);
    let harness = Harness::start(backend.clone(), FaultPlan::default(), "H");

    // Let the hazard be reported and the command land
    tokio::time::sleep(Duration::from_secs(3)).await;

    // The backend is not stepped until now, so A is still 20 m short of the
    // hazard. Drive it past at 20 m/s
    backend.set_speed(&AgentId::new("A"), 20.0).unwrap();
    for _ in 0..20 {
        backend.step(1.0);
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    let stats = harness.stats.clone();
    let (_detector, _router, reactors) = harness.stop().await;

    assert!(reactors[0].state().is_normal());
    let k = backend.kinematics(&AgentId::new("A")).unwrap();
    assert_eq!(k.lane, LaneId::new("S_1"));
    assert!(k.lane_position > 350.0);

    let snapshot = stats.snapshot();
    assert_eq!(snapshot.maneuvers_started, 1);
    assert_eq!(snapshot.maneuvers_completed, 1);
}

#[tokio::test(start_paused = true)]
async fn simulation_run_reports_accident_and_relays_it() {
    let config = short_scenario(5.0, 0.5);

    let summary = hazard::sim::run(&config, None, CancellationToken::new())
        .await
        .unwrap();

    assert!(!summary.interrupted);
    assert_eq!(summary.stats.accidents_triggered, 1);
    assert_eq!(summary.stats.hazards_reported, 1);
    assert_eq!(summary.stats.commands_forwarded, 3);
    assert_eq!(summary.stats.maneuvers_started, 3);
    assert_eq!(summary.stats.reports_discarded, 0);

    let stopper = summary
        .vehicles
        .iter()
        .find(|v| v.agent.as_str() == "stopper")
        .unwrap();
    assert_eq!(stopper.state, "stopped");
    assert_eq!(summary.vehicles.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn simulation_run_stops_on_shutdown() {
    let config = short_scenario(3600.0, 1.0);
    let shutdown = CancellationToken::new();

    let trigger = shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        trigger.cancel();
    });

    let summary = hazard::sim::run(&config, None, shutdown).await.unwrap();
    assert!(summary.interrupted);
    assert!(summary.elapsed_seconds < 3600.0);
}
