//! In-process simulation runner.
//!
//! Builds the kinematic road network from [`SimulationConfig`], starts one
//! detector, one router and one reactor per vehicle over the configured
//! transport, advances the kinematics on a fixed step and collects the run
//! statistics when the run ends.
//!
//! [`SimulationConfig`]: crate::config::SimulationConfig

mod error;

pub use error::SimError;

use crate::backend::{InMemoryBackend, RoadSegment, VehicleBackend, VehicleSpec};
use crate::config::{RelayConfig, TransportKind};
use crate::detector::Detector;
use crate::metrics::{EventSink, FanoutSink, RunStats, StatsSnapshot};
use crate::node::{DetectorNode, ReactorNode, RouterNode};
use crate::protocol::{AgentId, LaneId};
use crate::reactor::Reactor;
use crate::router::Router;
use crate::transport::{AddressBook, Inbox, LoopbackNetwork, Transport, UdpTransport};
use serde::Serialize;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Final state of one vehicle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleOutcome {
    pub agent: AgentId,
    pub state: String,
    /// Absent once the vehicle has left the network
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lane: Option<LaneId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lane_position: Option<f64>,
}

/// What a run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: String,
    pub transport: TransportKind,
    pub elapsed_seconds: f64,
    /// Ended by the shutdown token rather than the configured duration
    pub interrupted: bool,
    pub stats: StatsSnapshot,
    pub vehicles: Vec<VehicleOutcome>,
}

enum Network {
    Loopback(Arc<LoopbackNetwork>),
    Udp(IpAddr),
}

struct Endpoint {
    transport: Arc<dyn Transport>,
    inbox: Inbox,
}

impl Network {
    fn from_config(config: &RelayConfig) -> Result<Self, SimError> {
        match config.transport.kind {
            TransportKind::Loopback => Ok(Network::Loopback(LoopbackNetwork::new(
                config.transport.fault_plan(),
            ))),
            TransportKind::Udp => config
                .transport
                .bind_host
                .parse()
                .map(Network::Udp)
                .map_err(|_| SimError::BindHost(config.transport.bind_host.clone())),
        }
    }

    async fn endpoint(
        &self,
        cancel: &CancellationToken,
        receivers: &mut Vec<JoinHandle<()>>,
    ) -> Result<Endpoint, SimError> {
        match self {
            Network::Loopback(network) => {
                let (transport, inbox) = network.endpoint();
                Ok(Endpoint {
                    transport: Arc::new(transport),
                    inbox,
                })
            }
            Network::Udp(host) => {
                let transport = UdpTransport::bind(SocketAddr::new(*host, 0)).await?;
                let (tx, inbox) = tokio::sync::mpsc::unbounded_channel();
                receivers.push(transport.start_receiver(tx, cancel.clone()));
                Ok(Endpoint {
                    transport: Arc::new(transport),
                    inbox,
                })
            }
        }
    }
}

/// Build the road network described by `config`.
pub fn build_backend(config: &RelayConfig) -> Result<InMemoryBackend, SimError> {
    let backend = InMemoryBackend::new();
    for segment in &config.simulation.segments {
        backend.add_segment(RoadSegment::from(segment))?;
    }
    for vehicle in &config.simulation.vehicles {
        backend.add_vehicle(VehicleSpec::from(vehicle))?;
    }
    Ok(backend)
}

/// Run one simulation to completion.
///
/// The run lasts `simulation.duration_seconds` unless `shutdown` fires first.
/// `extra_sink` receives every protocol event alongside the run statistics.
pub async fn run(
    config: &RelayConfig,
    extra_sink: Option<Arc<dyn EventSink>>,
    shutdown: CancellationToken,
) -> Result<RunSummary, SimError> {
    config.validate()?;

    let run_id = crate::logging::generate_run_id();
    let span = tracing::info_span!("run", run_id = %run_id);
    run_inner(config, extra_sink, shutdown, run_id)
        .instrument(span)
        .await
}

async fn run_inner(
    config: &RelayConfig,
    extra_sink: Option<Arc<dyn EventSink>>,
    shutdown: CancellationToken,
    run_id: String,
) -> Result<RunSummary, SimError> {
    let backend = Arc::new(build_backend(config)?);
    let stats = Arc::new(RunStats::new());
    let mut fanout = FanoutSink::new().with(stats.clone());
    if let Some(extra) = extra_sink {
        fanout = fanout.with(extra);
    }
    let sink: Arc<dyn EventSink> = Arc::new(fanout);

    let addresses = Arc::new(AddressBook::new());
    let network = Network::from_config(config)?;
    let cancel = CancellationToken::new();
    // Tears down anything already started if a later step fails
    let _guard = cancel.clone().drop_guard();
    let mut receivers = Vec::new();

    let router_endpoint = network.endpoint(&cancel, &mut receivers).await?;
    let detector_endpoint = network.endpoint(&cancel, &mut receivers).await?;
    let mut vehicle_endpoints = Vec::with_capacity(config.simulation.vehicles.len());
    for vehicle in &config.simulation.vehicles {
        vehicle_endpoints.push((vehicle, network.endpoint(&cancel, &mut receivers).await?));
    }

    let router_addr = router_endpoint.transport.local_addr();
    let router = Router::new(backend.clone(), addresses.clone(), &config.router, sink.clone());
    let router_handle = RouterNode::new(
        router,
        router_endpoint.transport,
        router_endpoint.inbox,
        sink.clone(),
    )
    .start(cancel.clone());

    let detector = Detector::new(backend.clone(), config.detector.clone(), sink.clone());
    let detector_handle = DetectorNode::new(
        detector,
        detector_endpoint.transport,
        router_addr,
        sink.clone(),
    )
    .start(cancel.clone());

    let accident = config.simulation.accident.as_ref();
    let mut vehicle_tokens = HashMap::new();
    let mut reactor_handles = Vec::new();
    for (vehicle, endpoint) in vehicle_endpoints {
        let agent = AgentId::new(&vehicle.id);
        let local_addr = endpoint.transport.local_addr();
        addresses.register(agent.clone(), local_addr);

        let reactor = Reactor::new(
            agent.clone(),
            backend.clone(),
            config.reactor.clone(),
            sink.clone(),
        );
        let mut node = ReactorNode::new(reactor, endpoint.inbox, local_addr, sink.clone());
        if let Some(accident) = accident.filter(|a| a.vehicle == vehicle.id) {
            node = node.with_accident(accident.at());
        }

        let token = cancel.child_token();
        reactor_handles.push(node.start(token.clone()));
        vehicle_tokens.insert(agent, token);
    }

    tracing::info!(
        vehicles = config.simulation.vehicles.len(),
        transport = %config.transport.kind,
        router = %router_addr,
        duration_seconds = config.simulation.duration_seconds,
        "Simulation started"
    );

    let stepper = spawn_stepper(
        backend.clone(),
        addresses.clone(),
        vehicle_tokens,
        config.simulation.step(),
        cancel.clone(),
    );

    let started = tokio::time::Instant::now();
    let interrupted = tokio::select! {
        _ = tokio::time::sleep(config.simulation.duration()) => false,
        _ = shutdown.cancelled() => {
            tracing::info!("Shutdown requested, stopping simulation");
            true
        }
    };
    let elapsed = started.elapsed();
    cancel.cancel();

    let mut reactors = Vec::with_capacity(reactor_handles.len());
    for handle in reactor_handles {
        match handle.await {
            Ok(reactor) => reactors.push(reactor),
            Err(e) => tracing::error!(error = %e, "Reactor task failed"),
        }
    }
    if let Err(e) = stepper.await {
        tracing::error!(error = %e, "Stepper task failed");
    }
    if let Err(e) = detector_handle.await {
        tracing::error!(error = %e, "Detector task failed");
    }
    if let Err(e) = router_handle.await {
        tracing::error!(error = %e, "Router task failed");
    }
    for handle in receivers {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Receiver task failed");
        }
    }

    let vehicles = reactors
        .iter()
        .map(|reactor| {
            let kinematics = backend.kinematics(reactor.agent()).ok();
            VehicleOutcome {
                agent: reactor.agent().clone(),
                state: reactor.state().to_string(),
                lane: kinematics.as_ref().map(|k| k.lane.clone()),
                lane_position: kinematics.map(|k| k.lane_position),
            }
        })
        .collect();

    let summary = RunSummary {
        run_id,
        transport: config.transport.kind,
        elapsed_seconds: elapsed.as_secs_f64(),
        interrupted,
        stats: stats.snapshot(),
        vehicles,
    };
    tracing::info!(
        elapsed_seconds = summary.elapsed_seconds,
        hazards = summary.stats.hazards_reported,
        forwarded = summary.stats.commands_forwarded,
        completed = summary.stats.maneuvers_completed,
        "Simulation finished"
    );
    Ok(summary)
}

/// Advance the kinematics every `step` and retire vehicles that leave the
/// network.
fn spawn_stepper(
    backend: Arc<InMemoryBackend>,
    addresses: Arc<AddressBook>,
    mut vehicle_tokens: HashMap<AgentId, CancellationToken>,
    step: Duration,
    cancel_token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(step);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first tick completes immediately
        interval.tick().await;
        let dt = step.as_secs_f64();

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                _ = interval.tick() => {
                    for agent in backend.step(dt) {
                        addresses.unregister(&agent);
                        if let Some(token) = vehicle_tokens.remove(&agent) {
                            token.cancel();
                        }
                        tracing::info!(agent_id = %agent, "Vehicle reached the end of the network");
                    }
                }
            }
        }
    }
    .in_current_span())
}
