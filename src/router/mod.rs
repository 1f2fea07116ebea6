//! Hazard relay and arbitration.
//!
//! The [`Router`] turns each distinct hazard into one [`ManeuverCommand`] per
//! affected vehicle. Hazards are deduplicated by the stopped vehicle's
//! identity; an identity is marked as handled before anything else is
//! computed, so a report that cannot be dispatched is never retried.

mod error;
mod selection;
mod topology;

pub use error::{RouterError, TopologyError};
pub use selection::{select_affected, AffectedScope, HazardSite, VehicleView};
pub use topology::evasion_lane;

use crate::backend::VehicleBackend;
use crate::config::RouterConfig;
use crate::metrics::{EventSink, ProtocolEvent, Role};
use crate::protocol::{AgentId, HazardReport, LaneId, ManeuverCommand, SegmentId};
use crate::transport::AddressBook;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

/// One command ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    pub recipient: AgentId,
    pub address: SocketAddr,
    pub command: ManeuverCommand,
}

/// What the router did with a hazard report.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// The hazard was already handled
    Duplicate,
    /// No evasion lane could be resolved; nothing is sent
    Abandoned(TopologyError),
    /// Commands for every resolvable affected vehicle
    Forwarded {
        commands: Vec<Outbound>,
        skipped: Vec<RouterError>,
    },
}

impl Dispatch {
    pub fn commands(&self) -> &[Outbound] {
        match self {
            Dispatch::Forwarded { commands, .. } => commands,
            _ => &[],
        }
    }
}

pub struct Router {
    backend: Arc<dyn VehicleBackend>,
    addresses: Arc<AddressBook>,
    scope: AffectedScope,
    assumed_lane_count: u32,
    sink: Arc<dyn EventSink>,
    reported: HashSet<AgentId>,
    forwarded: u64,
}

impl Router {
    pub fn new(
        backend: Arc<dyn VehicleBackend>,
        addresses: Arc<AddressBook>,
        config: &RouterConfig,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            backend,
            addresses,
            scope: AffectedScope::from_routes(config.affected_routes.iter().cloned()),
            assumed_lane_count: config.assumed_lane_count,
            sink,
            reported: HashSet::new(),
            forwarded: 0,
        }
    }

    /// Handle one hazard report.
    pub fn on_hazard_report(&mut self, report: &HazardReport) -> Dispatch {
        if !self.reported.insert(report.agent_id.clone()) {
            tracing::debug!(agent_id = %report.agent_id, "Hazard already dispatched, discarding report");
            self.sink.record(&ProtocolEvent::ReportDiscarded {
                agent: report.agent_id.clone(),
            });
            return Dispatch::Duplicate;
        }

        let (segment, target_lane) = match self.resolve_target(report) {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!(agent_id = %report.agent_id, lane = %report.lane, error = %e, "Cannot resolve evasion lane, abandoning hazard");
                self.sink.record(&ProtocolEvent::HazardAbandoned {
                    agent: report.agent_id.clone(),
                });
                return Dispatch::Abandoned(e);
            }
        };

        let mut site = HazardSite::new(report.agent_id.clone(), segment, report.lane_position);
        if self.scope.needs_routes() {
            site.downstream = self.downstream_of(&site.segment);
        }
        let vehicles = self.snapshot_vehicles();
        let affected = select_affected(&site, &vehicles, &self.scope);

        let mut commands = Vec::with_capacity(affected.len());
        let mut skipped = Vec::new();
        for vehicle in affected {
            match self.addresses.resolve(&vehicle.agent) {
                Some(address) => {
                    commands.push(Outbound {
                        recipient: vehicle.agent.clone(),
                        address,
                        command: ManeuverCommand::for_report(report, target_lane.clone()),
                    });
                }
                None => {
                    tracing::warn!(hazard_agent = %report.agent_id, agent_id = %vehicle.agent, "No address for affected vehicle, skipping");
                    self.sink.record(&ProtocolEvent::ForwardSkipped {
                        hazard: report.agent_id.clone(),
                        recipient: vehicle.agent.clone(),
                    });
                    skipped.push(RouterError::AddressResolution(vehicle.agent.clone()));
                }
            }
        }

        self.forwarded += commands.len() as u64;
        tracing::info!(
            agent_id = %report.agent_id,
            target_lane = %target_lane,
            affected = commands.len() + skipped.len(),
            forwarded = commands.len(),
            "Hazard dispatched"
        );

        Dispatch::Forwarded { commands, skipped }
    }

    fn resolve_target(
        &self,
        report: &HazardReport,
    ) -> Result<(SegmentId, LaneId), TopologyError> {
        let segment = report
            .lane
            .segment()
            .ok_or_else(|| TopologyError::MalformedLane(report.lane.clone()))?;
        let lanes = self
            .backend
            .lane_count(&segment)
            .unwrap_or(self.assumed_lane_count);
        let target = evasion_lane(&report.lane, lanes)?;
        Ok((segment, target))
    }

    /// Segments reachable from `segment` by following the road forward.
    /// A loop back onto `segment` stops the walk.
    fn downstream_of(&self, segment: &SegmentId) -> HashSet<SegmentId> {
        let mut downstream = HashSet::new();
        let mut current = self.backend.next_segment(segment);
        while let Some(next) = current {
            if &next == segment || !downstream.insert(next.clone()) {
                break;
            }
            current = self.backend.next_segment(&next);
        }
        downstream
    }

    fn snapshot_vehicles(&self) -> Vec<VehicleView> {
        let mut vehicles = Vec::new();
        for agent in self.backend.agents() {
            let kinematics = match self.backend.kinematics(&agent) {
                Ok(k) => k,
                Err(e) => {
                    tracing::warn!(agent_id = %agent, error = %e, "Kinematics query failed, skipping agent");
                    self.sink.record(&ProtocolEvent::BackendFailure { role: Role::Router });
                    continue;
                }
            };
            let route = if self.scope.needs_routes() {
                match self.backend.route(&agent) {
                    Ok(route) => Some(route),
                    Err(e) => {
                        tracing::warn!(agent_id = %agent, error = %e, "Route query failed, skipping agent");
                        self.sink.record(&ProtocolEvent::BackendFailure { role: Role::Router });
                        continue;
                    }
                }
            } else {
                None
            };
            vehicles.push(VehicleView {
                agent,
                segment: kinematics.segment,
                lane_position: kinematics.lane_position,
                route,
            });
        }
        vehicles
    }

    /// Total commands produced over the router's lifetime.
    pub fn forwarded_count(&self) -> u64 {
        self.forwarded
    }

    pub fn has_reported(&self, agent: &AgentId) -> bool {
        self.reported.contains(agent)
    }

    pub fn reported_count(&self) -> usize {
        self.reported.len()
    }
}
