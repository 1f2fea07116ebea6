use super::{BackendError, Kinematics, LaneCost, VehicleBackend};
use crate::protocol::{AgentId, LaneId, Position, RouteId, SegmentId};
use dashmap::DashMap;
use std::cmp::Ordering;
use std::collections::HashMap;

/// A straight road segment laid along the x axis.
///
/// Lane `i` runs at `origin.y + i * lane_width`; travel is towards +x.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadSegment {
    pub id: SegmentId,
    pub length: f64,
    pub lanes: u32,
    pub origin: Position,
    pub lane_width: f64,
    /// Segment a vehicle continues onto at the end of this one
    pub next: Option<SegmentId>,
}

/// Initial placement of a vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleSpec {
    pub id: AgentId,
    pub segment: SegmentId,
    pub lane: u32,
    pub lane_position: f64,
    pub speed: f64,
    pub route: RouteId,
}

#[derive(Debug, Clone)]
struct VehicleRecord {
    segment: SegmentId,
    lane: u32,
    lane_position: f64,
    speed: f64,
    route: RouteId,
    lane_costs: HashMap<LaneId, f64>,
    target_lane: Option<LaneId>,
}

/// Minimal kinematic model of a road network.
///
/// No car following: vehicles on the same lane pass through each other.
/// A vehicle whose current lane carries a penalty moves to the cheapest lane of
/// its segment on the next [`step`](InMemoryBackend::step).
///
/// # Examples
///
/// ```
/// use hazard::backend::{InMemoryBackend, RoadSegment, VehicleBackend, VehicleSpec};
/// use hazard::protocol::{AgentId, Position, RouteId, SegmentId};
///
/// let backend = InMemoryBackend::new();
/// backend.add_segment(RoadSegment {
///     id: SegmentId::new("s1"),
///     length: 500.0,
///     lanes: 2,
///     origin: Position::new(0.0, 0.0),
///     lane_width: 3.2,
///     next: None,
/// }).unwrap();
/// backend.add_vehicle(VehicleSpec {
///     id: AgentId::new("veh0"),
///     segment: SegmentId::new("s1"),
///     lane: 0,
///     lane_position: 10.0,
///     speed: 10.0,
///     route: RouteId::new("r0"),
/// }).unwrap();
///
/// backend.step(1.0);
/// let k = backend.kinematics(&AgentId::new("veh0")).unwrap();
/// assert_eq!(k.lane_position, 20.0);
/// ```
#[derive(Default)]
pub struct InMemoryBackend {
    segments: DashMap<SegmentId, RoadSegment>,
    vehicles: DashMap<AgentId, VehicleRecord>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_segment(&self, segment: RoadSegment) -> Result<(), BackendError> {
        if self.segments.contains_key(&segment.id) {
            return Err(BackendError::DuplicateSegment(segment.id));
        }
        self.segments.insert(segment.id.clone(), segment);
        Ok(())
    }

    pub fn add_vehicle(&self, spec: VehicleSpec) -> Result<(), BackendError> {
        if self.vehicles.contains_key(&spec.id) {
            return Err(BackendError::DuplicateAgent(spec.id));
        }
        let lanes = self
            .lane_count(&spec.segment)
            .ok_or_else(|| BackendError::UnknownSegment(spec.segment.clone()))?;
        if spec.lane >= lanes {
            return Err(BackendError::UnknownLane(LaneId::on_segment(
                &spec.segment,
                spec.lane,
            )));
        }

        self.vehicles.insert(
            spec.id,
            VehicleRecord {
                segment: spec.segment,
                lane: spec.lane,
                lane_position: spec.lane_position,
                speed: spec.speed,
                route: spec.route,
                lane_costs: HashMap::new(),
                target_lane: None,
            },
        );
        Ok(())
    }

    /// Take a vehicle out of the simulation.
    pub fn remove_vehicle(&self, agent: &AgentId) -> Result<(), BackendError> {
        self.vehicles
            .remove(agent)
            .map(|_| ())
            .ok_or_else(|| BackendError::UnknownAgent(agent.clone()))
    }

    pub fn vehicle_count(&self) -> usize {
        self.vehicles.len()
    }

    /// Advance every vehicle by `dt` seconds.
    ///
    /// Returns the vehicles that drove off the end of the network during this
    /// step; they are no longer known to the backend.
    pub fn step(&self, dt: f64) -> Vec<AgentId> {
        let mut departed = Vec::new();

        for mut entry in self.vehicles.iter_mut() {
            let agent = entry.key().clone();
            let segment = match self.segments.get(&entry.segment) {
                Some(segment) => segment.clone(),
                None => {
                    departed.push(agent);
                    continue;
                }
            };

            let record = entry.value_mut();
            record.lane = choose_lane(record, &segment);
            record.lane_position += record.speed * dt;

            if record.lane_position > segment.length {
                let next = segment
                    .next
                    .as_ref()
                    .and_then(|id| self.segments.get(id).map(|s| s.clone()));
                match next {
                    Some(next) => {
                        record.lane_position -= segment.length;
                        record.lane = record.lane.min(next.lanes.saturating_sub(1));
                        record.segment = next.id;
                        record.target_lane = None;
                    }
                    None => departed.push(agent),
                }
            }
        }

        for agent in &departed {
            self.vehicles.remove(agent);
            tracing::debug!(agent_id = %agent, "Vehicle left the simulation");
        }

        departed
    }

    fn with_vehicle<T>(
        &self,
        agent: &AgentId,
        f: impl FnOnce(&mut VehicleRecord) -> T,
    ) -> Result<T, BackendError> {
        let mut record = self
            .vehicles
            .get_mut(agent)
            .ok_or_else(|| BackendError::UnknownAgent(agent.clone()))?;
        Ok(f(record.value_mut()))
    }
}

fn choose_lane(record: &VehicleRecord, segment: &RoadSegment) -> u32 {
    if let Some((target_segment, index)) = record.target_lane.as_ref().and_then(LaneId::split) {
        if target_segment == segment.id && index < segment.lanes {
            return index;
        }
    }

    let cost = |index: u32| {
        record
            .lane_costs
            .get(&LaneId::on_segment(&segment.id, index))
            .copied()
            .unwrap_or(0.0)
    };

    if cost(record.lane) <= 0.0 {
        return record.lane;
    }

    (0..segment.lanes)
        .min_by(|a, b| {
            cost(*a)
                .partial_cmp(&cost(*b))
                .unwrap_or(Ordering::Equal)
                .then(a.abs_diff(record.lane).cmp(&b.abs_diff(record.lane)))
        })
        .unwrap_or(record.lane)
}

impl VehicleBackend for InMemoryBackend {
    fn agents(&self) -> Vec<AgentId> {
        let mut agents: Vec<_> = self.vehicles.iter().map(|e| e.key().clone()).collect();
        agents.sort();
        agents
    }

    fn kinematics(&self, agent: &AgentId) -> Result<Kinematics, BackendError> {
        let record = self
            .vehicles
            .get(agent)
            .ok_or_else(|| BackendError::UnknownAgent(agent.clone()))?;
        let segment = self
            .segments
            .get(&record.segment)
            .ok_or_else(|| BackendError::UnknownSegment(record.segment.clone()))?;

        Ok(Kinematics {
            segment: segment.id.clone(),
            lane: LaneId::on_segment(&segment.id, record.lane),
            position: Position::new(
                segment.origin.x + record.lane_position,
                segment.origin.y + f64::from(record.lane) * segment.lane_width,
            ),
            lane_position: record.lane_position,
            speed: record.speed,
        })
    }

    fn route(&self, agent: &AgentId) -> Result<RouteId, BackendError> {
        self.with_vehicle(agent, |record| record.route.clone())
    }

    fn lane_count(&self, segment: &SegmentId) -> Option<u32> {
        self.segments.get(segment).map(|s| s.lanes)
    }

    fn next_segment(&self, segment: &SegmentId) -> Option<SegmentId> {
        self.segments.get(segment).and_then(|s| s.next.clone())
    }

    fn set_speed(&self, agent: &AgentId, speed: f64) -> Result<(), BackendError> {
        self.with_vehicle(agent, |record| record.speed = speed.max(0.0))
    }

    fn set_lane_cost(
        &self,
        agent: &AgentId,
        lane: &LaneId,
        cost: LaneCost,
    ) -> Result<(), BackendError> {
        let segment = lane
            .segment()
            .ok_or_else(|| BackendError::UnknownLane(lane.clone()))?;
        if !self.segments.contains_key(&segment) {
            return Err(BackendError::UnknownSegment(segment));
        }

        self.with_vehicle(agent, |record| match cost {
            LaneCost::Default => {
                record.lane_costs.remove(lane);
            }
            LaneCost::Penalized(value) => {
                record.lane_costs.insert(lane.clone(), value);
            }
        })
    }

    fn change_target(&self, agent: &AgentId, lane: &LaneId) -> Result<(), BackendError> {
        let (segment, index) = lane
            .split()
            .ok_or_else(|| BackendError::UnknownLane(lane.clone()))?;
        match self.lane_count(&segment) {
            Some(lanes) if index < lanes => {}
            Some(_) => return Err(BackendError::UnknownLane(lane.clone())),
            None => return Err(BackendError::UnknownSegment(segment)),
        }

        self.with_vehicle(agent, |record| record.target_lane = Some(lane.clone()))
    }
}
