//! Vehicle kinematics backend.
//!
//! The traffic simulator is an external collaborator. Roles only see it
//! through the synchronous [`VehicleBackend`] facade; [`InMemoryBackend`] is a
//! small kinematic stand-in used by the simulation runner and the tests.

mod error;
mod memory;

pub use error::*;
pub use memory::*;

use crate::protocol::{AgentId, LaneId, Position, RouteId, SegmentId};

/// Instantaneous state of one vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct Kinematics {
    pub segment: SegmentId,
    pub lane: LaneId,
    /// World position
    pub position: Position,
    /// Offset along the segment in the direction of travel
    pub lane_position: f64,
    /// Speed in m/s
    pub speed: f64,
}

/// Traversal cost a vehicle assigns to a lane when choosing where to drive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LaneCost {
    /// The backend's own cost
    Default,
    /// Explicit penalty; higher values push the vehicle off the lane
    Penalized(f64),
}

/// Query/command facade over the kinematics simulation.
pub trait VehicleBackend: Send + Sync {
    /// Every vehicle currently in the simulation.
    fn agents(&self) -> Vec<AgentId>;

    fn kinematics(&self, agent: &AgentId) -> Result<Kinematics, BackendError>;

    fn route(&self, agent: &AgentId) -> Result<RouteId, BackendError>;

    /// Number of lanes on `segment`, if the backend knows the segment.
    fn lane_count(&self, segment: &SegmentId) -> Option<u32>;

    /// Segment traffic continues onto at the end of `segment`.
    fn next_segment(&self, _segment: &SegmentId) -> Option<SegmentId> {
        None
    }

    fn set_speed(&self, agent: &AgentId, speed: f64) -> Result<(), BackendError>;

    fn set_lane_cost(
        &self,
        agent: &AgentId,
        lane: &LaneId,
        cost: LaneCost,
    ) -> Result<(), BackendError>;

    fn change_target(&self, agent: &AgentId, lane: &LaneId) -> Result<(), BackendError>;
}
