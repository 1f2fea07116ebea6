use crate::protocol::{AgentId, LaneId};
use thiserror::Error;

/// The evasion lane for a hazard could not be determined.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TopologyError {
    #[error("lane id '{0}' is not of the form <segment>_<index>")]
    MalformedLane(LaneId),

    #[error("segment of lane '{lane}' has {lanes} lane(s), no alternative lane")]
    NoAlternativeLane { lane: LaneId, lanes: u32 },

    #[error("lane '{lane}' is outside a segment with {lanes} lane(s)")]
    LaneOutOfRange { lane: LaneId, lanes: u32 },
}

/// Failures the router recovers from without stopping the dispatch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RouterError {
    #[error(transparent)]
    Topology(#[from] TopologyError),

    #[error("no address registered for agent '{0}'")]
    AddressResolution(AgentId),
}
