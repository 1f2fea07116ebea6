use crate::protocol::{AgentId, LaneId, SegmentId};

/// Errors raised by a vehicle kinematics backend.
///
/// Callers treat every variant as transient: the agent may have left the
/// simulation between the enumeration and the query.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("agent not found: {0}")]
    UnknownAgent(AgentId),

    #[error("segment not found: {0}")]
    UnknownSegment(SegmentId),

    #[error("lane not found: {0}")]
    UnknownLane(LaneId),

    #[error("agent already exists: {0}")]
    DuplicateAgent(AgentId),

    #[error("segment already exists: {0}")]
    DuplicateSegment(SegmentId),

    #[error("backend unavailable: {0}")]
    Unavailable(String),
}
