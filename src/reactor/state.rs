use crate::backend::BackendError;
use crate::protocol::{AgentId, LaneId, Position};
use std::fmt;
use tokio::time::Instant;

/// An evasion in progress.
#[derive(Debug, Clone, PartialEq)]
pub struct Maneuver {
    pub hazard_agent: AgentId,
    pub origin_lane: LaneId,
    pub target_lane: LaneId,
    pub hazard_position: Position,
    pub started_at: Instant,
    /// Position checks performed so far
    pub checks: u32,
}

/// Local state of one vehicle.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ReactorState {
    #[default]
    Normal,
    Maneuvering(Maneuver),
    /// The vehicle is the hazard itself and ignores commands
    Stopped,
}

impl ReactorState {
    pub fn is_normal(&self) -> bool {
        matches!(self, ReactorState::Normal)
    }

    pub fn maneuver(&self) -> Option<&Maneuver> {
        match self {
            ReactorState::Maneuvering(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Display for ReactorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReactorState::Normal => write!(f, "normal"),
            ReactorState::Maneuvering(_) => write!(f, "maneuvering"),
            ReactorState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Result of offering a command to the reactor.
#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    /// Entered Maneuvering; a position check must be scheduled
    Started,
    /// Not Normal; the command was ignored
    Rejected,
    /// The cost mutation failed; still Normal
    Failed(BackendError),
}

/// Result of one position check.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckOutcome {
    /// Arrival predicate held; cost restored, back to Normal
    Arrived,
    /// Not there yet; check again later
    Pending,
    /// Backend failure; back to Normal without restoring cost
    Abandoned(BackendError),
    /// Maneuver exceeded its time bound; cost restored, back to Normal
    TimedOut,
    /// No maneuver in progress
    Idle,
}

impl CheckOutcome {
    pub fn reschedule(&self) -> bool {
        matches!(self, CheckOutcome::Pending)
    }
}
