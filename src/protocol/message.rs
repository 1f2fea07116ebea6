use super::error::CodecError;
use super::ids::{AgentId, LaneId, Position};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Largest datagram a node will accept.
pub const MAX_DATAGRAM_SIZE: usize = 2048;

/// Emitted once by the detector when a vehicle has been stopped long enough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HazardReport {
    /// The immobilized vehicle
    pub agent_id: AgentId,
    /// Lane the vehicle occupies
    pub lane: LaneId,
    /// World position of the vehicle
    pub position: Position,
    /// Offset along the segment, increasing in the direction of travel
    pub lane_position: f64,
    /// Wall clock at which the debounce fired
    pub detected_at: DateTime<Utc>,
}

/// Sent by the router to each vehicle that must leave the hazard lane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManeuverCommand {
    pub hazard_agent: AgentId,
    pub origin_lane: LaneId,
    pub target_lane: LaneId,
    pub hazard_position: Position,
    pub issued_at: DateTime<Utc>,
}

impl ManeuverCommand {
    /// Build the command forwarded for `report`, steering onto `target_lane`.
    pub fn for_report(report: &HazardReport, target_lane: LaneId) -> Self {
        Self {
            hazard_agent: report.agent_id.clone(),
            origin_lane: report.lane.clone(),
            target_lane,
            hazard_position: report.position,
            issued_at: Utc::now(),
        }
    }
}

/// Every payload that travels over the transport.
///
/// Decoded once at the receive boundary; handlers match on the variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    HazardReport(HazardReport),
    ManeuverCommand(ManeuverCommand),
}

impl Message {
    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let bytes = serde_json::to_vec(self)?;
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(CodecError::TooLarge(bytes.len()));
        }
        Ok(bytes)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() > MAX_DATAGRAM_SIZE {
            return Err(CodecError::TooLarge(bytes.len()));
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Short variant name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::HazardReport(_) => "hazard_report",
            Message::ManeuverCommand(_) => "maneuver_command",
        }
    }
}

impl From<HazardReport> for Message {
    fn from(report: HazardReport) -> Self {
        Message::HazardReport(report)
    }
}

impl From<ManeuverCommand> for Message {
    fn from(command: ManeuverCommand) -> Self {
        Message::ManeuverCommand(command)
    }
}
