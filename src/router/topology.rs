use super::TopologyError;
use crate::protocol::LaneId;

/// Pick the lane vehicles should move to in order to pass a hazard on `origin`.
///
/// The evasion lane is an adjacent lane of the same segment: lane 0 evades to
/// lane 1, any other lane evades to the lane below it.
pub fn evasion_lane(origin: &LaneId, lane_count: u32) -> Result<LaneId, TopologyError> {
    let (segment, index) = origin
        .split()
        .ok_or_else(|| TopologyError::MalformedLane(origin.clone()))?;

    if lane_count < 2 {
        return Err(TopologyError::NoAlternativeLane {
            lane: origin.clone(),
            lanes: lane_count,
        });
    }
    if index >= lane_count {
        return Err(TopologyError::LaneOutOfRange {
            lane: origin.clone(),
            lanes: lane_count,
        });
    }

    let target = if index == 0 { 1 } else { index - 1 };
    Ok(LaneId::on_segment(&segment, target))
}
