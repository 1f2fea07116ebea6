//! Roadside detector configuration

use super::seconds;
use crate::protocol::{LaneId, SegmentId};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub poll_interval_seconds: f64,
    /// Delay before the first poll
    pub initial_delay_seconds: f64,
    /// Speed (m/s) below which a vehicle counts as stopped
    pub stopped_speed_threshold: f64,
    /// Dwell time before a stop is reported
    pub min_stop_time_seconds: f64,
    /// Segment or lane ids to watch. Empty watches everything.
    pub monitored_segments: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            poll_interval_seconds: 1.0,
            initial_delay_seconds: 0.1,
            stopped_speed_threshold: 0.1,
            min_stop_time_seconds: 3.0,
            monitored_segments: Vec::new(),
        }
    }
}

impl DetectorConfig {
    pub fn poll_interval(&self) -> Duration {
        seconds(self.poll_interval_seconds)
    }

    pub fn initial_delay(&self) -> Duration {
        seconds(self.initial_delay_seconds)
    }

    pub fn min_stop_time(&self) -> Duration {
        seconds(self.min_stop_time_seconds)
    }

    /// Whether a vehicle on `lane` of `segment` is watched.
    pub fn monitors(&self, segment: &SegmentId, lane: &LaneId) -> bool {
        self.monitored_segments.is_empty()
            || self
                .monitored_segments
                .iter()
                .any(|m| m == segment.as_str() || m == lane.as_str())
    }
}
