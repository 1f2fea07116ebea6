//! Vehicle reactor configuration

use super::seconds;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReactorConfig {
    pub check_interval_seconds: f64,
    /// Distance from the hazard (m) beyond which the maneuver is complete
    pub arrival_distance_threshold: f64,
    /// Cost applied to the hazard lane while maneuvering
    pub evasion_cost: f64,
    /// Give up a maneuver after this long. Unset polls until arrival.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_maneuver_seconds: Option<f64>,
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            check_interval_seconds: 1.0,
            arrival_distance_threshold: 200.0,
            evasion_cost: 9999.0,
            max_maneuver_seconds: None,
        }
    }
}

impl ReactorConfig {
    pub fn check_interval(&self) -> Duration {
        seconds(self.check_interval_seconds)
    }

    pub fn max_maneuver(&self) -> Option<Duration> {
        self.max_maneuver_seconds.map(seconds)
    }
}
