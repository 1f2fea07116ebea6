//! Relay router configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Route ids treated as leading into a hazard. Empty selects by segment.
    pub affected_routes: Vec<String>,
    /// Lane count used when the backend does not know the hazard segment
    pub assumed_lane_count: u32,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            affected_routes: Vec::new(),
            assumed_lane_count: 2,
        }
    }
}
