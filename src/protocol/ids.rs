use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Identity of a vehicle agent as known to the kinematics backend.
    AgentId
);

string_id!(
    /// A road segment (edge) of the network.
    SegmentId
);

string_id!(
    /// A single lane of a segment, encoded as `<segment>_<index>`.
    ///
    /// ```
    /// use hazard::protocol::{LaneId, SegmentId};
    ///
    /// let lane = LaneId::new("1/0to1/1_0");
    /// assert_eq!(lane.segment(), Some(SegmentId::new("1/0to1/1")));
    /// assert_eq!(lane.index(), Some(0));
    /// ```
    LaneId
);

string_id!(
    /// A route identifier assigned to a vehicle by the backend.
    RouteId
);

impl LaneId {
    /// Build the lane id for lane `index` of `segment`.
    pub fn on_segment(segment: &SegmentId, index: u32) -> Self {
        Self(format!("{}_{}", segment, index))
    }

    /// Split into segment and lane index.
    ///
    /// Returns `None` when the id has no `_` separator or the suffix is not a
    /// lane index.
    pub fn split(&self) -> Option<(SegmentId, u32)> {
        let (segment, index) = self.0.rsplit_once('_')?;
        if segment.is_empty() {
            return None;
        }
        let index = index.parse().ok()?;
        Some((SegmentId::new(segment), index))
    }

    pub fn segment(&self) -> Option<SegmentId> {
        self.split().map(|(segment, _)| segment)
    }

    pub fn index(&self) -> Option<u32> {
        self.split().map(|(_, index)| index)
    }
}

/// Planar world position in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Position) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}
