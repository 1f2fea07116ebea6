//! Wire protocol shared by the detector, router and vehicle roles.
//!
//! Payloads are JSON objects tagged with a `type` field so a receiver decodes a
//! datagram exactly once into a [`Message`] and dispatches on the variant.

mod error;
mod ids;
mod message;

pub use error::CodecError;
pub use ids::{AgentId, LaneId, Position, RouteId, SegmentId};
pub use message::{HazardReport, ManeuverCommand, Message, MAX_DATAGRAM_SIZE};
