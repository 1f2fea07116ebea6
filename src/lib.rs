//! Hazard relay - roadside stop detection and lane-change advisories
//!
//! A detector watches vehicle kinematics for vehicles that have stopped in a
//! lane, a router relays each confirmed hazard exactly once to the vehicles
//! driving towards it, and an on-vehicle reactor steers away from the blocked
//! lane until it has passed the hazard.

pub mod backend;
pub mod cli;
pub mod config;
pub mod detector;
pub mod logging;
pub mod metrics;
pub mod node;
pub mod protocol;
pub mod reactor;
pub mod router;
pub mod scheduler;
pub mod sim;
pub mod transport;
