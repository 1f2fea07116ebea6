//! # Protocol Event Types
//!
//! Events the roles hand to their [`EventSink`](super::EventSink), and the
//! JSON-serializable run summary built from them.

use crate::protocol::AgentId;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Which role observed an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Detector,
    Router,
    Reactor,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Detector => "detector",
            Role::Router => "router",
            Role::Reactor => "reactor",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something worth counting happened in one of the roles.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolEvent {
    /// Detector saw a vehicle below the stopped-speed threshold for the first time
    StopCandidateOpened { agent: AgentId },
    /// A candidate's vehicle sped up again
    StopCandidateCleared { agent: AgentId },
    /// Detector emitted a hazard report
    HazardReported { agent: AgentId },
    /// Router dropped a report for an already dispatched hazard
    ReportDiscarded { agent: AgentId },
    /// Router could not resolve an evasion lane
    HazardAbandoned { agent: AgentId },
    CommandForwarded { hazard: AgentId, recipient: AgentId },
    /// Recipient address could not be resolved or the send failed
    ForwardSkipped { hazard: AgentId, recipient: AgentId },
    ManeuverStarted { agent: AgentId },
    /// Command arrived while the reactor was not Normal
    ManeuverRejected { agent: AgentId },
    ManeuverCompleted { agent: AgentId, elapsed: Duration },
    /// Maneuver ended without arrival (backend failure or timeout)
    ManeuverAbandoned { agent: AgentId },
    /// Time between the router issuing a command and the reactor handling it
    CommandDelay { agent: AgentId, delay: Duration },
    /// Undecodable datagram
    PayloadDiscarded { role: Role },
    /// A backend call failed
    BackendFailure { role: Role },
    /// A message could not be put on the wire
    SendFailed { role: Role },
    AccidentTriggered { agent: AgentId },
}

impl ProtocolEvent {
    /// Stable snake_case name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            ProtocolEvent::StopCandidateOpened { .. } => "stop_candidate_opened",
            ProtocolEvent::StopCandidateCleared { .. } => "stop_candidate_cleared",
            ProtocolEvent::HazardReported { .. } => "hazard_reported",
            ProtocolEvent::ReportDiscarded { .. } => "report_discarded",
            ProtocolEvent::HazardAbandoned { .. } => "hazard_abandoned",
            ProtocolEvent::CommandForwarded { .. } => "command_forwarded",
            ProtocolEvent::ForwardSkipped { .. } => "forward_skipped",
            ProtocolEvent::ManeuverStarted { .. } => "maneuver_started",
            ProtocolEvent::ManeuverRejected { .. } => "maneuver_rejected",
            ProtocolEvent::ManeuverCompleted { .. } => "maneuver_completed",
            ProtocolEvent::ManeuverAbandoned { .. } => "maneuver_abandoned",
            ProtocolEvent::CommandDelay { .. } => "command_delay",
            ProtocolEvent::PayloadDiscarded { .. } => "payload_discarded",
            ProtocolEvent::BackendFailure { .. } => "backend_failure",
            ProtocolEvent::SendFailed { .. } => "send_failed",
            ProtocolEvent::AccidentTriggered { .. } => "accident_triggered",
        }
    }
}

/// Counters accumulated over one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    pub stop_candidates: u64,
    pub hazards_reported: u64,
    pub reports_discarded: u64,
    pub hazards_abandoned: u64,
    pub commands_forwarded: u64,
    pub forwards_skipped: u64,
    pub maneuvers_started: u64,
    pub maneuvers_rejected: u64,
    pub maneuvers_completed: u64,
    pub maneuvers_abandoned: u64,
    pub payloads_discarded: u64,
    pub backend_failures: u64,
    pub send_failures: u64,
    pub accidents_triggered: u64,
    /// Mean command delay in milliseconds, absent when no command was handled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_command_delay_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_command_delay_ms: Option<f64>,
}
