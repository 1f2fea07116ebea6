//! On-vehicle maneuver state machine.
//!
//! A [`Reactor`] admits the first maneuver command it receives while
//! [`Normal`](ReactorState::Normal), penalizes the hazard lane once, and then
//! checks its own position on a fixed cadence until it has passed the hazard
//! on the evasion lane. Arrival restores the lane cost exactly once.

mod state;

pub use state::{Admission, CheckOutcome, Maneuver, ReactorState};

use crate::backend::{BackendError, LaneCost, VehicleBackend};
use crate::config::ReactorConfig;
use crate::metrics::{EventSink, ProtocolEvent, Role};
use crate::protocol::{AgentId, ManeuverCommand};
use chrono::Utc;
use std::sync::Arc;
use tokio::time::Instant;

pub struct Reactor {
    agent: AgentId,
    backend: Arc<dyn VehicleBackend>,
    config: ReactorConfig,
    sink: Arc<dyn EventSink>,
    state: ReactorState,
}

impl Reactor {
    pub fn new(
        agent: AgentId,
        backend: Arc<dyn VehicleBackend>,
        config: ReactorConfig,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            agent,
            backend,
            config,
            sink,
            state: ReactorState::Normal,
        }
    }

    pub fn agent(&self) -> &AgentId {
        &self.agent
    }

    pub fn state(&self) -> &ReactorState {
        &self.state
    }

    pub fn config(&self) -> &ReactorConfig {
        &self.config
    }

    /// Offer a maneuver command.
    pub fn on_command(&mut self, command: &ManeuverCommand, now: Instant) -> Admission {
        let delay = (Utc::now() - command.issued_at).to_std().unwrap_or_default();
        self.sink.record(&ProtocolEvent::CommandDelay {
            agent: self.agent.clone(),
            delay,
        });

        if !self.state.is_normal() {
            tracing::debug!(agent_id = %self.agent, state = %self.state, hazard_agent = %command.hazard_agent, "Ignoring maneuver command");
            self.sink.record(&ProtocolEvent::ManeuverRejected {
                agent: self.agent.clone(),
            });
            return Admission::Rejected;
        }

        if let Err(e) = self.backend.set_lane_cost(
            &self.agent,
            &command.origin_lane,
            LaneCost::Penalized(self.config.evasion_cost),
        ) {
            tracing::warn!(agent_id = %self.agent, lane = %command.origin_lane, error = %e, "Lane cost mutation failed, staying normal");
            self.sink.record(&ProtocolEvent::BackendFailure {
                role: Role::Reactor,
            });
            return Admission::Failed(e);
        }

        tracing::info!(
            agent_id = %self.agent,
            hazard_agent = %command.hazard_agent,
            origin_lane = %command.origin_lane,
            target_lane = %command.target_lane,
            "Maneuver started"
        );
        self.state = ReactorState::Maneuvering(Maneuver {
            hazard_agent: command.hazard_agent.clone(),
            origin_lane: command.origin_lane.clone(),
            target_lane: command.target_lane.clone(),
            hazard_position: command.hazard_position,
            started_at: now,
            checks: 0,
        });
        self.sink.record(&ProtocolEvent::ManeuverStarted {
            agent: self.agent.clone(),
        });
        Admission::Started
    }

    /// Run one position check.
    pub fn check_position(&mut self, now: Instant) -> CheckOutcome {
        let ReactorState::Maneuvering(maneuver) = &mut self.state else {
            return CheckOutcome::Idle;
        };
        maneuver.checks += 1;

        let kinematics = match self.backend.kinematics(&self.agent) {
            Ok(k) => k,
            Err(e) => {
                tracing::warn!(agent_id = %self.agent, error = %e, "Position check failed, abandoning maneuver");
                self.state = ReactorState::Normal;
                self.sink.record(&ProtocolEvent::BackendFailure {
                    role: Role::Reactor,
                });
                self.sink.record(&ProtocolEvent::ManeuverAbandoned {
                    agent: self.agent.clone(),
                });
                return CheckOutcome::Abandoned(e);
            }
        };

        let distance = kinematics.position.distance(&maneuver.hazard_position);
        let arrived = distance > self.config.arrival_distance_threshold
            && kinematics.lane == maneuver.target_lane;
        let elapsed = now.saturating_duration_since(maneuver.started_at);

        if arrived {
            let checks = maneuver.checks;
            self.finish();
            tracing::info!(agent_id = %self.agent, distance, checks, "Passed hazard, maneuver complete");
            self.sink.record(&ProtocolEvent::ManeuverCompleted {
                agent: self.agent.clone(),
                elapsed,
            });
            return CheckOutcome::Arrived;
        }

        if self.config.max_maneuver().is_some_and(|max| elapsed >= max) {
            self.finish();
            tracing::warn!(agent_id = %self.agent, elapsed_seconds = elapsed.as_secs_f64(), "Maneuver timed out");
            self.sink.record(&ProtocolEvent::ManeuverAbandoned {
                agent: self.agent.clone(),
            });
            return CheckOutcome::TimedOut;
        }

        tracing::trace!(agent_id = %self.agent, distance, lane = %kinematics.lane, "Maneuver in progress");
        CheckOutcome::Pending
    }

    /// Restore the origin lane's cost and return to Normal.
    fn finish(&mut self) {
        let state = std::mem::take(&mut self.state);
        if let ReactorState::Maneuvering(maneuver) = state {
            if let Err(e) =
                self.backend
                    .set_lane_cost(&self.agent, &maneuver.origin_lane, LaneCost::Default)
            {
                tracing::warn!(agent_id = %self.agent, lane = %maneuver.origin_lane, error = %e, "Lane cost restore failed");
                self.sink.record(&ProtocolEvent::BackendFailure {
                    role: Role::Reactor,
                });
            }
        }
    }

    /// Stop this vehicle where it is; it becomes a hazard and ignores
    /// commands from now on.
    pub fn trigger_accident(&mut self) -> Result<(), BackendError> {
        self.backend.set_speed(&self.agent, 0.0)?;
        if self.state.maneuver().is_some() {
            self.finish();
        }
        self.state = ReactorState::Stopped;
        tracing::info!(agent_id = %self.agent, "Accident triggered, vehicle stopped");
        self.sink.record(&ProtocolEvent::AccidentTriggered {
            agent: self.agent.clone(),
        });
        Ok(())
    }
}
