//! Roadside stop detection.
//!
//! The [`Detector`] polls every known vehicle on a fixed cadence and debounces
//! low-speed observations. A vehicle that stays below the stopped-speed
//! threshold for the configured dwell time produces exactly one
//! [`HazardReport`] for that stop. Moving again clears the candidate so a later
//! stop is reported afresh.

mod debounce;

pub use debounce::{DebounceTable, Observation, StopCandidate};

use crate::backend::{Kinematics, VehicleBackend};
use crate::config::DetectorConfig;
use crate::metrics::{EventSink, ProtocolEvent, Role};
use crate::protocol::{AgentId, HazardReport};
use chrono::Utc;
use std::sync::Arc;
use tokio::time::Instant;

/// Debouncing stop detector.
pub struct Detector {
    backend: Arc<dyn VehicleBackend>,
    config: DetectorConfig,
    sink: Arc<dyn EventSink>,
    table: DebounceTable,
}

impl Detector {
    pub fn new(
        backend: Arc<dyn VehicleBackend>,
        config: DetectorConfig,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            backend,
            config,
            sink,
            table: DebounceTable::new(),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Sample every agent once and return the reports that became due.
    ///
    /// A backend failure for one agent is logged and that agent is skipped;
    /// the rest of the poll proceeds.
    pub fn poll(&mut self, now: Instant) -> Vec<HazardReport> {
        let agents = self.backend.agents();
        let pruned = self.table.retain_known(&agents);
        if pruned > 0 {
            tracing::debug!(pruned, "Dropped stop candidates of departed vehicles");
        }

        let mut reports = Vec::new();
        for agent in &agents {
            let sample = match self.backend.kinematics(agent) {
                Ok(sample) => sample,
                Err(e) => {
                    tracing::warn!(agent_id = %agent, error = %e, "Kinematics query failed, skipping agent");
                    self.sink.record(&ProtocolEvent::BackendFailure {
                        role: Role::Detector,
                    });
                    continue;
                }
            };

            if !self.config.monitors(&sample.segment, &sample.lane) {
                continue;
            }

            if let Some(report) = self.observe(agent, &sample, now) {
                reports.push(report);
            }
        }

        tracing::trace!(
            agents = agents.len(),
            candidates = self.table.len(),
            reports = reports.len(),
            "Detector poll completed"
        );
        reports
    }

    fn observe(&mut self, agent: &AgentId, sample: &Kinematics, now: Instant) -> Option<HazardReport> {
        let observation = self.table.observe(
            agent,
            sample,
            now,
            self.config.stopped_speed_threshold,
            self.config.min_stop_time(),
        );

        match observation {
            Observation::CandidateOpened => {
                tracing::debug!(agent_id = %agent, lane = %sample.lane, speed = sample.speed, "Stop candidate opened");
                self.sink.record(&ProtocolEvent::StopCandidateOpened {
                    agent: agent.clone(),
                });
                None
            }
            Observation::Cleared => {
                tracing::debug!(agent_id = %agent, speed = sample.speed, "Vehicle moving again, stop candidate cleared");
                self.sink.record(&ProtocolEvent::StopCandidateCleared {
                    agent: agent.clone(),
                });
                None
            }
            Observation::Confirmed => {
                tracing::info!(
                    agent_id = %agent,
                    lane = %sample.lane,
                    position = %sample.position,
                    "Vehicle stopped, reporting hazard"
                );
                self.sink.record(&ProtocolEvent::HazardReported {
                    agent: agent.clone(),
                });
                Some(HazardReport {
                    agent_id: agent.clone(),
                    lane: sample.lane.clone(),
                    position: sample.position,
                    lane_position: sample.lane_position,
                    detected_at: Utc::now(),
                })
            }
            Observation::Waiting | Observation::AlreadyReported | Observation::Moving => None,
        }
    }

    pub fn candidate(&self, agent: &AgentId) -> Option<&StopCandidate> {
        self.table.get(agent)
    }

    pub fn candidate_count(&self) -> usize {
        self.table.len()
    }
}
