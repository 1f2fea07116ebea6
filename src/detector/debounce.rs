use crate::backend::Kinematics;
use crate::protocol::{AgentId, LaneId, Position};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;

/// A vehicle currently observed below the stopped-speed threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct StopCandidate {
    pub first_observed: Instant,
    pub lane: LaneId,
    pub position: Position,
    pub lane_position: f64,
    /// Set once the report for this stop has been emitted. Never reset while
    /// the vehicle stays stopped.
    pub reported: bool,
}

/// Result of feeding one sample into the [`DebounceTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First sub-threshold sample; a candidate was created
    CandidateOpened,
    /// Stopped, but not for long enough yet
    Waiting,
    /// Dwell time reached; the caller must emit exactly one report
    Confirmed,
    /// Still stopped after the report went out
    AlreadyReported,
    /// Moving again; the candidate was deleted
    Cleared,
    /// Moving and no candidate existed
    Moving,
}

/// Per-agent stop candidates.
#[derive(Debug, Default)]
pub struct DebounceTable {
    candidates: HashMap<AgentId, StopCandidate>,
}

impl DebounceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one kinematics sample for `agent` taken at `now`.
    pub fn observe(
        &mut self,
        agent: &AgentId,
        sample: &Kinematics,
        now: Instant,
        stopped_speed_threshold: f64,
        min_stop_time: Duration,
    ) -> Observation {
        if sample.speed >= stopped_speed_threshold {
            return match self.candidates.remove(agent) {
                Some(_) => Observation::Cleared,
                None => Observation::Moving,
            };
        }

        let Some(candidate) = self.candidates.get_mut(agent) else {
            self.candidates.insert(
                agent.clone(),
                StopCandidate {
                    first_observed: now,
                    lane: sample.lane.clone(),
                    position: sample.position,
                    lane_position: sample.lane_position,
                    reported: false,
                },
            );
            return Observation::CandidateOpened;
        };

        candidate.lane = sample.lane.clone();
        candidate.position = sample.position;
        candidate.lane_position = sample.lane_position;

        if candidate.reported {
            Observation::AlreadyReported
        } else if now.saturating_duration_since(candidate.first_observed) >= min_stop_time {
            candidate.reported = true;
            Observation::Confirmed
        } else {
            Observation::Waiting
        }
    }

    pub fn get(&self, agent: &AgentId) -> Option<&StopCandidate> {
        self.candidates.get(agent)
    }

    /// Drop candidates of agents that are no longer known.
    pub fn retain_known(&mut self, known: &[AgentId]) -> usize {
        let before = self.candidates.len();
        self.candidates.retain(|agent, _| known.contains(agent));
        before - self.candidates.len()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::SegmentId;
    use proptest::prelude::*;

    const THRESHOLD: f64 = 0.5;

    fn sample(speed: f64) -> Kinematics {
        Kinematics {
            segment: SegmentId::new("S"),
            lane: LaneId::new("S_0"),
            position: Position::new(100.0, 0.0),
            lane_position: 100.0,
            speed,
        }
    }

    fn feed(speeds: &[f64], min_stop: Duration) -> Vec<Observation> {
        let mut table = DebounceTable::new();
        let agent = AgentId::new("veh0");
        let t0 = Instant::now();
        speeds
            .iter()
            .enumerate()
            .map(|(i, &speed)| {
                table.observe(
                    &agent,
                    &sample(speed),
                    t0 + Duration::from_secs(i as u64),
                    THRESHOLD,
                    min_stop,
                )
            })
            .collect()
    }

    #[test]
    fn test_confirms_after_dwell_time() {
        let observations = feed(&[2.0, 0.3, 0.2, 0.1, 0.1], Duration::from_secs(3));
        assert_eq!(
            observations,
            vec![
                Observation::Moving,
                Observation::CandidateOpened,
                Observation::Waiting,
                Observation::Waiting,
                Observation::Confirmed,
            ]
        );
    }

    #[test]
    fn test_confirmed_only_once_while_stopped() {
        let observations = feed(&[0.0, 0.0, 0.0, 0.0, 0.0], Duration::from_secs(2));
        let confirmed = observations
            .iter()
            .filter(|o| **o == Observation::Confirmed)
            .count();
        assert_eq!(confirmed, 1);
        assert_eq!(observations[3], Observation::AlreadyReported);
    }

    #[test]
    fn test_resume_clears_candidate() {
        let mut table = DebounceTable::new();
        let agent = AgentId::new("veh0");
        let t0 = Instant::now();
        let min_stop = Duration::from_secs(3);

        table.observe(&agent, &sample(0.3), t0, THRESHOLD, min_stop);
        table.observe(&agent, &sample(0.2), t0 + Duration::from_secs(1), THRESHOLD, min_stop);
        assert!(table.get(&agent).is_some());

        let cleared = table.observe(&agent, &sample(0.6), t0 + Duration::from_secs(2), THRESHOLD, min_stop);
        assert_eq!(cleared, Observation::Cleared);
        assert!(table.get(&agent).is_none());
    }

    #[test]
    fn test_new_stop_after_resume_reports_again() {
        let observations = feed(
            &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
            Duration::from_secs(2),
        );
        let confirmed = observations
            .iter()
            .filter(|o| **o == Observation::Confirmed)
            .count();
        assert_eq!(confirmed, 2);
    }

    #[test]
    fn test_speed_at_threshold_counts_as_moving() {
        let observations = feed(&[THRESHOLD], Duration::from_secs(1));
        assert_eq!(observations, vec![Observation::Moving]);
    }

    #[test]
    fn test_candidate_tracks_latest_position() {
        let mut table = DebounceTable::new();
        let agent = AgentId::new("veh0");
        let t0 = Instant::now();
        let min_stop = Duration::from_secs(3);

        table.observe(&agent, &sample(0.2), t0, THRESHOLD, min_stop);
        let mut crept = sample(0.2);
        crept.lane_position = 100.2;
        crept.position = Position::new(100.2, 0.0);
        table.observe(&agent, &crept, t0 + Duration::from_secs(1), THRESHOLD, min_stop);

        let candidate = table.get(&agent).unwrap();
        assert_eq!(candidate.lane_position, 100.2);
        assert_eq!(candidate.first_observed, t0);
    }

    #[test]
    fn test_retain_known_prunes_departed() {
        let mut table = DebounceTable::new();
        let t0 = Instant::now();
        for id in ["veh0", "veh1"] {
            table.observe(&AgentId::new(id), &sample(0.0), t0, THRESHOLD, Duration::from_secs(1));
        }

        assert_eq!(table.retain_known(&[AgentId::new("veh1")]), 1);
        assert_eq!(table.len(), 1);
    }

    proptest! {
        /// A report is confirmed exactly once per continuous stop that lasts
        /// at least the dwell time, for any poll interval no longer than it.
        #[test]
        fn prop_one_confirmation_per_stop(
            stops in proptest::collection::vec((0u64..12, 1u64..4), 1..6),
            poll_ms in 100u64..=2000,
        ) {
            let min_stop = Duration::from_secs(2);
            let poll = Duration::from_millis(poll_ms);
            let mut table = DebounceTable::new();
            let agent = AgentId::new("veh0");
            let mut now = Instant::now();
            let mut confirmations = 0usize;
            let mut expected = 0usize;

            for (stop_secs, move_polls) in stops {
                let stop = Duration::from_secs(stop_secs);
                let start = now;
                let mut confirmed_this_stop = 0usize;
                let mut observed_dwell = Duration::ZERO;
                while now.duration_since(start) <= stop {
                    observed_dwell = now.duration_since(start);
                    if table.observe(&agent, &sample(0.0), now, THRESHOLD, min_stop)
                        == Observation::Confirmed
                    {
                        confirmed_this_stop += 1;
                    }
                    now += poll;
                }
                if observed_dwell >= min_stop {
                    expected += 1;
                }
                prop_assert!(confirmed_this_stop <= 1);
                confirmations += confirmed_this_stop;

                for _ in 0..move_polls {
                    table.observe(&agent, &sample(5.0), now, THRESHOLD, min_stop);
                    now += poll;
                }
            }

            prop_assert_eq!(confirmations, expected);
        }
    }
}
