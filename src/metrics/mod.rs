//! # Protocol Metrics
//!
//! Roles report what they do through an [`EventSink`] passed in at
//! construction. Two sinks ship with the crate:
//!
//! - [`MetricsSink`] increments counters through the `metrics` facade so they
//!   can be rendered in Prometheus text format.
//! - [`RunStats`] keeps in-process atomic counters for the end-of-run summary.
//!
//! **Counters:**
//! - `hazard_stop_candidates_total`
//! - `hazard_reports_total`
//! - `hazard_reports_discarded_total`
//! - `hazard_events_abandoned_total`
//! - `hazard_commands_forwarded_total`
//! - `hazard_forwards_skipped_total`
//! - `hazard_maneuvers_total{outcome}`
//! - `hazard_payloads_discarded_total{role}`
//! - `hazard_backend_failures_total{role}`
//! - `hazard_send_failures_total{role}`
//! - `hazard_accidents_total`
//!
//! **Histograms:**
//! - `hazard_command_delay_seconds`
//! - `hazard_maneuver_duration_seconds`

pub mod types;

pub use types::*;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Receives protocol events from the roles.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &ProtocolEvent);
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn record(&self, _event: &ProtocolEvent) {}
}

/// Forwards every event to several sinks in order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanoutSink {
    fn record(&self, event: &ProtocolEvent) {
        for sink in &self.sinks {
            sink.record(event);
        }
    }
}

/// Records events through the global `metrics` recorder.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetricsSink;

impl EventSink for MetricsSink {
    fn record(&self, event: &ProtocolEvent) {
        match event {
            ProtocolEvent::StopCandidateOpened { .. } => {
                metrics::counter!("hazard_stop_candidates_total").increment(1);
            }
            ProtocolEvent::StopCandidateCleared { .. } => {}
            ProtocolEvent::HazardReported { .. } => {
                metrics::counter!("hazard_reports_total").increment(1);
            }
            ProtocolEvent::ReportDiscarded { .. } => {
                metrics::counter!("hazard_reports_discarded_total").increment(1);
            }
            ProtocolEvent::HazardAbandoned { .. } => {
                metrics::counter!("hazard_events_abandoned_total").increment(1);
            }
            ProtocolEvent::CommandForwarded { .. } => {
                metrics::counter!("hazard_commands_forwarded_total").increment(1);
            }
            ProtocolEvent::ForwardSkipped { .. } => {
                metrics::counter!("hazard_forwards_skipped_total").increment(1);
            }
            ProtocolEvent::ManeuverStarted { .. } => {
                metrics::counter!("hazard_maneuvers_total", "outcome" => "started").increment(1);
            }
            ProtocolEvent::ManeuverRejected { .. } => {
                metrics::counter!("hazard_maneuvers_total", "outcome" => "rejected").increment(1);
            }
            ProtocolEvent::ManeuverCompleted { elapsed, .. } => {
                metrics::counter!("hazard_maneuvers_total", "outcome" => "completed").increment(1);
                metrics::histogram!("hazard_maneuver_duration_seconds")
                    .record(elapsed.as_secs_f64());
            }
            ProtocolEvent::ManeuverAbandoned { .. } => {
                metrics::counter!("hazard_maneuvers_total", "outcome" => "abandoned").increment(1);
            }
            ProtocolEvent::CommandDelay { delay, .. } => {
                metrics::histogram!("hazard_command_delay_seconds").record(delay.as_secs_f64());
            }
            ProtocolEvent::PayloadDiscarded { role } => {
                metrics::counter!("hazard_payloads_discarded_total", "role" => role.as_str())
                    .increment(1);
            }
            ProtocolEvent::BackendFailure { role } => {
                metrics::counter!("hazard_backend_failures_total", "role" => role.as_str())
                    .increment(1);
            }
            ProtocolEvent::SendFailed { role } => {
                metrics::counter!("hazard_send_failures_total", "role" => role.as_str())
                    .increment(1);
            }
            ProtocolEvent::AccidentTriggered { .. } => {
                metrics::counter!("hazard_accidents_total").increment(1);
            }
        }
    }
}

/// In-process counters for one run.
#[derive(Debug, Default)]
pub struct RunStats {
    stop_candidates: AtomicU64,
    hazards_reported: AtomicU64,
    reports_discarded: AtomicU64,
    hazards_abandoned: AtomicU64,
    commands_forwarded: AtomicU64,
    forwards_skipped: AtomicU64,
    maneuvers_started: AtomicU64,
    maneuvers_rejected: AtomicU64,
    maneuvers_completed: AtomicU64,
    maneuvers_abandoned: AtomicU64,
    payloads_discarded: AtomicU64,
    backend_failures: AtomicU64,
    send_failures: AtomicU64,
    accidents_triggered: AtomicU64,
    delay_samples: AtomicU64,
    delay_total_us: AtomicU64,
    delay_max_us: AtomicU64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        let samples = load(&self.delay_samples);
        let (mean, max) = if samples == 0 {
            (None, None)
        } else {
            (
                Some(load(&self.delay_total_us) as f64 / samples as f64 / 1000.0),
                Some(load(&self.delay_max_us) as f64 / 1000.0),
            )
        };

        StatsSnapshot {
            stop_candidates: load(&self.stop_candidates),
            hazards_reported: load(&self.hazards_reported),
            reports_discarded: load(&self.reports_discarded),
            hazards_abandoned: load(&self.hazards_abandoned),
            commands_forwarded: load(&self.commands_forwarded),
            forwards_skipped: load(&self.forwards_skipped),
            maneuvers_started: load(&self.maneuvers_started),
            maneuvers_rejected: load(&self.maneuvers_rejected),
            maneuvers_completed: load(&self.maneuvers_completed),
            maneuvers_abandoned: load(&self.maneuvers_abandoned),
            payloads_discarded: load(&self.payloads_discarded),
            backend_failures: load(&self.backend_failures),
            send_failures: load(&self.send_failures),
            accidents_triggered: load(&self.accidents_triggered),
            mean_command_delay_ms: mean,
            max_command_delay_ms: max,
        }
    }
}

impl EventSink for RunStats {
    fn record(&self, event: &ProtocolEvent) {
        let bump = |counter: &AtomicU64| {
            counter.fetch_add(1, Ordering::Relaxed);
        };

        match event {
            ProtocolEvent::StopCandidateOpened { .. } => bump(&self.stop_candidates),
            ProtocolEvent::StopCandidateCleared { .. } => {}
            ProtocolEvent::HazardReported { .. } => bump(&self.hazards_reported),
            ProtocolEvent::ReportDiscarded { .. } => bump(&self.reports_discarded),
            ProtocolEvent::HazardAbandoned { .. } => bump(&self.hazards_abandoned),
            ProtocolEvent::CommandForwarded { .. } => bump(&self.commands_forwarded),
            ProtocolEvent::ForwardSkipped { .. } => bump(&self.forwards_skipped),
            ProtocolEvent::ManeuverStarted { .. } => bump(&self.maneuvers_started),
            ProtocolEvent::ManeuverRejected { .. } => bump(&self.maneuvers_rejected),
            ProtocolEvent::ManeuverCompleted { .. } => bump(&self.maneuvers_completed),
            ProtocolEvent::ManeuverAbandoned { .. } => bump(&self.maneuvers_abandoned),
            ProtocolEvent::PayloadDiscarded { .. } => bump(&self.payloads_discarded),
            ProtocolEvent::BackendFailure { .. } => bump(&self.backend_failures),
            ProtocolEvent::SendFailed { .. } => bump(&self.send_failures),
            ProtocolEvent::AccidentTriggered { .. } => bump(&self.accidents_triggered),
            ProtocolEvent::CommandDelay { delay, .. } => {
                let micros = u64::try_from(delay.as_micros()).unwrap_or(u64::MAX);
                bump(&self.delay_samples);
                self.delay_total_us.fetch_add(micros, Ordering::Relaxed);
                self.delay_max_us.fetch_max(micros, Ordering::Relaxed);
            }
        }
    }
}

/// Install the Prometheus recorder globally.
///
/// Delay buckets span sub-millisecond loopback delivery up to several seconds
/// of maneuvering.
pub fn setup_metrics(
) -> Result<metrics_exporter_prometheus::PrometheusHandle, Box<dyn std::error::Error>> {
    use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

    let delay_buckets = &[0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0];
    let maneuver_buckets = &[1.0, 2.0, 5.0, 10.0, 20.0, 30.0, 60.0, 120.0];

    let handle = PrometheusBuilder::new()
        .set_buckets_for_metric(
            Matcher::Full("hazard_command_delay_seconds".to_string()),
            delay_buckets,
        )?
        .set_buckets_for_metric(
            Matcher::Full("hazard_maneuver_duration_seconds".to_string()),
            maneuver_buckets,
        )?
        .install_recorder()?;

    Ok(handle)
}
