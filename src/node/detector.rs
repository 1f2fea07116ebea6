use super::send_message;
use crate::detector::Detector;
use crate::metrics::{EventSink, ProtocolEvent, Role};
use crate::protocol::Message;
use crate::scheduler::{Scheduler, TimerSlot};
use crate::transport::Transport;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

struct PollDue;

/// Runs a [`Detector`] on its poll cadence and sends reports to the router.
pub struct DetectorNode {
    detector: Detector,
    transport: Arc<dyn Transport>,
    router: SocketAddr,
    sink: Arc<dyn EventSink>,
}

impl DetectorNode {
    pub fn new(
        detector: Detector,
        transport: Arc<dyn Transport>,
        router: SocketAddr,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            detector,
            transport,
            router,
            sink,
        }
    }

    pub fn start(mut self, cancel_token: CancellationToken) -> JoinHandle<Detector> {
        tokio::spawn(async move {
            let (scheduler, mut timers) = Scheduler::new(cancel_token.child_token());
            let mut poll = TimerSlot::new("detector_poll");
            let interval = self.detector.config().poll_interval();

            if let Err(e) = poll.arm(&scheduler, self.detector.config().initial_delay(), PollDue) {
                tracing::error!(error = %e, "Cannot schedule first detector poll");
                return self.detector;
            }

            tracing::info!(
                local_addr = %self.transport.local_addr(),
                router = %self.router,
                poll_interval_seconds = interval.as_secs_f64(),
                "Detector started"
            );

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!("Detector shutting down");
                        break;
                    }
                    Some(PollDue) = timers.recv() => {
                        poll.fired();
                        let reports = self.detector.poll(Instant::now());
                        for report in reports {
                            let agent = report.agent_id.clone();
                            let message = Message::HazardReport(report);
                            if let Err(e) = send_message(self.transport.as_ref(), &message, self.router).await {
                                tracing::warn!(agent_id = %agent, error = %e, "Failed to send hazard report");
                                self.sink.record(&ProtocolEvent::SendFailed {
                                    role: Role::Detector,
                                });
                            }
                        }
                        if let Err(e) = poll.arm(&scheduler, interval, PollDue) {
                            tracing::debug!(error = %e, "Detector poll not rescheduled");
                        }
                    }
                }
            }

            self.detector
        }
        .in_current_span())
    }
}
