use super::{decode_datagram, send_message};
use crate::metrics::{EventSink, ProtocolEvent, Role};
use crate::protocol::{HazardReport, Message};
use crate::router::{Dispatch, Router};
use crate::transport::{Inbox, Transport};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Receives hazard reports and unicasts maneuver commands.
pub struct RouterNode {
    router: Router,
    transport: Arc<dyn Transport>,
    inbox: Inbox,
    sink: Arc<dyn EventSink>,
}

impl RouterNode {
    pub fn new(
        router: Router,
        transport: Arc<dyn Transport>,
        inbox: Inbox,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            router,
            transport,
            inbox,
            sink,
        }
    }

    pub fn start(mut self, cancel_token: CancellationToken) -> JoinHandle<Router> {
        tokio::spawn(async move {
            tracing::info!(local_addr = %self.transport.local_addr(), "Router started");

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::info!(
                            hazards = self.router.reported_count(),
                            forwarded = self.router.forwarded_count(),
                            "Router shutting down"
                        );
                        break;
                    }
                    datagram = self.inbox.recv() => {
                        let Some(datagram) = datagram else {
                            tracing::debug!("Router inbox closed");
                            break;
                        };
                        match decode_datagram(&datagram, Role::Router, self.sink.as_ref()) {
                            Some(Message::HazardReport(report)) => self.handle_report(&report).await,
                            Some(other) => {
                                tracing::debug!(kind = other.kind(), from = %datagram.from, "Router ignoring unexpected message");
                            }
                            None => {}
                        }
                    }
                }
            }

            self.router
        }
        .in_current_span())
    }

    async fn handle_report(&mut self, report: &HazardReport) {
        let dispatch = self.router.on_hazard_report(report);
        let Dispatch::Forwarded { commands, .. } = dispatch else {
            return;
        };

        for outbound in commands {
            let message = Message::ManeuverCommand(outbound.command);
            match send_message(self.transport.as_ref(), &message, outbound.address).await {
                Ok(()) => {
                    tracing::debug!(hazard_agent = %report.agent_id, agent_id = %outbound.recipient, dest = %outbound.address, "Maneuver command sent");
                    self.sink.record(&ProtocolEvent::CommandForwarded {
                        hazard: report.agent_id.clone(),
                        recipient: outbound.recipient,
                    });
                }
                Err(e) => {
                    tracing::warn!(hazard_agent = %report.agent_id, agent_id = %outbound.recipient, error = %e, "Failed to send maneuver command");
                    self.sink.record(&ProtocolEvent::SendFailed { role: Role::Router });
                    self.sink.record(&ProtocolEvent::ForwardSkipped {
                        hazard: report.agent_id.clone(),
                        recipient: outbound.recipient,
                    });
                }
            }
        }
    }
}
