use super::decode_datagram;
use crate::metrics::{EventSink, ProtocolEvent, Role};
use crate::protocol::Message;
use crate::reactor::{Admission, Reactor};
use crate::scheduler::{Scheduler, TimerSlot};
use crate::transport::Inbox;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReactorTimer {
    PositionCheck,
    Accident,
}

/// Runs one vehicle's [`Reactor`].
pub struct ReactorNode {
    reactor: Reactor,
    inbox: Inbox,
    local_addr: SocketAddr,
    accident_after: Option<Duration>,
    sink: Arc<dyn EventSink>,
}

impl ReactorNode {
    pub fn new(
        reactor: Reactor,
        inbox: Inbox,
        local_addr: SocketAddr,
        sink: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            reactor,
            inbox,
            local_addr,
            accident_after: None,
            sink,
        }
    }

    /// Stop this vehicle `delay` after the node starts.
    pub fn with_accident(mut self, delay: Duration) -> Self {
        self.accident_after = Some(delay);
        self
    }

    pub fn start(mut self, cancel_token: CancellationToken) -> JoinHandle<Reactor> {
        tokio::spawn(async move {
            let (scheduler, mut timers) = Scheduler::new(cancel_token.child_token());
            let mut check = TimerSlot::new("position_check");
            let mut accident = TimerSlot::new("accident");
            let check_interval = self.reactor.config().check_interval();

            if let Some(delay) = self.accident_after {
                if let Err(e) = accident.arm(&scheduler, delay, ReactorTimer::Accident) {
                    tracing::warn!(agent_id = %self.reactor.agent(), error = %e, "Cannot schedule accident");
                }
            }

            tracing::debug!(agent_id = %self.reactor.agent(), local_addr = %self.local_addr, "Reactor started");

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        tracing::debug!(agent_id = %self.reactor.agent(), state = %self.reactor.state(), "Reactor shutting down");
                        break;
                    }
                    datagram = self.inbox.recv() => {
                        let Some(datagram) = datagram else {
                            tracing::debug!(agent_id = %self.reactor.agent(), "Reactor inbox closed");
                            break;
                        };
                        match decode_datagram(&datagram, Role::Reactor, self.sink.as_ref()) {
                            Some(Message::ManeuverCommand(command)) => {
                                let admission = self.reactor.on_command(&command, Instant::now());
                                if admission == Admission::Started {
                                    if let Err(e) = check.arm(&scheduler, check_interval, ReactorTimer::PositionCheck) {
                                        tracing::warn!(agent_id = %self.reactor.agent(), error = %e, "Position check not scheduled");
                                    }
                                }
                            }
                            Some(other) => {
                                tracing::debug!(agent_id = %self.reactor.agent(), kind = other.kind(), "Reactor ignoring unexpected message");
                            }
                            None => {}
                        }
                    }
                    Some(timer) = timers.recv() => match timer {
                        ReactorTimer::PositionCheck => {
                            check.fired();
                            let outcome = self.reactor.check_position(Instant::now());
                            if outcome.reschedule() {
                                if let Err(e) = check.arm(&scheduler, check_interval, ReactorTimer::PositionCheck) {
                                    tracing::warn!(agent_id = %self.reactor.agent(), error = %e, "Position check not rescheduled");
                                }
                            }
                        }
                        ReactorTimer::Accident => {
                            accident.fired();
                            if let Err(e) = self.reactor.trigger_accident() {
                                tracing::warn!(agent_id = %self.reactor.agent(), error = %e, "Accident trigger failed");
                                self.sink.record(&ProtocolEvent::BackendFailure { role: Role::Reactor });
                            }
                        }
                    }
                }
            }

            self.reactor
        }
        .in_current_span())
    }
}
