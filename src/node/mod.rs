//! Runtime actors for the three roles.
//!
//! Each node is a single tokio task that owns one role state machine and
//! handles its inputs (inbound datagrams and timer expiries) one at a time,
//! to completion. Nodes stop when their cancellation token fires and hand the
//! role back through the task's `JoinHandle` so callers can inspect final
//! state.

mod detector;
mod reactor;
mod router;

pub use detector::DetectorNode;
pub use reactor::ReactorNode;
pub use router::RouterNode;

use crate::metrics::{EventSink, ProtocolEvent, Role};
use crate::protocol::{CodecError, Message};
use crate::transport::{Datagram, Transport, TransportError};
use std::net::SocketAddr;
use thiserror::Error;

/// Failure to put a message on the wire.
#[derive(Debug, Error)]
pub enum SendError {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Encode `message` and send it to `dest`.
pub async fn send_message(
    transport: &dyn Transport,
    message: &Message,
    dest: SocketAddr,
) -> Result<(), SendError> {
    let payload = message.encode()?;
    transport.send(&payload, dest).await?;
    tracing::trace!(kind = message.kind(), dest = %dest, bytes = payload.len(), "Message sent");
    Ok(())
}

/// Decode a datagram, discarding it when malformed.
fn decode_datagram(datagram: &Datagram, role: Role, sink: &dyn EventSink) -> Option<Message> {
    match Message::decode(&datagram.payload) {
        Ok(message) => Some(message),
        Err(e) => {
            tracing::debug!(role = %role, from = %datagram.from, error = %e, "Discarding malformed datagram");
            sink.record(&ProtocolEvent::PayloadDiscarded { role });
            None
        }
    }
}
