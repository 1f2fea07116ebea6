use super::{Datagram, Transport, TransportError};
use crate::protocol::MAX_DATAGRAM_SIZE;
use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn, Instrument};

/// Datagram transport over a real UDP socket.
pub struct UdpTransport {
    socket: Arc<UdpSocket>,
    local_addr: SocketAddr,
}

impl UdpTransport {
    /// Bind a socket on `addr`. Port 0 picks an ephemeral port.
    pub async fn bind(addr: SocketAddr) -> Result<Self, TransportError> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| TransportError::Bind { addr, source })?;
        let local_addr = socket
            .local_addr()
            .map_err(|source| TransportError::Bind { addr, source })?;

        Ok(Self {
            socket: Arc::new(socket),
            local_addr,
        })
    }

    /// Spawn the receive loop, forwarding every datagram into `inbox`.
    ///
    /// The loop stops when `cancel` fires or the inbox is dropped.
    pub fn start_receiver(
        &self,
        inbox: mpsc::UnboundedSender<Datagram>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let socket = Arc::clone(&self.socket);
        let local_addr = self.local_addr;

        tokio::spawn(async move {
            info!(local_addr = %local_addr, "UDP receiver started");
            let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
            let mut received: u64 = 0;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!(local_addr = %local_addr, received, "UDP receiver shutting down");
                        break;
                    }
                    result = socket.recv_from(&mut buffer) => match result {
                        Ok((len, from)) => {
                            received += 1;
                            trace!(local_addr = %local_addr, from = %from, len, "Datagram received");
                            let datagram = Datagram {
                                payload: buffer[..len].to_vec(),
                                from,
                            };
                            if inbox.send(datagram).is_err() {
                                debug!(local_addr = %local_addr, "Inbox closed, stopping receiver");
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(local_addr = %local_addr, error = %e, "UDP receive failed");
                        }
                    }
                }
            }
        }
        .in_current_span())
    }
}

#[async_trait]
impl Transport for UdpTransport {
    async fn send(&self, payload: &[u8], dest: SocketAddr) -> Result<(), TransportError> {
        self.socket
            .send_to(payload, dest)
            .await
            .map(|_| ())
            .map_err(|source| TransportError::Send { dest, source })
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
