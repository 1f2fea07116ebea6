use super::{Datagram, Inbox, Transport, TransportError};
use async_trait::async_trait;
use dashmap::DashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Deterministic impairments applied by a [`LoopbackNetwork`].
///
/// Counters are network-wide: `drop_every = Some(3)` drops the 3rd, 6th, 9th
/// ... datagram sent by any endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaultPlan {
    /// One-way delay added to every delivery
    pub latency: Duration,
    /// Drop every n-th datagram
    pub drop_every: Option<u32>,
    /// Deliver every n-th datagram twice
    pub duplicate_every: Option<u32>,
}

/// In-process datagram network.
///
/// Every endpoint gets a unique `127.0.0.1:<port>` address. Sends to an
/// address with no endpoint vanish, as they would over UDP.
pub struct LoopbackNetwork {
    endpoints: DashMap<SocketAddr, mpsc::UnboundedSender<Datagram>>,
    faults: FaultPlan,
    sent: AtomicU64,
    delivered: AtomicU64,
    next_port: AtomicU16,
}

impl LoopbackNetwork {
    pub fn new(faults: FaultPlan) -> Arc<Self> {
        Arc::new(Self {
            endpoints: DashMap::new(),
            faults,
            sent: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            next_port: AtomicU16::new(40000),
        })
    }

    /// Attach a new endpoint and return its transport and inbox.
    pub fn endpoint(self: &Arc<Self>) -> (LoopbackTransport, Inbox) {
        let port = self.next_port.fetch_add(1, Ordering::SeqCst);
        let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
        let (tx, rx) = mpsc::unbounded_channel();
        self.endpoints.insert(addr, tx);

        (
            LoopbackTransport {
                network: Arc::clone(self),
                addr,
            },
            rx,
        )
    }

    /// Remove an endpoint; later sends to it are lost.
    pub fn detach(&self, addr: &SocketAddr) {
        self.endpoints.remove(addr);
    }

    /// Datagrams handed to the network so far.
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::SeqCst)
    }

    /// Datagrams placed into an inbox so far, duplicates included.
    pub fn delivered_count(&self) -> u64 {
        self.delivered.load(Ordering::SeqCst)
    }

    fn copies_for(&self, sequence: u64) -> u32 {
        let hits = |every: Option<u32>| matches!(every, Some(n) if n > 0 && sequence % u64::from(n) == 0);

        if hits(self.faults.drop_every) {
            0
        } else if hits(self.faults.duplicate_every) {
            2
        } else {
            1
        }
    }

    fn deliver(&self, datagram: Datagram, dest: SocketAddr) {
        match self.endpoints.get(&dest) {
            Some(tx) => {
                if tx.send(datagram).is_ok() {
                    self.delivered.fetch_add(1, Ordering::SeqCst);
                }
            }
            None => {
                tracing::debug!(dest = %dest, "No endpoint at destination, datagram lost");
            }
        }
    }
}

/// Sending half of a loopback endpoint.
pub struct LoopbackTransport {
    network: Arc<LoopbackNetwork>,
    addr: SocketAddr,
}

#[async_trait]
impl Transport for LoopbackTransport {
    async fn send(&self, payload: &[u8], dest: SocketAddr) -> Result<(), TransportError> {
        let sequence = self.network.sent.fetch_add(1, Ordering::SeqCst) + 1;
        let copies = self.network.copies_for(sequence);
        if copies == 0 {
            tracing::trace!(from = %self.addr, dest = %dest, sequence, "Datagram dropped");
            return Ok(());
        }

        let latency = self.network.faults.latency;
        for _ in 0..copies {
            let datagram = Datagram {
                payload: payload.to_vec(),
                from: self.addr,
            };
            if latency.is_zero() {
                self.network.deliver(datagram, dest);
            } else {
                let network = Arc::clone(&self.network);
                tokio::spawn(async move {
                    tokio::time::sleep(latency).await;
                    network.deliver(datagram, dest);
                });
            }
        }

        Ok(())
    }

    fn local_addr(&self) -> SocketAddr {
        self.addr
    }
}
