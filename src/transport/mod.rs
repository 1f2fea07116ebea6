//! Best-effort datagram transport.
//!
//! Delivery is unacknowledged and may drop, duplicate or reorder payloads.
//! Inbound datagrams are pushed into the owning node's inbox channel; the node
//! decodes them.

mod error;
mod loopback;
mod udp;

pub use error::TransportError;
pub use loopback::{FaultPlan, LoopbackNetwork, LoopbackTransport};
pub use udp::UdpTransport;

use crate::protocol::AgentId;
use async_trait::async_trait;
use dashmap::DashMap;
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// A raw payload received from the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub payload: Vec<u8>,
    pub from: SocketAddr,
}

/// Receiving half handed to a node alongside its transport.
pub type Inbox = mpsc::UnboundedReceiver<Datagram>;

/// Unicast sender owned by each role.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `payload` to `dest`. Success only means the payload left this node.
    async fn send(&self, payload: &[u8], dest: SocketAddr) -> Result<(), TransportError>;

    fn local_addr(&self) -> SocketAddr;
}

/// Resolves vehicle identities to the address their reactor listens on.
#[derive(Debug, Default)]
pub struct AddressBook {
    entries: DashMap<AgentId, SocketAddr>,
}

impl AddressBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the address of `agent`.
    pub fn register(&self, agent: AgentId, addr: SocketAddr) {
        self.entries.insert(agent, addr);
    }

    pub fn unregister(&self, agent: &AgentId) -> Option<SocketAddr> {
        self.entries.remove(agent).map(|(_, addr)| addr)
    }

    pub fn resolve(&self, agent: &AgentId) -> Option<SocketAddr> {
        self.entries.get(agent).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
