//! Transport configuration

use crate::transport::FaultPlan;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which datagram transport the nodes use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// In-process network with optional fault injection
    #[default]
    Loopback,
    /// Real UDP sockets on `bind_host`
    Udp,
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "loopback" => Ok(TransportKind::Loopback),
            "udp" => Ok(TransportKind::Udp),
            _ => Err(format!("Invalid transport: {}", s)),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Loopback => write!(f, "loopback"),
            TransportKind::Udp => write!(f, "udp"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub kind: TransportKind,
    pub bind_host: String,
    /// Loopback only: one-way delivery delay
    pub latency_ms: u64,
    /// Loopback only: drop every n-th datagram
    #[serde(skip_serializing_if = "Option::is_none")]
    pub drop_every: Option<u32>,
    /// Loopback only: deliver every n-th datagram twice
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_every: Option<u32>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::Loopback,
            bind_host: "127.0.0.1".to_string(),
            latency_ms: 0,
            drop_every: None,
            duplicate_every: None,
        }
    }
}

impl TransportConfig {
    pub fn fault_plan(&self) -> FaultPlan {
        FaultPlan {
            latency: Duration::from_millis(self.latency_ms),
            drop_every: self.drop_every,
            duplicate_every: self.duplicate_every,
        }
    }
}
