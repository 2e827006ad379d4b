//! Host probing
//!
//! A prober turns one IP into a `DiscoveredDeviceDraft`. It holds no shared
//! state and never touches the store.

use async_trait::async_trait;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::config;
use crate::database::DeviceStatus;
use crate::models::DiscoveredDeviceDraft;
use crate::network::resolve_hostname;

use super::tcp::probe_host_ports;

#[async_trait]
pub trait HostProber: Send + Sync + 'static {
    /// Probes `ip`. `None` means the probe was abandoned because `cancel` fired.
    async fn probe(
        &self,
        ip: Ipv4Addr,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Option<DiscoveredDeviceDraft>;
}

/// Baseline prober: reverse DNS plus TCP connect checks on common ports
#[derive(Debug, Clone)]
pub struct TcpProber {
    ports: Vec<u16>,
    max_concurrent_ports: usize,
    reverse_dns: bool,
}

impl TcpProber {
    pub fn new(ports: Vec<u16>, max_concurrent_ports: usize) -> Self {
        Self {
            ports,
            max_concurrent_ports: max_concurrent_ports.max(1),
            reverse_dns: true,
        }
    }

    /// Port list and per-host limit from the environment
    pub fn from_env() -> Self {
        Self::new(config::probe_ports(), config::max_concurrent_ports())
    }

    pub fn with_reverse_dns(mut self, enabled: bool) -> Self {
        self.reverse_dns = enabled;
        self
    }

    pub fn ports(&self) -> &[u16] {
        &self.ports
    }
}

impl Default for TcpProber {
    fn default() -> Self {
        Self::new(
            config::COMMON_PORTS.to_vec(),
            config::MAX_CONCURRENT_PORT_CHECKS,
        )
    }
}

#[async_trait]
impl HostProber for TcpProber {
    async fn probe(
        &self,
        ip: Ipv4Addr,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Option<DiscoveredDeviceDraft> {
        if cancel.is_cancelled() {
            return None;
        }

        let hostname_lookup = async {
            if self.reverse_dns {
                resolve_hostname(ip, timeout).await
            } else {
                None
            }
        };
        let port_scan = probe_host_ports(ip, &self.ports, timeout, self.max_concurrent_ports, cancel);

        let (hostname, open_ports) = tokio::join!(hostname_lookup, port_scan);
        let open_ports = open_ports?;

        let mut draft = DiscoveredDeviceDraft::new(ip);
        draft.hostname = hostname;
        draft.status = if open_ports.is_empty() {
            DeviceStatus::Offline
        } else {
            DeviceStatus::Online
        };
        draft.open_ports = open_ports;

        crate::log_debug!(
            "Probed {}: {} ({} open ports)",
            ip,
            draft.status,
            draft.open_ports.len()
        );

        Some(draft)
    }
}
