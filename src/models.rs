//! Runtime data models shared by the prober, the scorer and the reconciler

use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

use crate::database::DeviceStatus;

/// Evidence gathered for one IP by a prober, not yet persisted
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveredDeviceDraft {
    pub ip: Ipv4Addr,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub network_id: Option<i64>,
    pub status: DeviceStatus,
    /// Filled in by the scorer; zero straight out of the prober
    #[serde(default)]
    pub confidence: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_guess: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_family: Option<String>,
    /// In discovery order; callers must not rely on it
    #[serde(default)]
    pub open_ports: Vec<u16>,
    #[serde(default)]
    pub services: Vec<String>,
    pub scan_id: Option<i64>,
}

impl DiscoveredDeviceDraft {
    /// Minimal constructor: no evidence yet
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            mac_address: None,
            hostname: None,
            network_id: None,
            status: DeviceStatus::Unknown,
            confidence: 0,
            os_guess: None,
            os_family: None,
            open_ports: Vec::new(),
            services: Vec::new(),
            scan_id: None,
        }
    }

    pub fn is_online(&self) -> bool {
        self.status == DeviceStatus::Online
    }
}
