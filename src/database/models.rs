//! Database models
//!
//! Records for the inventory collaborator tables and the discovery tables

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config;

/// Datacenter record (owned by the inventory side)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Datacenter {
    pub id: i64,
    pub name: String,
    pub location: Option<String>,
    pub description: Option<String>,
}

/// Network record (owned by the inventory side)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Network {
    pub id: i64,
    pub name: String,
    /// CIDR notation, e.g. `10.0.0.0/24`
    pub subnet: String,
    pub datacenter_id: Option<i64>,
    pub description: Option<String>,
}

/// Depth label of a scan. The baseline engine probes the same way for all three.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScanType {
    #[default]
    Quick,
    Full,
    Deep,
}

impl std::fmt::Display for ScanType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanType::Quick => write!(f, "quick"),
            ScanType::Full => write!(f, "full"),
            ScanType::Deep => write!(f, "deep"),
        }
    }
}

impl std::str::FromStr for ScanType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quick" => Ok(ScanType::Quick),
            "full" => Ok(ScanType::Full),
            "deep" => Ok(ScanType::Deep),
            _ => Err(format!("Unknown scan type: {}", s)),
        }
    }
}

/// Per-network scan configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryRule {
    pub id: i64,
    pub network_id: i64,
    pub enabled: bool,
    pub scan_type: ScanType,
    /// Per-host / per-port deadline. Zero means "use the process default".
    pub timeout_seconds: i64,
    /// Zero means "use the process default".
    pub max_concurrent_scans: i64,
    pub scan_ports: bool,
    pub service_detection: bool,
    pub os_detection: bool,
    /// Literal IPv4 addresses or IPv4 CIDRs skipped during enumeration
    #[serde(default)]
    pub exclude_ips: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DiscoveryRule {
    /// Rule with the stock defaults, not yet persisted (`id == 0`)
    pub fn new(network_id: i64) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            network_id,
            enabled: true,
            scan_type: ScanType::Quick,
            timeout_seconds: config::DEFAULT_PROBE_TIMEOUT.as_secs() as i64,
            max_concurrent_scans: config::DEFAULT_MAX_CONCURRENT_HOSTS as i64,
            scan_ports: true,
            service_detection: false,
            os_detection: false,
            exclude_ips: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        if self.timeout_seconds > 0 {
            Duration::from_secs(self.timeout_seconds as u64)
        } else {
            config::probe_timeout()
        }
    }

    pub fn host_concurrency(&self) -> usize {
        if self.max_concurrent_scans > 0 {
            self.max_concurrent_scans as usize
        } else {
            config::max_concurrent_hosts()
        }
    }
}

/// Lifecycle of a scan. Moves forward only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScanStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ScanStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ScanStatus::Completed | ScanStatus::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            ScanStatus::Pending => 0,
            ScanStatus::Running => 1,
            ScanStatus::Completed | ScanStatus::Failed => 2,
        }
    }

    /// Staying put is allowed for non-terminal states (progress updates).
    pub fn can_transition_to(self, next: ScanStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next.rank() >= self.rank()
    }
}

impl std::fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanStatus::Pending => write!(f, "pending"),
            ScanStatus::Running => write!(f, "running"),
            ScanStatus::Completed => write!(f, "completed"),
            ScanStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for ScanStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ScanStatus::Pending),
            "running" => Ok(ScanStatus::Running),
            "completed" => Ok(ScanStatus::Completed),
            "failed" => Ok(ScanStatus::Failed),
            _ => Err(format!("Unknown scan status: {}", s)),
        }
    }
}

/// One execution of a subnet sweep
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryScan {
    pub id: i64,
    pub network_id: i64,
    pub status: ScanStatus,
    pub scan_type: ScanType,
    pub scan_depth: i32,
    pub total_hosts: i64,
    pub scanned_hosts: i64,
    pub found_hosts: i64,
    pub progress_percent: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
    pub error_message: Option<String>,
}

impl DiscoveryScan {
    /// A scan that starts `running` right away, not yet persisted
    pub fn start(network_id: i64, scan_type: ScanType) -> Self {
        Self {
            id: 0,
            network_id,
            status: ScanStatus::Running,
            scan_type,
            scan_depth: config::BASELINE_SCAN_DEPTH,
            total_hosts: 0,
            scanned_hosts: 0,
            found_hosts: 0,
            progress_percent: 0.0,
            started_at: Some(Utc::now()),
            completed_at: None,
            duration_seconds: None,
            error_message: None,
        }
    }

    /// Counts one finished host. `scanned_hosts` never passes `total_hosts`.
    pub fn record_host(&mut self, found: bool) {
        if self.scanned_hosts < self.total_hosts {
            self.scanned_hosts += 1;
        }
        if found {
            self.found_hosts += 1;
        }
        self.progress_percent = self.computed_progress();
    }

    pub fn computed_progress(&self) -> f64 {
        if self.total_hosts <= 0 {
            return 0.0;
        }
        (self.scanned_hosts as f64 / self.total_hosts as f64) * 100.0
    }

    /// Moves to `completed` or `failed`, stamping completion time and duration.
    /// Returns false (and changes nothing) if the scan is already terminal.
    pub fn finish(&mut self, status: ScanStatus, error_message: Option<String>) -> bool {
        if !status.is_terminal() || !self.status.can_transition_to(status) {
            return false;
        }
        let now = Utc::now();
        self.status = status;
        self.completed_at = Some(now);
        self.duration_seconds = self
            .started_at
            .map(|started| (now - started).num_milliseconds().max(0) as f64 / 1000.0);
        self.error_message = error_message;
        if status == ScanStatus::Completed {
            self.progress_percent = 100.0;
        }
        true
    }
}

/// Liveness of a discovered host
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Offline,
    #[default]
    Unknown,
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceStatus::Online => write!(f, "online"),
            DeviceStatus::Offline => write!(f, "offline"),
            DeviceStatus::Unknown => write!(f, "unknown"),
        }
    }
}

impl std::str::FromStr for DeviceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "online" => Ok(DeviceStatus::Online),
            "offline" => Ok(DeviceStatus::Offline),
            "unknown" => Ok(DeviceStatus::Unknown),
            _ => Err(format!("Unknown device status: {}", s)),
        }
    }
}

/// Provisional, evidence-based record of an observed IP (one row per IP)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveredDevice {
    pub id: i64,
    pub ip: String,
    pub mac_address: Option<String>,
    pub hostname: Option<String>,
    pub network_id: Option<i64>,
    pub status: DeviceStatus,
    pub confidence: u8,
    pub os_guess: Option<String>,
    pub os_family: Option<String>,
    #[serde(default)]
    pub open_ports: Vec<u16>,
    #[serde(default)]
    pub services: Vec<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub last_scan_id: Option<i64>,
    pub promoted_to_device_id: Option<i64>,
    pub promoted_at: Option<DateTime<Utc>>,
}

impl DiscoveredDevice {
    pub fn is_promoted(&self) -> bool {
        self.promoted_to_device_id.is_some()
    }
}

/// Filter for listing discovered devices
#[derive(Debug, Clone, Default)]
pub struct DiscoveredDeviceFilter {
    pub network_id: Option<i64>,
    pub status: Option<DeviceStatus>,
    /// `Some(false)` lists only unpromoted rows
    pub promoted: Option<bool>,
    pub min_confidence: Option<u8>,
    pub limit: Option<i64>,
}

/// Managed inventory device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Device {
    pub id: i64,
    pub name: String,
    pub hostname: Option<String>,
    pub datacenter_id: Option<i64>,
    pub os: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub domains: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Address attached to a managed device
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub id: i64,
    pub device_id: i64,
    pub ip: String,
    pub address_type: String,
    pub label: Option<String>,
    pub network_id: Option<i64>,
}
