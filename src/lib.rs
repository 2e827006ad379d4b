//! rackscan - Network Discovery Engine for Infrastructure Inventory
//!
//! This crate sweeps the IPv4 ranges of inventory networks and stages what it
//! finds for promotion:
//! - TCP connect probing with reverse DNS, under bounded concurrency
//! - Confidence scoring of each responsive host
//! - One reconciled record per IP across scans
//! - Transactional promotion into managed devices
//! - SQLite storage for rules, scans and discovered devices

pub mod app;
pub mod cli;
mod command_handlers;
pub mod config;
pub mod database;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod models;
pub mod network;
pub mod scanner;

pub use app::{execute_command_with_context, run, run_with_context, AppContext, OutputHook};
pub use cli::{parse_cli_args, usage_text, version_text, CliCommand};
pub use database::{
    Database, Device, DeviceStatus, DiscoveredDevice, DiscoveredDeviceFilter, DiscoveryRule,
    DiscoveryScan, DiscoveryStore, Network, ScanStatus, ScanType,
};
pub use discovery::{
    noop_progress, purge_stale, BulkPromoteOutcome, ProgressCallback, PromoteRequest,
    PromotionError, PromotionService, RuleRun, Scanner,
};
pub use error::DiscoveryError;
pub use models::DiscoveredDeviceDraft;
pub use scanner::{HostProber, TcpProber};

// Re-export logging macros for use across crate
pub use crate::logging::macros;
