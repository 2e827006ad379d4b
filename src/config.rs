//! Configuration constants and runtime tunables for the discovery engine
//!
//! Per-scan values (timeout, concurrency, exclusions) always come from the
//! `DiscoveryRule` being executed. The values here are defaults used when a
//! rule leaves a field at zero, plus process-wide limits.

use std::path::PathBuf;
use std::time::Duration;

/// Hosts probed concurrently when a rule does not set `max_concurrent_scans`
pub const DEFAULT_MAX_CONCURRENT_HOSTS: usize = 5;

/// Simultaneous port checks per host
pub const MAX_CONCURRENT_PORT_CHECKS: usize = 10;

/// Per-port (and reverse DNS) deadline when a rule does not set `timeout_seconds`
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Ports dialled by the baseline TCP prober
pub const COMMON_PORTS: &[u16] = &[80, 443, 22, 3389, 23, 21, 25, 53, 110, 143, 993, 995];

/// Progress callback fires on every Nth completed host (and on the last one)
pub const PROGRESS_CALLBACK_INTERVAL: usize = 50;

/// Depth label recorded on every scan produced by the baseline engine
pub const BASELINE_SCAN_DEPTH: i32 = 2;

/// Largest candidate list a single scan accepts (a /16)
pub const MAX_SCAN_HOSTS: usize = 65_536;

/// Days without a sighting before an unpromoted discovered device is purged
pub const DEFAULT_RETENTION_DAYS: i64 = 30;

// ====== Confidence scoring ======

pub const CONFIDENCE_BASE: u8 = 30;
pub const CONFIDENCE_HOSTNAME_BONUS: u8 = 20;
pub const CONFIDENCE_OPEN_PORT_BONUS: u8 = 30;
pub const CONFIDENCE_MANY_PORTS_BONUS: u8 = 10;

/// More than this many open ports earns the extra bonus
pub const CONFIDENCE_MANY_PORTS_THRESHOLD: usize = 2;

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse_u64(name: &str, default: u64, min: u64, max: u64) -> u64 {
    match env_var(name).and_then(|v| v.parse::<u64>().ok()) {
        Some(v) => v.clamp(min, max),
        None => default,
    }
}

fn env_parse_usize(name: &str, default: usize, min: usize, max: usize) -> usize {
    match env_var(name).and_then(|v| v.parse::<usize>().ok()) {
        Some(v) => v.clamp(min, max),
        None => default,
    }
}

fn env_parse_i64(name: &str, default: i64, min: i64, max: i64) -> i64 {
    match env_var(name).and_then(|v| v.parse::<i64>().ok()) {
        Some(v) => v.clamp(min, max),
        None => default,
    }
}

/// Database file location override.
/// Env: `RACKSCAN_DB_PATH`
pub fn database_path() -> Option<PathBuf> {
    env_var("RACKSCAN_DB_PATH").map(PathBuf::from)
}

/// Fallback host concurrency for rules that leave it unset.
/// Env: `RACKSCAN_MAX_CONCURRENT_HOSTS`
pub fn max_concurrent_hosts() -> usize {
    env_parse_usize(
        "RACKSCAN_MAX_CONCURRENT_HOSTS",
        DEFAULT_MAX_CONCURRENT_HOSTS,
        1,
        1024,
    )
}

/// Per-host port check concurrency.
/// Env: `RACKSCAN_MAX_CONCURRENT_PORTS`
pub fn max_concurrent_ports() -> usize {
    env_parse_usize(
        "RACKSCAN_MAX_CONCURRENT_PORTS",
        MAX_CONCURRENT_PORT_CHECKS,
        1,
        64,
    )
}

/// Fallback probe timeout for rules that leave it unset.
/// Env: `RACKSCAN_PROBE_TIMEOUT_MS`
pub fn probe_timeout() -> Duration {
    Duration::from_millis(env_parse_u64(
        "RACKSCAN_PROBE_TIMEOUT_MS",
        DEFAULT_PROBE_TIMEOUT.as_millis() as u64,
        50,
        60_000,
    ))
}

/// Port list for the TCP prober.
/// Env: `RACKSCAN_PROBE_PORTS` (comma-separated, e.g. `22,80,443`)
pub fn probe_ports() -> Vec<u16> {
    if let Some(raw) = env_var("RACKSCAN_PROBE_PORTS") {
        let ports: Vec<u16> = raw
            .split(',')
            .filter_map(|p| p.trim().parse::<u16>().ok())
            .filter(|p| *p > 0)
            .collect();
        if !ports.is_empty() {
            return ports;
        }
    }
    COMMON_PORTS.to_vec()
}

/// Upper bound on candidate hosts per scan.
/// Env: `RACKSCAN_MAX_SCAN_HOSTS`
pub fn max_scan_hosts() -> usize {
    env_parse_usize("RACKSCAN_MAX_SCAN_HOSTS", MAX_SCAN_HOSTS, 1, 1 << 24)
}

/// Completed hosts between progress callbacks.
/// Env: `RACKSCAN_PROGRESS_INTERVAL`
pub fn progress_interval() -> usize {
    env_parse_usize(
        "RACKSCAN_PROGRESS_INTERVAL",
        PROGRESS_CALLBACK_INTERVAL,
        1,
        100_000,
    )
}

/// Retention window for unpromoted discovered devices.
/// Env: `RACKSCAN_RETENTION_DAYS`
pub fn retention_days() -> i64 {
    env_parse_i64("RACKSCAN_RETENTION_DAYS", DEFAULT_RETENTION_DAYS, 1, 3650)
}
