//! Database schema definitions
//!
//! The inventory tables (datacenters, networks, devices and their children)
//! mirror what the inventory service owns; the discovery tables belong to
//! this crate.

use anyhow::{Context, Result};
use rusqlite::Connection;

/// Create all database tables
pub fn create_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS datacenters (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            location TEXT,
            description TEXT
        );

        CREATE TABLE IF NOT EXISTS networks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            subnet TEXT NOT NULL,
            datacenter_id INTEGER,
            description TEXT,
            FOREIGN KEY (datacenter_id) REFERENCES datacenters(id) ON DELETE SET NULL
        );

        -- Managed inventory devices
        CREATE TABLE IF NOT EXISTS devices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            hostname TEXT,
            datacenter_id INTEGER,
            os TEXT,
            make TEXT,
            model TEXT,
            description TEXT,
            created_at TEXT NOT NULL,
            FOREIGN KEY (datacenter_id) REFERENCES datacenters(id) ON DELETE SET NULL
        );

        CREATE TABLE IF NOT EXISTS addresses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            device_id INTEGER NOT NULL,
            ip TEXT NOT NULL,
            address_type TEXT NOT NULL DEFAULT 'ipv4',
            label TEXT,
            network_id INTEGER,
            FOREIGN KEY (device_id) REFERENCES devices(id) ON DELETE CASCADE,
            FOREIGN KEY (network_id) REFERENCES networks(id) ON DELETE SET NULL
        );

        CREATE TABLE IF NOT EXISTS tags (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE
        );

        CREATE TABLE IF NOT EXISTS device_tags (
            device_id INTEGER NOT NULL,
            tag_id INTEGER NOT NULL,
            PRIMARY KEY (device_id, tag_id),
            FOREIGN KEY (device_id) REFERENCES devices(id) ON DELETE CASCADE,
            FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
        );

        CREATE TABLE IF NOT EXISTS device_domains (
            device_id INTEGER NOT NULL,
            domain TEXT NOT NULL,
            PRIMARY KEY (device_id, domain),
            FOREIGN KEY (device_id) REFERENCES devices(id) ON DELETE CASCADE
        );

        -- Discovery rules: one per network
        CREATE TABLE IF NOT EXISTS discovery_rules (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            network_id INTEGER NOT NULL UNIQUE,
            enabled INTEGER NOT NULL DEFAULT 1,
            scan_type TEXT NOT NULL DEFAULT 'quick',
            timeout_seconds INTEGER NOT NULL DEFAULT 2,
            max_concurrent_scans INTEGER NOT NULL DEFAULT 5,
            scan_ports INTEGER NOT NULL DEFAULT 1,
            service_detection INTEGER NOT NULL DEFAULT 0,
            os_detection INTEGER NOT NULL DEFAULT 0,
            exclude_ips TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY (network_id) REFERENCES networks(id) ON DELETE CASCADE
        );

        -- Scans outlive their network so history stays readable; no FK on network_id
        CREATE TABLE IF NOT EXISTS discovery_scans (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            network_id INTEGER NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            scan_type TEXT NOT NULL DEFAULT 'quick',
            scan_depth INTEGER NOT NULL DEFAULT 2,
            total_hosts INTEGER NOT NULL DEFAULT 0,
            scanned_hosts INTEGER NOT NULL DEFAULT 0,
            found_hosts INTEGER NOT NULL DEFAULT 0,
            progress_percent REAL NOT NULL DEFAULT 0,
            started_at TEXT,
            completed_at TEXT,
            duration_seconds REAL,
            error_message TEXT
        );

        -- Discovered devices: one row per IP regardless of scan
        CREATE TABLE IF NOT EXISTS discovered_devices (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            ip TEXT NOT NULL UNIQUE,
            mac_address TEXT,
            hostname TEXT,
            network_id INTEGER,
            status TEXT NOT NULL DEFAULT 'unknown',
            confidence INTEGER NOT NULL DEFAULT 0,
            os_guess TEXT,
            os_family TEXT,
            open_ports TEXT NOT NULL DEFAULT '',
            services TEXT NOT NULL DEFAULT '[]',
            first_seen TEXT NOT NULL,
            last_seen TEXT NOT NULL,
            last_scan_id INTEGER,
            promoted_to_device_id INTEGER,
            promoted_at TEXT,
            FOREIGN KEY (network_id) REFERENCES networks(id) ON DELETE SET NULL,
            FOREIGN KEY (promoted_to_device_id) REFERENCES devices(id) ON DELETE SET NULL
        );

        CREATE INDEX IF NOT EXISTS idx_networks_datacenter ON networks(datacenter_id);
        CREATE INDEX IF NOT EXISTS idx_addresses_device ON addresses(device_id);
        CREATE INDEX IF NOT EXISTS idx_scans_network ON discovery_scans(network_id, started_at);
        CREATE INDEX IF NOT EXISTS idx_discovered_network ON discovered_devices(network_id);
        CREATE INDEX IF NOT EXISTS idx_discovered_last_seen ON discovered_devices(last_seen);
        "#,
    )
    .context("Failed to create database tables")?;

    Ok(())
}
