//! Discovered device queries
//!
//! Row-level reads and writes. The merge rules applied on every new
//! observation live in `discovery::reconcile`.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::models::{DeviceStatus, DiscoveredDevice, DiscoveredDeviceFilter};
use super::sql::{
    encode_list, encode_ports, encode_time, parse_enum_column,
    parse_list_column, parse_opt_time_column, parse_ports, parse_time_column,
};
use crate::error::{DiscoveryError, Result};

const DISCOVERED_COLUMNS: &str = r#"
    id, ip, mac_address, hostname, network_id, status, confidence, os_guess, os_family,
    open_ports, services, first_seen, last_seen, last_scan_id, promoted_to_device_id, promoted_at
"#;

/// Inserts a new row and returns its id
pub fn insert_discovered_device(conn: &Connection, device: &DiscoveredDevice) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO discovered_devices (
            ip, mac_address, hostname, network_id, status, confidence, os_guess, os_family,
            open_ports, services, first_seen, last_seen, last_scan_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
        params![
            device.ip,
            device.mac_address,
            device.hostname,
            device.network_id,
            device.status.to_string(),
            device.confidence,
            device.os_guess,
            device.os_family,
            encode_ports(&device.open_ports),
            encode_list(&device.services)?,
            encode_time(&device.first_seen),
            encode_time(&device.last_seen),
            device.last_scan_id,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Rewrites the observation fields of an existing row.
///
/// `first_seen` and the promotion columns are never written here.
pub fn update_discovered_observation(conn: &Connection, device: &DiscoveredDevice) -> Result<()> {
    let changed = conn.execute(
        r#"
        UPDATE discovered_devices SET
            mac_address = ?2,
            hostname = ?3,
            network_id = ?4,
            status = ?5,
            confidence = ?6,
            os_guess = ?7,
            os_family = ?8,
            open_ports = ?9,
            services = ?10,
            last_seen = ?11,
            last_scan_id = ?12
        WHERE id = ?1
        "#,
        params![
            device.id,
            device.mac_address,
            device.hostname,
            device.network_id,
            device.status.to_string(),
            device.confidence,
            device.os_guess,
            device.os_family,
            encode_ports(&device.open_ports),
            encode_list(&device.services)?,
            encode_time(&device.last_seen),
            device.last_scan_id,
        ],
    )?;
    if changed == 0 {
        return Err(DiscoveryError::not_found("discovered device", device.id));
    }
    Ok(())
}

pub fn get_discovered_device(conn: &Connection, id: i64) -> Result<DiscoveredDevice> {
    conn.query_row(
        &format!("SELECT {DISCOVERED_COLUMNS} FROM discovered_devices WHERE id = ?1"),
        params![id],
        row_to_discovered,
    )
    .optional()?
    .ok_or_else(|| DiscoveryError::not_found("discovered device", id))
}

pub fn get_discovered_device_by_ip(conn: &Connection, ip: &str) -> Result<Option<DiscoveredDevice>> {
    Ok(conn
        .query_row(
            &format!("SELECT {DISCOVERED_COLUMNS} FROM discovered_devices WHERE ip = ?1"),
            params![ip],
            row_to_discovered,
        )
        .optional()?)
}

/// Lists discovered devices, highest confidence first
pub fn list_discovered_devices(
    conn: &Connection,
    filter: &DiscoveredDeviceFilter,
) -> Result<Vec<DiscoveredDevice>> {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(network_id) = filter.network_id {
        clauses.push("network_id = ?");
        values.push(Value::Integer(network_id));
    }
    if let Some(status) = filter.status {
        clauses.push("status = ?");
        values.push(Value::Text(status.to_string()));
    }
    match filter.promoted {
        Some(true) => clauses.push("promoted_to_device_id IS NOT NULL"),
        Some(false) => clauses.push("promoted_to_device_id IS NULL"),
        None => {}
    }
    if let Some(min) = filter.min_confidence {
        clauses.push("confidence >= ?");
        values.push(Value::Integer(i64::from(min)));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    values.push(Value::Integer(filter.limit.unwrap_or(-1)));

    let sql = format!(
        "SELECT {DISCOVERED_COLUMNS} FROM discovered_devices {where_clause} \
         ORDER BY confidence DESC, ip ASC LIMIT ?"
    );

    let mut stmt = conn.prepare(&sql)?;
    let devices = stmt
        .query_map(params_from_iter(values), row_to_discovered)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(devices)
}

/// Records that a known IP did not answer in `scan_id`. Unknown IPs are ignored.
///
/// Returns true when a row was updated.
pub fn mark_discovered_offline(conn: &Connection, ip: &str, scan_id: Option<i64>) -> Result<bool> {
    let changed = conn.execute(
        r#"
        UPDATE discovered_devices SET
            status = 'offline',
            last_scan_id = COALESCE(?2, last_scan_id)
        WHERE ip = ?1
        "#,
        params![ip, scan_id],
    )?;
    Ok(changed > 0)
}

/// Sets the promotion link exactly once.
///
/// Fails with `AlreadyPromoted` if another writer got there first.
pub fn mark_discovered_promoted(
    conn: &Connection,
    discovered_id: i64,
    device_id: i64,
    promoted_at: &DateTime<Utc>,
) -> Result<()> {
    let changed = conn.execute(
        r#"
        UPDATE discovered_devices SET
            promoted_to_device_id = ?2,
            promoted_at = ?3
        WHERE id = ?1 AND promoted_to_device_id IS NULL
        "#,
        params![discovered_id, device_id, encode_time(promoted_at)],
    )?;

    if changed == 0 {
        let existing = get_discovered_device(conn, discovered_id)?;
        return Err(DiscoveryError::AlreadyPromoted {
            discovered_id,
            device_id: existing.promoted_to_device_id.unwrap_or_default(),
        });
    }
    Ok(())
}

pub fn delete_discovered_device(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM discovered_devices WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(DiscoveryError::not_found("discovered device", id));
    }
    Ok(())
}

/// Retention sweep: deletes never-promoted rows last seen before `cutoff`
pub fn purge_stale_discovered_devices(conn: &Connection, cutoff: &DateTime<Utc>) -> Result<usize> {
    // Timestamps are fixed-width UTC strings, so text order is time order.
    let removed = conn.execute(
        r#"
        DELETE FROM discovered_devices
        WHERE promoted_to_device_id IS NULL AND last_seen < ?1
        "#,
        params![encode_time(cutoff)],
    )?;
    Ok(removed)
}

fn row_to_discovered(row: &Row<'_>) -> rusqlite::Result<DiscoveredDevice> {
    let status: DeviceStatus = parse_enum_column(row.get(5)?, 5)?;
    let confidence: i64 = row.get(6)?;
    let ports: String = row.get(9)?;

    Ok(DiscoveredDevice {
        id: row.get(0)?,
        ip: row.get(1)?,
        mac_address: row.get(2)?,
        hostname: row.get(3)?,
        network_id: row.get(4)?,
        status,
        confidence: confidence.clamp(0, 100) as u8,
        os_guess: row.get(7)?,
        os_family: row.get(8)?,
        open_ports: parse_ports(&ports),
        services: parse_list_column(row.get(10)?, 10)?,
        first_seen: parse_time_column(row.get(11)?, 11)?,
        last_seen: parse_time_column(row.get(12)?, 12)?,
        last_scan_id: row.get(13)?,
        promoted_to_device_id: row.get(14)?,
        promoted_at: parse_opt_time_column(row.get(15)?, 15)?,
    })
}

/// Shape of a brand-new row, used by tests and the reconciler
pub(crate) fn blank_row(ip: &str, now: DateTime<Utc>) -> DiscoveredDevice {
    DiscoveredDevice {
        id: 0,
        ip: ip.to_string(),
        mac_address: None,
        hostname: None,
        network_id: None,
        status: DeviceStatus::Unknown,
        confidence: 0,
        os_guess: None,
        os_family: None,
        open_ports: Vec::new(),
        services: Vec::new(),
        first_seen: now,
        last_seen: now,
        last_scan_id: None,
        promoted_to_device_id: None,
        promoted_at: None,
    }
}
