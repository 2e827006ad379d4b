//! Discovery rule and discovery scan queries

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{DiscoveryRule, DiscoveryScan, ScanStatus};
use super::sql::{
    encode_list, encode_opt_time, encode_time, parse_enum_column, parse_list_column,
    parse_opt_time_column, parse_time_column,
};
use crate::error::{DiscoveryError, Result};

const RULE_COLUMNS: &str = r#"
    id, network_id, enabled, scan_type, timeout_seconds, max_concurrent_scans,
    scan_ports, service_detection, os_detection, exclude_ips, created_at, updated_at
"#;

const SCAN_COLUMNS: &str = r#"
    id, network_id, status, scan_type, scan_depth, total_hosts, scanned_hosts,
    found_hosts, progress_percent, started_at, completed_at, duration_seconds, error_message
"#;

// ====== Rules ======

/// Inserts a rule; `network_id` is unique so a second rule for a network fails
pub fn create_discovery_rule(conn: &Connection, rule: &DiscoveryRule) -> Result<DiscoveryRule> {
    let now = Utc::now();
    conn.execute(
        r#"
        INSERT INTO discovery_rules (
            network_id, enabled, scan_type, timeout_seconds, max_concurrent_scans,
            scan_ports, service_detection, os_detection, exclude_ips, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
        "#,
        params![
            rule.network_id,
            rule.enabled,
            rule.scan_type.to_string(),
            rule.timeout_seconds,
            rule.max_concurrent_scans,
            rule.scan_ports,
            rule.service_detection,
            rule.os_detection,
            encode_list(&rule.exclude_ips)?,
            encode_time(&now),
        ],
    )?;
    get_discovery_rule(conn, conn.last_insert_rowid())
}

pub fn get_discovery_rule(conn: &Connection, id: i64) -> Result<DiscoveryRule> {
    conn.query_row(
        &format!("SELECT {RULE_COLUMNS} FROM discovery_rules WHERE id = ?1"),
        params![id],
        row_to_rule,
    )
    .optional()?
    .ok_or_else(|| DiscoveryError::not_found("discovery rule", id))
}

pub fn get_discovery_rule_for_network(
    conn: &Connection,
    network_id: i64,
) -> Result<Option<DiscoveryRule>> {
    Ok(conn
        .query_row(
            &format!("SELECT {RULE_COLUMNS} FROM discovery_rules WHERE network_id = ?1"),
            params![network_id],
            row_to_rule,
        )
        .optional()?)
}

pub fn list_discovery_rules(conn: &Connection, enabled_only: bool) -> Result<Vec<DiscoveryRule>> {
    let sql = if enabled_only {
        format!("SELECT {RULE_COLUMNS} FROM discovery_rules WHERE enabled = 1 ORDER BY id")
    } else {
        format!("SELECT {RULE_COLUMNS} FROM discovery_rules ORDER BY id")
    };
    let mut stmt = conn.prepare(&sql)?;
    let rules = stmt
        .query_map([], row_to_rule)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rules)
}

pub fn update_discovery_rule(conn: &Connection, rule: &DiscoveryRule) -> Result<DiscoveryRule> {
    let changed = conn.execute(
        r#"
        UPDATE discovery_rules SET
            enabled = ?2,
            scan_type = ?3,
            timeout_seconds = ?4,
            max_concurrent_scans = ?5,
            scan_ports = ?6,
            service_detection = ?7,
            os_detection = ?8,
            exclude_ips = ?9,
            updated_at = ?10
        WHERE id = ?1
        "#,
        params![
            rule.id,
            rule.enabled,
            rule.scan_type.to_string(),
            rule.timeout_seconds,
            rule.max_concurrent_scans,
            rule.scan_ports,
            rule.service_detection,
            rule.os_detection,
            encode_list(&rule.exclude_ips)?,
            encode_time(&Utc::now()),
        ],
    )?;
    if changed == 0 {
        return Err(DiscoveryError::not_found("discovery rule", rule.id));
    }
    get_discovery_rule(conn, rule.id)
}

pub fn delete_discovery_rule(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM discovery_rules WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(DiscoveryError::not_found("discovery rule", id));
    }
    Ok(())
}

fn row_to_rule(row: &Row<'_>) -> rusqlite::Result<DiscoveryRule> {
    Ok(DiscoveryRule {
        id: row.get(0)?,
        network_id: row.get(1)?,
        enabled: row.get(2)?,
        scan_type: parse_enum_column(row.get(3)?, 3)?,
        timeout_seconds: row.get(4)?,
        max_concurrent_scans: row.get(5)?,
        scan_ports: row.get(6)?,
        service_detection: row.get(7)?,
        os_detection: row.get(8)?,
        exclude_ips: parse_list_column(row.get(9)?, 9)?,
        created_at: parse_time_column(row.get(10)?, 10)?,
        updated_at: parse_time_column(row.get(11)?, 11)?,
    })
}

// ====== Scans ======

/// Inserts a scan record and returns it with its assigned id
pub fn create_discovery_scan(conn: &Connection, scan: &DiscoveryScan) -> Result<DiscoveryScan> {
    conn.execute(
        r#"
        INSERT INTO discovery_scans (
            network_id, status, scan_type, scan_depth, total_hosts, scanned_hosts,
            found_hosts, progress_percent, started_at, completed_at, duration_seconds,
            error_message
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
        params![
            scan.network_id,
            scan.status.to_string(),
            scan.scan_type.to_string(),
            scan.scan_depth,
            scan.total_hosts,
            scan.scanned_hosts,
            scan.found_hosts,
            scan.progress_percent,
            encode_opt_time(&scan.started_at),
            encode_opt_time(&scan.completed_at),
            scan.duration_seconds,
            scan.error_message,
        ],
    )?;

    let mut created = scan.clone();
    created.id = conn.last_insert_rowid();
    Ok(created)
}

pub fn get_discovery_scan(conn: &Connection, id: i64) -> Result<DiscoveryScan> {
    conn.query_row(
        &format!("SELECT {SCAN_COLUMNS} FROM discovery_scans WHERE id = ?1"),
        params![id],
        row_to_scan,
    )
    .optional()?
    .ok_or_else(|| DiscoveryError::not_found("discovery scan", id))
}

/// Most recent first
pub fn list_discovery_scans(
    conn: &Connection,
    network_id: Option<i64>,
    limit: i64,
) -> Result<Vec<DiscoveryScan>> {
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT {SCAN_COLUMNS} FROM discovery_scans
        WHERE (?1 IS NULL OR network_id = ?1)
        ORDER BY id DESC
        LIMIT ?2
        "#
    ))?;
    let scans = stmt
        .query_map(params![network_id, limit], row_to_scan)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(scans)
}

/// Writes progress/terminal state. Rejects backward moves and any change to a
/// scan that is already completed or failed.
pub fn update_discovery_scan(conn: &Connection, scan: &DiscoveryScan) -> Result<()> {
    let current: Option<String> = conn
        .query_row(
            "SELECT status FROM discovery_scans WHERE id = ?1",
            params![scan.id],
            |row| row.get(0),
        )
        .optional()?;

    let current: ScanStatus = match current {
        Some(raw) => raw.parse().map_err(DiscoveryError::Validation)?,
        None => return Err(DiscoveryError::not_found("discovery scan", scan.id)),
    };

    if current.is_terminal() {
        return Err(DiscoveryError::ScanFinalized { scan_id: scan.id });
    }
    if !current.can_transition_to(scan.status) {
        return Err(DiscoveryError::Validation(format!(
            "scan {} cannot move from {} to {}",
            scan.id, current, scan.status
        )));
    }
    if scan.scanned_hosts > scan.total_hosts {
        return Err(DiscoveryError::Validation(format!(
            "scan {} reports {} scanned of {} hosts",
            scan.id, scan.scanned_hosts, scan.total_hosts
        )));
    }

    conn.execute(
        r#"
        UPDATE discovery_scans SET
            status = ?2,
            total_hosts = ?3,
            scanned_hosts = ?4,
            found_hosts = ?5,
            progress_percent = ?6,
            completed_at = ?7,
            duration_seconds = ?8,
            error_message = ?9
        WHERE id = ?1 AND status NOT IN ('completed', 'failed')
        "#,
        params![
            scan.id,
            scan.status.to_string(),
            scan.total_hosts,
            scan.scanned_hosts,
            scan.found_hosts,
            scan.progress_percent,
            encode_opt_time(&scan.completed_at),
            scan.duration_seconds,
            scan.error_message,
        ],
    )?;
    Ok(())
}

pub fn delete_discovery_scan(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM discovery_scans WHERE id = ?1", params![id])?;
    if changed == 0 {
        return Err(DiscoveryError::not_found("discovery scan", id));
    }
    Ok(())
}

fn row_to_scan(row: &Row<'_>) -> rusqlite::Result<DiscoveryScan> {
    Ok(DiscoveryScan {
        id: row.get(0)?,
        network_id: row.get(1)?,
        status: parse_enum_column(row.get(2)?, 2)?,
        scan_type: parse_enum_column(row.get(3)?, 3)?,
        scan_depth: row.get(4)?,
        total_hosts: row.get(5)?,
        scanned_hosts: row.get(6)?,
        found_hosts: row.get(7)?,
        progress_percent: row.get(8)?,
        started_at: parse_opt_time_column(row.get(9)?, 9)?,
        completed_at: parse_opt_time_column(row.get(10)?, 10)?,
        duration_seconds: row.get(11)?,
        error_message: row.get(12)?,
    })
}
