//! Discovery reconciliation
//!
//! Folds a fresh observation into the one persisted row per IP.

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::database::discovered::blank_row;
use crate::database::sql::with_savepoint;
use crate::database::{
    get_discovered_device, get_discovered_device_by_ip, insert_discovered_device,
    update_discovered_observation, DiscoveredDevice,
};
use crate::error::Result;
use crate::models::DiscoveredDeviceDraft;

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Merges `draft` over `existing` (or a blank row when the IP is new).
///
/// `first_seen` and the promotion link survive, confidence never drops, and
/// blank mac/hostname keep what was known before.
pub fn merge_observation(
    existing: Option<&DiscoveredDevice>,
    draft: &DiscoveredDeviceDraft,
    now: DateTime<Utc>,
) -> DiscoveredDevice {
    let ip = draft.ip.to_string();
    let mut row = existing.cloned().unwrap_or_else(|| blank_row(&ip, now));

    if let Some(mac) = non_blank(&draft.mac_address) {
        row.mac_address = Some(mac);
    }
    if let Some(hostname) = non_blank(&draft.hostname) {
        row.hostname = Some(hostname);
    }
    if draft.network_id.is_some() {
        row.network_id = draft.network_id;
    }

    row.status = draft.status;
    row.confidence = row.confidence.max(draft.confidence.min(100));
    row.os_guess = draft.os_guess.clone();
    row.os_family = draft.os_family.clone();
    row.open_ports = draft.open_ports.clone();
    row.services = draft.services.clone();
    row.last_seen = now;
    row.last_scan_id = draft.scan_id;

    row
}

/// Insert-or-update by IP inside one write transaction. Returns the stored row.
///
/// The write lock is held from the read through the write, so concurrent
/// writers on other handles queue behind it and the later one merges over
/// the earlier.
pub fn upsert_discovered_device(
    conn: &Connection,
    draft: &DiscoveredDeviceDraft,
) -> Result<DiscoveredDevice> {
    with_savepoint(conn, "upsert_discovered_device", |conn| {
        let existing = get_discovered_device_by_ip(conn, &draft.ip.to_string())?;
        let merged = merge_observation(existing.as_ref(), draft, Utc::now());

        let id = match existing {
            Some(_) => {
                update_discovered_observation(conn, &merged)?;
                merged.id
            }
            None => insert_discovered_device(conn, &merged)?,
        };
        get_discovered_device(conn, id)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{mark_discovered_promoted, Database, DeviceStatus};
    use chrono::Duration;
    use std::net::Ipv4Addr;
    use std::sync::{Arc, Barrier};
    use std::time::{SystemTime, UNIX_EPOCH};

    fn observation(confidence: u8, hostname: Option<&str>, ports: &[u16]) -> DiscoveredDeviceDraft {
        let mut draft = DiscoveredDeviceDraft::new(Ipv4Addr::new(10, 0, 0, 2));
        draft.status = DeviceStatus::Online;
        draft.confidence = confidence;
        draft.hostname = hostname.map(str::to_string);
        draft.open_ports = ports.to_vec();
        draft
    }

    #[test]
    fn test_merge_new_ip_sets_both_timestamps() {
        let now = Utc::now();
        let row = merge_observation(None, &observation(60, None, &[22]), now);
        assert_eq!(row.ip, "10.0.0.2");
        assert_eq!(row.first_seen, now);
        assert_eq!(row.last_seen, now);
        assert_eq!(row.confidence, 60);
    }

    #[test]
    fn test_merge_keeps_history() {
        let earlier = Utc::now() - Duration::hours(3);
        let first = merge_observation(None, &observation(80, Some("db-01"), &[22, 443]), earlier);

        let mut second = observation(60, None, &[22]);
        second.mac_address = Some(String::new());
        second.os_guess = Some("Linux".to_string());
        let now = Utc::now();
        let merged = merge_observation(Some(&first), &second, now);

        assert_eq!(merged.first_seen, earlier);
        assert_eq!(merged.last_seen, now);
        assert_eq!(merged.confidence, 80);
        assert_eq!(merged.hostname.as_deref(), Some("db-01"));
        assert_eq!(merged.open_ports, vec![22]);
        assert_eq!(merged.os_guess.as_deref(), Some("Linux"));
    }

    #[test]
    fn test_merge_network_id_only_when_present() {
        let mut with_net = observation(50, None, &[]);
        with_net.network_id = Some(4);
        let first = merge_observation(None, &with_net, Utc::now());

        let merged = merge_observation(Some(&first), &observation(50, None, &[]), Utc::now());
        assert_eq!(merged.network_id, Some(4));
    }

    #[test]
    fn test_confidence_is_monotonic_across_upserts() {
        let db = Database::in_memory().unwrap();
        let conn = db.lock().unwrap();

        let mut high_water = 0;
        for confidence in [50, 30, 90, 60, 70, 10] {
            let row = upsert_discovered_device(&conn, &observation(confidence, None, &[22])).unwrap();
            high_water = high_water.max(confidence);
            assert_eq!(row.confidence, high_water);
        }
    }

    #[test]
    fn test_upsert_is_idempotent_except_last_seen() {
        let db = Database::in_memory().unwrap();
        let conn = db.lock().unwrap();
        let draft = observation(60, Some("web"), &[80, 443]);

        let first = upsert_discovered_device(&conn, &draft).unwrap();
        let second = upsert_discovered_device(&conn, &draft).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.first_seen, second.first_seen);
        assert!(second.last_seen >= first.last_seen);
        assert_eq!(
            DiscoveredDevice {
                last_seen: first.last_seen,
                ..second.clone()
            },
            first
        );

        let stored = get_discovered_device(&conn, first.id).unwrap();
        assert_eq!(stored.first_seen, first.first_seen);
    }

    #[test]
    fn test_upsert_leaves_promotion_alone() {
        let db = Database::in_memory().unwrap();
        let conn = db.lock().unwrap();
        let row = upsert_discovered_device(&conn, &observation(60, None, &[22])).unwrap();

        conn.execute(
            "INSERT INTO devices (name, created_at) VALUES ('kept', ?1)",
            [crate::database::sql::encode_time(&Utc::now())],
        )
        .unwrap();
        let device_id = conn.last_insert_rowid();
        mark_discovered_promoted(&conn, row.id, device_id, &Utc::now()).unwrap();

        let after = upsert_discovered_device(&conn, &observation(70, None, &[22])).unwrap();
        assert_eq!(after.promoted_to_device_id, Some(device_id));
        assert!(after.promoted_at.is_some());
    }

    #[test]
    fn test_racing_handles_on_one_ip_both_land() {
        let path = std::env::temp_dir().join(format!(
            "rackscan_reconcile_race_{}.db",
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos()
        ));
        let first = Database::new(path.clone()).unwrap();
        let second = Database::new(path.clone()).unwrap();

        let ips: Vec<Ipv4Addr> = (1..=50).map(|n| Ipv4Addr::new(10, 9, 0, n)).collect();
        let seeded: Vec<DiscoveredDevice> = {
            let conn = first.lock().unwrap();
            ips.iter()
                .map(|ip| {
                    let mut draft = DiscoveredDeviceDraft::new(*ip);
                    draft.status = DeviceStatus::Online;
                    draft.confidence = 30;
                    upsert_discovered_device(&conn, &draft).unwrap()
                })
                .collect()
        };

        let barrier = Arc::new(Barrier::new(2));
        let workers: Vec<_> = [(first, 60u8), (second, 90u8)]
            .into_iter()
            .map(|(db, confidence)| {
                let barrier = Arc::clone(&barrier);
                let ips = ips.clone();
                std::thread::spawn(move || {
                    let mut failures = 0;
                    for ip in ips {
                        let mut draft = DiscoveredDeviceDraft::new(ip);
                        draft.status = DeviceStatus::Online;
                        draft.confidence = confidence;
                        draft.open_ports = vec![22];
                        barrier.wait();
                        let conn = db.lock().unwrap();
                        if upsert_discovered_device(&conn, &draft).is_err() {
                            failures += 1;
                        }
                    }
                    failures
                })
            })
            .collect();

        let failures: usize = workers.into_iter().map(|w| w.join().unwrap()).sum();
        assert_eq!(failures, 0);

        let db = Database::new(path.clone()).unwrap();
        let conn = db.lock().unwrap();
        for before in &seeded {
            let after = get_discovered_device_by_ip(&conn, &before.ip)
                .unwrap()
                .unwrap();
            assert_eq!(after.id, before.id);
            assert_eq!(after.first_seen, before.first_seen);
            assert_eq!(after.confidence, 90);
        }
        drop(conn);
        drop(db);
        let _ = std::fs::remove_file(path);
    }
}
