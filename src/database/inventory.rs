//! Inventory collaborator queries
//!
//! Datacenters, networks and managed devices are owned by the inventory
//! service. Only the operations the discovery engine relies on live here.

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{Address, Datacenter, Device, Network};
use super::sql::{encode_time, parse_time_column};
use crate::error::{DiscoveryError, Result};

/// Fields needed to create a managed device
#[derive(Debug, Clone, Default)]
pub struct NewDevice {
    pub name: String,
    pub hostname: Option<String>,
    pub datacenter_id: Option<i64>,
    pub os: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub description: Option<String>,
    pub addresses: Vec<NewAddress>,
    pub tags: Vec<String>,
    pub domains: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewAddress {
    pub ip: String,
    pub address_type: String,
    pub label: Option<String>,
    pub network_id: Option<i64>,
}

pub fn create_datacenter(
    conn: &Connection,
    name: &str,
    location: Option<&str>,
    description: Option<&str>,
) -> Result<Datacenter> {
    conn.execute(
        "INSERT INTO datacenters (name, location, description) VALUES (?1, ?2, ?3)",
        params![name, location, description],
    )?;
    get_datacenter(conn, conn.last_insert_rowid())
}

pub fn get_datacenter(conn: &Connection, id: i64) -> Result<Datacenter> {
    conn.query_row(
        "SELECT id, name, location, description FROM datacenters WHERE id = ?1",
        params![id],
        row_to_datacenter,
    )
    .optional()?
    .ok_or_else(|| DiscoveryError::not_found("datacenter", id))
}

pub fn list_datacenters(conn: &Connection) -> Result<Vec<Datacenter>> {
    let mut stmt =
        conn.prepare("SELECT id, name, location, description FROM datacenters ORDER BY id")?;
    let datacenters = stmt
        .query_map([], row_to_datacenter)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(datacenters)
}

fn row_to_datacenter(row: &Row<'_>) -> rusqlite::Result<Datacenter> {
    Ok(Datacenter {
        id: row.get(0)?,
        name: row.get(1)?,
        location: row.get(2)?,
        description: row.get(3)?,
    })
}

pub fn create_network(
    conn: &Connection,
    name: &str,
    subnet: &str,
    datacenter_id: Option<i64>,
) -> Result<Network> {
    conn.execute(
        "INSERT INTO networks (name, subnet, datacenter_id) VALUES (?1, ?2, ?3)",
        params![name, subnet, datacenter_id],
    )?;
    get_network(conn, conn.last_insert_rowid())
}

pub fn get_network(conn: &Connection, id: i64) -> Result<Network> {
    conn.query_row(
        "SELECT id, name, subnet, datacenter_id, description FROM networks WHERE id = ?1",
        params![id],
        row_to_network,
    )
    .optional()?
    .ok_or_else(|| DiscoveryError::not_found("network", id))
}

pub fn list_networks(conn: &Connection) -> Result<Vec<Network>> {
    let mut stmt = conn.prepare(
        "SELECT id, name, subnet, datacenter_id, description FROM networks ORDER BY id",
    )?;
    let networks = stmt
        .query_map([], row_to_network)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(networks)
}

fn row_to_network(row: &Row<'_>) -> rusqlite::Result<Network> {
    Ok(Network {
        id: row.get(0)?,
        name: row.get(1)?,
        subnet: row.get(2)?,
        datacenter_id: row.get(3)?,
        description: row.get(4)?,
    })
}

/// Inserts a device with its addresses, tags and domains.
///
/// Not transactional on its own: callers wrap it in a savepoint.
pub fn insert_device(conn: &Connection, device: &NewDevice) -> Result<Device> {
    let created_at = Utc::now();
    conn.execute(
        r#"
        INSERT INTO devices (
            name, hostname, datacenter_id, os, make, model, description, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
        params![
            device.name,
            device.hostname,
            device.datacenter_id,
            device.os,
            device.make,
            device.model,
            device.description,
            encode_time(&created_at),
        ],
    )?;
    let device_id = conn.last_insert_rowid();

    for address in &device.addresses {
        conn.execute(
            r#"
            INSERT INTO addresses (device_id, ip, address_type, label, network_id)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![
                device_id,
                address.ip,
                address.address_type,
                address.label,
                address.network_id,
            ],
        )?;
    }

    for tag in &device.tags {
        conn.execute(
            "INSERT INTO tags (name) VALUES (?1) ON CONFLICT(name) DO NOTHING",
            params![tag],
        )?;
        conn.execute(
            r#"
            INSERT OR IGNORE INTO device_tags (device_id, tag_id)
            SELECT ?1, id FROM tags WHERE name = ?2
            "#,
            params![device_id, tag],
        )?;
    }

    for domain in &device.domains {
        conn.execute(
            "INSERT OR IGNORE INTO device_domains (device_id, domain) VALUES (?1, ?2)",
            params![device_id, domain],
        )?;
    }

    get_device(conn, device_id)
}

pub fn get_device(conn: &Connection, id: i64) -> Result<Device> {
    let mut device = conn
        .query_row(
            r#"
            SELECT id, name, hostname, datacenter_id, os, make, model, description, created_at
            FROM devices WHERE id = ?1
            "#,
            params![id],
            |row| {
                Ok(Device {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    hostname: row.get(2)?,
                    datacenter_id: row.get(3)?,
                    os: row.get(4)?,
                    make: row.get(5)?,
                    model: row.get(6)?,
                    description: row.get(7)?,
                    addresses: Vec::new(),
                    tags: Vec::new(),
                    domains: Vec::new(),
                    created_at: parse_time_column(row.get(8)?, 8)?,
                })
            },
        )
        .optional()?
        .ok_or_else(|| DiscoveryError::not_found("device", id))?;

    let mut stmt = conn.prepare(
        r#"
        SELECT id, device_id, ip, address_type, label, network_id
        FROM addresses WHERE device_id = ?1 ORDER BY id
        "#,
    )?;
    device.addresses = stmt
        .query_map(params![id], |row| {
            Ok(Address {
                id: row.get(0)?,
                device_id: row.get(1)?,
                ip: row.get(2)?,
                address_type: row.get(3)?,
                label: row.get(4)?,
                network_id: row.get(5)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare(
        r#"
        SELECT t.name FROM device_tags dt
        JOIN tags t ON t.id = dt.tag_id
        WHERE dt.device_id = ?1 ORDER BY t.name
        "#,
    )?;
    device.tags = stmt
        .query_map(params![id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut stmt =
        conn.prepare("SELECT domain FROM device_domains WHERE device_id = ?1 ORDER BY domain")?;
    device.domains = stmt
        .query_map(params![id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(device)
}

pub fn count_devices(conn: &Connection) -> Result<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM devices", [], |row| row.get(0))?)
}
