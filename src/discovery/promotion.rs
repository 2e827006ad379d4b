//! Promotion of discovered devices into the managed inventory

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::database::sql::with_savepoint;
use crate::database::{
    get_datacenter, get_discovered_device, insert_device, list_datacenters,
    mark_discovered_promoted, Database, Device, NewAddress, NewDevice,
};
use crate::error::{DiscoveryError, Result};

/// Label on the address created from a discovered IP
pub const DISCOVERED_ADDRESS_LABEL: &str = "discovered";

/// Operator-supplied fields for a promotion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromoteRequest {
    pub name: String,
    #[serde(default)]
    pub datacenter_id: Option<i64>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub make: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub domains: Vec<String>,
}

impl PromoteRequest {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Per-id failure from a bulk promotion
#[derive(Debug)]
pub struct PromotionError {
    pub discovered_id: i64,
    pub error: DiscoveryError,
}

#[derive(Debug, Default)]
pub struct BulkPromoteOutcome {
    pub promoted: Vec<Device>,
    pub errors: Vec<PromotionError>,
}

#[derive(Clone)]
pub struct PromotionService {
    db: Database,
}

impl PromotionService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Creates a Device from a discovered row and links the two, atomically
    pub fn promote(&self, discovered_id: i64, request: &PromoteRequest) -> Result<Device> {
        if request.name.trim().is_empty() {
            return Err(DiscoveryError::Validation(
                "device name is required".to_string(),
            ));
        }

        let conn = self.db.lock()?;
        let device = with_savepoint(&conn, "promote_discovered", |conn| {
            promote_in(conn, discovered_id, request)
        })?;

        crate::log_info!(
            "Promoted discovered device {} to device {} ({})",
            discovered_id,
            device.id,
            device.name
        );
        Ok(device)
    }

    /// Promotes each id in its own transaction. `requests[i]` belongs to `ids[i]`.
    pub fn bulk_promote(&self, ids: &[i64], requests: &[PromoteRequest]) -> BulkPromoteOutcome {
        let mut outcome = BulkPromoteOutcome::default();

        for (index, &discovered_id) in ids.iter().enumerate() {
            let result = match requests.get(index) {
                Some(request) => self.promote(discovered_id, request),
                None => Err(DiscoveryError::Validation(format!(
                    "no promotion request for discovered device {}",
                    discovered_id
                ))),
            };

            match result {
                Ok(device) => outcome.promoted.push(device),
                Err(error) => {
                    crate::log_warn!("Promotion of discovered device {} failed: {}", discovered_id, error);
                    outcome.errors.push(PromotionError {
                        discovered_id,
                        error,
                    });
                }
            }
        }

        if ids.len() < requests.len() {
            crate::log_warn!(
                "{} promotion requests had no matching discovered id",
                requests.len() - ids.len()
            );
        }

        outcome
    }
}

fn promote_in(conn: &Connection, discovered_id: i64, request: &PromoteRequest) -> Result<Device> {
    let discovered = get_discovered_device(conn, discovered_id)?;
    if let Some(device_id) = discovered.promoted_to_device_id {
        return Err(DiscoveryError::AlreadyPromoted {
            discovered_id,
            device_id,
        });
    }

    let datacenter_id = resolve_datacenter(conn, request.datacenter_id)?;

    let new_device = NewDevice {
        name: request.name.trim().to_string(),
        hostname: request.hostname.clone().or(discovered.hostname.clone()),
        datacenter_id,
        os: request.os.clone().or(discovered.os_guess.clone()),
        make: request.make.clone(),
        model: request.model.clone(),
        description: request.description.clone(),
        addresses: vec![NewAddress {
            ip: discovered.ip.clone(),
            address_type: "ipv4".to_string(),
            label: Some(DISCOVERED_ADDRESS_LABEL.to_string()),
            network_id: discovered.network_id,
        }],
        tags: request.tags.clone(),
        domains: request.domains.clone(),
    };

    let device = insert_device(conn, &new_device)?;
    mark_discovered_promoted(conn, discovered_id, device.id, &Utc::now())?;
    Ok(device)
}

/// Explicit id must exist; otherwise a lone datacenter is picked
fn resolve_datacenter(conn: &Connection, requested: Option<i64>) -> Result<Option<i64>> {
    if let Some(id) = requested {
        return Ok(Some(get_datacenter(conn, id)?.id));
    }

    let datacenters = list_datacenters(conn)?;
    match datacenters.as_slice() {
        [only] => Ok(Some(only.id)),
        _ => Ok(None),
    }
}
