//! Store seam used by the scan orchestrator
//!
//! The scanner only needs these five operations. `Database` implements them on
//! top of SQLite; tests can substitute an implementation that fails on demand.

use crate::discovery::reconcile;
use crate::error::Result;
use crate::models::DiscoveredDeviceDraft;

use super::connection::Database;
use super::models::{DiscoveredDevice, DiscoveryScan, Network};
use super::{discovered, discovery, inventory};

pub trait DiscoveryStore: Send + Sync + 'static {
    fn get_network(&self, id: i64) -> Result<Network>;

    /// Persists a new scan and returns it with its id
    fn create_discovery_scan(&self, scan: &DiscoveryScan) -> Result<DiscoveryScan>;

    fn update_discovery_scan(&self, scan: &DiscoveryScan) -> Result<()>;

    /// Insert-or-merge by IP, atomically
    fn create_or_update_discovered_device(
        &self,
        draft: &DiscoveredDeviceDraft,
    ) -> Result<DiscoveredDevice>;

    /// Returns true when a known row was flipped to offline
    fn mark_discovered_offline(&self, ip: &str, scan_id: Option<i64>) -> Result<bool>;
}

impl DiscoveryStore for Database {
    fn get_network(&self, id: i64) -> Result<Network> {
        let conn = self.lock()?;
        inventory::get_network(&conn, id)
    }

    fn create_discovery_scan(&self, scan: &DiscoveryScan) -> Result<DiscoveryScan> {
        let conn = self.lock()?;
        discovery::create_discovery_scan(&conn, scan)
    }

    fn update_discovery_scan(&self, scan: &DiscoveryScan) -> Result<()> {
        let conn = self.lock()?;
        discovery::update_discovery_scan(&conn, scan)
    }

    fn create_or_update_discovered_device(
        &self,
        draft: &DiscoveredDeviceDraft,
    ) -> Result<DiscoveredDevice> {
        let conn = self.lock()?;
        reconcile::upsert_discovered_device(&conn, draft)
    }

    fn mark_discovered_offline(&self, ip: &str, scan_id: Option<i64>) -> Result<bool> {
        let conn = self.lock()?;
        discovered::mark_discovered_offline(&conn, ip, scan_id)
    }
}
