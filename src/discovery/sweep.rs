//! Whole-inventory operations: scan every enabled rule, purge stale rows

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;

use crate::database::{list_discovery_rules, purge_stale_discovered_devices, Database, DiscoveryScan};
use crate::error::Result;
use crate::scanner::HostProber;

use super::orchestrator::{ProgressCallback, Scanner};

/// Result of one rule in a sweep
#[derive(Debug)]
pub struct RuleRun {
    pub network_id: i64,
    pub result: Result<DiscoveryScan>,
}

impl<P: HostProber> Scanner<Database, P> {
    /// Scans every enabled rule's network, one after another.
    ///
    /// A failing network does not stop the sweep; cancellation does.
    pub async fn run_enabled_rules(
        &self,
        cancel: &CancellationToken,
        progress: ProgressCallback,
    ) -> Result<Vec<RuleRun>> {
        let rules = {
            let conn = self.store().lock()?;
            list_discovery_rules(&conn, true)?
        };

        crate::log_info!("Sweeping {} enabled discovery rules", rules.len());

        let mut runs = Vec::with_capacity(rules.len());
        for rule in rules {
            if cancel.is_cancelled() {
                crate::log_warn!("Sweep cancelled before network {}", rule.network_id);
                break;
            }

            let result = self
                .scan_network(cancel, rule.network_id, &rule, progress.clone())
                .await;
            if let Err(e) = &result {
                crate::log_warn!("Scan of network {} failed: {}", rule.network_id, e);
            }
            runs.push(RuleRun {
                network_id: rule.network_id,
                result,
            });
        }

        Ok(runs)
    }
}

/// Deletes never-promoted discovered devices not seen for `retention_days`
pub fn purge_stale(db: &Database, retention_days: i64) -> Result<usize> {
    let cutoff = Utc::now() - Duration::days(retention_days.max(0));
    let conn = db.lock()?;
    let removed = purge_stale_discovered_devices(&conn, &cutoff)?;
    crate::log_info!(
        "Purged {} discovered devices last seen before {}",
        removed,
        cutoff.to_rfc3339()
    );
    Ok(removed)
}
