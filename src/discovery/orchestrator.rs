//! Scan orchestration
//!
//! Enumerates a network's hosts, probes them under a bounded worker pool,
//! scores and reconciles what answered, and keeps one scan record up to date
//! for progress reporting.
//!
//! Two limiters apply: the host semaphore here (permit taken before each task
//! is spawned) and the per-host port semaphore inside the prober.
//!
//! Store calls are synchronous and run on the blocking pool. Progress
//! snapshots are persisted and delivered one at a time in increasing
//! `scanned_hosts` order; a snapshot overtaken by a newer one is dropped.

use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config;
use crate::database::{DiscoveryRule, DiscoveryScan, DiscoveryStore, ScanStatus};
use crate::error::{DiscoveryError, Result};
use crate::network::{candidate_hosts, parse_exclusions, parse_subnet};
use crate::scanner::{HostProber, TcpProber};

use super::confidence;

/// Receives scan snapshots; never the live record
pub type ProgressCallback = Arc<dyn Fn(&DiscoveryScan) + Send + Sync>;

/// Callback that ignores every snapshot
pub fn noop_progress() -> ProgressCallback {
    Arc::new(|_: &DiscoveryScan| {})
}

/// Error message stored on scans stopped through the cancellation token
pub const CANCELLED_MESSAGE: &str = "scan cancelled";

/// Runs discovery scans against a store with a prober
pub struct Scanner<S, P = TcpProber> {
    store: Arc<S>,
    prober: Arc<P>,
    progress_interval: usize,
}

impl<S, P> Clone for Scanner<S, P> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            prober: Arc::clone(&self.prober),
            progress_interval: self.progress_interval,
        }
    }
}

/// Runs a synchronous store call on the blocking pool
async fn blocking<S, T, F>(store: &Arc<S>, op: F) -> Result<T>
where
    S: DiscoveryStore,
    T: Send + 'static,
    F: FnOnce(&S) -> Result<T> + Send + 'static,
{
    let store = Arc::clone(store);
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| DiscoveryError::Other(anyhow::anyhow!("store task failed: {}", e)))?
}

/// Everything a host task needs, cloned per task
struct HostTask<S, P> {
    store: Arc<S>,
    prober: Arc<P>,
    state: Arc<Mutex<DiscoveryScan>>,
    /// Highest `scanned_hosts` persisted and handed to the callback so far
    delivered: Arc<Mutex<i64>>,
    progress: ProgressCallback,
    cancel: CancellationToken,
    scan_id: i64,
    network_id: i64,
    timeout: Duration,
    interval: usize,
}

impl<S: DiscoveryStore, P: HostProber> Scanner<S, P> {
    pub fn new(store: Arc<S>, prober: Arc<P>) -> Self {
        Self {
            store,
            prober,
            progress_interval: config::progress_interval(),
        }
    }

    /// Notify every `interval` hosts instead of the configured default
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Scans one network under `rule` and returns the terminal scan record.
    ///
    /// Configuration problems (unknown network, bad subnet, too many hosts)
    /// fail the scan before any host is probed and are returned as errors.
    /// A cancelled scan ends `failed` and returns `DiscoveryError::Cancelled`.
    pub async fn scan_network(
        &self,
        cancel: &CancellationToken,
        network_id: i64,
        rule: &DiscoveryRule,
        progress: ProgressCallback,
    ) -> Result<DiscoveryScan> {
        if !rule.enabled {
            return Err(DiscoveryError::RuleDisabled { network_id });
        }

        let span = tracing::info_span!(
            "discovery_scan",
            network_id,
            scan_id = tracing::field::Empty
        );
        self.run_scan(cancel, network_id, rule, progress)
            .instrument(span)
            .await
    }

    async fn run_scan(
        &self,
        cancel: &CancellationToken,
        network_id: i64,
        rule: &DiscoveryRule,
        progress: ProgressCallback,
    ) -> Result<DiscoveryScan> {
        let start = DiscoveryScan::start(network_id, rule.scan_type);
        let mut scan =
            blocking(&self.store, move |store| store.create_discovery_scan(&start)).await?;
        tracing::Span::current().record("scan_id", scan.id);

        let hosts = match self.plan_hosts(network_id, rule).await {
            Ok(hosts) => hosts,
            Err(e) => {
                if e.is_configuration() {
                    crate::log_error!("Scan {} misconfigured: {}", scan.id, e);
                } else {
                    crate::log_error!("Scan {} aborted: {}", scan.id, e);
                }
                scan.finish(ScanStatus::Failed, Some(e.to_string()));
                self.persist(&scan).await;
                progress(&scan);
                return Err(e);
            }
        };

        scan.total_hosts = hosts.len() as i64;
        self.persist(&scan).await;
        crate::log_info!(
            "Scan {} started: {} hosts, {} at a time, {:?} timeout",
            scan.id,
            hosts.len(),
            rule.host_concurrency(),
            rule.probe_timeout()
        );

        let scan_id = scan.id;
        let state = Arc::new(Mutex::new(scan));
        let delivered = Arc::new(Mutex::new(0));
        let semaphore = Arc::new(Semaphore::new(rule.host_concurrency()));
        let mut handles = Vec::with_capacity(hosts.len());

        for ip in hosts {
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(e) => {
                        crate::log_warn!("Host semaphore closed at {}: {}", ip, e);
                        break;
                    }
                },
            };

            let task = HostTask {
                store: Arc::clone(&self.store),
                prober: Arc::clone(&self.prober),
                state: Arc::clone(&state),
                delivered: Arc::clone(&delivered),
                progress: Arc::clone(&progress),
                cancel: cancel.clone(),
                scan_id,
                network_id,
                timeout: rule.probe_timeout(),
                interval: self.progress_interval.max(1),
            };

            let handle = tokio::spawn(
                async move {
                    let _permit = permit;
                    task.run(ip).await;
                }
                .in_current_span(),
            );
            handles.push(handle);
        }

        for handle in handles {
            if let Err(e) = handle.await {
                crate::log_warn!("Host task failed: {}", e);
            }
        }

        let mut scan = state.lock().await.clone();

        if cancel.is_cancelled() && scan.scanned_hosts < scan.total_hosts {
            scan.finish(ScanStatus::Failed, Some(CANCELLED_MESSAGE.to_string()));
            self.persist(&scan).await;
            progress(&scan);
            crate::log_warn!(
                "Scan {} cancelled after {}/{} hosts",
                scan.id,
                scan.scanned_hosts,
                scan.total_hosts
            );
            return Err(DiscoveryError::Cancelled);
        }

        scan.finish(ScanStatus::Completed, None);
        self.persist(&scan).await;
        progress(&scan);

        crate::log_info!(
            "Scan {} complete: {} of {} hosts online in {:.1}s",
            scan.id,
            scan.found_hosts,
            scan.total_hosts,
            scan.duration_seconds.unwrap_or_default()
        );

        Ok(scan)
    }

    /// Network lookup, subnet parsing, exclusions and the host cap
    async fn plan_hosts(&self, network_id: i64, rule: &DiscoveryRule) -> Result<Vec<Ipv4Addr>> {
        let network = blocking(&self.store, move |store| store.get_network(network_id)).await?;
        let subnet = parse_subnet(&network.subnet)?;
        let exclusions = parse_exclusions(&rule.exclude_ips);
        candidate_hosts(&subnet, &exclusions, config::max_scan_hosts())
    }

    async fn persist(&self, scan: &DiscoveryScan) {
        let snapshot = scan.clone();
        let result =
            blocking(&self.store, move |store| store.update_discovery_scan(&snapshot)).await;
        if let Err(e) = result {
            crate::log_error!("Failed to persist scan {}: {}", scan.id, e);
        }
    }
}

impl<S: DiscoveryStore, P: HostProber> HostTask<S, P> {
    async fn run(self, ip: Ipv4Addr) {
        let Some(mut draft) = self.prober.probe(ip, self.timeout, &self.cancel).await else {
            crate::log_debug!("Probe of {} abandoned", ip);
            return;
        };

        draft.network_id = Some(self.network_id);
        draft.scan_id = Some(self.scan_id);

        let found = if draft.is_online() {
            draft.confidence = confidence::score(&draft);
            let result = blocking(&self.store, move |store| {
                store.create_or_update_discovered_device(&draft)
            })
            .await;
            match result {
                Ok(device) => {
                    crate::log_debug!(
                        "Host {} online, confidence {}",
                        device.ip,
                        device.confidence
                    );
                    true
                }
                Err(e) => {
                    crate::log_warn!("Failed to record discovered host {}: {}", ip, e);
                    false
                }
            }
        } else {
            let scan_id = self.scan_id;
            let result = blocking(&self.store, move |store| {
                store.mark_discovered_offline(&ip.to_string(), Some(scan_id))
            })
            .await;
            if let Err(e) = result {
                crate::log_warn!("Failed to mark {} offline: {}", ip, e);
            }
            false
        };

        // Counters and the notify decision stay under the state lock
        let snapshot = {
            let mut scan = self.state.lock().await;
            scan.record_host(found);
            let done = scan.scanned_hosts as usize;
            let notify = done % self.interval == 0 || scan.scanned_hosts == scan.total_hosts;
            notify.then(|| scan.clone())
        };

        if let Some(snapshot) = snapshot {
            self.deliver(snapshot).await;
        }
    }

    /// Persists and reports `snapshot` unless a newer one already went out
    async fn deliver(&self, snapshot: DiscoveryScan) {
        let mut delivered = self.delivered.lock().await;
        if snapshot.scanned_hosts <= *delivered {
            crate::log_debug!(
                "Dropping stale progress {} of scan {}",
                snapshot.scanned_hosts,
                snapshot.id
            );
            return;
        }
        *delivered = snapshot.scanned_hosts;

        let stored = snapshot.clone();
        let result = blocking(&self.store, move |store| store.update_discovery_scan(&stored)).await;
        if let Err(e) = result {
            crate::log_warn!("Failed to persist progress of scan {}: {}", snapshot.id, e);
        }
        (self.progress)(&snapshot);
    }
}
