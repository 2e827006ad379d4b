use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppContext;
use crate::database::{
    get_discovery_rule_for_network, list_discovered_devices, Database, DiscoveredDeviceFilter,
    DiscoveryRule, DiscoveryScan,
};
use crate::discovery::{purge_stale, PromoteRequest, PromotionService, ProgressCallback, Scanner};
use crate::scanner::TcpProber;

#[derive(Debug, Serialize)]
struct RuleRunReport {
    network_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    scan: Option<DiscoveryScan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct PurgeReport {
    retention_days: i64,
    removed: usize,
}

fn open_database(context: &AppContext) -> Result<Database> {
    Database::new(context.db_path().clone()).with_context(|| {
        format!(
            "Failed to open database at {}",
            context.db_path().display()
        )
    })
}

fn build_scanner(context: &AppContext) -> Result<Scanner<Database, TcpProber>> {
    let db = open_database(context)?;
    Ok(Scanner::new(Arc::new(db), Arc::new(TcpProber::from_env())))
}

fn emit_json<T: Serialize>(context: &AppContext, value: &T, what: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize {}", what))?;
    context.emit(&json);
    Ok(())
}

fn log_progress() -> ProgressCallback {
    Arc::new(|scan: &DiscoveryScan| {
        crate::log_info!(
            "Scan {} [{}]: {}/{} hosts ({:.0}%), {} found",
            scan.id,
            scan.status,
            scan.scanned_hosts,
            scan.total_hosts,
            scan.progress_percent,
            scan.found_hosts
        );
    })
}

pub(crate) async fn handle_scan(context: &AppContext, network_id: i64) -> Result<()> {
    crate::log_info!("rackscan v{} - scanning network {}", env!("CARGO_PKG_VERSION"), network_id);

    let scanner = build_scanner(context)?;
    let rule = {
        let conn = scanner.store().lock()?;
        get_discovery_rule_for_network(&conn, network_id)?
    };
    let rule = rule.unwrap_or_else(|| {
        crate::log_info!("No discovery rule for network {}, using defaults", network_id);
        DiscoveryRule::new(network_id)
    });

    let scan = scanner
        .scan_network(&context.cancellation_token(), network_id, &rule, log_progress())
        .await
        .with_context(|| format!("Scan of network {} failed", network_id))?;

    emit_json(context, &scan, "scan result")
}

pub(crate) async fn handle_scan_all(context: &AppContext) -> Result<()> {
    let scanner = build_scanner(context)?;
    let runs = scanner
        .run_enabled_rules(&context.cancellation_token(), log_progress())
        .await?;

    let reports: Vec<RuleRunReport> = runs
        .into_iter()
        .map(|run| match run.result {
            Ok(scan) => RuleRunReport {
                network_id: run.network_id,
                scan: Some(scan),
                error: None,
            },
            Err(e) => RuleRunReport {
                network_id: run.network_id,
                scan: None,
                error: Some(e.to_string()),
            },
        })
        .collect();

    emit_json(context, &reports, "sweep results")
}

pub(crate) fn handle_discovered(context: &AppContext, network_id: Option<i64>) -> Result<()> {
    let db = open_database(context)?;
    let devices = {
        let conn = db.lock()?;
        list_discovered_devices(
            &conn,
            &DiscoveredDeviceFilter {
                network_id,
                ..Default::default()
            },
        )?
    };
    emit_json(context, &devices, "discovered devices")
}

pub(crate) fn handle_promote(
    context: &AppContext,
    discovered_id: i64,
    name: String,
    datacenter_id: Option<i64>,
) -> Result<()> {
    let db = open_database(context)?;
    let request = PromoteRequest {
        datacenter_id,
        ..PromoteRequest::named(name)
    };
    let device = PromotionService::new(db)
        .promote(discovered_id, &request)
        .with_context(|| format!("Failed to promote discovered device {}", discovered_id))?;
    emit_json(context, &device, "promoted device")
}

pub(crate) fn handle_purge(context: &AppContext, days: Option<i64>) -> Result<()> {
    let retention_days = days.unwrap_or_else(crate::config::retention_days);
    let db = open_database(context)?;
    let removed = purge_stale(&db, retention_days)?;
    emit_json(
        context,
        &PurgeReport {
            retention_days,
            removed,
        },
        "purge report",
    )
}
