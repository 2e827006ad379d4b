use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use rackscan::database::{
    create_discovery_rule, create_network, get_discovery_scan, list_discovered_devices,
};
use rackscan::{
    noop_progress, Database, DeviceStatus, DiscoveredDeviceDraft, DiscoveredDeviceFilter,
    DiscoveryError, DiscoveryRule, DiscoveryScan, HostProber, ProgressCallback, ScanStatus,
    Scanner, TcpProber,
};

/// Fixed answers per IP; unknown IPs come back offline
struct FakeProber {
    answers: HashMap<Ipv4Addr, (Vec<u16>, Option<String>)>,
}

impl FakeProber {
    fn new() -> Self {
        Self {
            answers: HashMap::new(),
        }
    }

    fn host(mut self, ip: [u8; 4], ports: &[u16], hostname: Option<&str>) -> Self {
        self.answers.insert(
            Ipv4Addr::from(ip),
            (ports.to_vec(), hostname.map(str::to_string)),
        );
        self
    }
}

#[async_trait]
impl HostProber for FakeProber {
    async fn probe(
        &self,
        ip: Ipv4Addr,
        _timeout: Duration,
        cancel: &CancellationToken,
    ) -> Option<DiscoveredDeviceDraft> {
        if cancel.is_cancelled() {
            return None;
        }
        let mut draft = DiscoveredDeviceDraft::new(ip);
        draft.status = DeviceStatus::Offline;
        if let Some((ports, hostname)) = self.answers.get(&ip) {
            draft.open_ports = ports.clone();
            draft.hostname = hostname.clone();
            if !ports.is_empty() {
                draft.status = DeviceStatus::Online;
            }
        }
        Some(draft)
    }
}

fn unique_temp_db_path(prefix: &str) -> PathBuf {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{}_{}.db", prefix, timestamp))
}

fn network(db: &Database, subnet: &str) -> i64 {
    let conn = db.lock().expect("database lock should not be poisoned");
    create_network(&conn, "lab", subnet, None)
        .expect("network should insert")
        .id
}

fn collecting_callback() -> (ProgressCallback, Arc<Mutex<Vec<DiscoveryScan>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let callback: ProgressCallback = Arc::new(move |scan: &DiscoveryScan| {
        sink.lock()
            .expect("callback lock should not be poisoned")
            .push(scan.clone());
    });
    (callback, seen)
}

#[tokio::test]
async fn slash_30_scan_records_the_one_live_host() {
    let db = Arc::new(Database::in_memory().expect("db should initialize"));
    let network_id = network(&db, "10.0.0.0/30");

    let prober = FakeProber::new().host([10, 0, 0, 2], &[22], None);
    let scanner = Scanner::new(Arc::clone(&db), Arc::new(prober));
    let (callback, seen) = collecting_callback();

    let scan = scanner
        .scan_network(
            &CancellationToken::new(),
            network_id,
            &DiscoveryRule::new(network_id),
            callback,
        )
        .await
        .expect("scan should complete");

    assert_eq!(scan.status, ScanStatus::Completed);
    assert_eq!(scan.total_hosts, 2);
    assert_eq!(scan.found_hosts, 1);

    let conn = db.lock().expect("database lock should not be poisoned");
    let devices = list_discovered_devices(&conn, &DiscoveredDeviceFilter::default())
        .expect("list should succeed");
    assert_eq!(devices.len(), 1);
    let device = &devices[0];
    assert_eq!(device.ip, "10.0.0.2");
    assert_eq!(device.status, DeviceStatus::Online);
    assert_eq!(device.open_ports, vec![22]);
    assert_eq!(device.confidence, 60);
    assert!(devices.iter().all(|d| d.ip != "10.0.0.1"));

    // Final-host snapshot plus the terminal one
    let seen = seen.lock().expect("callback lock should not be poisoned");
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].status, ScanStatus::Completed);
    assert_eq!(seen[1].progress_percent, 100.0);
}

#[tokio::test]
async fn rescans_keep_first_seen_and_peak_confidence() {
    let db_path = unique_temp_db_path("rackscan_rescan");
    let db = Arc::new(Database::new(db_path.clone()).expect("db should initialize"));
    let network_id = network(&db, "10.0.0.0/29");
    let rule = {
        let conn = db.lock().expect("database lock should not be poisoned");
        create_discovery_rule(&conn, &DiscoveryRule::new(network_id)).expect("rule should insert")
    };

    let rich = FakeProber::new().host([10, 0, 0, 3], &[22, 80, 443], Some("app-03"));
    Scanner::new(Arc::clone(&db), Arc::new(rich))
        .scan_network(&CancellationToken::new(), network_id, &rule, noop_progress())
        .await
        .expect("first scan should complete");

    let first = {
        let conn = db.lock().expect("database lock should not be poisoned");
        list_discovered_devices(&conn, &DiscoveredDeviceFilter::default()).expect("list")[0].clone()
    };
    assert_eq!(first.confidence, 90);

    let poor = FakeProber::new().host([10, 0, 0, 3], &[22], None);
    let second = Scanner::new(Arc::clone(&db), Arc::new(poor))
        .scan_network(&CancellationToken::new(), network_id, &rule, noop_progress())
        .await
        .expect("second scan should complete");

    let conn = db.lock().expect("database lock should not be poisoned");
    let devices = list_discovered_devices(&conn, &DiscoveredDeviceFilter::default()).expect("list");
    assert_eq!(devices.len(), 1);
    let after = &devices[0];
    assert_eq!(after.id, first.id);
    assert_eq!(after.first_seen, first.first_seen);
    assert!(after.last_seen >= first.last_seen);
    assert_eq!(after.confidence, 90);
    assert_eq!(after.hostname.as_deref(), Some("app-03"));
    assert_eq!(after.open_ports, vec![22]);
    assert_eq!(after.last_scan_id, Some(second.id));

    drop(conn);
    drop(db);
    let _ = std::fs::remove_file(db_path);
}

#[tokio::test]
async fn terminal_scan_rejects_further_updates() {
    let db = Arc::new(Database::in_memory().expect("db should initialize"));
    let network_id = network(&db, "10.0.0.0/30");

    let scan = Scanner::new(Arc::clone(&db), Arc::new(FakeProber::new()))
        .scan_network(
            &CancellationToken::new(),
            network_id,
            &DiscoveryRule::new(network_id),
            noop_progress(),
        )
        .await
        .expect("scan should complete");

    let conn = db.lock().expect("database lock should not be poisoned");
    let mut tampered = get_discovery_scan(&conn, scan.id).expect("scan should exist");
    tampered.found_hosts = 99;
    let err = rackscan::database::update_discovery_scan(&conn, &tampered).unwrap_err();
    assert!(matches!(err, DiscoveryError::ScanFinalized { .. }));
}

#[tokio::test]
async fn too_many_hosts_is_a_failed_scan() {
    let db = Arc::new(Database::in_memory().expect("db should initialize"));
    let network_id = network(&db, "10.0.0.0/8");
    let (callback, seen) = collecting_callback();

    let err = Scanner::new(Arc::clone(&db), Arc::new(FakeProber::new()))
        .scan_network(
            &CancellationToken::new(),
            network_id,
            &DiscoveryRule::new(network_id),
            callback,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, DiscoveryError::TooManyHosts { .. }));

    let seen = seen.lock().expect("callback lock should not be poisoned");
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].status, ScanStatus::Failed);
    assert_eq!(seen[0].scanned_hosts, 0);
}

#[tokio::test]
async fn excluded_addresses_are_never_probed() {
    let db = Arc::new(Database::in_memory().expect("db should initialize"));
    let network_id = network(&db, "10.0.0.0/29");

    let prober = FakeProber::new()
        .host([10, 0, 0, 1], &[80], None)
        .host([10, 0, 0, 5], &[80], None);
    let mut rule = DiscoveryRule::new(network_id);
    rule.exclude_ips = vec!["10.0.0.1".to_string(), "10.0.0.4/30".to_string()];

    let scan = Scanner::new(Arc::clone(&db), Arc::new(prober))
        .scan_network(&CancellationToken::new(), network_id, &rule, noop_progress())
        .await
        .expect("scan should complete");

    // 6 usable hosts minus .1 and .4-.6
    assert_eq!(scan.total_hosts, 2);
    assert_eq!(scan.found_hosts, 0);
}

#[tokio::test]
async fn tcp_prober_against_a_real_listener() {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let port = listener.local_addr().expect("local addr").port();

    let db = Arc::new(Database::in_memory().expect("db should initialize"));
    let network_id = network(&db, "127.0.0.1/32");
    let prober = TcpProber::new(vec![port], 4).with_reverse_dns(false);

    let mut rule = DiscoveryRule::new(network_id);
    rule.timeout_seconds = 1;
    let scan = Scanner::new(Arc::clone(&db), Arc::new(prober))
        .scan_network(&CancellationToken::new(), network_id, &rule, noop_progress())
        .await
        .expect("scan should complete");

    assert_eq!(scan.total_hosts, 1);
    assert_eq!(scan.found_hosts, 1);

    let conn = db.lock().expect("database lock should not be poisoned");
    let devices = list_discovered_devices(&conn, &DiscoveredDeviceFilter::default()).expect("list");
    assert_eq!(devices[0].ip, "127.0.0.1");
    assert_eq!(devices[0].open_ports, vec![port]);
    assert_eq!(devices[0].confidence, 60);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn overlapping_scans_share_one_row_per_ip() {
    let db = Arc::new(Database::in_memory().expect("db should initialize"));
    let wide = network(&db, "10.0.0.0/29");
    let narrow = network(&db, "10.0.0.0/30");

    let rich = FakeProber::new()
        .host([10, 0, 0, 2], &[22, 80, 443], Some("app-02"))
        .host([10, 0, 0, 5], &[22], None);
    let poor = FakeProber::new().host([10, 0, 0, 2], &[22], None);

    let wide_scanner = Scanner::new(Arc::clone(&db), Arc::new(rich));
    let narrow_scanner = Scanner::new(Arc::clone(&db), Arc::new(poor));
    let cancel = CancellationToken::new();
    let wide_rule = DiscoveryRule::new(wide);
    let narrow_rule = DiscoveryRule::new(narrow);

    let (wide_scan, narrow_scan) = tokio::join!(
        wide_scanner.scan_network(&cancel, wide, &wide_rule, noop_progress()),
        narrow_scanner.scan_network(&cancel, narrow, &narrow_rule, noop_progress()),
    );
    let wide_scan = wide_scan.expect("wide scan should complete");
    let narrow_scan = narrow_scan.expect("narrow scan should complete");
    assert_eq!(wide_scan.found_hosts, 2);
    assert_eq!(narrow_scan.found_hosts, 1);

    let conn = db.lock().expect("database lock should not be poisoned");
    let devices = list_discovered_devices(&conn, &DiscoveredDeviceFilter::default()).expect("list");
    let mut ips: Vec<&str> = devices.iter().map(|d| d.ip.as_str()).collect();
    ips.sort_unstable();
    assert_eq!(ips, vec!["10.0.0.2", "10.0.0.5"]);

    let shared = devices
        .iter()
        .find(|d| d.ip == "10.0.0.2")
        .expect("shared host should be recorded");
    assert_eq!(shared.confidence, 90);
    assert_eq!(shared.hostname.as_deref(), Some("app-02"));
    assert!([Some(wide_scan.id), Some(narrow_scan.id)].contains(&shared.last_scan_id));
}
