use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use rackscan::database::{create_network, insert_discovered_device, DiscoveredDevice};
use rackscan::discovery::upsert_discovered_device;
use rackscan::{
    execute_command_with_context, AppContext, CliCommand, Database, DeviceStatus,
    DiscoveredDeviceDraft, OutputHook,
};

fn make_test_context(db_path: PathBuf) -> (AppContext, Arc<Mutex<Vec<String>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&lines);
    let output_hook: OutputHook = Arc::new(move |line| {
        sink.lock()
            .expect("output lock should not be poisoned")
            .push(line.to_string());
    });

    let context = AppContext::from_env()
        .with_db_path(db_path)
        .with_output_hook(output_hook);
    (context, lines)
}

fn unique_temp_db_path(prefix: &str) -> PathBuf {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{}_{}.db", prefix, timestamp))
}

fn output_of(lines: &Arc<Mutex<Vec<String>>>) -> String {
    lines
        .lock()
        .expect("output lock should not be poisoned")
        .join("\n")
}

#[tokio::test]
async fn help_command_writes_usage_to_output_hook() {
    let (context, lines) = make_test_context(unique_temp_db_path("rackscan_help"));

    execute_command_with_context(CliCommand::Help, &context)
        .await
        .expect("help command should succeed");

    let output = output_of(&lines);
    assert!(output.contains("Usage:"));
    assert!(output.contains("rackscan promote <DISCOVERED_ID>"));
}

#[tokio::test]
async fn discovered_then_promote_through_dispatch() {
    let db_path = unique_temp_db_path("rackscan_dispatch_promote");
    let discovered_id = {
        let db = Database::new(db_path.clone()).expect("db should initialize");
        let conn = db.lock().expect("database lock should not be poisoned");
        let net = create_network(&conn, "lab", "10.30.0.0/24", None).expect("network");
        let mut draft = DiscoveredDeviceDraft::new(Ipv4Addr::new(10, 30, 0, 4));
        draft.status = DeviceStatus::Online;
        draft.open_ports = vec![443];
        draft.confidence = 60;
        draft.network_id = Some(net.id);
        upsert_discovered_device(&conn, &draft).expect("upsert").id
    };

    let (context, lines) = make_test_context(db_path.clone());
    execute_command_with_context(CliCommand::Discovered { network_id: None }, &context)
        .await
        .expect("discovered should succeed");
    let listed: serde_json::Value =
        serde_json::from_str(&output_of(&lines)).expect("discovered output should be JSON");
    assert_eq!(listed.as_array().map(|a| a.len()), Some(1));
    assert_eq!(listed[0]["ip"], "10.30.0.4");
    assert_eq!(listed[0]["status"], "online");

    lines.lock().expect("output lock").clear();
    execute_command_with_context(
        CliCommand::Promote {
            discovered_id,
            name: "api-04".to_string(),
            datacenter_id: None,
        },
        &context,
    )
    .await
    .expect("promote should succeed");

    let device: serde_json::Value =
        serde_json::from_str(&output_of(&lines)).expect("promote output should be JSON");
    assert_eq!(device["name"], "api-04");
    assert_eq!(device["addresses"][0]["label"], "discovered");

    let err = execute_command_with_context(
        CliCommand::Promote {
            discovered_id,
            name: "api-04-again".to_string(),
            datacenter_id: None,
        },
        &context,
    )
    .await
    .expect_err("second promote should fail");
    assert!(format!("{:#}", err).contains("already promoted"));

    let _ = std::fs::remove_file(db_path);
}

#[tokio::test]
async fn purge_reports_removed_rows() {
    let db_path = unique_temp_db_path("rackscan_dispatch_purge");
    {
        let db = Database::new(db_path.clone()).expect("db should initialize");
        let conn = db.lock().expect("database lock should not be poisoned");
        let old = chrono::Utc::now() - chrono::Duration::days(90);
        let row = DiscoveredDevice {
            id: 0,
            ip: "10.30.0.9".to_string(),
            mac_address: None,
            hostname: None,
            network_id: None,
            status: DeviceStatus::Offline,
            confidence: 30,
            os_guess: None,
            os_family: None,
            open_ports: Vec::new(),
            services: Vec::new(),
            first_seen: old,
            last_seen: old,
            last_scan_id: None,
            promoted_to_device_id: None,
            promoted_at: None,
        };
        insert_discovered_device(&conn, &row).expect("insert");
    }

    let (context, lines) = make_test_context(db_path.clone());
    execute_command_with_context(CliCommand::Purge { days: Some(30) }, &context)
        .await
        .expect("purge should succeed");

    let report: serde_json::Value =
        serde_json::from_str(&output_of(&lines)).expect("purge output should be JSON");
    assert_eq!(report["removed"], 1);
    assert_eq!(report["retention_days"], 30);

    let _ = std::fs::remove_file(db_path);
}

#[tokio::test]
async fn scan_of_unknown_network_fails() {
    let db_path = unique_temp_db_path("rackscan_dispatch_scan");
    let (context, _lines) = make_test_context(db_path.clone());

    let err = execute_command_with_context(CliCommand::Scan { network_id: 42 }, &context)
        .await
        .expect_err("scan of a missing network should fail");
    assert!(format!("{:#}", err).contains("network not found: 42"));

    let _ = std::fs::remove_file(db_path);
}
