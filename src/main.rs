//! rackscan - network discovery CLI
//!
//! Sweeps inventory networks over TCP, stages what answers as discovered
//! devices and promotes them into the managed inventory.

use rackscan::{log_error, log_warn, AppContext};

#[tokio::main]
async fn main() {
    if let Err(e) = rackscan::logging::init_logging() {
        eprintln!("[WARN] Failed to initialize structured logging: {}", e);
    }

    let context = AppContext::from_env();

    let cancel = context.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log_warn!("Interrupt received, cancelling running scans");
            cancel.cancel();
        }
    });

    if let Err(e) = rackscan::app::run_with_context(std::env::args(), &context).await {
        log_error!("{:#}", e);
        std::process::exit(1);
    }
}
