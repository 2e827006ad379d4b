//! TCP port probing

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

/// Connect-and-close check of a single port
pub async fn check_port(ip: Ipv4Addr, port: u16, timeout: Duration) -> bool {
    let addr = SocketAddr::new(IpAddr::V4(ip), port);
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect(addr)).await,
        Ok(Ok(_))
    )
}

/// Probes one host's ports with at most `max_concurrent` dials in flight.
///
/// Open ports come back in the order the dials succeeded. Returns `None` if
/// `cancel` fired; dials already in flight are allowed to finish first.
pub async fn probe_host_ports(
    ip: Ipv4Addr,
    ports: &[u16],
    timeout: Duration,
    max_concurrent: usize,
    cancel: &CancellationToken,
) -> Option<Vec<u16>> {
    let semaphore = Arc::new(Semaphore::new(max_concurrent.max(1)));
    let open_ports: Arc<Mutex<Vec<u16>>> = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::with_capacity(ports.len());

    for &port in ports {
        if cancel.is_cancelled() {
            break;
        }

        let semaphore = Arc::clone(&semaphore);
        let open_ports = Arc::clone(&open_ports);
        let cancel = cancel.clone();

        let handle = tokio::spawn(async move {
            let _permit = match semaphore.acquire().await {
                Ok(permit) => permit,
                Err(e) => {
                    crate::log_warn!("Port semaphore acquire failed for {}:{}: {}", ip, port, e);
                    return;
                }
            };

            if cancel.is_cancelled() {
                return;
            }

            if check_port(ip, port, timeout).await {
                open_ports.lock().await.push(port);
            }
        });

        handles.push(handle);
    }

    for handle in handles {
        if let Err(e) = handle.await {
            crate::log_warn!("TCP probe task failed for {}: {}", ip, e);
        }
    }

    if cancel.is_cancelled() {
        return None;
    }

    let ports = open_ports.lock().await.clone();
    Some(ports)
}
