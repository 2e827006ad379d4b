//! DNS Reverse Lookup for hostname resolution
//!
//! Resolves IP addresses to hostnames using reverse DNS queries.

use dns_lookup::lookup_addr;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

/// Perform reverse DNS lookup for a single IP address (blocking)
pub fn reverse_lookup(ip: Ipv4Addr) -> Option<String> {
    let ip_addr = IpAddr::V4(ip);
    match lookup_addr(&ip_addr) {
        Ok(hostname) => {
            // Don't return if hostname is just the IP address
            if hostname != ip.to_string() && !hostname.trim().is_empty() {
                Some(hostname)
            } else {
                None
            }
        }
        Err(_) => None,
    }
}

/// Reverse lookup on a blocking thread, bounded by `timeout`
pub async fn resolve_hostname(ip: Ipv4Addr, timeout: Duration) -> Option<String> {
    let lookup_result =
        tokio::time::timeout(timeout, tokio::task::spawn_blocking(move || reverse_lookup(ip)))
            .await;

    match lookup_result {
        Ok(Ok(hostname)) => hostname,
        Ok(Err(e)) => {
            crate::log_warn!("DNS worker join failed for {}: {}", ip, e);
            None
        }
        Err(_) => {
            crate::log_debug!("DNS lookup for {} timed out after {:?}", ip, timeout);
            None
        }
    }
}
