//! Subnet parsing and host enumeration

use ipnetwork::Ipv4Network;
use std::net::Ipv4Addr;

use crate::error::{DiscoveryError, Result};

/// One entry of a rule's exclusion list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exclusion {
    Address(Ipv4Addr),
    Range(Ipv4Network),
}

impl Exclusion {
    pub fn matches(&self, ip: Ipv4Addr) -> bool {
        match self {
            Exclusion::Address(addr) => *addr == ip,
            Exclusion::Range(net) => net.contains(ip),
        }
    }
}

/// Parses a network's CIDR text. Only IPv4 is scanned.
pub fn parse_subnet(subnet: &str) -> Result<Ipv4Network> {
    let trimmed = subnet.trim();
    if trimmed.is_empty() {
        return Err(DiscoveryError::InvalidSubnet {
            subnet: subnet.to_string(),
            reason: "empty subnet".to_string(),
        });
    }

    let parsed: Ipv4Network = trimmed
        .parse()
        .map_err(|e: ipnetwork::IpNetworkError| DiscoveryError::InvalidSubnet {
            subnet: subnet.to_string(),
            reason: e.to_string(),
        })?;

    // Normalise host bits away: `10.0.0.7/24` scans `10.0.0.0/24`
    Ipv4Network::new(parsed.network(), parsed.prefix()).map_err(|e| {
        DiscoveryError::InvalidSubnet {
            subnet: subnet.to_string(),
            reason: e.to_string(),
        }
    })
}

/// Parses exclusion entries (literal addresses or CIDRs).
/// Entries that parse as neither are logged and skipped.
pub fn parse_exclusions(entries: &[String]) -> Vec<Exclusion> {
    entries
        .iter()
        .filter_map(|raw| {
            let entry = raw.trim();
            if let Ok(addr) = entry.parse::<Ipv4Addr>() {
                return Some(Exclusion::Address(addr));
            }
            match entry.parse::<Ipv4Network>() {
                Ok(net) => Some(Exclusion::Range(net)),
                Err(e) => {
                    crate::log_warn!("Ignoring unparseable exclusion '{}': {}", raw, e);
                    None
                }
            }
        })
        .collect()
}

/// Checks if an IP address is a network or broadcast address
pub fn is_special_address(ip: Ipv4Addr, subnet: &Ipv4Network) -> bool {
    ip == subnet.network() || ip == subnet.broadcast()
}

/// Lists the hosts a scan should probe.
///
/// Network and broadcast addresses are dropped for prefixes up to /30; /31 and
/// /32 keep every address. Fails with `TooManyHosts` once more than `limit`
/// candidates survive the exclusions, without materialising the rest.
pub fn candidate_hosts(
    subnet: &Ipv4Network,
    exclusions: &[Exclusion],
    limit: usize,
) -> Result<Vec<Ipv4Addr>> {
    let keep_edges = subnet.prefix() >= 31;

    let hosts: Vec<Ipv4Addr> = subnet
        .iter()
        .filter(|ip| keep_edges || !is_special_address(*ip, subnet))
        .filter(|ip| !exclusions.iter().any(|ex| ex.matches(*ip)))
        .take(limit.saturating_add(1))
        .collect();

    if hosts.len() > limit {
        return Err(DiscoveryError::TooManyHosts {
            subnet: subnet.to_string(),
            hosts: usable_host_count(subnet),
            limit,
        });
    }

    Ok(hosts)
}

/// Host count before exclusions
pub fn usable_host_count(subnet: &Ipv4Network) -> usize {
    let size = 1u64 << (32 - u32::from(subnet.prefix()));
    let usable = if subnet.prefix() >= 31 { size } else { size - 2 };
    usize::try_from(usable).unwrap_or(usize::MAX)
}

#[cfg(test)]
#[path = "subnet_tests.rs"]
mod subnet_tests;
