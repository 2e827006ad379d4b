//! Tests for subnet parsing and host enumeration

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::error::DiscoveryError;
    use ipnetwork::Ipv4Network;
    use std::net::Ipv4Addr;

    fn hosts(cidr: &str) -> Vec<Ipv4Addr> {
        let subnet = parse_subnet(cidr).unwrap();
        candidate_hosts(&subnet, &[], 1 << 20).unwrap()
    }

    #[test]
    fn test_is_special_address_network() {
        let subnet: Ipv4Network = "192.168.1.0/24".parse().unwrap();
        assert!(is_special_address("192.168.1.0".parse().unwrap(), &subnet));
    }

    #[test]
    fn test_is_special_address_broadcast() {
        let subnet: Ipv4Network = "192.168.1.0/24".parse().unwrap();
        assert!(is_special_address("192.168.1.255".parse().unwrap(), &subnet));
    }

    #[test]
    fn test_is_special_address_regular_ip() {
        let subnet: Ipv4Network = "192.168.1.0/24".parse().unwrap();
        assert!(!is_special_address("192.168.1.100".parse().unwrap(), &subnet));
    }

    #[test]
    fn test_class_c_drops_network_and_broadcast() {
        let ips = hosts("192.168.1.0/24");
        assert_eq!(ips.len(), 254);
        assert!(!ips.contains(&"192.168.1.0".parse().unwrap()));
        assert!(!ips.contains(&"192.168.1.255".parse().unwrap()));
        assert!(ips.contains(&"192.168.1.1".parse().unwrap()));
        assert!(ips.contains(&"192.168.1.254".parse().unwrap()));
    }

    #[test]
    fn test_small_prefixes() {
        assert_eq!(
            hosts("10.0.0.0/30"),
            vec![Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2)]
        );
        assert_eq!(
            hosts("10.0.0.0/31"),
            vec![Ipv4Addr::new(10, 0, 0, 0), Ipv4Addr::new(10, 0, 0, 1)]
        );
        assert_eq!(hosts("10.0.0.9/32"), vec![Ipv4Addr::new(10, 0, 0, 9)]);
    }

    #[test]
    fn test_host_bits_are_normalised() {
        let subnet = parse_subnet("10.0.0.77/24").unwrap();
        assert_eq!(subnet.network(), Ipv4Addr::new(10, 0, 0, 0));
        assert_eq!(subnet.prefix(), 24);
    }

    #[test]
    fn test_invalid_subnets_are_rejected() {
        for bad in ["", "not-a-subnet", "10.0.0.0/33", "fd00::/64"] {
            let err = parse_subnet(bad).unwrap_err();
            assert!(
                matches!(err, DiscoveryError::InvalidSubnet { .. }),
                "{bad:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_exclusions_literal_and_cidr() {
        let subnet = parse_subnet("10.1.0.0/24").unwrap();
        let exclusions = parse_exclusions(&[
            "10.1.0.1".to_string(),
            "10.1.0.128/25".to_string(),
            "garbage".to_string(),
        ]);
        assert_eq!(exclusions.len(), 2);

        let ips = candidate_hosts(&subnet, &exclusions, 1024).unwrap();
        assert_eq!(ips.len(), 126);
        assert_eq!(ips.first(), Some(&Ipv4Addr::new(10, 1, 0, 2)));
        assert_eq!(ips.last(), Some(&Ipv4Addr::new(10, 1, 0, 127)));
    }

    #[test]
    fn test_host_cap_is_enforced() {
        let subnet = parse_subnet("10.0.0.0/16").unwrap();
        let err = candidate_hosts(&subnet, &[], 1000).unwrap_err();
        match err {
            DiscoveryError::TooManyHosts { hosts, limit, .. } => {
                assert_eq!(hosts, 65_534);
                assert_eq!(limit, 1000);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        // Exactly at the cap is fine
        let subnet = parse_subnet("10.0.0.0/30").unwrap();
        assert_eq!(candidate_hosts(&subnet, &[], 2).unwrap().len(), 2);
    }

    #[test]
    fn test_usable_host_count() {
        assert_eq!(usable_host_count(&parse_subnet("10.0.0.0/24").unwrap()), 254);
        assert_eq!(usable_host_count(&parse_subnet("10.0.0.0/31").unwrap()), 2);
        assert_eq!(usable_host_count(&parse_subnet("0.0.0.0/0").unwrap()), 4_294_967_294);
    }
}
