//! Network module - subnet utilities and DNS resolution

mod dns;
mod subnet;

pub use dns::{resolve_hostname, reverse_lookup};
pub use subnet::{
    candidate_hosts, is_special_address, parse_exclusions, parse_subnet, usable_host_count,
    Exclusion,
};
