//! Scanner module - host probing over TCP

mod prober;
mod tcp;

pub use prober::{HostProber, TcpProber};
pub use tcp::{check_port, probe_host_ports};
