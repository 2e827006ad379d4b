//! Database module
//!
//! SQLite storage for:
//! - Inventory collaborator records (datacenters, networks, devices)
//! - Discovery rules and scans
//! - Discovered devices

pub mod connection;
pub mod discovered;
pub mod discovery;
pub mod inventory;
pub mod models;
pub mod schema;
pub mod sql;
pub mod store;

pub use connection::Database;
pub use discovered::*;
pub use discovery::*;
pub use inventory::*;
pub use models::*;
pub use store::DiscoveryStore;
