//! Error types for the discovery engine

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, DiscoveryError>;

/// Errors surfaced by the store, the scanner and the promotion workflow
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Lookup by id (or ip) found nothing
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("discovered device {discovered_id} was already promoted to device {device_id}")]
    AlreadyPromoted { discovered_id: i64, device_id: i64 },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("invalid subnet '{subnet}': {reason}")]
    InvalidSubnet { subnet: String, reason: String },

    #[error("subnet {subnet} has {hosts} candidate hosts, limit is {limit}")]
    TooManyHosts {
        subnet: String,
        hosts: usize,
        limit: usize,
    },

    #[error("discovery rule for network {network_id} is disabled")]
    RuleDisabled { network_id: i64 },

    /// Completed and failed scans are immutable
    #[error("scan {scan_id} is already finalized")]
    ScanFinalized { scan_id: i64 },

    #[error("scan cancelled")]
    Cancelled,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl DiscoveryError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Errors that abort a scan before any host work starts
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::InvalidSubnet { .. } | Self::TooManyHosts { .. }
        )
    }
}
