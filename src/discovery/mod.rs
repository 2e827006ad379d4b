//! Discovery engine
//!
//! - `orchestrator`: subnet sweeps with bounded fan-out and progress snapshots
//! - `confidence`: evidence to score
//! - `reconcile`: one row per IP, merged across observations
//! - `promotion`: discovered device to managed device
//! - `sweep`: all enabled rules, retention purge

pub mod confidence;
pub mod orchestrator;
pub mod promotion;
pub mod reconcile;
pub mod sweep;

pub use confidence::score;
pub use orchestrator::{noop_progress, ProgressCallback, Scanner, CANCELLED_MESSAGE};
pub use promotion::{
    BulkPromoteOutcome, PromoteRequest, PromotionError, PromotionService,
    DISCOVERED_ADDRESS_LABEL,
};
pub use reconcile::{merge_observation, upsert_discovered_device};
pub use sweep::{purge_stale, RuleRun};
