//! Sync engine: reachability tracking, sync passes and status broadcasting.

mod engine;
mod reachability;
mod status;

pub use engine::{SyncEngine, SyncOutcome, SyncReport};
pub use reachability::ReachabilityMonitor;
pub use status::{StatusChannel, Subscription, SyncStatusSnapshot};
