//! deskline-core - Core library for Deskline
//!
//! This crate contains the shared models, the durable local store, and the
//! offline-first synchronization engine used by the Deskline client shells.

pub mod api;
pub mod db;
pub mod error;
pub mod models;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support;

pub use db::TicketStore;
pub use error::{Error, Result};
pub use models::{CommentRecord, TicketRecord};
pub use sync::{SyncEngine, SyncOutcome};
