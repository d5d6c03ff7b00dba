//! Sync status broadcasting.
//!
//! UI surfaces subscribe to a [`StatusChannel`] to render connectivity and
//! pending-work indicators. Listeners are plain callbacks; dropping the
//! returned [`Subscription`] detaches the listener.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use chrono::{DateTime, Utc};

/// Point-in-time view of the sync engine's state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatusSnapshot {
    /// Both the network signal and the service probe are up.
    pub online: bool,
    /// A sync pass is currently running.
    pub syncing: bool,
    pub pending_tickets: u64,
    pub pending_comments: u64,
    /// Completion time of the last finished sync pass, if any.
    pub last_sync: Option<DateTime<Utc>>,
    /// Most recent per-record failures, newest last.
    pub last_errors: Vec<String>,
}

type Listener = Box<dyn Fn(&SyncStatusSnapshot) + Send + Sync>;

struct ChannelInner {
    listeners: Mutex<Vec<(u64, Listener)>>,
    next_id: AtomicU64,
}

/// Broadcast channel for [`SyncStatusSnapshot`] updates.
#[derive(Clone)]
pub struct StatusChannel {
    inner: Arc<ChannelInner>,
}

impl StatusChannel {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ChannelInner {
                listeners: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    /// Attach a listener. It stays attached until the returned subscription
    /// is dropped.
    #[must_use]
    pub fn subscribe(
        &self,
        listener: impl Fn(&SyncStatusSnapshot) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, Box::new(listener)));

        Subscription {
            id,
            channel: Arc::downgrade(&self.inner),
        }
    }

    /// Deliver a snapshot to every attached listener.
    pub fn publish(&self, snapshot: &SyncStatusSnapshot) {
        let listeners = self
            .inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        for (_, listener) in listeners.iter() {
            listener(snapshot);
        }
    }

    /// Number of attached listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Default for StatusChannel {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle that keeps a status listener attached.
pub struct Subscription {
    id: u64,
    channel: Weak<ChannelInner>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(inner) = self.channel.upgrade() {
            inner
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .retain(|(id, _)| *id != self.id);
        }
    }
}
