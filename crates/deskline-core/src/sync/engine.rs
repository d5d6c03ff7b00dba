//! Sync orchestration.
//!
//! A sync pass pushes dirty records to the service in insertion order,
//! tickets before comments, then refreshes the local store from the server.
//! Passes are single-flight: concurrent triggers piggyback on the pass that
//! is already running instead of starting another one.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::{RemoteTicket, TicketApi};
use crate::db::TicketStore;
use crate::error::Result;

use super::reachability::ReachabilityMonitor;
use super::status::{StatusChannel, SyncStatusSnapshot};

/// How many per-record failures the engine remembers for status reporting.
const ERROR_RING_CAPACITY: usize = 5;

/// Page size used for the post-push server refresh.
const PULL_PAGE_SIZE: u32 = 50;

/// What a completed sync pass accomplished.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub tickets_pushed: usize,
    pub comments_pushed: usize,
    /// Server records merged into the local store by the pull refresh.
    pub tickets_pulled: usize,
    /// Comments skipped because their ticket has no remote id yet.
    pub comments_deferred: usize,
    /// Per-record failures; each failed record stays pending for the next
    /// pass.
    pub failures: Vec<String>,
}

/// Result of a sync trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The engine was offline; no network traffic was attempted.
    SkippedOffline,
    /// The pass ran to completion (possibly with per-record failures).
    Completed(SyncReport),
    /// The pass could not run at all, e.g. the local store failed.
    Aborted(String),
}

type SharedPass = Shared<BoxFuture<'static, SyncOutcome>>;

struct EngineInner {
    store: TicketStore,
    api: Arc<dyn TicketApi>,
    monitor: Arc<ReachabilityMonitor>,
    status: StatusChannel,
    in_flight: Mutex<Option<SharedPass>>,
    syncing: AtomicBool,
    last_sync: Mutex<Option<DateTime<Utc>>>,
    recent_errors: Mutex<VecDeque<String>>,
}

/// Coordinates sync passes between the local store and the remote service.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    /// Create an engine over the given store, API client and monitor.
    #[must_use]
    pub fn new(
        store: TicketStore,
        api: Arc<dyn TicketApi>,
        monitor: Arc<ReachabilityMonitor>,
    ) -> Self {
        Self {
            inner: Arc::new(EngineInner {
                store,
                api,
                monitor,
                status: StatusChannel::new(),
                in_flight: Mutex::new(None),
                syncing: AtomicBool::new(false),
                last_sync: Mutex::new(None),
                recent_errors: Mutex::new(VecDeque::with_capacity(ERROR_RING_CAPACITY)),
            }),
        }
    }

    /// Channel on which status snapshots are published around every pass.
    #[must_use]
    pub fn status_channel(&self) -> &StatusChannel {
        &self.inner.status
    }

    /// Trigger a sync pass.
    ///
    /// If a pass is already running, this awaits that pass and returns its
    /// outcome instead of starting a second one.
    pub async fn sync(&self) -> SyncOutcome {
        let pass = {
            let mut slot = self
                .inner
                .in_flight
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if let Some(pass) = slot.as_ref() {
                pass.clone()
            } else {
                let inner = Arc::clone(&self.inner);
                let pass: SharedPass = async move {
                    let outcome = run_pass(&inner).await;
                    // Clear the slot so the next trigger starts a fresh pass
                    inner
                        .in_flight
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .take();
                    outcome
                }
                .boxed()
                .shared();
                *slot = Some(pass.clone());
                pass
            }
        };

        pass.await
    }

    /// Build a point-in-time status snapshot.
    pub async fn snapshot(&self) -> Result<SyncStatusSnapshot> {
        snapshot(&self.inner).await
    }

    /// Make every offline-to-online transition trigger a sync pass.
    pub fn attach_reconnect_trigger(&self) {
        let engine = self.clone();
        self.inner.monitor.on_reconnect(move || {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine.sync().await;
            });
        });
    }

    /// Publish a status snapshot whenever the effective online state flips,
    /// so subscribers see connectivity changes between passes too.
    pub fn attach_reachability_publisher(&self) {
        let engine = self.clone();
        self.inner.monitor.on_change(move |_| {
            let engine = engine.clone();
            tokio::spawn(async move {
                publish_status(&engine.inner).await;
            });
        });
    }

    /// Run a sync pass at a fixed period until the returned task is aborted.
    pub fn spawn_periodic(&self, period: Duration) -> JoinHandle<()> {
        let engine = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                engine.sync().await;
            }
        })
    }
}

async fn run_pass(inner: &Arc<EngineInner>) -> SyncOutcome {
    if !inner.monitor.is_online() {
        tracing::debug!("Sync pass skipped: offline");
        return SyncOutcome::SkippedOffline;
    }

    // Stale reachability must not green-light a pass
    if !inner.monitor.probe().await {
        tracing::debug!("Sync pass skipped: service unreachable");
        return SyncOutcome::SkippedOffline;
    }

    inner.syncing.store(true, Ordering::SeqCst);
    publish_status(inner).await;

    let outcome = push_and_pull(inner).await;

    inner.syncing.store(false, Ordering::SeqCst);
    match &outcome {
        SyncOutcome::Completed(_) => {
            *inner
                .last_sync
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(Utc::now());
        }
        SyncOutcome::Aborted(reason) => {
            // Pass-level failures surface through the status channel, not as
            // a panic in whoever happened to trigger the pass
            push_error(inner, reason.clone());
        }
        SyncOutcome::SkippedOffline => {}
    }
    publish_status(inner).await;

    outcome
}

async fn push_and_pull(inner: &Arc<EngineInner>) -> SyncOutcome {
    let mut report = SyncReport::default();
    // A local mutation racing the dirty-record read must not get a record
    // pushed twice within one pass
    let mut processed = HashSet::new();

    let tickets = match inner.store.unsynced_tickets().await {
        Ok(tickets) => tickets,
        Err(e) => return SyncOutcome::Aborted(format!("Local store failure: {e}")),
    };
    let comments = match inner.store.unsynced_comments().await {
        Ok(comments) => comments,
        Err(e) => return SyncOutcome::Aborted(format!("Local store failure: {e}")),
    };

    if tickets.is_empty() && comments.is_empty() {
        tracing::debug!("Nothing pending; sync pass finished without traffic");
        return SyncOutcome::Completed(report);
    }

    for ticket in tickets {
        if !processed.insert(ticket.local_id) {
            continue;
        }
        let pushed = match ticket.remote_id {
            None => inner.api.create_ticket(&ticket).await.map(|r| r.id),
            Some(remote_id) => inner
                .api
                .update_ticket(remote_id, &ticket)
                .await
                .map(|r| r.id),
        };

        match pushed {
            Ok(remote_id) => {
                match inner
                    .store
                    .mark_ticket_synced(ticket.local_id, remote_id)
                    .await
                {
                    Ok(()) => report.tickets_pushed += 1,
                    Err(e) => record_failure(
                        inner,
                        &mut report,
                        format!("Ticket '{}': {e}", ticket.title),
                    ),
                }
            }
            Err(e) => {
                record_failure(inner, &mut report, format!("Ticket '{}': {e}", ticket.title));
            }
        }
    }

    let mut processed_comments = HashSet::new();
    for comment in comments {
        if !processed_comments.insert(comment.local_id) {
            continue;
        }
        let ticket = match inner.store.get_ticket(comment.ticket_local_id).await {
            Ok(Some(ticket)) => ticket,
            Ok(None) => {
                record_failure(
                    inner,
                    &mut report,
                    format!(
                        "Comment {}: owning ticket {} is missing",
                        comment.local_id, comment.ticket_local_id
                    ),
                );
                continue;
            }
            Err(e) => return SyncOutcome::Aborted(format!("Local store failure: {e}")),
        };

        // A comment can only be pushed once its ticket exists on the server;
        // until then it waits for a later pass
        let Some(ticket_remote_id) = ticket.remote_id else {
            report.comments_deferred += 1;
            continue;
        };

        match inner.api.add_comment(ticket_remote_id, &comment).await {
            Ok(remote) => {
                match inner
                    .store
                    .mark_comment_synced(comment.local_id, remote.id)
                    .await
                {
                    Ok(()) => report.comments_pushed += 1,
                    Err(e) => record_failure(
                        inner,
                        &mut report,
                        format!("Comment {}: {e}", comment.local_id),
                    ),
                }
            }
            Err(e) => {
                record_failure(
                    inner,
                    &mut report,
                    format!("Comment {}: {e}", comment.local_id),
                );
            }
        }
    }

    // Refresh from the server only after a clean push; after failures the
    // local store is still ahead of the server for those records
    if report.failures.is_empty() {
        match inner.api.fetch_tickets(1, PULL_PAGE_SIZE).await {
            Ok(page) => {
                let drafts: Vec<_> = page
                    .tickets
                    .into_iter()
                    .map(RemoteTicket::into_draft)
                    .collect();
                match inner.store.upsert_remote_tickets(&drafts).await {
                    Ok(applied) => report.tickets_pulled = applied,
                    Err(e) => {
                        record_failure(inner, &mut report, format!("Pull refresh: {e}"));
                    }
                }
            }
            Err(e) => record_failure(inner, &mut report, format!("Pull refresh: {e}")),
        }
    }

    tracing::info!(
        tickets_pushed = report.tickets_pushed,
        comments_pushed = report.comments_pushed,
        tickets_pulled = report.tickets_pulled,
        failures = report.failures.len(),
        "Sync pass finished"
    );

    SyncOutcome::Completed(report)
}

fn record_failure(inner: &EngineInner, report: &mut SyncReport, message: String) {
    tracing::warn!("{message}");
    report.failures.push(message.clone());
    push_error(inner, message);
}

fn push_error(inner: &EngineInner, message: String) {
    let mut ring = inner
        .recent_errors
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if ring.len() == ERROR_RING_CAPACITY {
        ring.pop_front();
    }
    ring.push_back(message);
}

async fn snapshot(inner: &EngineInner) -> Result<SyncStatusSnapshot> {
    let counts = inner.store.pending_counts().await?;
    Ok(SyncStatusSnapshot {
        online: inner.monitor.is_online(),
        syncing: inner.syncing.load(Ordering::SeqCst),
        pending_tickets: counts.tickets,
        pending_comments: counts.comments,
        last_sync: *inner
            .last_sync
            .lock()
            .unwrap_or_else(PoisonError::into_inner),
        last_errors: inner
            .recent_errors
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect(),
    })
}

async fn publish_status(inner: &EngineInner) {
    match snapshot(inner).await {
        Ok(snapshot) => inner.status.publish(&snapshot),
        Err(e) => tracing::warn!("Failed to build status snapshot: {e}"),
    }
}
