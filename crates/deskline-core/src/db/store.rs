//! High-level ticket store facade
//!
//! Wraps the database behind an async mutex so the store can be cloned into
//! background tasks. Repositories are constructed per call against the shared
//! connection.

use std::path::Path;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::{
    AttachmentDraft, AttachmentRecord, CommentDraft, CommentRecord, TicketDraft, TicketFilter,
    TicketPatch, TicketRecord,
};

use super::attachment_repository::{AttachmentRepository, LibSqlAttachmentRepository};
use super::comment_repository::{CommentRepository, LibSqlCommentRepository};
use super::connection::Database;
use super::ticket_repository::{LibSqlTicketRepository, TicketRepository};

/// Counts of records still waiting to be pushed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingCounts {
    pub tickets: u64,
    pub comments: u64,
}

impl PendingCounts {
    /// Total number of dirty records
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.tickets + self.comments
    }
}

/// Cloneable handle to the local ticket database
#[derive(Clone)]
pub struct TicketStore {
    db: Arc<Mutex<Database>>,
}

impl TicketStore {
    /// Open (or create) the store at the given path
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::open(path).await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open an in-memory store (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Insert a ticket and return the stored record
    pub async fn create_ticket(&self, draft: &TicketDraft) -> Result<TicketRecord> {
        let db = self.db.lock().await;
        let repo = LibSqlTicketRepository::new(db.connection());
        let local_id = repo.save(draft).await?;
        repo.get(local_id)
            .await?
            .ok_or_else(|| Error::Database(format!("Ticket {local_id} vanished after insert")))
    }

    /// Get a ticket by local id
    pub async fn get_ticket(&self, local_id: i64) -> Result<Option<TicketRecord>> {
        let db = self.db.lock().await;
        LibSqlTicketRepository::new(db.connection())
            .get(local_id)
            .await
    }

    /// List tickets matching the filter, with the total match count
    pub async fn list_tickets(&self, filter: &TicketFilter) -> Result<(Vec<TicketRecord>, u64)> {
        let db = self.db.lock().await;
        LibSqlTicketRepository::new(db.connection())
            .list(filter)
            .await
    }

    /// Apply a partial update and return the refreshed record
    ///
    /// The record is always reset to pending, even when the patch is empty.
    pub async fn update_ticket(&self, local_id: i64, patch: &TicketPatch) -> Result<TicketRecord> {
        let db = self.db.lock().await;
        let repo = LibSqlTicketRepository::new(db.connection());
        repo.update(local_id, patch).await?;
        repo.get(local_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("ticket {local_id}")))
    }

    /// List pending tickets in insertion order
    pub async fn unsynced_tickets(&self) -> Result<Vec<TicketRecord>> {
        let db = self.db.lock().await;
        LibSqlTicketRepository::new(db.connection())
            .list_unsynced()
            .await
    }

    /// Atomically record that the server accepted a ticket
    pub async fn mark_ticket_synced(&self, local_id: i64, remote_id: i64) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlTicketRepository::new(db.connection())
            .mark_synced(local_id, remote_id)
            .await
    }

    /// Merge server-known tickets into the store without clobbering dirty
    /// local records
    pub async fn upsert_remote_tickets(&self, drafts: &[TicketDraft]) -> Result<usize> {
        let db = self.db.lock().await;
        LibSqlTicketRepository::new(db.connection())
            .upsert_remote(drafts)
            .await
    }

    /// Append a comment and return its local id
    pub async fn add_comment(&self, draft: &CommentDraft) -> Result<i64> {
        let db = self.db.lock().await;
        LibSqlCommentRepository::new(db.connection())
            .save(draft)
            .await
    }

    /// List comments for a ticket in chronological order
    pub async fn comments_for_ticket(&self, ticket_local_id: i64) -> Result<Vec<CommentRecord>> {
        let db = self.db.lock().await;
        LibSqlCommentRepository::new(db.connection())
            .list_for_ticket(ticket_local_id)
            .await
    }

    /// List all pending comments in insertion order
    pub async fn unsynced_comments(&self) -> Result<Vec<CommentRecord>> {
        let db = self.db.lock().await;
        LibSqlCommentRepository::new(db.connection())
            .list_unsynced()
            .await
    }

    /// Atomically record that the server accepted a comment
    pub async fn mark_comment_synced(&self, local_id: i64, remote_id: i64) -> Result<()> {
        let db = self.db.lock().await;
        LibSqlCommentRepository::new(db.connection())
            .mark_synced(local_id, remote_id)
            .await
    }

    /// Record attachment metadata and return its local id
    pub async fn add_attachment(&self, draft: &AttachmentDraft) -> Result<i64> {
        let db = self.db.lock().await;
        LibSqlAttachmentRepository::new(db.connection())
            .save(draft)
            .await
    }

    /// List attachment metadata for a ticket
    pub async fn attachments_for_ticket(
        &self,
        ticket_local_id: i64,
    ) -> Result<Vec<AttachmentRecord>> {
        let db = self.db.lock().await;
        LibSqlAttachmentRepository::new(db.connection())
            .list_for_ticket(ticket_local_id)
            .await
    }

    /// Counts of records still waiting to be pushed
    pub async fn pending_counts(&self) -> Result<PendingCounts> {
        let db = self.db.lock().await;
        let tickets = LibSqlTicketRepository::new(db.connection())
            .count_pending()
            .await?;
        let comments = LibSqlCommentRepository::new(db.connection())
            .count_pending()
            .await?;
        Ok(PendingCounts { tickets, comments })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::models::{Creator, SyncStatus, TicketPriority, TicketStatus};

    fn draft(title: &str) -> TicketDraft {
        TicketDraft::new(
            title,
            "description",
            "general",
            TicketPriority::Medium,
            Creator::new("u1", "Ana", "ana@example.com"),
        )
        .unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn create_returns_stored_record() {
        let store = TicketStore::open_in_memory().await.unwrap();

        let ticket = store.create_ticket(&draft("hello")).await.unwrap();
        assert!(ticket.local_id > 0);
        assert_eq!(ticket.title, "hello");
        assert_eq!(ticket.sync_status, SyncStatus::Pending);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn update_returns_refreshed_record() {
        let store = TicketStore::open_in_memory().await.unwrap();
        let ticket = store.create_ticket(&draft("before")).await.unwrap();

        let patch = TicketPatch {
            status: Some(TicketStatus::InProgress),
            ..TicketPatch::default()
        };
        let updated = store.update_ticket(ticket.local_id, &patch).await.unwrap();
        assert_eq!(updated.status, TicketStatus::InProgress);
        assert_eq!(updated.sync_status, SyncStatus::Pending);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn pending_counts_cover_tickets_and_comments() {
        let store = TicketStore::open_in_memory().await.unwrap();
        let ticket = store.create_ticket(&draft("with comment")).await.unwrap();
        store
            .add_comment(&CommentDraft::new(ticket.local_id, "hi", Creator::default()).unwrap())
            .await
            .unwrap();

        let counts = store.pending_counts().await.unwrap();
        assert_eq!(counts, PendingCounts { tickets: 1, comments: 1 });
        assert_eq!(counts.total(), 2);

        store.mark_ticket_synced(ticket.local_id, 5).await.unwrap();
        let counts = store.pending_counts().await.unwrap();
        assert_eq!(counts.tickets, 0);
        assert_eq!(counts.comments, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn clones_share_the_same_database() {
        let store = TicketStore::open_in_memory().await.unwrap();
        let clone = store.clone();

        let ticket = store.create_ticket(&draft("shared")).await.unwrap();
        let seen = clone.get_ticket(ticket.local_id).await.unwrap();
        assert_eq!(seen.map(|t| t.title), Some("shared".to_string()));
    }
}
