//! Comment repository implementation

use async_trait::async_trait;
use chrono::Utc;
use libsql::{params, Connection, Row};

use crate::error::{Error, Result};
use crate::models::{CommentDraft, CommentRecord, Creator};

use super::ticket_repository::{nullable_i64, parse_timestamp};

const COMMENT_COLUMNS: &str = "local_id, ticket_local_id, text, created_by_id, \
     created_by_name, created_by_email, created_at, sync_status, remote_id";

/// Trait for comment storage operations
#[async_trait]
pub trait CommentRepository {
    /// Append a comment to a ticket
    async fn save(&self, draft: &CommentDraft) -> Result<i64>;

    /// List comments for a ticket in chronological order
    async fn list_for_ticket(&self, ticket_local_id: i64) -> Result<Vec<CommentRecord>>;

    /// List all pending comments in insertion order
    async fn list_unsynced(&self) -> Result<Vec<CommentRecord>>;

    /// Atomically assign a remote id and flip the comment to synced
    async fn mark_synced(&self, local_id: i64, remote_id: i64) -> Result<()>;

    /// Number of comments still pending
    async fn count_pending(&self) -> Result<u64>;
}

/// libSQL implementation of [`CommentRepository`]
pub struct LibSqlCommentRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlCommentRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl CommentRepository for LibSqlCommentRepository<'_> {
    async fn save(&self, draft: &CommentDraft) -> Result<i64> {
        let created_at = draft.created_at.unwrap_or_else(Utc::now);

        self.conn
            .execute(
                "INSERT INTO ticket_comments
                     (ticket_local_id, text, created_by_id, created_by_name,
                      created_by_email, created_at, sync_status, remote_id)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    draft.ticket_local_id,
                    draft.text.as_str(),
                    draft.created_by.id.as_str(),
                    draft.created_by.name.as_str(),
                    draft.created_by.email.as_str(),
                    created_at.to_rfc3339(),
                    draft.effective_sync_status().as_str(),
                    draft.remote_id,
                ],
            )
            .await?;

        Ok(self.conn.last_insert_rowid())
    }

    async fn list_for_ticket(&self, ticket_local_id: i64) -> Result<Vec<CommentRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {COMMENT_COLUMNS} FROM ticket_comments
                     WHERE ticket_local_id = ? ORDER BY created_at ASC, local_id ASC"
                ),
                params![ticket_local_id],
            )
            .await?;

        let mut comments = Vec::new();
        while let Some(row) = rows.next().await? {
            comments.push(parse_comment(&row)?);
        }

        Ok(comments)
    }

    async fn list_unsynced(&self) -> Result<Vec<CommentRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {COMMENT_COLUMNS} FROM ticket_comments
                     WHERE sync_status = 'pending' ORDER BY local_id ASC"
                ),
                (),
            )
            .await?;

        let mut comments = Vec::new();
        while let Some(row) = rows.next().await? {
            comments.push(parse_comment(&row)?);
        }

        Ok(comments)
    }

    async fn mark_synced(&self, local_id: i64, remote_id: i64) -> Result<()> {
        let rows = self
            .conn
            .execute(
                "UPDATE ticket_comments SET remote_id = ?, sync_status = 'synced'
                 WHERE local_id = ?",
                params![remote_id, local_id],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("comment {local_id}")));
        }

        Ok(())
    }

    async fn count_pending(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM ticket_comments WHERE sync_status = 'pending'",
                (),
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(u64::try_from(row.get::<i64>(0)?).unwrap_or(0)),
            None => Ok(0),
        }
    }
}

fn parse_comment(row: &Row) -> Result<CommentRecord> {
    Ok(CommentRecord {
        local_id: row.get(0)?,
        ticket_local_id: row.get(1)?,
        text: row.get(2)?,
        created_by: Creator {
            id: row.get(3)?,
            name: row.get(4)?,
            email: row.get(5)?,
        },
        created_at: parse_timestamp(&row.get::<String>(6)?)?,
        sync_status: row.get::<String>(7)?.parse()?,
        remote_id: nullable_i64(&row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::ticket_repository::{LibSqlTicketRepository, TicketRepository};
    use crate::db::Database;
    use crate::models::{SyncStatus, TicketDraft, TicketPriority};

    async fn setup_with_ticket() -> (Database, i64) {
        let db = Database::open_in_memory().await.unwrap();
        let ticket_id = {
            let repo = LibSqlTicketRepository::new(db.connection());
            let draft = TicketDraft::new(
                "host ticket",
                "desc",
                "general",
                TicketPriority::Low,
                Creator::default(),
            )
            .unwrap();
            repo.save(&draft).await.unwrap()
        };
        (db, ticket_id)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn save_and_list_in_chronological_order() {
        let (db, ticket_id) = setup_with_ticket().await;
        let repo = LibSqlCommentRepository::new(db.connection());

        let author = Creator::new("u1", "Ana", "ana@example.com");
        repo.save(&CommentDraft::new(ticket_id, "first", author.clone()).unwrap())
            .await
            .unwrap();
        repo.save(&CommentDraft::new(ticket_id, "second", author).unwrap())
            .await
            .unwrap();

        let comments = repo.list_for_ticket(ticket_id).await.unwrap();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].text, "first");
        assert_eq!(comments[1].text, "second");
        assert_eq!(comments[0].sync_status, SyncStatus::Pending);
        assert!(comments[0].is_dirty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mark_synced_removes_from_unsynced_listing() {
        let (db, ticket_id) = setup_with_ticket().await;
        let repo = LibSqlCommentRepository::new(db.connection());

        let id = repo
            .save(&CommentDraft::new(ticket_id, "needs push", Creator::default()).unwrap())
            .await
            .unwrap();
        assert_eq!(repo.count_pending().await.unwrap(), 1);

        repo.mark_synced(id, 77).await.unwrap();

        assert!(repo.list_unsynced().await.unwrap().is_empty());
        assert_eq!(repo.count_pending().await.unwrap(), 0);

        let comments = repo.list_for_ticket(ticket_id).await.unwrap();
        assert_eq!(comments[0].remote_id, Some(77));
        assert_eq!(comments[0].sync_status, SyncStatus::Synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mark_synced_missing_comment_is_not_found() {
        let (db, _) = setup_with_ticket().await;
        let repo = LibSqlCommentRepository::new(db.connection());

        let err = repo.mark_synced(999, 1).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn foreign_key_rejects_orphan_comments() {
        let (db, _) = setup_with_ticket().await;
        let repo = LibSqlCommentRepository::new(db.connection());

        let draft = CommentDraft::new(4711, "orphan", Creator::default()).unwrap();
        assert!(repo.save(&draft).await.is_err());
    }
}
