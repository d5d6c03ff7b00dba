//! Attachment metadata repository

use async_trait::async_trait;
use libsql::{params, Connection, Row};

use crate::error::Result;
use crate::models::{AttachmentDraft, AttachmentRecord};

use super::ticket_repository::{nullable_i64, nullable_text};

const ATTACHMENT_COLUMNS: &str = "local_id, ticket_local_id, name, local_uri, remote_url, \
     mime_type, size_bytes, sync_status, remote_id";

/// Trait for attachment metadata storage
#[async_trait]
pub trait AttachmentRepository {
    /// Record attachment metadata for a ticket
    async fn save(&self, draft: &AttachmentDraft) -> Result<i64>;

    /// List attachment metadata for a ticket
    async fn list_for_ticket(&self, ticket_local_id: i64) -> Result<Vec<AttachmentRecord>>;
}

/// libSQL implementation of [`AttachmentRepository`]
pub struct LibSqlAttachmentRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlAttachmentRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl AttachmentRepository for LibSqlAttachmentRepository<'_> {
    async fn save(&self, draft: &AttachmentDraft) -> Result<i64> {
        self.conn
            .execute(
                "INSERT INTO ticket_attachments
                     (ticket_local_id, name, local_uri, mime_type, size_bytes)
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    draft.ticket_local_id,
                    draft.name.as_str(),
                    draft.local_uri.as_str(),
                    draft.mime_type.as_str(),
                    draft.size_bytes,
                ],
            )
            .await?;

        Ok(self.conn.last_insert_rowid())
    }

    async fn list_for_ticket(&self, ticket_local_id: i64) -> Result<Vec<AttachmentRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {ATTACHMENT_COLUMNS} FROM ticket_attachments
                     WHERE ticket_local_id = ? ORDER BY local_id ASC"
                ),
                params![ticket_local_id],
            )
            .await?;

        let mut attachments = Vec::new();
        while let Some(row) = rows.next().await? {
            attachments.push(parse_attachment(&row)?);
        }

        Ok(attachments)
    }
}

fn parse_attachment(row: &Row) -> Result<AttachmentRecord> {
    Ok(AttachmentRecord {
        local_id: row.get(0)?,
        ticket_local_id: row.get(1)?,
        name: row.get(2)?,
        local_uri: row.get(3)?,
        remote_url: nullable_text(row, 4)?,
        mime_type: row.get(5)?,
        size_bytes: row.get(6)?,
        sync_status: row.get::<String>(7)?.parse()?,
        remote_id: nullable_i64(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::ticket_repository::{LibSqlTicketRepository, TicketRepository};
    use crate::db::Database;
    use crate::models::{Creator, SyncStatus, TicketDraft, TicketPriority};

    #[tokio::test(flavor = "multi_thread")]
    async fn save_and_list_attachment_metadata() {
        let db = Database::open_in_memory().await.unwrap();
        let ticket_id = {
            let repo = LibSqlTicketRepository::new(db.connection());
            let draft = TicketDraft::new(
                "with screenshot",
                "desc",
                "general",
                TicketPriority::Low,
                Creator::default(),
            )
            .unwrap();
            repo.save(&draft).await.unwrap()
        };

        let repo = LibSqlAttachmentRepository::new(db.connection());
        let draft =
            AttachmentDraft::new(ticket_id, "shot.png", "file:///shot.png", "image/png", 2048)
                .unwrap();
        repo.save(&draft).await.unwrap();

        let attachments = repo.list_for_ticket(ticket_id).await.unwrap();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].name, "shot.png");
        assert_eq!(attachments[0].size_bytes, 2048);
        assert_eq!(attachments[0].sync_status, SyncStatus::Pending);
        assert_eq!(attachments[0].remote_url, None);
    }
}
