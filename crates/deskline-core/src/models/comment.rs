//! Comment model

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

use super::ticket::{Creator, SyncStatus};

/// A ticket comment as stored in the local database.
///
/// A comment cannot be pushed to the server until its owning ticket has a
/// remote identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentRecord {
    pub local_id: i64,
    pub ticket_local_id: i64,
    pub text: String,
    pub created_by: Creator,
    pub created_at: DateTime<Utc>,
    pub sync_status: SyncStatus,
    pub remote_id: Option<i64>,
}

impl CommentRecord {
    /// Whether this record still needs to be pushed to the remote service.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        matches!(self.sync_status, SyncStatus::Pending)
    }
}

/// Input for inserting a comment into the local store.
#[derive(Debug, Clone)]
pub struct CommentDraft {
    pub ticket_local_id: i64,
    pub text: String,
    pub created_by: Creator,
    pub created_at: Option<DateTime<Utc>>,
    pub remote_id: Option<i64>,
    /// Caller-asserted "already accepted by the server"; only honored when
    /// `remote_id` is present.
    pub synced: bool,
}

impl CommentDraft {
    /// Create a draft for a locally-authored comment.
    pub fn new(
        ticket_local_id: i64,
        text: impl Into<String>,
        created_by: Creator,
    ) -> Result<Self> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(Error::InvalidInput(
                "Comment text cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            ticket_local_id,
            text,
            created_by,
            created_at: None,
            remote_id: None,
            synced: false,
        })
    }

    /// Sync status the store will assign for this draft.
    #[must_use]
    pub const fn effective_sync_status(&self) -> SyncStatus {
        if self.synced && self.remote_id.is_some() {
            SyncStatus::Synced
        } else {
            SyncStatus::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_rejects_empty_text() {
        assert!(CommentDraft::new(1, "   ", Creator::default()).is_err());
    }

    #[test]
    fn draft_trims_text_and_defaults_pending() {
        let draft = CommentDraft::new(1, "  looks broken  ", Creator::default()).unwrap();
        assert_eq!(draft.text, "looks broken");
        assert_eq!(draft.effective_sync_status(), SyncStatus::Pending);
    }
}
