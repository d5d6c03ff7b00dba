//! Attachment model
//!
//! Attachment metadata is tracked locally with a sync status; the binary
//! upload protocol itself is a future extension point.

use crate::error::{Error, Result};

use super::ticket::SyncStatus;

/// Attachment metadata persisted for a ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentRecord {
    pub local_id: i64,
    pub ticket_local_id: i64,
    /// Display name of the file.
    pub name: String,
    /// On-device URI of the file contents.
    pub local_uri: String,
    /// Remote URL once the attachment has been uploaded.
    pub remote_url: Option<String>,
    pub mime_type: String,
    pub size_bytes: i64,
    pub sync_status: SyncStatus,
    pub remote_id: Option<i64>,
}

/// Input for inserting attachment metadata into the local store.
#[derive(Debug, Clone)]
pub struct AttachmentDraft {
    pub ticket_local_id: i64,
    pub name: String,
    pub local_uri: String,
    pub mime_type: String,
    pub size_bytes: i64,
}

impl AttachmentDraft {
    /// Create attachment metadata for a locally-picked file.
    pub fn new(
        ticket_local_id: i64,
        name: impl Into<String>,
        local_uri: impl Into<String>,
        mime_type: impl Into<String>,
        size_bytes: i64,
    ) -> Result<Self> {
        let name = name.into().trim().to_string();
        let local_uri = local_uri.into().trim().to_string();
        let mime_type = mime_type.into().trim().to_string();

        if name.is_empty() {
            return Err(Error::InvalidInput(
                "Attachment name cannot be empty".to_string(),
            ));
        }
        if local_uri.is_empty() {
            return Err(Error::InvalidInput(
                "Attachment local_uri cannot be empty".to_string(),
            ));
        }
        if mime_type.is_empty() {
            return Err(Error::InvalidInput(
                "Attachment mime_type cannot be empty".to_string(),
            ));
        }
        if size_bytes < 0 {
            return Err(Error::InvalidInput(
                "Attachment size_bytes cannot be negative".to_string(),
            ));
        }

        Ok(Self {
            ticket_local_id,
            name,
            local_uri,
            mime_type,
            size_bytes,
        })
    }
}
