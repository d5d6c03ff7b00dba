//! Ticket model and the enums shared across the sync engine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Ticket priority levels accepted by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    Medium,
    High,
    Critical,
}

impl TicketPriority {
    /// Wire/storage name of this priority.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for TicketPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketPriority {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            other => Err(Error::InvalidInput(format!(
                "Unknown ticket priority: {other}"
            ))),
        }
    }
}

/// Ticket workflow status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl TicketStatus {
    /// Wire/storage name of this status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            other => Err(Error::InvalidInput(format!("Unknown ticket status: {other}"))),
        }
    }
}

/// Whether a local record has been accepted by the remote service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Pending,
    Synced,
}

impl SyncStatus {
    /// Storage name of this sync status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Synced => "synced",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "synced" => Ok(Self::Synced),
            other => Err(Error::InvalidInput(format!("Unknown sync status: {other}"))),
        }
    }
}

/// Denormalized creator identity carried on every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl Creator {
    /// Create a creator identity triple.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            email: email.into(),
        }
    }
}

/// A ticket as stored in the local database.
///
/// `local_id` is assigned by the store (monotonic rowid); `remote_id` is
/// assigned by the server once the record is accepted. A record with
/// `sync_status == Synced` always carries a remote id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketRecord {
    pub local_id: i64,
    pub remote_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Creator,
    pub sync_status: SyncStatus,
    /// Local insertion timestamp, audit only.
    pub created_at_local: DateTime<Utc>,
}

impl TicketRecord {
    /// Whether this record still needs to be pushed to the remote service.
    #[must_use]
    pub const fn is_dirty(&self) -> bool {
        matches!(self.sync_status, SyncStatus::Pending)
    }
}

/// Input for inserting a ticket into the local store.
#[derive(Debug, Clone)]
pub struct TicketDraft {
    /// Existing local id for insert-or-replace; `None` assigns a new one.
    pub local_id: Option<i64>,
    pub remote_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub created_by: Creator,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Caller-asserted "already accepted by the server". Only honored when
    /// `remote_id` is present; the store falls back to pending otherwise.
    pub synced: bool,
}

impl TicketDraft {
    /// Create a draft for a brand-new, locally-authored ticket.
    pub fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        category: impl Into<String>,
        priority: TicketPriority,
        created_by: Creator,
    ) -> Result<Self> {
        let title = title.into().trim().to_string();
        let description = description.into().trim().to_string();
        let category = category.into().trim().to_string();

        if title.is_empty() {
            return Err(Error::InvalidInput(
                "Ticket title cannot be empty".to_string(),
            ));
        }
        if description.is_empty() {
            return Err(Error::InvalidInput(
                "Ticket description cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            local_id: None,
            remote_id: None,
            title,
            description,
            category,
            priority,
            status: TicketStatus::Open,
            created_by,
            created_at: None,
            updated_at: None,
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

/// Partial field update applied to a stored ticket.
///
/// Applying a patch always resets the record to pending; prior sync state is
/// never trusted across an edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub priority: Option<TicketPriority>,
    pub status: Option<TicketStatus>,
    pub created_by: Option<Creator>,
}

impl TicketPatch {
    /// Whether the patch carries no field changes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.category.is_none()
            && self.priority.is_none()
            && self.status.is_none()
            && self.created_by.is_none()
    }
}

/// Sort order for ticket listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TicketSort {
    #[default]
    CreatedDesc,
    CreatedAsc,
    UpdatedDesc,
}

impl TicketSort {
    pub(crate) const fn order_clause(self) -> &'static str {
        match self {
            Self::CreatedDesc => "created_at DESC",
            Self::CreatedAsc => "created_at ASC",
            Self::UpdatedDesc => "updated_at DESC",
        }
    }
}

/// Conjunctive filter for ticket listings.
#[derive(Debug, Clone, Default)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    /// Case-insensitive substring match on title or description.
    pub search: Option<String>,
    /// 1-based page number; 0 is treated as 1.
    pub page: u32,
    /// Page size; 0 falls back to the store default.
    pub page_size: u32,
    pub sort: TicketSort,
}

impl TicketFilter {
    /// Filter by status only.
    #[must_use]
    pub fn with_status(status: TicketStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}
