//! Shared models for tickets, comments, and attachments.

mod attachment;
mod comment;
mod ticket;

pub use attachment::{AttachmentDraft, AttachmentRecord};
pub use comment::{CommentDraft, CommentRecord};
pub use ticket::{
    Creator, SyncStatus, TicketDraft, TicketFilter, TicketPatch, TicketPriority, TicketRecord,
    TicketSort, TicketStatus,
};
