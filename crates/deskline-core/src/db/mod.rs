//! Database layer for Deskline

mod attachment_repository;
mod comment_repository;
mod connection;
mod migrations;
mod store;
mod ticket_repository;

pub use attachment_repository::{AttachmentRepository, LibSqlAttachmentRepository};
pub use comment_repository::{CommentRepository, LibSqlCommentRepository};
pub use connection::Database;
pub use store::{PendingCounts, TicketStore};
pub use ticket_repository::{LibSqlTicketRepository, TicketRepository};
