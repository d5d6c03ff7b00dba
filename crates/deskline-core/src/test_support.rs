//! Shared test doubles.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::api::{
    RemoteComment, RemoteCreator, RemotePagination, RemoteTicket, TicketApi, TicketPage,
};
use crate::error::{Error, Result};
use crate::models::{CommentRecord, TicketRecord};

/// Scriptable in-memory stand-in for the remote ticket service.
pub(crate) struct MockTicketApi {
    healthy: AtomicBool,
    health_calls: AtomicUsize,
    create_calls: AtomicUsize,
    update_calls: AtomicUsize,
    comment_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    next_ticket_id: AtomicI64,
    next_comment_id: AtomicI64,
    fail_create_titles: Mutex<HashSet<String>>,
    fail_comment_texts: Mutex<HashSet<String>>,
    remote_id_by_title: Mutex<HashMap<String, i64>>,
    server_tickets: Mutex<Vec<RemoteTicket>>,
    create_delay: Mutex<Option<Duration>>,
}

impl MockTicketApi {
    pub(crate) fn new() -> Self {
        Self {
            healthy: AtomicBool::new(true),
            health_calls: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            update_calls: AtomicUsize::new(0),
            comment_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            next_ticket_id: AtomicI64::new(100),
            next_comment_id: AtomicI64::new(1000),
            fail_create_titles: Mutex::new(HashSet::new()),
            fail_comment_texts: Mutex::new(HashSet::new()),
            remote_id_by_title: Mutex::new(HashMap::new()),
            server_tickets: Mutex::new(Vec::new()),
            create_delay: Mutex::new(None),
        }
    }

    pub(crate) fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Make `create_ticket` fail for tickets with this title.
    pub(crate) fn fail_create_for_title(&self, title: &str) {
        self.fail_create_titles
            .lock()
            .unwrap()
            .insert(title.to_string());
    }

    pub(crate) fn clear_create_failures(&self) {
        self.fail_create_titles.lock().unwrap().clear();
    }

    /// Make `add_comment` fail for comments with this text.
    pub(crate) fn fail_comment_for_text(&self, text: &str) {
        self.fail_comment_texts
            .lock()
            .unwrap()
            .insert(text.to_string());
    }

    /// Pin the remote id assigned to a ticket with this title.
    pub(crate) fn assign_remote_id(&self, title: &str, remote_id: i64) {
        self.remote_id_by_title
            .lock()
            .unwrap()
            .insert(title.to_string(), remote_id);
    }

    /// Tickets returned from `fetch_tickets`.
    pub(crate) fn set_server_tickets(&self, tickets: Vec<RemoteTicket>) {
        *self.server_tickets.lock().unwrap() = tickets;
    }

    /// Delay every `create_ticket` call, widening race windows in tests.
    pub(crate) fn set_create_delay(&self, delay: Duration) {
        *self.create_delay.lock().unwrap() = Some(delay);
    }

    pub(crate) fn health_calls(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn update_calls(&self) -> usize {
        self.update_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn comment_calls(&self) -> usize {
        self.comment_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Every API call, the health probe included.
    pub(crate) fn total_calls(&self) -> usize {
        self.health_calls()
            + self.create_calls()
            + self.update_calls()
            + self.comment_calls()
            + self.fetch_calls()
    }

    fn remote_ticket(&self, id: i64, ticket: &TicketRecord) -> RemoteTicket {
        RemoteTicket {
            id,
            title: ticket.title.clone(),
            description: ticket.description.clone(),
            category: ticket.category.clone(),
            priority: ticket.priority,
            status: ticket.status,
            created_at: ticket.created_at,
            updated_at: ticket.updated_at,
            created_by: RemoteCreator::from(&ticket.created_by),
        }
    }
}

#[async_trait]
impl TicketApi for MockTicketApi {
    async fn health_check(&self) -> bool {
        self.health_calls.fetch_add(1, Ordering::SeqCst);
        self.healthy.load(Ordering::SeqCst)
    }

    async fn create_ticket(&self, ticket: &TicketRecord) -> Result<RemoteTicket> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.create_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_create_titles.lock().unwrap().contains(&ticket.title) {
            return Err(Error::Api(format!(
                "Simulated failure for '{}' (500)",
                ticket.title
            )));
        }

        let id = self
            .remote_id_by_title
            .lock()
            .unwrap()
            .get(&ticket.title)
            .copied()
            .unwrap_or_else(|| self.next_ticket_id.fetch_add(1, Ordering::SeqCst));

        Ok(self.remote_ticket(id, ticket))
    }

    async fn update_ticket(&self, remote_id: i64, ticket: &TicketRecord) -> Result<RemoteTicket> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.remote_ticket(remote_id, ticket))
    }

    async fn add_comment(
        &self,
        ticket_remote_id: i64,
        comment: &CommentRecord,
    ) -> Result<RemoteComment> {
        self.comment_calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_comment_texts.lock().unwrap().contains(&comment.text) {
            return Err(Error::Api(format!(
                "Simulated comment failure for '{}' (500)",
                comment.text
            )));
        }

        Ok(RemoteComment {
            id: self.next_comment_id.fetch_add(1, Ordering::SeqCst),
            ticket_id: ticket_remote_id,
            text: comment.text.clone(),
            created_at: Utc::now(),
            created_by: RemoteCreator::from(&comment.created_by),
        })
    }

    async fn fetch_tickets(&self, page: u32, page_size: u32) -> Result<TicketPage> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let tickets = self.server_tickets.lock().unwrap().clone();
        let total = tickets.len() as u64;
        Ok(TicketPage {
            tickets,
            pagination: RemotePagination {
                page,
                limit: page_size,
                total,
                total_pages: 1,
            },
        })
    }
}
