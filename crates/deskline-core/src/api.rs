//! HTTP client for the remote ticket service.
//!
//! The service speaks JSON over REST under `/api/v1`. All payload field names
//! are camelCase on the wire. Reachability of the service is probed through
//! the unauthenticated `/health` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::{
    CommentRecord, Creator, TicketDraft, TicketPriority, TicketRecord, TicketStatus,
};

/// Hard deadline for the `/health` probe; a slow health endpoint is treated
/// the same as an unreachable one.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(3);

/// Default deadline for data requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for the remote ticket service client.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    base_url: String,
    timeout: Duration,
}

impl ApiConfig {
    /// Create a configuration for the given service base URL.
    ///
    /// The URL must include a scheme; a trailing slash is stripped so paths
    /// can be appended uniformly.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim().to_string();
        if base_url.is_empty() {
            return Err(Error::InvalidInput(
                "API base URL must not be empty".to_string(),
            ));
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(Error::InvalidInput(
                "API base URL must include http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout: REQUEST_TIMEOUT,
        })
    }

    /// Override the data request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v1{path}", self.base_url)
    }
}

/// Creator identity as sent over the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCreator {
    pub id: String,
    pub name: String,
    pub email: String,
}

impl From<&Creator> for RemoteCreator {
    fn from(creator: &Creator) -> Self {
        Self {
            id: creator.id.clone(),
            name: creator.name.clone(),
            email: creator.email.clone(),
        }
    }
}

/// A ticket as the server represents it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTicket {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: RemoteCreator,
}

impl RemoteTicket {
    /// Convert into a store draft for a record the server already owns.
    #[must_use]
    pub fn into_draft(self) -> TicketDraft {
        TicketDraft {
            local_id: None,
            remote_id: Some(self.id),
            title: self.title,
            description: self.description,
            category: self.category,
            priority: self.priority,
            status: self.status,
            created_by: Creator {
                id: self.created_by.id,
                name: self.created_by.name,
                email: self.created_by.email,
            },
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
            synced: true,
        }
    }
}

/// A comment as the server represents it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteComment {
    pub id: i64,
    pub ticket_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub created_by: RemoteCreator,
}

/// Pagination envelope on ticket listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemotePagination {
    pub page: u32,
    pub limit: u32,
    pub total: u64,
    pub total_pages: u32,
}

/// One page of server-known tickets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketPage {
    pub tickets: Vec<RemoteTicket>,
    pub pagination: RemotePagination,
}

/// Request body for creating a ticket on the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTicketPayload {
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: TicketPriority,
    pub status: TicketStatus,
    pub created_by: RemoteCreator,
}

impl From<&TicketRecord> for NewTicketPayload {
    fn from(ticket: &TicketRecord) -> Self {
        Self {
            title: ticket.title.clone(),
            description: ticket.description.clone(),
            category: ticket.category.clone(),
            priority: ticket.priority,
            status: ticket.status,
            created_by: RemoteCreator::from(&ticket.created_by),
        }
    }
}

/// Request body for replacing a ticket's mutable fields on the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketUpdatePayload {
    pub title: String,
    pub description: String,
    pub category: String,
    pub priority: TicketPriority,
    pub status: TicketStatus,
}

impl From<&TicketRecord> for TicketUpdatePayload {
    fn from(ticket: &TicketRecord) -> Self {
        Self {
            title: ticket.title.clone(),
            description: ticket.description.clone(),
            category: ticket.category.clone(),
            priority: ticket.priority,
            status: ticket.status,
        }
    }
}

/// Request body for appending a comment to a server-known ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewCommentPayload {
    pub text: String,
    pub created_by: RemoteCreator,
}

/// Client interface to the remote ticket service.
#[async_trait]
pub trait TicketApi: Send + Sync {
    /// Probe service reachability. Any HTTP response counts as reachable,
    /// including server errors; only transport failures do not.
    async fn health_check(&self) -> bool;

    /// Create a ticket on the server, returning the server's record.
    async fn create_ticket(&self, ticket: &TicketRecord) -> Result<RemoteTicket>;

    /// Replace a server ticket's mutable fields.
    async fn update_ticket(&self, remote_id: i64, ticket: &TicketRecord) -> Result<RemoteTicket>;

    /// Append a comment to a server-known ticket.
    async fn add_comment(&self, ticket_remote_id: i64, comment: &CommentRecord)
        -> Result<RemoteComment>;

    /// Fetch one page of the server's tickets.
    async fn fetch_tickets(&self, page: u32, page_size: u32) -> Result<TicketPage>;
}

/// reqwest-backed implementation of [`TicketApi`].
#[derive(Clone)]
pub struct HttpTicketApi {
    config: ApiConfig,
    client: reqwest::Client,
}

impl HttpTicketApi {
    /// Create a client for the configured service.
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, client })
    }

    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api(parse_api_error(status, &body)));
        }
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl TicketApi for HttpTicketApi {
    async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.config.base_url);
        self.client
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .is_ok()
    }

    async fn create_ticket(&self, ticket: &TicketRecord) -> Result<RemoteTicket> {
        let response = self
            .client
            .post(self.config.url("/tickets"))
            .json(&NewTicketPayload::from(ticket))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn update_ticket(&self, remote_id: i64, ticket: &TicketRecord) -> Result<RemoteTicket> {
        let response = self
            .client
            .put(self.config.url(&format!("/tickets/{remote_id}")))
            .json(&TicketUpdatePayload::from(ticket))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn add_comment(
        &self,
        ticket_remote_id: i64,
        comment: &CommentRecord,
    ) -> Result<RemoteComment> {
        let payload = NewCommentPayload {
            text: comment.text.clone(),
            created_by: RemoteCreator::from(&comment.created_by),
        };
        let response = self
            .client
            .post(self.config.url(&format!("/tickets/{ticket_remote_id}/comments")))
            .json(&payload)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    async fn fetch_tickets(&self, page: u32, page_size: u32) -> Result<TicketPage> {
        let response = self
            .client
            .get(self.config.url("/tickets"))
            .query(&[("page", page), ("limit", page_size)])
            .send()
            .await?;
        Self::parse_response(response).await
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn config_rejects_invalid_base_urls() {
        assert!(ApiConfig::new("").is_err());
        assert!(ApiConfig::new("api.example.com").is_err());

        let config = ApiConfig::new("https://api.example.com/").unwrap();
        assert_eq!(config.url("/tickets"), "https://api.example.com/api/v1/tickets");
    }

    #[test]
    fn api_error_prefers_json_message() {
        let body = r#"{"error":"ValidationError","message":"Title is required"}"#;
        assert_eq!(
            parse_api_error(StatusCode::BAD_REQUEST, body),
            "Title is required (400)"
        );

        let body = r#"{"error":"ValidationError"}"#;
        assert_eq!(
            parse_api_error(StatusCode::BAD_REQUEST, body),
            "ValidationError (400)"
        );

        assert_eq!(
            parse_api_error(StatusCode::INTERNAL_SERVER_ERROR, ""),
            "HTTP 500"
        );
        assert_eq!(
            parse_api_error(StatusCode::BAD_GATEWAY, "upstream down"),
            "upstream down (502)"
        );
    }

    #[test]
    fn payloads_use_camel_case_field_names() {
        let payload = NewCommentPayload {
            text: "hello".to_string(),
            created_by: RemoteCreator {
                id: "u1".to_string(),
                name: "Ana".to_string(),
                email: "ana@example.com".to_string(),
            },
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert!(json.get("createdBy").is_some());
        assert!(json.get("created_by").is_none());
    }

    #[test]
    fn remote_ticket_parses_wire_shape_and_becomes_synced_draft() {
        let json = r#"{
            "id": 42,
            "title": "Erro de login",
            "description": "Cannot sign in",
            "category": "auth",
            "priority": "high",
            "status": "open",
            "createdAt": "2026-01-02T03:04:05Z",
            "updatedAt": "2026-01-02T03:04:05Z",
            "createdBy": {"id": "u1", "name": "Ana", "email": "ana@example.com"}
        }"#;

        let remote: RemoteTicket = serde_json::from_str(json).unwrap();
        assert_eq!(remote.id, 42);
        assert_eq!(remote.priority, TicketPriority::High);

        let draft = remote.into_draft();
        assert_eq!(draft.remote_id, Some(42));
        assert!(draft.synced);
        assert_eq!(
            draft.effective_sync_status(),
            crate::models::SyncStatus::Synced
        );
    }
}
