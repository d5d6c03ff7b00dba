//! Ticket repository implementation

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{params, params_from_iter, Connection, Row, Value};

use crate::error::{Error, Result};
use crate::models::{Creator, TicketDraft, TicketFilter, TicketPatch, TicketRecord};

const DEFAULT_PAGE_SIZE: u32 = 50;

const TICKET_COLUMNS: &str = "local_id, remote_id, title, description, category, priority, \
     status, created_at, updated_at, created_by_id, created_by_name, created_by_email, \
     sync_status, created_at_local";

/// Trait for ticket storage operations
#[async_trait]
pub trait TicketRepository {
    /// Insert or replace a ticket keyed by local id
    async fn save(&self, draft: &TicketDraft) -> Result<i64>;

    /// Get a ticket by local id
    async fn get(&self, local_id: i64) -> Result<Option<TicketRecord>>;

    /// List tickets matching the filter, with the total match count
    async fn list(&self, filter: &TicketFilter) -> Result<(Vec<TicketRecord>, u64)>;

    /// Merge partial fields into a ticket; always resets it to pending
    async fn update(&self, local_id: i64, patch: &TicketPatch) -> Result<()>;

    /// List pending tickets in insertion order
    async fn list_unsynced(&self) -> Result<Vec<TicketRecord>>;

    /// Atomically assign a remote id and flip the record to synced
    async fn mark_synced(&self, local_id: i64, remote_id: i64) -> Result<()>;

    /// Bulk upsert server-known tickets without clobbering dirty records
    async fn upsert_remote(&self, drafts: &[TicketDraft]) -> Result<usize>;

    /// Number of tickets still pending
    async fn count_pending(&self) -> Result<u64>;
}

/// libSQL implementation of [`TicketRepository`]
pub struct LibSqlTicketRepository<'a> {
    conn: &'a Connection,
}

impl<'a> LibSqlTicketRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl TicketRepository for LibSqlTicketRepository<'_> {
    async fn save(&self, draft: &TicketDraft) -> Result<i64> {
        let now = Utc::now();
        let created_at = draft.created_at.unwrap_or(now);
        let updated_at = draft.updated_at.unwrap_or(now);
        let sync_status = draft.effective_sync_status();

        if let Some(local_id) = draft.local_id {
            self.conn
                .execute(
                    "INSERT OR REPLACE INTO tickets
                         (local_id, remote_id, title, description, category, priority, status,
                          created_at, updated_at, created_by_id, created_by_name,
                          created_by_email, sync_status, created_at_local)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    params![
                        local_id,
                        draft.remote_id,
                        draft.title.as_str(),
                        draft.description.as_str(),
                        draft.category.as_str(),
                        draft.priority.as_str(),
                        draft.status.as_str(),
                        created_at.to_rfc3339(),
                        updated_at.to_rfc3339(),
                        draft.created_by.id.as_str(),
                        draft.created_by.name.as_str(),
                        draft.created_by.email.as_str(),
                        sync_status.as_str(),
                        now.to_rfc3339(),
                    ],
                )
                .await?;
            return Ok(local_id);
        }

        self.conn
            .execute(
                "INSERT INTO tickets
                     (remote_id, title, description, category, priority, status,
                      created_at, updated_at, created_by_id, created_by_name,
                      created_by_email, sync_status, created_at_local)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    draft.remote_id,
                    draft.title.as_str(),
                    draft.description.as_str(),
                    draft.category.as_str(),
                    draft.priority.as_str(),
                    draft.status.as_str(),
                    created_at.to_rfc3339(),
                    updated_at.to_rfc3339(),
                    draft.created_by.id.as_str(),
                    draft.created_by.name.as_str(),
                    draft.created_by.email.as_str(),
                    sync_status.as_str(),
                    now.to_rfc3339(),
                ],
            )
            .await?;

        Ok(self.conn.last_insert_rowid())
    }

    async fn get(&self, local_id: i64) -> Result<Option<TicketRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE local_id = ?"),
                params![local_id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(parse_ticket(&row)?)),
            None => Ok(None),
        }
    }

    async fn list(&self, filter: &TicketFilter) -> Result<(Vec<TicketRecord>, u64)> {
        let mut where_clause = String::from("WHERE 1=1");
        let mut values: Vec<Value> = Vec::new();

        if let Some(status) = filter.status {
            where_clause.push_str(" AND status = ?");
            values.push(Value::from(status.as_str()));
        }
        if let Some(search) = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            where_clause.push_str(" AND (LOWER(title) LIKE ? OR LOWER(description) LIKE ?)");
            let pattern = format!("%{}%", search.to_lowercase());
            values.push(Value::from(pattern.clone()));
            values.push(Value::from(pattern));
        }

        let mut rows = self
            .conn
            .query(
                &format!("SELECT COUNT(*) FROM tickets {where_clause}"),
                params_from_iter(values.clone()),
            )
            .await?;
        let total: u64 = match rows.next().await? {
            Some(row) => u64::try_from(row.get::<i64>(0)?).unwrap_or(0),
            None => 0,
        };

        let page = if filter.page == 0 { 1 } else { filter.page };
        let page_size = if filter.page_size == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            filter.page_size
        };
        let offset = i64::from(page - 1) * i64::from(page_size);
        values.push(Value::from(i64::from(page_size)));
        values.push(Value::from(offset));

        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {TICKET_COLUMNS} FROM tickets {where_clause}
                     ORDER BY {} LIMIT ? OFFSET ?",
                    filter.sort.order_clause()
                ),
                params_from_iter(values),
            )
            .await?;

        let mut tickets = Vec::new();
        while let Some(row) = rows.next().await? {
            tickets.push(parse_ticket(&row)?);
        }

        Ok((tickets, total))
    }

    async fn update(&self, local_id: i64, patch: &TicketPatch) -> Result<()> {
        let mut setters: Vec<&str> = Vec::new();
        let mut values: Vec<Value> = Vec::new();

        if let Some(title) = &patch.title {
            setters.push("title = ?");
            values.push(Value::from(title.as_str()));
        }
        if let Some(description) = &patch.description {
            setters.push("description = ?");
            values.push(Value::from(description.as_str()));
        }
        if let Some(category) = &patch.category {
            setters.push("category = ?");
            values.push(Value::from(category.as_str()));
        }
        if let Some(priority) = patch.priority {
            setters.push("priority = ?");
            values.push(Value::from(priority.as_str()));
        }
        if let Some(status) = patch.status {
            setters.push("status = ?");
            values.push(Value::from(status.as_str()));
        }
        if let Some(created_by) = &patch.created_by {
            setters.push("created_by_id = ?");
            values.push(Value::from(created_by.id.as_str()));
            setters.push("created_by_name = ?");
            values.push(Value::from(created_by.name.as_str()));
            setters.push("created_by_email = ?");
            values.push(Value::from(created_by.email.as_str()));
        }

        // An edit always invalidates prior sync state, even a no-op one
        setters.push("updated_at = ?");
        values.push(Value::from(Utc::now().to_rfc3339()));
        setters.push("sync_status = 'pending'");

        values.push(Value::from(local_id));
        let sql = format!("UPDATE tickets SET {} WHERE local_id = ?", setters.join(", "));

        let rows = self.conn.execute(&sql, params_from_iter(values)).await?;
        if rows == 0 {
            return Err(Error::NotFound(format!("ticket {local_id}")));
        }

        Ok(())
    }

    async fn list_unsynced(&self) -> Result<Vec<TicketRecord>> {
        let mut rows = self
            .conn
            .query(
                &format!(
                    "SELECT {TICKET_COLUMNS} FROM tickets
                     WHERE sync_status = 'pending' ORDER BY local_id ASC"
                ),
                (),
            )
            .await?;

        let mut tickets = Vec::new();
        while let Some(row) = rows.next().await? {
            tickets.push(parse_ticket(&row)?);
        }

        Ok(tickets)
    }

    async fn mark_synced(&self, local_id: i64, remote_id: i64) -> Result<()> {
        // Single statement: no window where remote id and sync status disagree
        let rows = self
            .conn
            .execute(
                "UPDATE tickets SET remote_id = ?, sync_status = 'synced' WHERE local_id = ?",
                params![remote_id, local_id],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(format!("ticket {local_id}")));
        }

        tracing::debug!("Ticket marked as synced: local {local_id} -> remote {remote_id}");
        Ok(())
    }

    async fn upsert_remote(&self, drafts: &[TicketDraft]) -> Result<usize> {
        if drafts.is_empty() {
            return Ok(0);
        }

        self.conn.execute("BEGIN TRANSACTION", ()).await?;
        let mut applied = 0usize;

        for draft in drafts {
            let Some(remote_id) = draft.remote_id else {
                self.conn.execute("ROLLBACK", ()).await.ok();
                return Err(Error::InvalidInput(
                    "Remote upsert requires a remote id".to_string(),
                ));
            };

            let now = Utc::now();
            let created_at = draft.created_at.unwrap_or(now);
            let updated_at = draft.updated_at.unwrap_or(now);

            // Dirty local records win until they are pushed; only records the
            // server already owns are refreshed here
            let result = self
                .conn
                .execute(
                    "INSERT INTO tickets
                         (remote_id, title, description, category, priority, status,
                          created_at, updated_at, created_by_id, created_by_name,
                          created_by_email, sync_status, created_at_local)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'synced', ?)
                     ON CONFLICT(remote_id) WHERE remote_id IS NOT NULL DO UPDATE SET
                         title = excluded.title,
                         description = excluded.description,
                         category = excluded.category,
                         priority = excluded.priority,
                         status = excluded.status,
                         created_at = excluded.created_at,
                         updated_at = excluded.updated_at,
                         created_by_id = excluded.created_by_id,
                         created_by_name = excluded.created_by_name,
                         created_by_email = excluded.created_by_email,
                         sync_status = 'synced'
                     WHERE tickets.sync_status = 'synced'",
                    params![
                        remote_id,
                        draft.title.as_str(),
                        draft.description.as_str(),
                        draft.category.as_str(),
                        draft.priority.as_str(),
                        draft.status.as_str(),
                        created_at.to_rfc3339(),
                        updated_at.to_rfc3339(),
                        draft.created_by.id.as_str(),
                        draft.created_by.name.as_str(),
                        draft.created_by.email.as_str(),
                        now.to_rfc3339(),
                    ],
                )
                .await;

            match result {
                Ok(rows) => applied += usize::try_from(rows).unwrap_or(0),
                Err(e) => {
                    self.conn.execute("ROLLBACK", ()).await.ok();
                    return Err(e.into());
                }
            }
        }

        if let Err(e) = self.conn.execute("COMMIT", ()).await {
            self.conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }

        Ok(applied)
    }

    async fn count_pending(&self) -> Result<u64> {
        let mut rows = self
            .conn
            .query(
                "SELECT COUNT(*) FROM tickets WHERE sync_status = 'pending'",
                (),
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(u64::try_from(row.get::<i64>(0)?).unwrap_or(0)),
            None => Ok(0),
        }
    }
}

/// Parse an RFC 3339 timestamp persisted by the store
pub(super) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::Database(format!("Invalid timestamp '{raw}': {e}")))
}

/// Read a nullable INTEGER column
pub(super) fn nullable_i64(row: &Row, index: i32) -> Result<Option<i64>> {
    match row.get_value(index)? {
        Value::Integer(value) => Ok(Some(value)),
        _ => Ok(None),
    }
}

/// Read a nullable TEXT column
pub(super) fn nullable_text(row: &Row, index: i32) -> Result<Option<String>> {
    match row.get_value(index)? {
        Value::Text(value) => Ok(Some(value)),
        _ => Ok(None),
    }
}

fn parse_ticket(row: &Row) -> Result<TicketRecord> {
    Ok(TicketRecord {
        local_id: row.get(0)?,
        remote_id: nullable_i64(row, 1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        category: row.get(4)?,
        priority: row.get::<String>(5)?.parse()?,
        status: row.get::<String>(6)?.parse()?,
        created_at: parse_timestamp(&row.get::<String>(7)?)?,
        updated_at: parse_timestamp(&row.get::<String>(8)?)?,
        created_by: Creator {
            id: row.get(9)?,
            name: row.get(10)?,
            email: row.get(11)?,
        },
        sync_status: row.get::<String>(12)?.parse()?,
        created_at_local: parse_timestamp(&row.get::<String>(13)?)?,
    })
}
