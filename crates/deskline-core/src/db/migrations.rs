//! Database migrations

use libsql::Connection;

use crate::error::Result;

/// Current schema version
const CURRENT_VERSION: i32 = 2;

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = get_version(conn).await?;

    if version < 1 {
        migrate_v1(conn).await?;
    }
    if version < 2 {
        migrate_v2(conn).await?;
    }

    Ok(())
}

/// Get the current schema version
async fn get_version(conn: &Connection) -> Result<i32> {
    // Check if schema_version table exists
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            (),
        )
        .await?;

    let exists: bool = if let Some(row) = rows.next().await? {
        row.get::<i32>(0)? != 0
    } else {
        false
    };

    if !exists {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

/// Migration to version 1: tickets and comments
async fn migrate_v1(conn: &Connection) -> Result<()> {
    // libsql doesn't have execute_batch, so we run each statement separately
    // inside one transaction

    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        // Schema version tracking
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        )",
        // Tickets table
        "CREATE TABLE IF NOT EXISTS tickets (
            local_id INTEGER PRIMARY KEY AUTOINCREMENT,
            remote_id INTEGER,
            title TEXT NOT NULL,
            description TEXT NOT NULL,
            category TEXT NOT NULL,
            priority TEXT NOT NULL,
            status TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            created_by_id TEXT NOT NULL DEFAULT '',
            created_by_name TEXT NOT NULL DEFAULT '',
            created_by_email TEXT NOT NULL DEFAULT '',
            sync_status TEXT NOT NULL DEFAULT 'pending',
            created_at_local TEXT NOT NULL
        )",
        "CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status)",
        "CREATE INDEX IF NOT EXISTS idx_tickets_sync_status ON tickets(sync_status)",
        "CREATE INDEX IF NOT EXISTS idx_tickets_created ON tickets(created_at DESC)",
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_tickets_remote_id
            ON tickets(remote_id) WHERE remote_id IS NOT NULL",
        // Comments table
        "CREATE TABLE IF NOT EXISTS ticket_comments (
            local_id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticket_local_id INTEGER NOT NULL
                REFERENCES tickets(local_id) ON DELETE CASCADE,
            text TEXT NOT NULL,
            created_by_id TEXT NOT NULL DEFAULT '',
            created_by_name TEXT NOT NULL DEFAULT '',
            created_by_email TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            sync_status TEXT NOT NULL DEFAULT 'pending',
            remote_id INTEGER
        )",
        "CREATE INDEX IF NOT EXISTS idx_comments_ticket ON ticket_comments(ticket_local_id)",
        "CREATE INDEX IF NOT EXISTS idx_comments_sync_status ON ticket_comments(sync_status)",
        // Record migration version
        "INSERT INTO schema_version (version) VALUES (1)",
    ];

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version 1");
    Ok(())
}

/// Migration to version 2: attachment metadata
async fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    let statements = [
        "CREATE TABLE IF NOT EXISTS ticket_attachments (
            local_id INTEGER PRIMARY KEY AUTOINCREMENT,
            ticket_local_id INTEGER NOT NULL
                REFERENCES tickets(local_id) ON DELETE CASCADE,
            name TEXT NOT NULL,
            local_uri TEXT NOT NULL,
            remote_url TEXT,
            mime_type TEXT NOT NULL,
            size_bytes INTEGER NOT NULL,
            sync_status TEXT NOT NULL DEFAULT 'pending',
            remote_id INTEGER
        )",
        "CREATE INDEX IF NOT EXISTS idx_attachments_ticket ON ticket_attachments(ticket_local_id)",
        "CREATE INDEX IF NOT EXISTS idx_attachments_sync_status
            ON ticket_attachments(sync_status)",
        "INSERT INTO schema_version (version) VALUES (2)",
    ];

    for stmt in statements {
        if let Err(e) = conn.execute(stmt, ()).await {
            conn.execute("ROLLBACK", ()).await.ok();
            return Err(e.into());
        }
    }

    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Migrated database to version {CURRENT_VERSION}");
    Ok(())
}
