//! Deskline CLI - Offline-first ticket tracking from the terminal
//!
//! Every write lands in the local store first; pushing to the ticket service
//! is best-effort and never blocks capturing work.

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use deskline_core::api::{ApiConfig, HttpTicketApi, TicketApi};
use deskline_core::db::TicketStore;
use deskline_core::models::{
    CommentDraft, Creator, TicketDraft, TicketFilter, TicketPatch, TicketPriority, TicketRecord,
    TicketStatus,
};
use deskline_core::sync::{ReachabilityMonitor, SyncEngine, SyncOutcome};
use serde::Serialize;
use thiserror::Error;

const DEFAULT_API_URL: &str = "http://localhost:3000";

#[derive(Parser)]
#[command(name = "deskline")]
#[command(about = "Track support tickets from the command line, online or not")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional path to the local database file
    #[arg(long, global = true, value_name = "PATH")]
    db_path: Option<PathBuf>,

    /// Base URL of the ticket service
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new ticket
    #[command(alias = "new")]
    Add {
        /// Ticket title
        title: String,
        /// What is going on
        #[arg(short, long)]
        description: String,
        /// Free-form category
        #[arg(long, default_value = "general")]
        category: String,
        #[arg(long, value_enum, default_value_t = PriorityArg::Medium)]
        priority: PriorityArg,
    },
    /// List tickets
    List {
        /// Filter by workflow status
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
        /// Case-insensitive search over title and description
        #[arg(long)]
        search: Option<String>,
        /// 1-based page number
        #[arg(long, default_value = "1")]
        page: u32,
        /// Tickets per page
        #[arg(long, default_value = "20")]
        page_size: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one ticket with its comments
    Show {
        /// Local ticket id
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit fields of an existing ticket
    Edit {
        /// Local ticket id
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(short, long)]
        description: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long, value_enum)]
        priority: Option<PriorityArg>,
        #[arg(long, value_enum)]
        status: Option<StatusArg>,
    },
    /// Add a comment to a ticket
    Comment {
        /// Local ticket id
        id: i64,
        /// Comment text
        text: String,
    },
    /// Push pending records to the ticket service
    Sync,
    /// Show connectivity and pending-work status
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum PriorityArg {
    Low,
    Medium,
    High,
    Critical,
}

impl From<PriorityArg> for TicketPriority {
    fn from(arg: PriorityArg) -> Self {
        match arg {
            PriorityArg::Low => Self::Low,
            PriorityArg::Medium => Self::Medium,
            PriorityArg::High => Self::High,
            PriorityArg::Critical => Self::Critical,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum StatusArg {
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl From<StatusArg> for TicketStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Open => Self::Open,
            StatusArg::InProgress => Self::InProgress,
            StatusArg::Resolved => Self::Resolved,
            StatusArg::Closed => Self::Closed,
        }
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] deskline_core::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Ticket not found: {0}")]
    TicketNotFound(i64),
    #[error("Nothing to update; pass at least one field flag")]
    EmptyPatch,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("deskline=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let api_url = resolve_api_url(cli.api_url);
    let ctx = build_context(&db_path, &api_url).await?;

    match cli.command {
        Commands::Add {
            title,
            description,
            category,
            priority,
        } => run_add(&ctx, &title, &description, &category, priority).await?,
        Commands::List {
            status,
            search,
            page,
            page_size,
            json,
        } => {
            let filter = build_filter(status, search, page, page_size);
            run_list(&ctx, &filter, json).await?;
        }
        Commands::Show { id, json } => run_show(&ctx, id, json).await?,
        Commands::Edit {
            id,
            title,
            description,
            category,
            priority,
            status,
        } => {
            let patch = build_patch(title, description, category, priority, status)?;
            run_edit(&ctx, id, &patch).await?;
        }
        Commands::Comment { id, text } => run_comment(&ctx, id, &text).await?,
        Commands::Sync => run_sync(&ctx).await,
        Commands::Status { json } => run_status(&ctx, json).await?,
    }

    Ok(())
}

struct AppContext {
    store: TicketStore,
    engine: SyncEngine,
}

async fn build_context(db_path: &Path, api_url: &str) -> Result<AppContext, CliError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let store = TicketStore::open(db_path).await?;
    tracing::debug!("Using database at {}", db_path.display());

    let config = ApiConfig::new(api_url)?;
    let api: Arc<dyn TicketApi> = Arc::new(HttpTicketApi::new(config)?);
    let monitor = Arc::new(ReachabilityMonitor::new(api.clone()));
    // A CLI process runs on demand; assume the link is up and let the
    // health probe decide whether the service is actually reachable
    monitor.set_network_available(true).await;

    let engine = SyncEngine::new(store.clone(), api, monitor);
    Ok(AppContext { store, engine })
}

async fn run_add(
    ctx: &AppContext,
    title: &str,
    description: &str,
    category: &str,
    priority: PriorityArg,
) -> Result<(), CliError> {
    let draft = TicketDraft::new(
        title,
        description,
        category,
        priority.into(),
        creator_identity(),
    )?;
    let ticket = ctx.store.create_ticket(&draft).await?;
    println!("Created ticket {}", ticket.local_id);

    let outcome = ctx.engine.sync().await;
    println!("{}", describe_outcome(&outcome));
    Ok(())
}

#[derive(Debug, Serialize)]
struct TicketListItem {
    local_id: i64,
    remote_id: Option<i64>,
    title: String,
    status: String,
    priority: String,
    sync_status: String,
    updated_at: DateTime<Utc>,
}

fn ticket_to_list_item(ticket: &TicketRecord) -> TicketListItem {
    TicketListItem {
        local_id: ticket.local_id,
        remote_id: ticket.remote_id,
        title: ticket.title.clone(),
        status: ticket.status.to_string(),
        priority: ticket.priority.to_string(),
        sync_status: ticket.sync_status.to_string(),
        updated_at: ticket.updated_at,
    }
}

async fn run_list(ctx: &AppContext, filter: &TicketFilter, as_json: bool) -> Result<(), CliError> {
    let (tickets, total) = ctx.store.list_tickets(filter).await?;

    if as_json {
        let items = tickets
            .iter()
            .map(ticket_to_list_item)
            .collect::<Vec<TicketListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in format_ticket_lines(&tickets) {
            println!("{line}");
        }
        println!("{} of {total} ticket(s)", tickets.len());
    }

    Ok(())
}

async fn run_show(ctx: &AppContext, id: i64, as_json: bool) -> Result<(), CliError> {
    let ticket = ctx
        .store
        .get_ticket(id)
        .await?
        .ok_or(CliError::TicketNotFound(id))?;
    let comments = ctx.store.comments_for_ticket(id).await?;

    if as_json {
        #[derive(Serialize)]
        struct CommentView {
            text: String,
            author: String,
            created_at: DateTime<Utc>,
            sync_status: String,
        }
        #[derive(Serialize)]
        struct TicketView {
            #[serde(flatten)]
            ticket: TicketListItem,
            description: String,
            category: String,
            comments: Vec<CommentView>,
        }

        let view = TicketView {
            ticket: ticket_to_list_item(&ticket),
            description: ticket.description.clone(),
            category: ticket.category.clone(),
            comments: comments
                .iter()
                .map(|c| CommentView {
                    text: c.text.clone(),
                    author: c.created_by.name.clone(),
                    created_at: c.created_at,
                    sync_status: c.sync_status.to_string(),
                })
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!("#{} {}", ticket.local_id, ticket.title);
    println!(
        "{} | {} | {} | {}",
        ticket.status,
        ticket.priority,
        ticket.category,
        sync_marker(&ticket)
    );
    println!();
    println!("{}", ticket.description);

    if !comments.is_empty() {
        println!();
        println!("Comments:");
        let now = Utc::now();
        for comment in &comments {
            println!(
                "  [{}] {}: {}",
                format_relative_time(comment.created_at, now),
                comment.created_by.name,
                comment.text
            );
        }
    }

    Ok(())
}

async fn run_edit(ctx: &AppContext, id: i64, patch: &TicketPatch) -> Result<(), CliError> {
    let updated = ctx.store.update_ticket(id, patch).await.map_err(|e| {
        if matches!(e, deskline_core::Error::NotFound(_)) {
            CliError::TicketNotFound(id)
        } else {
            CliError::Core(e)
        }
    })?;
    println!("Updated ticket {}", updated.local_id);

    let outcome = ctx.engine.sync().await;
    println!("{}", describe_outcome(&outcome));
    Ok(())
}

async fn run_comment(ctx: &AppContext, id: i64, text: &str) -> Result<(), CliError> {
    // The owning ticket must exist locally, synced or not
    ctx.store
        .get_ticket(id)
        .await?
        .ok_or(CliError::TicketNotFound(id))?;

    let draft = CommentDraft::new(id, text, creator_identity())?;
    ctx.store.add_comment(&draft).await?;
    println!("Comment added to ticket {id}");

    let outcome = ctx.engine.sync().await;
    println!("{}", describe_outcome(&outcome));
    Ok(())
}

async fn run_sync(ctx: &AppContext) {
    let outcome = ctx.engine.sync().await;
    println!("{}", describe_outcome(&outcome));
}

async fn run_status(ctx: &AppContext, as_json: bool) -> Result<(), CliError> {
    let snapshot = ctx.engine.snapshot().await?;

    if as_json {
        #[derive(Serialize)]
        struct StatusView {
            online: bool,
            pending_tickets: u64,
            pending_comments: u64,
            last_sync: Option<DateTime<Utc>>,
            last_errors: Vec<String>,
        }
        let view = StatusView {
            online: snapshot.online,
            pending_tickets: snapshot.pending_tickets,
            pending_comments: snapshot.pending_comments,
            last_sync: snapshot.last_sync,
            last_errors: snapshot.last_errors,
        };
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!(
        "Service: {}",
        if snapshot.online { "reachable" } else { "offline" }
    );
    println!(
        "Pending: {} ticket(s), {} comment(s)",
        snapshot.pending_tickets, snapshot.pending_comments
    );
    match snapshot.last_sync {
        Some(at) => println!("Last sync: {}", format_relative_time(at, Utc::now())),
        None => println!("Last sync: never"),
    }
    if !snapshot.last_errors.is_empty() {
        println!("Recent failures:");
        for error in &snapshot.last_errors {
            println!("  {error}");
        }
    }

    Ok(())
}

fn build_filter(
    status: Option<StatusArg>,
    search: Option<String>,
    page: u32,
    page_size: u32,
) -> TicketFilter {
    TicketFilter {
        status: status.map(Into::into),
        search,
        page,
        page_size,
        ..TicketFilter::default()
    }
}

fn build_patch(
    title: Option<String>,
    description: Option<String>,
    category: Option<String>,
    priority: Option<PriorityArg>,
    status: Option<StatusArg>,
) -> Result<TicketPatch, CliError> {
    let patch = TicketPatch {
        title,
        description,
        category,
        priority: priority.map(Into::into),
        status: status.map(Into::into),
        created_by: None,
    };

    if patch.is_empty() {
        return Err(CliError::EmptyPatch);
    }
    Ok(patch)
}

fn describe_outcome(outcome: &SyncOutcome) -> String {
    match outcome {
        SyncOutcome::SkippedOffline => {
            "Saved locally; will sync when the service is reachable".to_string()
        }
        SyncOutcome::Completed(report) if report.failures.is_empty() => format!(
            "Synced ({} pushed, {} pulled)",
            report.tickets_pushed + report.comments_pushed,
            report.tickets_pulled
        ),
        SyncOutcome::Completed(report) => format!(
            "Partially synced: {} pushed, {} failed; failed records stay queued",
            report.tickets_pushed + report.comments_pushed,
            report.failures.len()
        ),
        SyncOutcome::Aborted(reason) => format!("Sync aborted: {reason}"),
    }
}

fn sync_marker(ticket: &TicketRecord) -> &'static str {
    if ticket.is_dirty() {
        "not synced"
    } else {
        "synced"
    }
}

fn format_ticket_lines(tickets: &[TicketRecord]) -> Vec<String> {
    let now = Utc::now();
    tickets
        .iter()
        .map(|ticket| {
            let marker = if ticket.is_dirty() { "*" } else { " " };
            let title = ticket_title_preview(ticket, 40);
            format!(
                "{:>4}{marker} {:<11} {:<8} {:<40}  {}",
                ticket.local_id,
                ticket.status.to_string(),
                ticket.priority.to_string(),
                title,
                format_relative_time(ticket.updated_at, now)
            )
        })
        .collect()
}

fn ticket_title_preview(ticket: &TicketRecord, max_chars: usize) -> String {
    let collapsed = ticket
        .title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

fn format_relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(at).num_milliseconds().max(0);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

fn creator_identity() -> Creator {
    let name = env::var("DESKLINE_USER_NAME")
        .or_else(|_| env::var("USER"))
        .unwrap_or_else(|_| "local".to_string());
    let email = env::var("DESKLINE_USER_EMAIL").unwrap_or_default();
    let id = env::var("DESKLINE_USER_ID").unwrap_or_else(|_| name.clone());
    Creator::new(id, name, email)
}

fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("DESKLINE_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("deskline")
        .join("deskline.db")
}

fn resolve_api_url(cli_api_url: Option<String>) -> String {
    cli_api_url
        .or_else(|| env::var("DESKLINE_API_URL").ok())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string())
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use deskline_core::models::SyncStatus;

    use super::*;

    fn record(title: &str, dirty: bool) -> TicketRecord {
        let now = Utc::now();
        TicketRecord {
            local_id: 1,
            remote_id: if dirty { None } else { Some(9) },
            title: title.to_string(),
            description: "desc".to_string(),
            category: "general".to_string(),
            priority: TicketPriority::High,
            status: TicketStatus::Open,
            created_at: now,
            updated_at: now,
            created_by: Creator::default(),
            sync_status: if dirty {
                SyncStatus::Pending
            } else {
                SyncStatus::Synced
            },
            created_at_local: now,
        }
    }

    #[test]
    fn value_enums_map_onto_core_enums() {
        assert_eq!(TicketPriority::from(PriorityArg::Critical), TicketPriority::Critical);
        assert_eq!(TicketStatus::from(StatusArg::InProgress), TicketStatus::InProgress);
    }

    #[test]
    fn build_patch_rejects_empty_edits() {
        assert!(matches!(
            build_patch(None, None, None, None, None),
            Err(CliError::EmptyPatch)
        ));

        let patch = build_patch(Some("new title".to_string()), None, None, None, None).unwrap();
        assert_eq!(patch.title.as_deref(), Some("new title"));
    }

    #[test]
    fn build_filter_carries_all_arguments() {
        let filter = build_filter(Some(StatusArg::Open), Some("login".to_string()), 2, 10);
        assert_eq!(filter.status, Some(TicketStatus::Open));
        assert_eq!(filter.search.as_deref(), Some("login"));
        assert_eq!(filter.page, 2);
        assert_eq!(filter.page_size, 10);
    }

    #[test]
    fn ticket_lines_flag_unsynced_records() {
        let lines = format_ticket_lines(&[record("dirty one", true), record("clean one", false)]);
        assert!(lines[0].contains("1* "));
        assert!(lines[0].contains("dirty one"));
        assert!(lines[1].contains("1  "));
    }

    #[test]
    fn long_titles_are_truncated_with_ellipsis() {
        let ticket = record(
            "This is a very long ticket title that should definitely be shortened",
            true,
        );
        let preview = ticket_title_preview(&ticket, 20);
        assert_eq!(preview.chars().count(), 20);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn format_relative_time_units() {
        let now = Utc::now();
        assert_eq!(format_relative_time(now - Duration::seconds(30), now), "just now");
        assert_eq!(format_relative_time(now - Duration::minutes(2), now), "2m ago");
        assert_eq!(format_relative_time(now - Duration::hours(3), now), "3h ago");
        assert_eq!(format_relative_time(now - Duration::days(2), now), "2d ago");
    }

    #[test]
    fn describe_outcome_summarizes_each_variant() {
        assert!(describe_outcome(&SyncOutcome::SkippedOffline).contains("Saved locally"));

        let clean = SyncOutcome::Completed(deskline_core::sync::SyncReport {
            tickets_pushed: 2,
            comments_pushed: 1,
            tickets_pulled: 4,
            comments_deferred: 0,
            failures: Vec::new(),
        });
        assert_eq!(describe_outcome(&clean), "Synced (3 pushed, 4 pulled)");

        let dirty = SyncOutcome::Completed(deskline_core::sync::SyncReport {
            tickets_pushed: 1,
            comments_pushed: 0,
            tickets_pulled: 0,
            comments_deferred: 0,
            failures: vec!["Ticket 'x': boom".to_string()],
        });
        assert!(describe_outcome(&dirty).contains("Partially synced"));

        assert!(describe_outcome(&SyncOutcome::Aborted("db gone".to_string()))
            .contains("Sync aborted: db gone"));
    }

    #[test]
    fn db_path_resolution_prefers_explicit_flag() {
        let explicit = resolve_db_path(Some(PathBuf::from("/tmp/custom.db")));
        assert_eq!(explicit, PathBuf::from("/tmp/custom.db"));
    }
}
