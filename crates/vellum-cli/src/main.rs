#![forbid(unsafe_code)]

//! `vlm`: inspect and maintain a vellum draft store from the terminal.
//!
//! The editor surface talks to the store through `vellum-engine`; this
//! binary is for operators and the curious — listing drafts, walking
//! version history, restoring a snapshot, or discarding a stuck AUTO slot.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use vellum_core::clock::{Clock, SystemClock};
use vellum_core::config::{HistoryConfig, default_data_dir};
use vellum_core::ids::{DraftId, SessionId, SnapshotId};
use vellum_core::ledger::HistoryTarget;
use vellum_core::model::Draft;
use vellum_core::store::{DiscardTarget, DraftStore};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "vellum: draft store inspection and maintenance",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Path to the store database (defaults to the user data directory).
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        about = "List drafts for an owner",
        after_help = "EXAMPLES:\n    # Manual drafts plus the newest autosave slot\n    vlm drafts --owner alice\n\n    # Machine-readable\n    vlm drafts --owner alice --json"
    )]
    Drafts {
        /// Owner identity to list for.
        #[arg(long)]
        owner: String,
    },

    #[command(
        about = "Show version history for a draft or session",
        after_help = "EXAMPLES:\n    vlm history dr-ab12cd34\n    vlm history ss-ab12cd34   # includes snapshots of torn-down drafts"
    )]
    History {
        /// Draft id (dr-…) or session id (ss-…).
        target: String,
    },

    #[command(
        about = "Roll a draft back to a snapshot's content",
        long_about = "Roll a draft back to a snapshot's content. The content being \
                      replaced is first recorded as a restore snapshot, so this is \
                      itself undoable."
    )]
    Restore {
        /// Snapshot id (sn-…).
        snapshot: String,
    },

    #[command(
        about = "Discard an autosave slot and its history",
        after_help = "EXAMPLES:\n    vlm discard --draft dr-ab12cd34\n    vlm discard --owner alice --session ss-ab12cd34"
    )]
    Discard {
        /// Draft id of the AUTO slot.
        #[arg(long, conflicts_with_all = ["owner", "session"])]
        draft: Option<String>,

        /// Owner identity (with --session).
        #[arg(long, requires = "session")]
        owner: Option<String>,

        /// Session id (with --owner).
        #[arg(long, requires = "owner")]
        session: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let store_path = match cli.store.clone() {
        Some(path) => path,
        None => default_data_dir()
            .context("no user data directory; pass --store")?
            .join("store.sqlite3"),
    };
    let mut store = DraftStore::open(&store_path, &HistoryConfig::default())
        .with_context(|| format!("open store at {}", store_path.display()))?;
    tracing::debug!(store = %store_path.display(), "store opened");

    match &cli.command {
        Commands::Drafts { owner } => cmd_drafts(&store, owner, cli.json),
        Commands::History { target } => cmd_history(&store, target, cli.json),
        Commands::Restore { snapshot } => cmd_restore(&mut store, snapshot, cli.json),
        Commands::Discard {
            draft,
            owner,
            session,
        } => cmd_discard(&mut store, draft.as_deref(), owner.as_deref(), session.as_deref()),
    }
}

fn describe(draft: &Draft, now_ms: i64) -> String {
    let age = vellum_core::model::AgeBucket::from_age_ms(now_ms - draft.updated_at_ms);
    let name = draft.name.as_deref().unwrap_or("(autosave)");
    let title = if draft.fields.title.is_empty() {
        "(untitled)"
    } else {
        &draft.fields.title
    };
    format!(
        "{}  v{:<3} {}  {:24} {}",
        draft.draft_id, draft.version, age, name, title
    )
}

fn cmd_drafts(store: &DraftStore, owner: &str, json: bool) -> Result<()> {
    let auto = store.latest_auto_for_owner(owner)?;
    let manual = store.list_manual(owner)?;

    if json {
        let value = serde_json::json!({ "auto": auto, "manual": manual });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    let now_ms = SystemClock.now_ms();
    match &auto {
        Some(draft) => println!("{}", describe(draft, now_ms)),
        None => println!("(no autosave slot)"),
    }
    for draft in &manual {
        println!("{}", describe(draft, now_ms));
    }
    Ok(())
}

fn cmd_history(store: &DraftStore, target: &str, json: bool) -> Result<()> {
    let draft_id;
    let session_id;
    let target = if let Ok(id) = DraftId::new(target) {
        draft_id = id;
        HistoryTarget::Draft(&draft_id)
    } else if let Ok(id) = SessionId::new(target) {
        session_id = id;
        HistoryTarget::Session(&session_id)
    } else {
        bail!("'{target}' is neither a draft id (dr-…) nor a session id (ss-…)");
    };

    let snapshots = store.history(target)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshots)?);
        return Ok(());
    }

    if snapshots.is_empty() {
        println!("(no snapshots)");
        return Ok(());
    }

    let now_ms = SystemClock.now_ms();
    for snapshot in &snapshots {
        let title = if snapshot.fields.title.is_empty() {
            "(untitled)"
        } else {
            &snapshot.fields.title
        };
        println!(
            "{}  v{:<3} {:13} {}  {}",
            snapshot.snapshot_id,
            snapshot.version_number,
            snapshot.reason.to_string(),
            snapshot.age_bucket(now_ms),
            title
        );
    }
    Ok(())
}

fn cmd_restore(store: &mut DraftStore, snapshot: &str, json: bool) -> Result<()> {
    let snapshot_id =
        SnapshotId::new(snapshot).with_context(|| format!("parse snapshot id '{snapshot}'"))?;

    let draft = store.restore(&snapshot_id, SystemClock.now_ms())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&draft)?);
    } else {
        println!(
            "restored {} to snapshot {} (now v{})",
            draft.draft_id, snapshot_id, draft.version
        );
    }
    Ok(())
}

fn cmd_discard(
    store: &mut DraftStore,
    draft: Option<&str>,
    owner: Option<&str>,
    session: Option<&str>,
) -> Result<()> {
    let removed = match (draft, owner, session) {
        (Some(draft), _, _) => {
            let draft_id =
                DraftId::new(draft).with_context(|| format!("parse draft id '{draft}'"))?;
            store.discard(DiscardTarget::Draft(&draft_id))?
        }
        (None, Some(owner), Some(session)) => {
            let session_id = SessionId::new(session)
                .with_context(|| format!("parse session id '{session}'"))?;
            store.discard(DiscardTarget::Session {
                owner_id: owner,
                session_id: &session_id,
            })?
        }
        _ => bail!("pass --draft, or --owner together with --session"),
    };

    if removed {
        println!("discarded");
    } else {
        println!("nothing to discard");
    }
    Ok(())
}
