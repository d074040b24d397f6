//! notesync CLI
//!
//! Command-line interface for locally stored, remotely synced notes.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use futures::StreamExt;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notesync::error::{NoteSyncError, Result};
use notesync::storage::{SqliteNoteStore, Storage};
use notesync::sync::{HttpRemoteClient, SyncEngine};
use notesync::types::*;

#[derive(Parser)]
#[command(name = "notesync")]
#[command(about = "Synced notes CLI")]
#[command(version)]
struct Cli {
    /// Database path
    #[arg(
        long,
        env = "NOTESYNC_DB_PATH",
        default_value = "~/.local/share/notesync/notes.db"
    )]
    db_path: String,

    /// Storage mode: local (WAL) or cloud-safe
    #[arg(long, env = "NOTESYNC_STORAGE_MODE", default_value = "local")]
    storage_mode: String,

    /// Remote notes service
    #[arg(
        long,
        env = "NOTESYNC_REMOTE_URL",
        default_value = "https://sharednotes.goto.ucsd.edu"
    )]
    remote_url: String,

    /// Delay between remote polls, in milliseconds
    #[arg(long, env = "NOTESYNC_POLL_INTERVAL_MS", default_value = "3000")]
    poll_interval_ms: u64,

    /// Upper bound on one remote fetch, in milliseconds
    #[arg(long, env = "NOTESYNC_FETCH_TIMEOUT_MS", default_value = "1000")]
    fetch_timeout_ms: u64,

    /// Emit logs as JSON lines
    #[arg(long, env = "NOTESYNC_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the local copy of a note
    Get {
        /// Note title
        title: String,
    },
    /// List local notes
    List,
    /// Write a note locally and push it to the remote
    Put {
        /// Note title
        title: String,
        /// Note content
        content: String,
    },
    /// Delete the local copy of a note
    Delete {
        /// Note title
        title: String,
    },
    /// Follow a note, printing every change from either side
    Watch {
        /// Note title
        title: String,
    },
    /// Fetch the remote copy of a note once
    Pull {
        /// Note title
        title: String,
    },
    /// Check connectivity with the remote service
    Ping {
        /// Message to echo back
        #[arg(default_value = "hello")]
        message: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so note output can be piped
    tracing_subscriber::registry()
        .with(cli.log_json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!cli.log_json).then(|| {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false)
        }))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let db_path = shellexpand::tilde(&cli.db_path).to_string();
    let storage = Storage::open(StorageConfig {
        db_path,
        storage_mode: cli.storage_mode.parse()?,
    })?;
    if let Some(warning) = storage.storage_mode_warning() {
        tracing::warn!("{}", warning);
    }

    let remote = Arc::new(HttpRemoteClient::new(RemoteConfig::new(&cli.remote_url))?);
    let engine = SyncEngine::new(
        Arc::new(SqliteNoteStore::new(storage)),
        remote.clone(),
        SyncConfig {
            poll_interval_ms: cli.poll_interval_ms,
            fetch_timeout_ms: cli.fetch_timeout_ms,
        },
    )?;

    match cli.command {
        Commands::Get { title } => {
            let local = engine.get_local(&title)?;
            let note = local
                .borrow()
                .clone()
                .ok_or_else(|| NoteSyncError::NotFound(title.clone()))?;
            println!("{}", serde_json::to_string_pretty(&note)?);
        }

        Commands::List => {
            let notes = engine.get_all_local()?;
            for note in notes.borrow().iter() {
                println!(
                    "{} ({}) - {}",
                    note.title(),
                    note.updated_at(),
                    truncate(note.content(), 60)
                );
            }
        }

        Commands::Put { title, content } => {
            let note = Note::new(title, content)?;
            let stamped = engine.upsert_local(&note)?;
            engine
                .upsert_remote(&stamped)?
                .await
                .map_err(|e| NoteSyncError::Internal(e.to_string()))?;
            println!("Saved '{}' at {}", stamped.title(), stamped.updated_at());
        }

        Commands::Delete { title } => {
            let local = engine.get_local(&title)?;
            let note = local
                .borrow()
                .clone()
                .ok_or_else(|| NoteSyncError::NotFound(title.clone()))?;
            engine.delete_local(&note)?;
            println!("Deleted '{}'", title);
        }

        Commands::Watch { title } => {
            let mut updates = engine.get_synced(&title)?.into_stream();
            loop {
                tokio::select! {
                    next = updates.next() => match next {
                        Some(Some(note)) => println!("{}", note.to_json()?),
                        Some(None) => println!("(no note named '{}')", title),
                        None => break,
                    },
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            engine.shutdown();
        }

        Commands::Pull { title } => match remote.get_note(&title).await? {
            Some(note) => println!("{}", serde_json::to_string_pretty(&note)?),
            None => println!("Remote has no note named '{}'", title),
        },

        Commands::Ping { message } => {
            let body = remote.echo(&message).await?;
            println!("{}", body);
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    let first_line = s.lines().next().unwrap_or(s);
    if first_line.chars().count() <= max {
        first_line.to_string()
    } else {
        let cut: String = first_line.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}
