//! SyncQ CLI
//!
//! Command-line tools for inspecting and repairing a file-backed sync queue.
//!
//! # Commands
//!
//! - `inspect` - Display queue counters and items
//! - `retry-failed` - Re-queue items that ran out of attempts
//! - `compact` - Drop synced items
//! - `remove` - Delete one item
//! - `clear` - Delete every item
//! - `enqueue` - Queue a mutation by hand

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// SyncQ command-line queue tools.
#[derive(Parser)]
#[command(name = "syncq")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the queue file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display queue counters and items
    Inspect {
        /// List every item
        #[arg(short, long)]
        items: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Move failed items back to pending with attempts reset
    RetryFailed,

    /// Remove synced items
    Compact {
        /// Dry run - show what would be done
        #[arg(short, long)]
        dry_run: bool,
    },

    /// Remove one item by id
    Remove {
        /// Item id (UUID)
        id: String,
    },

    /// Remove every item
    Clear,

    /// Queue a mutation
    Enqueue {
        /// Operation (create, update, delete)
        operation: String,

        /// Resource type
        resource_type: String,

        /// Resource id
        resource_id: String,

        /// Payload as a JSON document
        #[arg(long)]
        payload: Option<String>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Inspect { items, format } => {
            let path = cli.path.ok_or("Queue path required for inspect")?;
            commands::inspect::run(&path, items, &format)?;
        }
        Commands::RetryFailed => {
            let path = cli.path.ok_or("Queue path required for retry-failed")?;
            commands::maintain::retry_failed(&path)?;
        }
        Commands::Compact { dry_run } => {
            let path = cli.path.ok_or("Queue path required for compact")?;
            commands::maintain::compact(&path, dry_run)?;
        }
        Commands::Remove { id } => {
            let path = cli.path.ok_or("Queue path required for remove")?;
            commands::maintain::remove(&path, &id)?;
        }
        Commands::Clear => {
            let path = cli.path.ok_or("Queue path required for clear")?;
            commands::maintain::clear(&path)?;
        }
        Commands::Enqueue {
            operation,
            resource_type,
            resource_id,
            payload,
        } => {
            let path = cli.path.ok_or("Queue path required for enqueue")?;
            commands::enqueue::run(
                &path,
                &operation,
                &resource_type,
                &resource_id,
                payload.as_deref(),
            )?;
        }
        Commands::Version => {
            println!("SyncQ CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Snapshot format v{}", syncq_engine::SNAPSHOT_VERSION);
        }
    }

    Ok(())
}
