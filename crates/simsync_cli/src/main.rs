//! simsync CLI
//!
//! Command-line access to a simsync document store, going through the same
//! synchronizer the application uses.
//!
//! # Commands
//!
//! - `get` - Load one document and print its state
//! - `list` - Load a whole collection
//! - `put` - Create a document
//! - `edit` - Load, edit one field, and save a document
//! - `delete` - Delete a document

mod commands;

use clap::{Parser, Subcommand};
use simsync_client::ClientConfig;
use std::process::ExitCode;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// simsync document store client.
#[derive(Parser)]
#[command(name = "simsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the document store
    #[arg(global = true, long, env = "SIMSYNC_BASE_URL")]
    base_url: Option<String>,

    /// Bearer token
    #[arg(global = true, long, env = "SIMSYNC_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Seconds to wait for a token before giving up
    #[arg(global = true, long, env = "SIMSYNC_QUEUE_TIMEOUT_SECS", default_value = "10")]
    queue_timeout: u64,

    /// Per-request timeout in seconds
    #[arg(global = true, long, default_value = "30")]
    request_timeout: u64,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load one document and print its state
    Get {
        /// Collection name
        collection: String,
        /// Document id
        id: String,
    },

    /// Load every document of a collection
    List {
        /// Collection name
        collection: String,
    },

    /// Create a document
    Put {
        /// Collection name
        collection: String,
        /// Document body (JSON)
        json: String,
        /// Document id (defaults to a random UUID)
        #[arg(long)]
        id: Option<String>,
    },

    /// Load a document, set one field, and save it
    Edit {
        /// Collection name
        collection: String,
        /// Document id
        id: String,
        /// JSON pointer of the field to set (e.g. /name)
        pointer: String,
        /// New field value (JSON)
        json: String,
    },

    /// Delete a document
    Delete {
        /// Collection name
        collection: String,
        /// Document id
        id: String,
    },

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the JSON output.
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Version = cli.command {
        println!("simsync CLI v{}", env!("CARGO_PKG_VERSION"));
        println!("simsync state v{}", simsync_state::VERSION);
        return Ok(ExitCode::SUCCESS);
    }

    let base_url = cli
        .base_url
        .ok_or("Document store URL required (--base-url or SIMSYNC_BASE_URL)")?;
    let mut config = ClientConfig::new(base_url)
        .with_queue_timeout(Duration::from_secs(cli.queue_timeout))
        .with_request_timeout(Duration::from_secs(cli.request_timeout));
    if let Some(token) = cli.token.filter(|t| !t.is_empty()) {
        config = config.with_token(token);
    }
    let ctx = commands::Context::connect(config)?;

    let outcome = match cli.command {
        Commands::Get { collection, id } => commands::get::run(&ctx, &collection, &id).await?,
        Commands::List { collection } => commands::list::run(&ctx, &collection).await?,
        Commands::Put {
            collection,
            json,
            id,
        } => commands::put::run(&ctx, &collection, id, &json).await?,
        Commands::Edit {
            collection,
            id,
            pointer,
            json,
        } => commands::edit::run(&ctx, &collection, &id, &pointer, &json).await?,
        Commands::Delete { collection, id } => {
            commands::delete::run(&ctx, &collection, &id).await?
        }
        Commands::Version => commands::Outcome::Settled,
    };

    Ok(outcome.exit_code())
}
