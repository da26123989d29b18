//! CLI administration tool for shortly.
//!
//! Provides commands for shortening and resolving URLs, managing an
//! owner's links, and checking storage health, against whichever
//! backend the environment selects.
//!
//! # Usage
//!
//! ```bash
//! # Shorten a URL
//! cargo run --bin admin -- shorten --owner alice https://example.com/page
//!
//! # Shorten several URLs atomically
//! cargo run --bin admin -- batch --owner alice https://a.example/1 https://a.example/2
//!
//! # Resolve a code
//! cargo run --bin admin -- resolve Ab3xYz9Q
//!
//! # List an owner's links
//! cargo run --bin admin -- list alice
//!
//! # Queue links for deletion
//! cargo run --bin admin -- delete --owner alice Ab3xYz9Q Cd5wVu7R
//!
//! # View statistics
//! cargo run --bin admin -- stats
//!
//! # Check storage connection
//! cargo run --bin admin -- ping
//! ```
//!
//! # Environment Variables
//!
//! - `STORAGE_BACKEND`: `memory`, `file`, or `postgres` (default: `memory`)
//! - `DATABASE_URL`: PostgreSQL connection string (postgres backend)
//! - `FILE_STORAGE_PATH`: log path (file backend)
//!
//! See [`shortly::config`] for the full list.

use shortly::application::services::ShortenerService;
use shortly::config;
use shortly::domain::entities::BatchItem;
use shortly::domain::repositories::UrlRepository;
use shortly::error::AppError;
use shortly::infrastructure::observers::LogAuditObserver;
use shortly::infrastructure::persistence::build_repository;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::sync::Arc;
use std::time::Duration;

/// CLI tool for managing shortly.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Shorten a single URL
    Shorten {
        /// Owner the new link belongs to
        #[arg(short, long)]
        owner: String,

        /// The URL to shorten
        url: String,
    },

    /// Shorten several URLs in one atomic batch
    Batch {
        /// Owner the new links belong to
        #[arg(short, long)]
        owner: String,

        /// The URLs to shorten
        #[arg(required = true)]
        urls: Vec<String>,
    },

    /// Resolve a short code
    Resolve {
        /// The short code to look up
        code: String,
    },

    /// List an owner's live links
    List {
        /// Owner to list
        owner: String,
    },

    /// Queue links for deletion
    Delete {
        /// Owner of the links
        #[arg(short, long)]
        owner: String,

        /// Short codes to delete
        #[arg(required = true)]
        codes: Vec<String>,
    },

    /// Show storage statistics
    Stats,

    /// Check storage connection
    Ping,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = config::load_from_env().context("Failed to load configuration")?;
    init_tracing(&config);
    config.print_summary();

    let repository = build_repository(&config)
        .await
        .context("Failed to initialize storage backend")?;

    let service = ShortenerService::new(
        Arc::clone(&repository),
        config.delete_queue_capacity,
        config.delete_workers,
        Duration::from_secs(config.shutdown_timeout_seconds),
    );
    service.register_observer(Arc::new(LogAuditObserver::new()));

    let outcome = run_command(cli.command, &service).await;

    // Drain queued deletions before the process exits.
    service
        .close()
        .await
        .context("Failed to close storage backend")?;

    outcome
}

fn init_tracing(config: &config::Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run_command(
    command: Commands,
    service: &ShortenerService<dyn UrlRepository>,
) -> Result<()> {
    match command {
        Commands::Shorten { owner, url } => shorten(service, &owner, &url).await,
        Commands::Batch { owner, urls } => shorten_batch(service, &owner, urls).await,
        Commands::Resolve { code } => resolve(service, &code).await,
        Commands::List { owner } => list(service, &owner).await,
        Commands::Delete { owner, codes } => delete(service, &owner, codes),
        Commands::Stats => stats(service).await,
        Commands::Ping => ping(service).await,
    }
}

async fn shorten(
    service: &ShortenerService<dyn UrlRepository>,
    owner: &str,
    url: &str,
) -> Result<()> {
    match service.shorten(owner, url).await {
        Ok(code) => {
            println!("{}", "✅ Shortened".green().bold());
            println!("  Code:  {}", code.bright_yellow().bold());
            println!("  Owner: {}", owner.cyan());
            Ok(())
        }
        Err(AppError::UrlConflict { short_code }) => {
            println!("{}", "⚠️  Already shortened".yellow());
            println!("  Existing code: {}", short_code.bright_yellow().bold());
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Failed to shorten URL: {e}")),
    }
}

async fn shorten_batch(
    service: &ShortenerService<dyn UrlRepository>,
    owner: &str,
    urls: Vec<String>,
) -> Result<()> {
    let items: Vec<BatchItem> = urls
        .into_iter()
        .enumerate()
        .map(|(i, url)| BatchItem {
            correlation_id: i.to_string(),
            original_url: url,
        })
        .collect();

    let codes = service
        .shorten_batch(owner, &items)
        .await
        .map_err(|e| anyhow::anyhow!("Batch failed, nothing was saved: {e}"))?;

    println!("{}", "✅ Batch shortened".green().bold());
    for (item, code) in items.iter().zip(&codes) {
        println!(
            "  {} {}",
            code.short_code.bright_yellow().bold(),
            item.original_url.bright_black()
        );
    }

    Ok(())
}

async fn resolve(service: &ShortenerService<dyn UrlRepository>, code: &str) -> Result<()> {
    match service.resolve(code).await {
        Ok(record) if record.is_deleted => {
            println!("{}", "🗑️  Deleted".red().bold());
            println!("  This code existed but its link was removed");
            Ok(())
        }
        Ok(record) => {
            println!("{}", "🔗 Resolved".green().bold());
            println!("  URL:   {}", record.original_url.bright_white());
            println!("  Owner: {}", record.owner_id.cyan());
            Ok(())
        }
        Err(AppError::NotFound) => {
            println!("{}", "❌ Not found".red());
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Failed to resolve code: {e}")),
    }
}

async fn list(service: &ShortenerService<dyn UrlRepository>, owner: &str) -> Result<()> {
    let records = service
        .list_by_owner(owner)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list links: {e}"))?;

    println!("{}", format!("📋 Links for {owner}").bright_blue().bold());
    println!();

    if records.is_empty() {
        println!("{}", "  No links found".yellow());
        return Ok(());
    }

    for record in &records {
        println!(
            "  {} {}",
            record.short_code.bright_yellow().bold(),
            record.original_url.bright_black()
        );
    }

    println!();
    println!(
        "  Total: {}",
        records.len().to_string().bright_white().bold()
    );

    Ok(())
}

fn delete(
    service: &ShortenerService<dyn UrlRepository>,
    owner: &str,
    codes: Vec<String>,
) -> Result<()> {
    let count = codes.len();

    match service.delete_urls(owner, codes) {
        Ok(()) => {
            println!("{}", "✅ Deletion queued".green().bold());
            println!("  {count} code(s) will be removed shortly");
            Ok(())
        }
        Err(AppError::QueueFull) => {
            println!("{}", "⚠️  Deletion queue is full, try again later".yellow());
            Ok(())
        }
        Err(e) => Err(anyhow::anyhow!("Failed to queue deletion: {e}")),
    }
}

async fn stats(service: &ShortenerService<dyn UrlRepository>) -> Result<()> {
    let stats = service
        .stats()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load statistics: {e}"))?;

    println!("{}", "📊 Statistics".bright_blue().bold());
    println!();
    println!(
        "  Links: {}",
        stats.urls.to_string().bright_green().bold()
    );
    println!(
        "  Users: {}",
        stats.users.to_string().bright_green().bold()
    );

    Ok(())
}

async fn ping(service: &ShortenerService<dyn UrlRepository>) -> Result<()> {
    println!("{}", "🔍 Checking storage connection...".bright_blue());

    service
        .ping()
        .await
        .map_err(|e| anyhow::anyhow!("Storage check failed: {e}"))?;

    println!("{}", "✅ Storage connection OK".green().bold());
    Ok(())
}
