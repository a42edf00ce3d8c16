//! Thread-Mirror main entry point
//!
//! This is the command-line interface for the Thread-Mirror forum mirror.

use clap::Parser;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thread_mirror::config::{load_config_with_hash, Config};
use thread_mirror::crawler::{CrawlSettings, Orchestrator};
use thread_mirror::source::HttpSource;
use thread_mirror::storage::{open_storage, SqliteStorage, StorageError, ThreadStore};
use tokio::sync::Notify;
use tokio::time::MissedTickBehavior;
use tracing_subscriber::EnvFilter;

/// Thread-Mirror: an incremental forum mirror
///
/// Thread-Mirror re-visits a forum on a fixed interval and stores every
/// listed thread in a local SQLite database, fetching only the posts that
/// earlier passes have not captured yet.
#[derive(Parser, Debug)]
#[command(name = "thread-mirror")]
#[command(version = "1.0.0")]
#[command(about = "An incremental forum mirror", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Run a single pass and exit
    #[arg(long)]
    once: bool,

    /// Validate config and show the effective settings without crawling
    #[arg(long, conflicts_with_all = ["stats", "show"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "show"])]
    stats: bool,

    /// Print the stored record of one thread as JSON and exit
    #[arg(long, value_name = "THREAD_ID", conflicts_with_all = ["dry_run", "stats"])]
    show: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    let storage = open_storage(Path::new(&config.storage.database_path))?;

    if cli.stats {
        handle_stats(&storage, &config)?;
        storage.close()?;
    } else if let Some(thread_id) = cli.show {
        handle_show(&storage, thread_id)?;
        storage.close()?;
    } else {
        handle_crawl(config, storage, cli.once).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("thread_mirror=info,warn"),
            1 => EnvFilter::new("thread_mirror=debug,info"),
            2 => EnvFilter::new("thread_mirror=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: prints the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Thread-Mirror Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Interval: {}s", config.crawler.interval_seconds);
    println!(
        "  Forum listing depth: {} pages",
        config.crawler.forum_listing_depth
    );
    println!(
        "  Per-pass page cap: {} pages",
        config.crawler.per_pass_page_cap
    );
    println!("  Max snapshots: {}", config.crawler.max_snapshots);
    println!(
        "  Max concurrent forums: {}",
        config.crawler.max_concurrent_forums
    );

    println!("\nSource:");
    println!("  Base URL: {}", config.source.base_url);
    if config.source.forum_ids.is_empty() {
        println!("  Forums: all");
    } else {
        println!("  Forums: {:?}", config.source.forum_ids);
    }
    match config.source.credentials() {
        Some((username, _)) => println!("  Login: {}", username),
        None => println!("  Login: anonymous"),
    }

    println!("\nStorage:");
    println!("  Database: {}", config.storage.database_path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(storage: &SqliteStorage, config: &Config) -> Result<(), StorageError> {
    let stats = storage.stats(config.crawler.max_snapshots)?;

    println!("Database: {}\n", config.storage.database_path);
    println!("Threads:        {}", stats.threads);
    println!("Posts:          {}", stats.posts);
    println!("Frozen threads: {}", stats.frozen_threads);

    let passes = storage.recent_passes(10)?;
    if !passes.is_empty() {
        println!("\nRecent passes:");
        for pass in passes {
            println!(
                "  {}  {:>4}s  forums {}/{} ok  threads {}  +{} posts",
                pass.started_at.format("%Y-%m-%d %H:%M:%S"),
                (pass.finished_at - pass.started_at).num_seconds(),
                pass.forums_total.saturating_sub(pass.forums_failed),
                pass.forums_total,
                pass.threads_seen,
                pass.posts_appended
            );
        }
    }

    Ok(())
}

/// Handles the --show mode: dumps one stored thread as JSON
fn handle_show(storage: &SqliteStorage, thread_id: u64) -> thread_mirror::Result<()> {
    let mut stdout = std::io::stdout().lock();
    match storage.get(thread_id)? {
        Some(thread) => writeln!(stdout, "{}", serde_json::to_string_pretty(&thread)?)?,
        None => writeln!(stdout, "No record stored for thread {}", thread_id)?,
    }
    Ok(())
}

/// Handles the main crawl loop
///
/// The first pass starts immediately, later passes on every interval tick.
/// Ctrl-C is honored between passes; a running pass is always finished.
async fn handle_crawl(config: Config, storage: SqliteStorage, once: bool) -> thread_mirror::Result<()> {
    let store = Arc::new(Mutex::new(storage));
    let source = Arc::new(HttpSource::new(&config.source.base_url)?);
    let orchestrator = Orchestrator::new(source, store.clone(), CrawlSettings::from(&config));

    let settings = orchestrator.settings();
    tracing::info!(
        "Crawling every {}s: {} listing pages per forum, {} post pages per thread, up to {} forums at once",
        config.crawler.interval_seconds,
        settings.forum_listing_depth,
        settings.per_pass_page_cap,
        settings.max_concurrent_forums
    );

    if let Some((username, password)) = config.source.credentials() {
        if let Err(e) = orchestrator.login(username, password).await {
            tracing::warn!("Login failed, continuing anonymously: {}", e);
        }
    }

    let shutdown = listen_for_shutdown();

    let mut ticker = tokio::time::interval(Duration::from_secs(config.crawler.interval_seconds));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.notified() => {
                tracing::info!("Gracefully shutting down");
                break;
            }
            _ = ticker.tick() => {}
        }

        if let Err(e) = orchestrator.run_pass().await {
            tracing::error!("Pass failed: {}", e);
        }

        if once {
            break;
        }
    }

    drop(orchestrator);
    close_store(store)
}

/// Spawns a ctrl-c listener that logs the request as soon as it arrives
///
/// The returned `Notify` keeps the request until the crawl loop next checks
/// for it, so a signal received mid-pass stops the loop after that pass.
fn listen_for_shutdown() -> Arc<Notify> {
    let shutdown = Arc::new(Notify::new());
    let notify = Arc::clone(&shutdown);

    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown requested, finishing current pass");
                notify.notify_one();
            }
            Err(e) => tracing::error!("Unable to listen for ctrl-c: {}", e),
        }
    });

    shutdown
}

/// Closes the store once no forum task holds it any more
fn close_store(store: Arc<Mutex<SqliteStorage>>) -> thread_mirror::Result<()> {
    match Arc::try_unwrap(store) {
        Ok(mutex) => {
            let storage = mutex.into_inner().map_err(|_| StorageError::LockPoisoned)?;
            storage.close()?;
            tracing::info!("Store closed");
        }
        Err(_) => tracing::warn!("Store still shared at shutdown, leaving it to drop"),
    }
    Ok(())
}
