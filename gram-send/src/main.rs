//! gram-send - Background daemon for scheduled publishing
//!
//! Monitors the scheduled post queue and publishes due posts to Instagram
//! at a fixed cadence.

use clap::Parser;
use libgramcast::logging::{LogFormat, LoggingConfig};
use libgramcast::pipeline::Pipeline;
use libgramcast::platforms::instagram::InstagramPublisher;
use libgramcast::platforms::MediaPublisher;
use libgramcast::{Config, Database, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "gram-send")]
#[command(version)]
#[command(about = "Background daemon for scheduled publishing")]
#[command(long_about = "\
gram-send - Background daemon for scheduled publishing

DESCRIPTION:
    gram-send is a long-running daemon that monitors the Gramcast queue
    and publishes scheduled posts to Instagram at the right time.

    Each tick it reclaims posts stuck in processing by a crashed run,
    selects due posts (bounded batch, oldest first), and drives each one
    through the Graph API container publish protocol. Failures are
    recorded per post and never stop the cadence.

USAGE:
    # Run in foreground (logs to stderr)
    gram-send

    # Run with custom poll interval
    gram-send --poll-interval 30

    # Enable verbose logging
    gram-send --verbose

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current batch)

CONFIGURATION:
    Configuration file: ~/.config/gramcast/config.toml
    Database location: ~/.local/share/gramcast/posts.db

    [scheduling]
    poll_interval = 60         # seconds between ticks
    batch_size = 10            # max posts per tick
    stale_after_minutes = 30   # reclaim threshold for stuck posts

    Credentials come from INSTAGRAM_ACCESS_TOKEN / INSTAGRAM_ACCOUNT_ID
    or the [instagram] config section.

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Poll interval in seconds (overrides config)
    #[arg(long, value_name = "SECONDS")]
    #[arg(help = "How often to check for due posts (default: 60)")]
    poll_interval: Option<u64>,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    #[arg(help = "Enable verbose logging (useful for debugging)")]
    verbose: bool,

    /// Run once and exit (for testing)
    #[arg(long, hide = true)]
    #[arg(help = "Process due posts once and exit (for testing)")]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        LoggingConfig::new(LogFormat::Text, "debug".to_string(), true).init();
    } else {
        libgramcast::logging::init_default();
    }

    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;

    info!("gram-send daemon starting");

    let publisher = InstagramPublisher::from_config(&config);
    if !publisher.is_configured() {
        error!("Instagram credentials are not configured; due posts will be left pending");
    }

    let pipeline = Pipeline::new(db, Arc::new(publisher))
        .with_batch_size(config.scheduling.batch_size);
    let stale_after = Duration::from_secs(config.scheduling.stale_after_minutes * 60);

    // Set up graceful shutdown
    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    let poll_interval = cli
        .poll_interval
        .unwrap_or(config.scheduling.poll_interval);
    info!("Poll interval: {}s", poll_interval);

    if cli.once {
        run_tick(&pipeline, stale_after).await;
        info!("gram-send: processed posts once, exiting");
    } else {
        run_daemon_loop(&pipeline, stale_after, poll_interval, shutdown).await;
    }

    info!("gram-send daemon stopped");
    Ok(())
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(|e| {
        libgramcast::GramcastError::InvalidInput(format!("Signal setup failed: {}", e))
    })?;

    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) -> Result<()> {
    Ok(())
}

/// Main daemon loop
async fn run_daemon_loop(
    pipeline: &Pipeline,
    stale_after: Duration,
    poll_interval: u64,
    shutdown: Arc<AtomicBool>,
) {
    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        run_tick(pipeline, stale_after).await;

        // Sleep until next poll (check shutdown every second)
        for _ in 0..poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }
}

/// One scheduler tick: reclaim stuck posts, then process the due batch.
///
/// Errors are logged, never propagated; the cadence continues regardless.
async fn run_tick(pipeline: &Pipeline, stale_after: Duration) {
    if let Err(e) = pipeline.reclaim_stale(stale_after).await {
        error!("Error reclaiming stale posts: {}", e);
    }

    match pipeline.run_once().await {
        Ok(report) if report.selected > 0 => {
            info!(
                "Processed {} post(s): {} published, {} failed, {} skipped",
                report.selected, report.published, report.failed, report.skipped
            );
        }
        Ok(_) => {}
        Err(e) => error!("Error processing posts: {}", e),
    }
}
