//! gram-queue - Manage scheduled Instagram posts
//!
//! Unix-style tool for managing the scheduled post queue.

use clap::{Parser, Subcommand};
use libgramcast::scheduling::parse_schedule;
use libgramcast::types::{MediaKind, PostStatus, PostType, ScheduledPost};
use libgramcast::{Config, Database, GramcastError, Result};

#[derive(Parser, Debug)]
#[command(name = "gram-queue")]
#[command(version)]
#[command(about = "Manage scheduled Instagram posts")]
#[command(long_about = "\
gram-queue - Manage scheduled Instagram posts

DESCRIPTION:
    gram-queue is a Unix-style tool for managing the Gramcast publishing
    queue. Use it to schedule, list, cancel, or fast-track posts. The
    gram-send daemon picks up due posts and publishes them.

COMMANDS:
    add     Schedule a new post
    list    List queued posts
    cancel  Cancel a pending post
    now     Make a pending post due immediately

USAGE EXAMPLES:
    # Schedule a single image for tomorrow morning
    gram-queue add photo.example.com/a.jpg --caption \"Morning\" --at \"tomorrow 9am\"

    # Schedule a carousel with hashtags
    gram-queue add a.jpg b.jpg --hashtag \"#pair\" --at 2h

    # Schedule a reel
    gram-queue add --type reel clip.example.com/v.mp4 --at \"next friday\"

    # List pending posts in JSON
    gram-queue list --format json --status pending

    # Cancel a post
    gram-queue cancel <POST_ID>

CONFIGURATION:
    Configuration file: ~/.config/gramcast/config.toml
    Database location: ~/.local/share/gramcast/posts.db

    Override with environment variables:
        GRAMCAST_CONFIG - Path to config file

EXIT CODES:
    0 - Success
    1 - Operation failed
    2 - Database or configuration error
    3 - Invalid input (bad post ID, time format, etc.)
")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    #[arg(help = "Enable verbose logging to stderr (useful for debugging)")]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Schedule a new post
    Add {
        /// Media URLs, in presentation order
        #[arg(required = true)]
        media: Vec<String>,

        /// Post type: feed or reel
        #[arg(long = "type", default_value = "feed")]
        post_type: String,

        /// Caption text
        #[arg(short, long, default_value = "")]
        caption: String,

        /// Hashtag to append (repeatable)
        #[arg(long = "hashtag")]
        hashtags: Vec<String>,

        /// When to publish (e.g. "tomorrow 9am", "2h"); default is now
        #[arg(long)]
        at: Option<String>,
    },

    /// List queued posts
    List {
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Filter by status: pending, processing, published, failed
        #[arg(short, long)]
        status: Option<String>,

        /// Maximum posts to show
        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Cancel a pending post
    Cancel {
        /// Post ID to cancel
        post_id: Option<String>,

        /// Cancel all pending posts
        #[arg(long)]
        all: bool,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Make a pending post due immediately
    Now {
        /// Post ID to publish on the next daemon tick
        post_id: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("debug")
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("error")
            .with_writer(std::io::stderr)
            .init();
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;

    match cli.command {
        Commands::Add {
            media,
            post_type,
            caption,
            hashtags,
            at,
        } => {
            cmd_add(&db, media, &post_type, caption, hashtags, at.as_deref()).await?;
        }
        Commands::List {
            format,
            status,
            limit,
        } => {
            cmd_list(&db, &format, status.as_deref(), limit).await?;
        }
        Commands::Cancel {
            post_id,
            all,
            force,
        } => {
            cmd_cancel(&db, post_id.as_deref(), all, force).await?;
        }
        Commands::Now { post_id } => {
            cmd_now(&db, &post_id).await?;
        }
    }

    Ok(())
}

/// Schedule a new post
async fn cmd_add(
    db: &Database,
    media: Vec<String>,
    post_type: &str,
    caption: String,
    hashtags: Vec<String>,
    at: Option<&str>,
) -> Result<()> {
    let post_type = PostType::parse(post_type).ok_or_else(|| {
        GramcastError::InvalidInput(format!(
            "Invalid post type '{}'. Must be 'feed' or 'reel'",
            post_type
        ))
    })?;

    if post_type == PostType::Reel {
        if media.len() != 1 {
            return Err(GramcastError::InvalidInput(
                "A reel takes exactly one media URL".to_string(),
            ));
        }
        if !MediaKind::from_url(&media[0]).is_video() {
            return Err(GramcastError::InvalidInput(
                "A reel requires a video URL (.mp4 or .mov)".to_string(),
            ));
        }
    }

    let scheduled_time = match at {
        Some(input) => parse_schedule(input)?.timestamp(),
        None => chrono::Utc::now().timestamp(),
    };

    let post = ScheduledPost::new(post_type, media, caption, hashtags, scheduled_time);
    db.create_post(&post).await?;

    println!("Scheduled post {}", post.id);
    println!("  type:  {}", post.post_type);
    println!("  media: {}", post.media_urls.len());
    println!("  at:    {}", format_time(post.scheduled_time));
    Ok(())
}

/// List queued posts
async fn cmd_list(db: &Database, format: &str, status: Option<&str>, limit: usize) -> Result<()> {
    if format != "text" && format != "json" {
        return Err(GramcastError::InvalidInput(format!(
            "Invalid format '{}'. Must be 'text' or 'json'",
            format
        )));
    }

    let status = match status {
        Some(s) => Some(PostStatus::parse(s).ok_or_else(|| {
            GramcastError::InvalidInput(format!("Invalid status filter '{}'", s))
        })?),
        None => None,
    };

    let posts = db.queue_posts(status, limit).await?;

    if format == "json" {
        println!(
            "{}",
            serde_json::to_string_pretty(&posts)
                .map_err(|e| GramcastError::InvalidInput(e.to_string()))?
        );
        return Ok(());
    }

    if posts.is_empty() {
        println!("No queued posts");
        return Ok(());
    }

    for post in posts {
        println!(
            "{}  {:<10}  {}  {:<4}  {} media  {}",
            post.id,
            post.status.as_str(),
            format_time(post.scheduled_time),
            post.post_type.as_str(),
            post.media_urls.len(),
            truncate(&post.caption, 40),
        );
        if let Some(error) = &post.error {
            println!("    last error: {}", truncate(error, 70));
        }
    }
    Ok(())
}

/// Cancel one pending post, or all of them
async fn cmd_cancel(db: &Database, post_id: Option<&str>, all: bool, force: bool) -> Result<()> {
    if all {
        let pending = db.queue_posts(Some(PostStatus::Pending), 10_000).await?;
        if pending.is_empty() {
            println!("No pending posts to cancel");
            return Ok(());
        }

        if !force && !confirm(&format!("Cancel {} pending post(s)?", pending.len()))? {
            println!("Aborted");
            return Ok(());
        }

        let mut cancelled = 0;
        for post in pending {
            if db.cancel_post(&post.id).await? {
                cancelled += 1;
            }
        }
        println!("Cancelled {} post(s)", cancelled);
        return Ok(());
    }

    let post_id = post_id.ok_or_else(|| {
        GramcastError::InvalidInput("Provide a post ID or --all".to_string())
    })?;

    if db.cancel_post(post_id).await? {
        println!("Cancelled post {}", post_id);
        Ok(())
    } else {
        Err(GramcastError::InvalidInput(format!(
            "Post not found or not pending: {}",
            post_id
        )))
    }
}

/// Make a pending post due immediately
async fn cmd_now(db: &Database, post_id: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    if db.post_now(post_id, now).await? {
        println!("Post {} is now due; the daemon will pick it up", post_id);
        Ok(())
    } else {
        Err(GramcastError::InvalidInput(format!(
            "Post not found or not pending: {}",
            post_id
        )))
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    use std::io::{BufRead, Write};

    print!("{} [y/N] ", prompt);
    std::io::stdout()
        .flush()
        .map_err(|e| GramcastError::InvalidInput(e.to_string()))?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| GramcastError::InvalidInput(e.to_string()))?;

    Ok(matches!(line.trim(), "y" | "Y" | "yes"))
}

fn format_time(timestamp: i64) -> String {
    chrono::DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let prefix: String = s.chars().take(max).collect();
        format!("{}...", prefix)
    }
}
