//! Bugstr Desktop CLI - inspect the crash event queue of a desktop application
//!
//! Lists, shows and purges queued events, and reports which process role the
//! SDK would detect in the current environment.

use bugstr_desktop::{default_queue_dir, CrashEvent, EventQueue, Level, ProcessRole, PROCESS_TYPE_ENV};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::filter::{Directive, EnvFilter};

#[derive(Parser)]
#[command(name = "bugstr-desktop")]
#[command(about = "Inspect the on-disk crash event queue of a desktop application")]
struct Cli {
    /// Log SDK internals at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the process role detected from the environment
    Role,

    /// Work with the event queue
    Queue {
        /// Queue directory
        #[arg(short, long, env = "BUGSTR_CACHE_DIR", global = true)]
        dir: Option<PathBuf>,

        #[command(subcommand)]
        command: QueueCommands,
    },
}

#[derive(Subcommand)]
enum QueueCommands {
    /// List queued events, oldest first
    List,

    /// Show a single queued event
    Show {
        /// Entry name as printed by `list`
        name: String,

        /// Output format: pretty or json
        #[arg(short, long, default_value = "pretty")]
        format: OutputFormat,
    },

    /// Delete every queued event
    Purge,
}

#[derive(Clone, Debug, clap::ValueEnum)]
enum OutputFormat {
    Pretty,
    Json,
}

fn init_logging(verbose: bool) {
    let mut filter = EnvFilter::from_default_env();
    if verbose {
        filter = filter.add_directive(Directive::from(tracing::Level::DEBUG));
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Role => show_role(),
        Commands::Queue { dir, command } => {
            let dir = dir.unwrap_or_else(default_queue_dir);
            let queue = EventQueue::create(&dir, 0, usize::MAX)?;
            match command {
                QueueCommands::List => list_queue(&queue).await?,
                QueueCommands::Show { name, format } => show_entry(&queue, &name, format).await?,
                QueueCommands::Purge => {
                    let removed = queue.purge().await?;
                    println!(
                        "{} Removed {} queued events from {}",
                        "✓".green(),
                        removed,
                        queue.dir().display()
                    );
                }
            }
        }
    }

    Ok(())
}

fn show_role() {
    let role = ProcessRole::detect();
    let raw = std::env::var(PROCESS_TYPE_ENV).unwrap_or_else(|_| "<unset>".to_string());

    println!("{}: {}", "Role".cyan(), role.to_string().bold());
    println!("{}: {}={}", "Source".cyan(), PROCESS_TYPE_ENV, raw.dimmed());
}

fn format_timestamp(timestamp: i64) -> String {
    DateTime::<Utc>::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn colored_level(level: Level) -> colored::ColoredString {
    match level {
        Level::Fatal => "fatal".red().bold(),
        Level::Error => "error".red(),
        Level::Warning => "warning".yellow(),
        Level::Info => "info".blue(),
        Level::Debug => "debug".dimmed(),
    }
}

async fn list_queue(queue: &EventQueue) -> Result<(), Box<dyn std::error::Error>> {
    let entries = queue.entries().await?;
    if entries.is_empty() {
        println!("{} No queued events in {}", "info".blue(), queue.dir().display());
        return Ok(());
    }

    println!("{}", "━".repeat(60).dimmed());
    println!(
        "{} {} in {}",
        "Queued events".green().bold(),
        entries.len(),
        queue.dir().display()
    );
    println!("{}", "━".repeat(60).dimmed());

    for name in &entries {
        match queue.load(name).await {
            Ok(event) => println!(
                "  {} {} {:<8} {}",
                name.cyan(),
                format_timestamp(event.timestamp).dimmed(),
                colored_level(event.level),
                event.message
            ),
            Err(e) => eprintln!("  {} {} unreadable: {}", "⚠".yellow(), name, e),
        }
    }
    println!();

    Ok(())
}

async fn show_entry(
    queue: &EventQueue,
    name: &str,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let event = queue.load(name).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&event)?),
        OutputFormat::Pretty => print_pretty(name, &event),
    }

    Ok(())
}

fn print_pretty(name: &str, event: &CrashEvent) {
    println!("{}", "━".repeat(60).dimmed());
    println!(
        "{} {}",
        "CRASH EVENT".red().bold(),
        format_timestamp(event.timestamp).dimmed()
    );
    println!("{}", "━".repeat(60).dimmed());
    println!("{}: {}", "Entry".cyan(), name);
    if let Some(id) = &event.event_id {
        println!("{}: {}", "Event ID".cyan(), id);
    }
    println!("{}: {}", "Process".cyan(), event.process);
    println!("{}: {}", "Level".cyan(), colored_level(event.level));
    println!();
    println!("{}: {}", "Message".yellow().bold(), event.message);

    if let Some(stack) = &event.stack {
        println!();
        println!("{}:", "Stack Trace".yellow().bold());
        for line in stack.lines().take(20) {
            println!("  {}", line.dimmed());
        }
        let line_count = stack.lines().count();
        if line_count > 20 {
            println!("  {} (+{} more lines)", "...".dimmed(), line_count - 20);
        }
    }
    if let Some(env) = &event.environment {
        println!("{}: {}", "Environment".cyan(), env);
    }
    if let Some(release) = &event.release {
        println!("{}: {}", "Release".cyan(), release);
    }

    println!();
}
