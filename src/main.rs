mod error;
mod extract;
mod filter;
mod journal;
mod lexicon;
mod notify;
mod scanner;
mod settings;
mod source;
mod store;

use std::io::{IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::ProgressBar;
use tracing::{info, warn};

use filter::Verdict;
use lexicon::IgnoreLexicon;
use notify::telegram::TelegramNotifier;
use notify::{ConsoleNotifier, Notifier};
use scanner::{ScanPolicy, ScanReport, Scanner};
use settings::Settings;
use source::discord::DiscordChannel;
use source::reddit::RedditFeed;
use source::MessageSource;
use store::{CodeStore, FileCodeStore};

#[derive(Parser)]
#[command(name = "codewatch", about = "Watch feeds and chats for new promo codes")]
struct Cli {
    /// Settings file (default: ./codewatch.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check every configured source once and announce new codes
    Scan,
    /// Show what would be extracted from TEXT (or stdin) without recording anything
    Check {
        text: Option<String>,
    },
    /// List codes already reported
    Known,
    /// Totals from the scan journal
    Stats,
    /// Most recent codes from the scan journal
    History {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    let result = match cli.command {
        Commands::Scan => scan(&settings),
        Commands::Check { text } => {
            let text = match text {
                Some(t) => t,
                None => {
                    let mut buf = String::new();
                    std::io::stdin().read_to_string(&mut buf)?;
                    buf
                }
            };
            check(&settings, &text)
        }
        Commands::Known => {
            let store = FileCodeStore::load(&settings.known_codes_path)?;
            for code in store.codes() {
                println!("{}", code);
            }
            println!("\n{} known codes in {:?}", store.len(), store.path());
            Ok(())
        }
        Commands::Stats => {
            let conn = journal::connect(&settings.journal_path)?;
            journal::init_schema(&conn)?;
            let s = journal::get_stats(&conn)?;
            println!("Runs:             {}", s.runs);
            println!("Last run:         {}", s.last_run.as_deref().unwrap_or("-"));
            println!("Source failures:  {}", s.source_failures);
            println!("Codes found:      {}", s.sightings);
            println!("Delivered:        {}", s.delivered);
            println!("Delivery failed:  {}", s.delivery_failed);
            println!("Persist failed:   {}", s.persist_failed);
            Ok(())
        }
        Commands::History { limit } => {
            let conn = journal::connect(&settings.journal_path)?;
            journal::init_schema(&conn)?;
            let rows = journal::fetch_recent(&conn, limit)?;
            if rows.is_empty() {
                println!("No codes recorded yet. Run 'scan' first.");
                return Ok(());
            }

            println!(
                "{:<20} | {:<20} | {:<15} | {:<25} | Source",
                "Code", "Found", "Outcome", "From"
            );
            println!("{}", "-".repeat(110));
            for r in &rows {
                println!(
                    "{:<20} | {:<20} | {:<15} | {:<25} | {}",
                    r.code,
                    truncate(&r.found_at, 20),
                    r.outcome,
                    truncate(&r.source_id, 25),
                    r.provenance_link
                );
                if let Some(detail) = &r.detail {
                    println!("{:>20}   {}", "", truncate(detail, 80));
                }
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn scan(settings: &Settings) -> Result<()> {
    let lexicon = load_lexicon(settings)?;
    // Without the known set every old code would be announced again.
    let mut store = FileCodeStore::load(&settings.known_codes_path)
        .context("Cannot start without the known-code list")?;
    let notifier = build_notifier(settings);
    let sources = build_sources(settings);
    if sources.is_empty() {
        println!("No sources configured.");
        return Ok(());
    }

    let policy = ScanPolicy {
        lookback: chrono::Duration::days(i64::from(settings.lookback_days)),
        message_limit: settings.message_limit,
        letter_required: settings.letter_requirement,
        now: chrono::Utc::now(),
    };
    let progress = if std::io::stderr().is_terminal() {
        ProgressBar::new(sources.len() as u64)
    } else {
        ProgressBar::hidden()
    };

    let report = Scanner::new(&lexicon, &mut store, notifier.as_ref(), policy)
        .with_progress(progress)
        .run(&sources);

    if let Err(e) = write_journal(&settings.journal_path, &report) {
        warn!("Could not write scan journal: {:#}", e);
    }

    println!(
        "Checked {} sources ({} failed), {} messages scanned.",
        report.sources.len(),
        report.sources_failed(),
        report.messages_scanned()
    );
    for s in report.sources.iter().filter(|s| s.error.is_some()) {
        println!("  {}: {}", s.source_id, s.error.as_deref().unwrap_or_default());
    }
    println!(
        "New codes: {} ({} delivered, {} delivery failed, {} not recorded).",
        report.sightings.len(),
        report.count("delivered"),
        report.count("delivery_failed"),
        report.count("persist_failed"),
    );
    for s in &report.sightings {
        println!("  {} [{}] {}", s.code, s.outcome.label(), s.provenance_link);
    }
    Ok(())
}

fn check(settings: &Settings, text: &str) -> Result<()> {
    let lexicon = load_lexicon(settings)?;
    let store = FileCodeStore::load(&settings.known_codes_path)?;
    let normalized = extract::normalize(text);
    let candidates = extract::extract(&normalized, settings.letter_requirement);
    if candidates.is_empty() {
        println!("No candidates.");
        return Ok(());
    }
    for candidate in candidates {
        let verdict = match filter::evaluate(candidate, "-", &lexicon, &store) {
            Verdict::Ignored => "ignored",
            Verdict::Known => "known",
            Verdict::Accepted(_) => "new",
        };
        println!("{:<20} {}", candidate, verdict);
    }
    Ok(())
}

fn load_lexicon(settings: &Settings) -> Result<IgnoreLexicon> {
    let lexicon = IgnoreLexicon::load(
        settings.ignore_file.as_deref(),
        &settings.ignore_extra,
        settings.lexicon_case_sensitive,
    )?;
    info!("Ignore list has {} entries", lexicon.len());
    Ok(lexicon)
}

fn build_notifier(settings: &Settings) -> Box<dyn Notifier> {
    match (&settings.telegram.bot_token, &settings.telegram.channel_id) {
        (Some(token), Some(chat)) => Box::new(TelegramNotifier::new(
            token,
            chat,
            &settings.telegram.title,
            settings.http_timeout_secs,
        )),
        _ => {
            warn!("Missing Telegram credentials; alerts will only be logged.");
            Box::new(ConsoleNotifier::new(settings.telegram.title.clone()))
        }
    }
}

fn build_sources(settings: &Settings) -> Vec<Box<dyn MessageSource>> {
    let mut sources: Vec<Box<dyn MessageSource>> = Vec::new();
    match (&settings.discord.token, &settings.discord.channel_id) {
        (Some(token), Some(channel)) => sources.push(Box::new(DiscordChannel::new(
            channel,
            token,
            settings.message_limit,
            settings.http_timeout_secs,
        ))),
        _ => info!("Skipping Discord check (no credentials provided)."),
    }
    for sub in &settings.reddit.subreddits {
        sources.push(Box::new(RedditFeed::new(sub, settings.http_timeout_secs)));
    }
    sources
}

fn write_journal(path: &Path, report: &ScanReport) -> Result<()> {
    let conn = journal::connect(path)?;
    journal::init_schema(&conn)?;
    let run_id = journal::record_run(&conn, report)?;
    info!("Recorded run {} in {:?}", run_id, path);
    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
