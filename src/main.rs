use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use console::Emoji;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use podsync::{
    Config, NoopReporter, ProgressEvent, ProgressReporter, ReqwestClient, SharedProgressReporter,
    SyncResult, Syncer,
};

// Emoji with fallback for terminals without Unicode support
static ANTENNA: Emoji<'_, '_> = Emoji("📡 ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static DOWNLOAD: Emoji<'_, '_> = Emoji("📥 ", "[v] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static FOLDER: Emoji<'_, '_> = Emoji("📁 ", "");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

/// Synchronize podcast subscriptions against their download history
#[derive(Parser, Debug)]
#[command(name = "podsync")]
#[command(about = "Download new and backlog podcast episodes for configured subscriptions")]
#[command(version)]
struct Args {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Subscription names to sync (default: all)
    subscriptions: Vec<String>,

    /// Quiet mode - suppress progress output
    #[arg(short, long)]
    quiet: bool,
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    multi: MultiProgress,
    main_bar: ProgressBar,
    download_bar: Mutex<Option<ProgressBar>>,
}

impl IndicatifReporter {
    fn new() -> Self {
        let multi = MultiProgress::new();

        let main_style = ProgressStyle::default_bar()
            .template("{spinner:.green} {wide_msg}")
            .unwrap();

        let main_bar = multi.add(ProgressBar::new_spinner());
        main_bar.set_style(main_style);
        main_bar.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            multi,
            main_bar,
            download_bar: Mutex::new(None),
        }
    }

    fn start_download_bar(&self, length: Option<u64>, message: String) {
        let style = ProgressStyle::default_bar()
            .template(&format!(
                "  {DOWNLOAD}[{{bar:30.cyan/blue}}] {{bytes}}/{{total_bytes}} {{wide_msg}}"
            ))
            .unwrap()
            .progress_chars("█▓░");

        let bar = self.multi.add(ProgressBar::new(length.unwrap_or(0)));
        bar.set_style(style);
        bar.set_message(message);

        let mut slot = self.download_bar.lock().unwrap();
        if let Some(old) = slot.replace(bar) {
            old.finish_and_clear();
        }
    }

    fn finish_download_bar(&self) {
        if let Some(bar) = self.download_bar.lock().unwrap().take() {
            bar.finish_and_clear();
        }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::FetchingFeed { subscription, url } => {
                self.main_bar.set_message(format!(
                    "{SEARCH}{}: fetching {}",
                    subscription.bold(),
                    url.cyan()
                ));
            }

            ProgressEvent::PlanReady {
                subscription,
                feed_title,
                total_entries,
                to_download,
                ..
            } => {
                self.main_bar.set_message(format!(
                    "{ANTENNA}{}: {} • {} entries, {} to download",
                    subscription.bold(),
                    feed_title.green(),
                    total_entries.to_string().cyan(),
                    to_download.to_string().yellow()
                ));
            }

            ProgressEvent::PartialFilesCleanedUp { subscription, count } => {
                self.multi.suspend(|| {
                    println!(
                        "  {}: cleaned up {} partial file(s) from an interrupted run",
                        subscription.dimmed(),
                        count
                    );
                });
            }

            ProgressEvent::DownloadStarting {
                entry_title,
                entry_index,
                total_to_download,
                content_length,
                ..
            } => {
                self.start_download_bar(
                    content_length,
                    format!(
                        "[{}/{}] {}",
                        (entry_index + 1).to_string().cyan(),
                        total_to_download.to_string().cyan(),
                        truncate_title(&entry_title, 40)
                    ),
                );
            }

            ProgressEvent::DownloadProgress {
                bytes_downloaded,
                total_bytes,
                ..
            } => {
                if let Some(bar) = self.download_bar.lock().unwrap().as_ref() {
                    if let Some(total) = total_bytes {
                        bar.set_length(total);
                    }
                    bar.set_position(bytes_downloaded);
                }
            }

            ProgressEvent::DownloadCompleted { entry_title, .. } => {
                self.finish_download_bar();
                self.multi.suspend(|| {
                    println!("  {SUCCESS}{}", truncate_title(&entry_title, 60).green());
                });
            }

            ProgressEvent::DownloadFailed { entry_title, error } => {
                self.finish_download_bar();
                self.multi.suspend(|| {
                    println!(
                        "  {FAILURE}{} - {}",
                        truncate_title(&entry_title, 40).red(),
                        error.red()
                    );
                });
            }

            ProgressEvent::SubscriptionCompleted {
                subscription,
                downloaded,
                skipped,
                failed,
            } => {
                self.main_bar.set_message(String::new());
                self.multi.suspend(|| {
                    println!(
                        "{}{} {} downloaded, {} skipped, {} failed",
                        ANTENNA,
                        format!("{}:", subscription).bold(),
                        downloaded.to_string().green().bold(),
                        skipped.to_string().yellow(),
                        if failed > 0 {
                            failed.to_string().red().bold()
                        } else {
                            failed.to_string().green()
                        }
                    );
                });
            }
        }
    }
}

fn truncate_title(title: &str, max_len: usize) -> String {
    if title.len() <= max_len {
        title.to_string()
    } else {
        let truncated: String = title.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn print_summary(results: &BTreeMap<String, SyncResult>) {
    let mut any_moved = false;
    for (name, result) in results {
        if let Some(moved) = &result.feed_moved_to {
            if !any_moved {
                println!("\n{}", "Feeds that moved:".yellow().bold());
                any_moved = true;
            }
            println!(
                "  {} now lives at {} - update the configuration",
                name.bold(),
                moved.cyan()
            );
        }
    }

    let mut any_failures = false;

    for (name, result) in results {
        if !result.failures.is_empty() {
            if !any_failures {
                println!("\n{}", "Failures:".red().bold());
                any_failures = true;
            }
            for failure in &result.failures {
                println!(
                    "  {}{} / {} - {}",
                    CROSS,
                    name.bold(),
                    failure.subject.yellow(),
                    failure.reason.dimmed()
                );
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;
    let base_directory = config.directory.clone();

    let reporter: SharedProgressReporter = if args.quiet {
        NoopReporter::shared()
    } else {
        Arc::new(IndicatifReporter::new())
    };

    let syncer = Syncer::new(config, ReqwestClient::new(), reporter)
        .context("Failed to initialize history store")?;

    let results: BTreeMap<String, SyncResult> = if args.subscriptions.is_empty() {
        syncer.sync_all().await.context("Sync run aborted")?
    } else {
        let mut results = BTreeMap::new();
        for name in &args.subscriptions {
            let result = syncer
                .sync(name)
                .await
                .with_context(|| format!("Failed to sync subscription '{}'", name))?;
            results.insert(name.clone(), result);
        }
        results
    };

    let downloaded: usize = results.values().map(|r| r.downloaded).sum();
    let failed: usize = results.values().map(|r| r.failed).sum();

    if !args.quiet {
        print_summary(&results);
        println!(
            "\n{FOLDER}Output: {}\n",
            base_directory.display().to_string().cyan()
        );
    }

    if failed > 0 && downloaded == 0 {
        std::process::exit(1);
    }

    Ok(())
}
