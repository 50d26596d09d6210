mod config;
mod crawler;
mod db;
mod error;
mod fetch;
mod parser;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use url::Url;

use crate::config::Settings;
use crate::crawler::{drain, CrawlOptions, CrawlSummary, Crawler, JsonLines, SinkStats};
use crate::fetch::HttpFetcher;
use crate::parser::detail;
use crate::parser::vocabulary::Vocabulary;

#[derive(Parser)]
#[command(name = "djinni_scraper", about = "djinni.co job crawler and technology report")]
struct Cli {
    /// SQLite database path (overrides config)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl listing pages for each keyword and save every posting
    Crawl {
        /// Primary keywords, e.g. Python Django
        #[arg(required = true)]
        keywords: Vec<String>,
        /// Max concurrent detail fetches
        #[arg(short, long)]
        concurrency: Option<usize>,
        /// Max listing pages per keyword
        #[arg(short = 'p', long)]
        max_pages: Option<usize>,
        /// Print JSON lines instead of saving
        #[arg(long)]
        dry_run: bool,
    },
    /// Extract postings from saved detail pages
    Extract {
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// URL the pages were served from (default: file URL)
        #[arg(long)]
        url: Option<String>,
    },
    /// Show database statistics
    Stats,
    /// Technology demand by experience level
    Report {
        /// Only list companies with at least this many postings
        #[arg(long, default_value = "3")]
        min_vacancies: usize,
        /// Max rows per section
        #[arg(short = 'n', long, default_value = "20")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load().context("Failed to load settings")?;
    if let Some(db) = cli.db {
        settings.db_path = db;
    }

    let result = match cli.command {
        Commands::Crawl {
            keywords,
            concurrency,
            max_pages,
            dry_run,
        } => {
            if let Some(n) = concurrency {
                settings.detail_concurrency = n;
            }
            if max_pages.is_some() {
                settings.max_listing_pages = max_pages;
            }
            crawl(&settings, keywords, dry_run).await
        }
        Commands::Extract { files, url } => extract_files(&settings, &files, url.as_deref()),
        Commands::Stats => {
            let conn = db::connect(&settings.db_path)?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Jobs:         {}", s.jobs);
            println!("Companies:    {}", s.companies);
            println!("Technologies: {}", s.technologies);
            println!("Links:        {}", s.links);
            println!("Latest:       {}", s.latest.as_deref().unwrap_or("-"));
            Ok(())
        }
        Commands::Report {
            min_vacancies,
            limit,
        } => report(&settings.db_path, min_vacancies, limit),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn crawl(settings: &Settings, keywords: Vec<String>, dry_run: bool) -> Result<()> {
    let keywords: Vec<String> = keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    if keywords.is_empty() {
        anyhow::bail!("No keywords given");
    }

    let selectors = settings.selectors.compile()?;
    let vocabulary = Vocabulary::new(&settings.vocabulary);
    let base_url = settings.base_url()?;
    let fetcher = HttpFetcher::new(settings)?;
    if vocabulary.is_empty() {
        warn!("Vocabulary is empty, postings will carry no technologies");
    }
    info!(
        keywords = ?keywords,
        vocabulary = vocabulary.len(),
        concurrency = settings.detail_concurrency,
        "Starting crawl"
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, stopping crawl");
                cancel.cancel();
            }
        }
    });

    let crawler = Arc::new(Crawler::new(
        fetcher,
        selectors,
        vocabulary,
        base_url,
        CrawlOptions::from(settings),
        cancel,
    ));

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(120));

    let (mut rx, handle) = crawler.run(keywords);
    let sink_stats = if dry_run {
        let mut sink = JsonLines::new(std::io::stdout());
        drain(&mut rx, &mut sink, &pb).await
    } else {
        let conn = db::connect(&settings.db_path)
            .with_context(|| format!("Failed to open {}", settings.db_path.display()))?;
        db::init_schema(&conn)?;
        let mut store = db::JobStore::new(conn);
        drain(&mut rx, &mut store, &pb).await
    };
    let summary = handle.await.context("Crawl task failed")?;
    pb.finish_and_clear();

    if dry_run {
        print_summary(&mut std::io::stderr(), &summary, &sink_stats)?;
    } else {
        print_summary(&mut std::io::stdout(), &summary, &sink_stats)?;
    }
    Ok(())
}

fn print_summary(out: &mut impl Write, summary: &CrawlSummary, sink: &SinkStats) -> Result<()> {
    writeln!(
        out,
        "Listing pages: {} ({} failed)",
        summary.listing_pages, summary.listing_pages_skipped
    )?;
    writeln!(
        out,
        "Postings:      {} extracted, {} detail fetches failed, {} extraction failures",
        summary.records, summary.detail_pages_skipped, summary.extraction_failures
    )?;
    writeln!(
        out,
        "Saved:         {} ({} duplicates, {} failed)",
        sink.saved, sink.duplicates, sink.failed
    )?;
    writeln!(out, "Pages skipped: {}", summary.pages_skipped())?;
    Ok(())
}

fn extract_files(settings: &Settings, files: &[PathBuf], url: Option<&str>) -> Result<()> {
    let selectors = settings.selectors.compile()?;
    let vocabulary = Vocabulary::new(&settings.vocabulary);
    let base = url
        .map(|u| Url::parse(u).with_context(|| format!("Invalid URL: {}", u)))
        .transpose()?;

    let results: Vec<_> = files
        .par_iter()
        .map(|path| -> Result<parser::JobPosting> {
            let body = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let page_url = match &base {
                Some(u) => u.clone(),
                None => file_url(path)?,
            };
            Ok(detail::extract_html(&body, page_url, &selectors, &vocabulary)?)
        })
        .collect();

    let mut stdout = std::io::stdout().lock();
    let mut failed = 0;
    for (path, result) in files.iter().zip(results) {
        match result {
            Ok(job) => {
                serde_json::to_writer(&mut stdout, &job)?;
                writeln!(stdout)?;
            }
            Err(e) => {
                warn!(file = %path.display(), "Skipping: {:#}", e);
                failed += 1;
            }
        }
    }
    info!(total = files.len(), failed, "Extraction finished");
    Ok(())
}

fn file_url(path: &Path) -> Result<Url> {
    let abs = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", path.display()))?;
    Url::from_file_path(&abs).map_err(|_| anyhow::anyhow!("Not a file path: {}", abs.display()))
}

fn report(db_path: &Path, min_vacancies: usize, limit: usize) -> Result<()> {
    let conn = db::connect(db_path)?;
    db::init_schema(&conn)?;

    let techs = db::technology_counts(&conn, limit)?;
    if techs.is_empty() {
        println!("No postings saved. Run 'crawl' first.");
        return Ok(());
    }

    println!("--- Technologies by level ---");
    println!("{:<7} | {:<24} | {:>5}", "Level", "Technology", "Count");
    println!("{}", "-".repeat(42));
    let mut last_level = "";
    for r in &techs {
        let level = if r.level == last_level { "" } else { r.level.as_str() };
        println!("{:<7} | {:<24} | {:>5}", level, truncate(&r.technology, 24), r.count);
        last_level = &r.level;
    }

    println!("\n--- Experience (years) ---");
    for (years, count) in db::experience_distribution(&conn)? {
        println!("{:>3} | {:>5}", years, count);
    }

    println!("\n--- English level ---");
    for (level, count) in db::english_distribution(&conn)? {
        println!("{:<24} | {:>5}", truncate(&level, 24), count);
    }

    let companies = db::active_companies(&conn, min_vacancies, limit)?;
    println!("\n--- Companies with {}+ vacancies ---", min_vacancies);
    if companies.is_empty() {
        println!("None.");
        return Ok(());
    }
    println!(
        "{:>3} | {:<32} | {:>5} | {:<10} | {:<10}",
        "#", "Company", "Jobs", "First", "Last"
    );
    println!("{}", "-".repeat(72));
    for (i, c) in companies.iter().enumerate() {
        println!(
            "{:>3} | {:<32} | {:>5} | {:<10} | {:<10}",
            i + 1,
            truncate(&c.company, 32),
            c.vacancies,
            c.first_posted,
            c.last_posted
        );
    }
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

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
