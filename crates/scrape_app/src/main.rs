mod cli;
mod config;
mod progress;

use anyhow::Context;
use clap::Parser;
use engine_logging::{engine_info, engine_warn};
use log::LevelFilter;
use scrape_engine::{AcquisitionEngine, AcquisitionReport, ArticleCache, ArticleRecord};
use tokio_util::sync::CancellationToken;

use crate::cli::Args;
use crate::config::{resolve, FileConfig, RunConfig};
use crate::progress::TerminalProgress;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    engine_logging::initialize(args.log.into(), level);

    let file = match &args.config {
        Some(path) => FileConfig::load(path)?,
        None => FileConfig::default(),
    };
    let run = resolve(&args, file)?;
    let cache = ArticleCache::new(&run.output);

    if cache.exists() && !run.force_refresh {
        if let Some(records) = cache
            .load()
            .with_context(|| format!("reading {}", cache.path().display()))?
        {
            println!(
                "Loaded {} articles from {}; pass --force-refresh to crawl again",
                records.len(),
                cache.path().display()
            );
            print_records(&records);
            return Ok(());
        }
    }

    let report = acquire(run).await?;
    println!(
        "Status: {} ({} articles, {} listing pages)",
        report.status,
        report.records.len(),
        report.pages_fetched
    );
    let details = report.details;
    if details.attempted > 0 || details.cancelled {
        println!(
            "Details: {} fetched, {} failed{}",
            details.fetched,
            details.failed,
            if details.cancelled { ", cancelled" } else { "" }
        );
    }

    if report.records.is_empty() {
        engine_warn!("No articles collected; leaving {} untouched", cache.path().display());
        return Ok(());
    }
    cache
        .save(&report.records)
        .with_context(|| format!("writing {}", cache.path().display()))?;
    println!("Saved {} articles to {}", report.records.len(), cache.path().display());
    print_records(&report.records);
    Ok(())
}

async fn acquire(run: RunConfig) -> anyhow::Result<AcquisitionReport> {
    let cancel = CancellationToken::new();
    let engine = AcquisitionEngine::new(run.target, run.engine, cancel.clone())
        .context("setting up the acquisition engine")?;
    engine_info!("Crawling {}", engine.target().base_url);

    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                engine_warn!("Interrupt received; finishing with what has been collected");
                cancel.cancel();
            }
        })
    };
    let report = engine.run(&TerminalProgress).await;
    ctrl_c.abort();
    Ok(report)
}

/// Engagement summed over every collected article.
#[derive(Debug, Default, PartialEq, Eq)]
struct Totals {
    reads: u64,
    likes: u64,
    comments: u64,
}

impl Totals {
    fn of(records: &[ArticleRecord]) -> Self {
        records.iter().fold(Self::default(), |acc, record| Self {
            reads: acc.reads.saturating_add(record.read_count),
            likes: acc.likes.saturating_add(record.like_count),
            comments: acc.comments.saturating_add(record.comment_count),
        })
    }

    fn average_reads(&self, articles: usize) -> u64 {
        match articles {
            0 => 0,
            n => self.reads / n as u64,
        }
    }
}

fn print_records(records: &[ArticleRecord]) {
    let totals = Totals::of(records);
    println!(
        "Totals: {} articles, {} reads (avg {}), {} likes, {} comments",
        records.len(),
        totals.reads,
        totals.average_reads(records.len()),
        totals.likes,
        totals.comments
    );
    for (index, record) in records.iter().enumerate().take(5) {
        println!(
            "{:>3}. {} ({}; {} reads, {} likes, {} comments)",
            index + 1,
            record.title,
            if record.published_at.is_empty() {
                "undated"
            } else {
                record.published_at.as_str()
            },
            record.read_count,
            record.like_count,
            record.comment_count
        );
    }
    if records.len() > 5 {
        println!("     ... and {} more", records.len() - 5);
    }
}
