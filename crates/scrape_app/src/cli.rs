use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use engine_logging::LogDestination;

#[derive(Debug, Parser)]
#[command(
    name = "scrape_app",
    about = "Collect article records from a paginated blog into articles.json",
    version
)]
pub struct Args {
    /// RON file with target and policy overrides.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Blog user id on the default host.
    #[arg(long, conflicts_with = "base_url")]
    pub user: Option<String>,

    /// Blog root URL; listing pages live under `{base}/article/list/{page}`.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Stop after this many listing pages.
    #[arg(long, value_name = "N", conflicts_with = "all_pages")]
    pub max_pages: Option<u32>,

    /// Follow listing pages until the blog runs out.
    #[arg(long)]
    pub all_pages: bool,

    /// Fetch at most this many detail pages.
    #[arg(long, value_name = "N")]
    pub detail_limit: Option<usize>,

    /// Skip the detail phase entirely.
    #[arg(long)]
    pub no_details: bool,

    /// Article cache file.
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Crawl even when the cache file already exists.
    #[arg(long)]
    pub force_refresh: bool,

    #[arg(long, value_enum, default_value_t = LogTarget::Terminal)]
    pub log: LogTarget,

    /// Log debug output as well.
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogTarget {
    Terminal,
    File,
    Both,
}

impl From<LogTarget> for LogDestination {
    fn from(target: LogTarget) -> Self {
        match target {
            LogTarget::Terminal => LogDestination::Terminal,
            LogTarget::File => LogDestination::File,
            LogTarget::Both => LogDestination::Both,
        }
    }
}
