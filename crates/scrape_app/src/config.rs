//! Run configuration: an optional RON file merged with command-line flags.
//!
//! Precedence is flags, then file, then the engine defaults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use scrape_engine::{EngineConfig, IdentityPool, TargetConfig};
use serde::Deserialize;
use thiserror::Error;

use crate::cli::Args;

pub const DEFAULT_USER_ID: &str = "2301_80171004";
pub const DEFAULT_OUTPUT: &str = "articles.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("config file {path:?} is not valid: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: ron::error::SpannedError,
    },
    #[error("invalid value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// On-disk shape of the config file. Every field is optional.
#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub user: Option<String>,
    pub base_url: Option<String>,
    /// Overrides the `{base}/article/list/{page}` layout.
    pub listing_url_template: Option<String>,
    pub max_pages: Option<u32>,
    pub all_pages: bool,
    pub fetch_details: Option<bool>,
    pub detail_fetch_limit: Option<usize>,
    pub output: Option<PathBuf>,
    pub request_timeout_secs: Option<f64>,
    pub max_attempts: Option<u32>,
    pub max_backoff_secs: Option<f64>,
    pub extra_retryable_statuses: Vec<u16>,
    /// Replaces the built-in browser user agents when non-empty.
    pub user_agents: Vec<String>,
    pub pacing: PacingFile,
    pub low_yield_threshold: Option<usize>,
    pub low_yield_streak: Option<u32>,
    pub content_budget: Option<usize>,
}

#[derive(Debug, Default, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PacingFile {
    pub base_delay_secs: Option<f64>,
    pub jitter_min_secs: Option<f64>,
    pub jitter_max_secs: Option<f64>,
    pub reading_pause_probability: Option<f64>,
    pub reading_pause_min_secs: Option<f64>,
    pub reading_pause_max_secs: Option<f64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        ron::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Everything a run needs after merging.
#[derive(Debug)]
pub struct RunConfig {
    pub target: TargetConfig,
    pub engine: EngineConfig,
    pub output: PathBuf,
    pub force_refresh: bool,
}

pub fn resolve(args: &Args, file: FileConfig) -> Result<RunConfig, ConfigError> {
    let base_url = match (&args.base_url, &args.user) {
        (Some(base), _) => Some(base.clone()),
        (None, Some(_)) => None,
        (None, None) => file.base_url.clone(),
    };
    let mut target = match base_url {
        Some(base) => TargetConfig::with_base_url(&base),
        None => {
            let user = args
                .user
                .as_deref()
                .or(file.user.as_deref())
                .unwrap_or(DEFAULT_USER_ID);
            TargetConfig::csdn(user)
        }
    };
    if let Some(template) = &file.listing_url_template {
        target = TargetConfig::new(target.base_url, template.clone());
    }

    if args.all_pages || (file.all_pages && args.max_pages.is_none()) {
        target.max_pages = None;
    } else if let Some(max) = args.max_pages.or(file.max_pages) {
        target.max_pages = Some(max);
    }
    if let Some(fetch) = file.fetch_details {
        target.fetch_details = fetch;
    }
    if args.no_details {
        target.fetch_details = false;
    }
    if let Some(limit) = args.detail_limit.or(file.detail_fetch_limit) {
        target.detail_fetch_limit = Some(limit);
    }
    if let Some(secs) = file.request_timeout_secs {
        target.request_timeout = seconds("request_timeout_secs", secs)?;
    }

    let mut engine = EngineConfig::default();
    engine.transport.request_timeout = target.request_timeout;
    engine
        .transport
        .extra_retryable_statuses
        .extend(file.extra_retryable_statuses.iter().copied());
    if let Some(attempts) = file.max_attempts {
        if attempts == 0 {
            return Err(ConfigError::Invalid {
                field: "max_attempts",
                message: "must be at least 1".to_string(),
            });
        }
        engine.retry.max_attempts = attempts;
    }
    if let Some(secs) = file.max_backoff_secs {
        engine.retry.max_backoff = seconds("max_backoff_secs", secs)?;
    }
    if !file.user_agents.is_empty() {
        engine.identities = IdentityPool::from_user_agents(&file.user_agents);
    }
    apply_pacing(&mut engine, &file.pacing)?;
    if let Some(threshold) = file.low_yield_threshold {
        engine.pagination.low_yield_threshold = threshold;
    }
    if let Some(streak) = file.low_yield_streak {
        if streak == 0 {
            return Err(ConfigError::Invalid {
                field: "low_yield_streak",
                message: "must be at least 1".to_string(),
            });
        }
        engine.pagination.low_yield_streak = streak;
    }
    if let Some(budget) = file.content_budget {
        engine.detail.content_budget = budget;
    }

    let output = args
        .output
        .clone()
        .or(file.output)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    Ok(RunConfig {
        target,
        engine,
        output,
        force_refresh: args.force_refresh,
    })
}

fn apply_pacing(engine: &mut EngineConfig, file: &PacingFile) -> Result<(), ConfigError> {
    let pacing = &mut engine.pacing;
    if let Some(secs) = file.base_delay_secs {
        pacing.base_delay = seconds("pacing.base_delay_secs", secs)?;
    }
    if let Some(secs) = file.jitter_min_secs {
        pacing.jitter_min = seconds("pacing.jitter_min_secs", secs)?;
    }
    if let Some(secs) = file.jitter_max_secs {
        pacing.jitter_max = seconds("pacing.jitter_max_secs", secs)?;
    }
    if let Some(p) = file.reading_pause_probability {
        if !(0.0..=1.0).contains(&p) {
            return Err(ConfigError::Invalid {
                field: "pacing.reading_pause_probability",
                message: format!("{p} is outside 0..=1"),
            });
        }
        pacing.reading_pause_probability = p;
    }
    if let Some(secs) = file.reading_pause_min_secs {
        pacing.reading_pause_min = seconds("pacing.reading_pause_min_secs", secs)?;
    }
    if let Some(secs) = file.reading_pause_max_secs {
        pacing.reading_pause_max = seconds("pacing.reading_pause_max_secs", secs)?;
    }
    if pacing.jitter_min > pacing.jitter_max {
        return Err(ConfigError::Invalid {
            field: "pacing.jitter_min_secs",
            message: "greater than pacing.jitter_max_secs".to_string(),
        });
    }
    Ok(())
}

fn seconds(field: &'static str, secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|err| ConfigError::Invalid {
        field,
        message: format!("{secs}: {err}"),
    })
}
