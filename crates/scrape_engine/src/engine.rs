use std::time::Duration;

use engine_logging::{engine_error, engine_info, engine_warn};
use scrape_core::{
    start, update, AcquisitionStatus, Effect, Msg, PaginationPolicy, PaginationState, PartialReason,
};
use tokio_util::sync::CancellationToken;

use crate::detail::{DetailExtractor, DetailSettings};
use crate::identity::IdentityPool;
use crate::listing::{ExtractorError, ListingExtractor, ListingSelectors};
use crate::pacing::PacingSettings;
use crate::retry::RetryPolicy;
use crate::transport::{ResilientTransport, Transport, TransportSettings};
use crate::{
    AcquisitionReport, ArticleRecord, DetailSummary, EngineEvent, FailureKind, FetchContext,
    FetchError, FetchOutcome, FetchPurpose, ProgressSink,
};

const PAGE_PLACEHOLDER: &str = "{page}";

/// What to crawl and how far.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetConfig {
    /// Blog root; used to resolve relative article links and as detail referer.
    pub base_url: String,
    /// Listing URL with a `{page}` placeholder, e.g. `https://host/user/article/list/{page}`.
    pub listing_url_template: String,
    pub max_pages: Option<u32>,
    pub request_timeout: Duration,
    pub fetch_details: bool,
    pub detail_fetch_limit: Option<usize>,
}

impl TargetConfig {
    pub fn new(base_url: impl Into<String>, listing_url_template: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            listing_url_template: listing_url_template.into(),
            max_pages: Some(5),
            request_timeout: Duration::from_secs(30),
            fetch_details: true,
            detail_fetch_limit: Some(10),
        }
    }

    /// CSDN blog of `user_id`.
    pub fn csdn(user_id: &str) -> Self {
        let base = format!("https://blog.csdn.net/{user_id}");
        let template = format!("{base}/article/list/{PAGE_PLACEHOLDER}");
        Self::new(base, template)
    }

    /// Listing page URL under the usual `{base}/article/list/{page}` layout.
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self::new(base, format!("{base}/article/list/{PAGE_PLACEHOLDER}"))
    }

    pub fn listing_url(&self, page: u32) -> String {
        self.listing_url_template
            .replace(PAGE_PLACEHOLDER, &page.to_string())
    }
}

#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    pub transport: TransportSettings,
    pub retry: RetryPolicy,
    pub pacing: PacingSettings,
    pub identities: IdentityPool,
    pub listing: ListingSelectors,
    pub detail: DetailSettings,
    pub pagination: PaginationPolicy,
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("listing url template {0:?} has no {{page}} placeholder")]
    MissingPagePlaceholder(String),
    #[error("extractor setup failed: {0}")]
    Extractor(#[from] ExtractorError),
    #[error("http client setup failed: {0}")]
    Transport(FetchError),
}

/// Sequential acquisition: listing pages one by one, then optional detail pages.
pub struct AcquisitionEngine {
    transport: Box<dyn Transport>,
    listing: ListingExtractor,
    detail: DetailExtractor,
    pagination: PaginationPolicy,
    target: TargetConfig,
    cancel: CancellationToken,
}

impl AcquisitionEngine {
    /// Engine with a real HTTP transport. The target's timeout and page ceiling
    /// override the values in `config`.
    pub fn new(
        target: TargetConfig,
        config: EngineConfig,
        cancel: CancellationToken,
    ) -> Result<Self, EngineError> {
        let settings = TransportSettings {
            request_timeout: target.request_timeout,
            ..config.transport.clone()
        };
        let transport = ResilientTransport::builder(settings)
            .identities(config.identities.clone())
            .pacing(config.pacing.clone())
            .retry(config.retry.clone())
            .cancel(cancel.clone())
            .build()
            .map_err(EngineError::Transport)?;
        Self::with_transport(target, &config, Box::new(transport), cancel)
    }

    pub fn with_transport(
        target: TargetConfig,
        config: &EngineConfig,
        transport: Box<dyn Transport>,
        cancel: CancellationToken,
    ) -> Result<Self, EngineError> {
        if !target.listing_url_template.contains(PAGE_PLACEHOLDER) {
            return Err(EngineError::MissingPagePlaceholder(
                target.listing_url_template.clone(),
            ));
        }
        let pagination = config
            .pagination
            .clone()
            .with_max_pages(target.max_pages);
        Ok(Self {
            transport,
            listing: ListingExtractor::with_selectors(&target.base_url, &config.listing)?,
            detail: DetailExtractor::new(&config.detail)?,
            pagination,
            target,
            cancel,
        })
    }

    pub fn target(&self) -> &TargetConfig {
        &self.target
    }

    pub async fn run(&self, sink: &dyn ProgressSink) -> AcquisitionReport {
        engine_info!(
            "Starting acquisition of {} (max pages {:?})",
            self.target.base_url,
            self.pagination.max_pages
        );
        let mut records = Vec::new();
        let (mut state, mut pending) = start(&self.pagination);

        let status = loop {
            match pending.pop() {
                Some(Effect::FetchPage { page }) => {
                    let msg = self.listing_step(page, &mut records, sink).await;
                    (state, pending) = update(state, &self.pagination, msg);
                }
                Some(Effect::Finish(status)) => break status,
                None => break final_status(&state),
            }
        };
        engine_info!(
            "Listing phase ended: {} ({} records from {} pages)",
            status,
            records.len(),
            state.cursor().pages_fetched()
        );
        sink.emit(EngineEvent::ListingStopped {
            status: status.clone(),
        });

        let details = if matches!(status, AcquisitionStatus::Partial(PartialReason::Cancelled { .. })) {
            DetailSummary {
                cancelled: true,
                ..DetailSummary::default()
            }
        } else {
            self.fetch_details(&mut records, sink).await
        };

        AcquisitionReport {
            records,
            status,
            pages_fetched: state.cursor().pages_fetched(),
            details,
        }
    }

    async fn listing_step(
        &self,
        page: u32,
        records: &mut Vec<ArticleRecord>,
        sink: &dyn ProgressSink,
    ) -> Msg {
        if self.cancel.is_cancelled() {
            engine_warn!("Cancelled before listing page {}", page);
            return Msg::Cancelled;
        }

        let url = self.target.listing_url(page);
        let ctx = FetchContext {
            purpose: FetchPurpose::Listing { page },
            referer: None,
            sink,
        };
        match self.transport.fetch(&url, &ctx).await {
            FetchOutcome::Success { body, .. } => {
                let found = self.listing.extract(&body);
                let yielded = found.len();
                engine_info!("Listing page {} yielded {} records", page, yielded);
                sink.emit(EngineEvent::PageExtracted {
                    page,
                    records: yielded,
                });
                records.extend(found);
                Msg::PageExtracted { page, yielded }
            }
            FetchOutcome::RetryableFailure(err) | FetchOutcome::FatalFailure(err) => {
                if err.kind == FailureKind::Cancelled {
                    return Msg::Cancelled;
                }
                engine_error!("Listing page {} failed: {}; stopping pagination", page, err);
                Msg::ListingFailed {
                    page,
                    reason: err.kind.to_string(),
                }
            }
        }
    }

    async fn fetch_details(
        &self,
        records: &mut [ArticleRecord],
        sink: &dyn ProgressSink,
    ) -> DetailSummary {
        let mut summary = DetailSummary::default();
        if !self.target.fetch_details {
            return summary;
        }
        let limit = self.target.detail_fetch_limit.unwrap_or(usize::MAX);

        let pending = records
            .iter_mut()
            .enumerate()
            .filter(|(_, record)| !record.has_content())
            .take(limit);
        for (index, record) in pending {
            if self.cancel.is_cancelled() {
                engine_warn!("Cancelled before detail #{}", index);
                summary.cancelled = true;
                break;
            }

            let ctx = FetchContext {
                purpose: FetchPurpose::Detail { index },
                referer: Some(self.target.base_url.as_str()),
                sink,
            };
            match self.transport.fetch(&record.url, &ctx).await {
                FetchOutcome::Success { body, .. } => {
                    summary.attempted += 1;
                    record.content = self.detail.extract(&body);
                    summary.fetched += 1;
                    sink.emit(EngineEvent::DetailFetched {
                        index,
                        url: record.url.clone(),
                        content_chars: Some(record.content.chars().count()),
                    });
                }
                FetchOutcome::RetryableFailure(err) | FetchOutcome::FatalFailure(err) => {
                    if err.kind == FailureKind::Cancelled {
                        summary.cancelled = true;
                        break;
                    }
                    summary.attempted += 1;
                    summary.failed += 1;
                    engine_warn!(
                        "Detail {} failed: {}; keeping record without content",
                        record.url,
                        err
                    );
                    sink.emit(EngineEvent::DetailFetched {
                        index,
                        url: record.url.clone(),
                        content_chars: None,
                    });
                }
            }
        }

        engine_info!(
            "Detail phase: {} fetched, {} failed{}",
            summary.fetched,
            summary.failed,
            if summary.cancelled { ", cancelled" } else { "" }
        );
        summary
    }
}

/// Status of a state machine that ran out of effects without a `Finish`.
fn final_status(state: &PaginationState) -> AcquisitionStatus {
    if let Some(status) = state.status() {
        return status.clone();
    }
    let page = state.cursor().page_number();
    engine_error!("Pagination stopped at page {} without a final status", page);
    AcquisitionStatus::Partial(PartialReason::ListingFetchFailed {
        page,
        reason: "pagination stopped without a final status".to_string(),
    })
}
