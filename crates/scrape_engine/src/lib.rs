//! Scrape engine: resilient listing/detail acquisition for a paginated blog.
mod decode;
mod detail;
mod engine;
mod identity;
mod listing;
mod pacing;
mod persist;
mod retry;
mod text;
mod timing;
mod transport;
mod types;

pub use decode::{decode_body, DecodedBody};
pub use detail::{
    truncate_chars, DetailExtractor, DetailSettings, DEFAULT_CONTENT_BUDGET, TRUNCATION_MARKER,
};
pub use engine::{AcquisitionEngine, EngineConfig, EngineError, TargetConfig};
pub use identity::{IdentityPool, RequestIdentity};
pub use listing::{ExtractorError, ListingExtractor, ListingSelectors};
pub use pacing::{Delay, PacingController, PacingSettings};
pub use persist::{ArticleCache, PersistError};
pub use retry::{
    classify_status, failure_class, BackoffRule, FailureClass, RetryPolicy, RetryState,
    StatusClass,
};
pub use text::{flatten_text, resolve_url};
pub use timing::{FixedJitter, JitterSource, RecordingSleeper, Sleeper, ThreadRngJitter, TokioSleeper};
pub use transport::{ResilientTransport, Transport, TransportBuilder, TransportSettings};
pub use types::{
    AcquisitionReport, ArticleRecord, DetailSummary, EngineEvent, FailureKind, FetchContext,
    FetchError, FetchOutcome, FetchPurpose, NullProgressSink, ProgressSink,
};

pub use scrape_core::{AcquisitionStatus, CompletionReason, PaginationPolicy, PartialReason};
