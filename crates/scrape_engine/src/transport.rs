use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use futures_util::StreamExt;
use reqwest::header::{CONTENT_TYPE, REFERER};
use reqwest::Url;
use tokio_util::sync::CancellationToken;

use crate::decode::decode_body;
use crate::identity::{IdentityPool, RequestIdentity};
use crate::pacing::{PacingController, PacingSettings};
use crate::retry::{classify_status, failure_class, RetryPolicy, RetryState, StatusClass};
use crate::timing::{sleep_unless_cancelled, JitterSource, Sleeper, ThreadRngJitter, TokioSleeper};
use crate::{EngineEvent, FailureKind, FetchContext, FetchError, FetchOutcome};

#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub connect_timeout: Duration,
    /// Per-request socket timeout; the only timeout the engine applies.
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub allowed_content_types: Vec<String>,
    /// Statuses retried as server errors on top of the built-in retryable set.
    pub extra_retryable_statuses: Vec<u16>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            allowed_content_types: vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ],
            extra_retryable_statuses: Vec::new(),
        }
    }
}

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &str, ctx: &FetchContext<'_>) -> FetchOutcome;
}

/// HTTP GET with pacing, identity rotation and a bounded, class-keyed retry loop.
pub struct ResilientTransport {
    settings: TransportSettings,
    client: reqwest::Client,
    identities: IdentityPool,
    pacing: PacingController,
    retry: RetryPolicy,
    jitter: Arc<dyn JitterSource>,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancellationToken,
}

pub struct TransportBuilder {
    settings: TransportSettings,
    identities: IdentityPool,
    pacing: PacingSettings,
    retry: RetryPolicy,
    jitter: Arc<dyn JitterSource>,
    sleeper: Arc<dyn Sleeper>,
    cancel: CancellationToken,
}

impl TransportBuilder {
    pub fn new(settings: TransportSettings) -> Self {
        Self {
            settings,
            identities: IdentityPool::default(),
            pacing: PacingSettings::default(),
            retry: RetryPolicy::default(),
            jitter: Arc::new(ThreadRngJitter),
            sleeper: Arc::new(TokioSleeper),
            cancel: CancellationToken::new(),
        }
    }

    pub fn identities(mut self, identities: IdentityPool) -> Self {
        self.identities = identities;
        self
    }

    pub fn pacing(mut self, pacing: PacingSettings) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn jitter(mut self, jitter: Arc<dyn JitterSource>) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn build(self) -> Result<ResilientTransport, FetchError> {
        let client = reqwest::Client::builder()
            .connect_timeout(self.settings.connect_timeout)
            .timeout(self.settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(self.settings.redirect_limit))
            .cookie_store(true)
            .build()
            .map_err(|err| FetchError::new(FailureKind::Network, err.to_string()))?;

        if self.identities.is_empty() {
            engine_warn!("Identity pool is empty; requests go out with client default headers");
        }

        let pacing = PacingController::new(self.pacing, self.jitter.clone(), self.sleeper.clone());
        Ok(ResilientTransport {
            settings: self.settings,
            client,
            identities: self.identities,
            pacing,
            retry: self.retry,
            jitter: self.jitter,
            sleeper: self.sleeper,
            cancel: self.cancel,
        })
    }
}

impl ResilientTransport {
    pub fn builder(settings: TransportSettings) -> TransportBuilder {
        TransportBuilder::new(settings)
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }

    /// One request with one identity; classification only, no retrying here.
    async fn attempt(
        &self,
        url: &Url,
        identity: Option<&RequestIdentity>,
        referer: Option<&str>,
    ) -> FetchOutcome {
        let mut request = self.client.get(url.clone());
        if let Some(identity) = identity {
            request = request.headers(identity.header_map());
        }
        if let Some(referer) = referer {
            request = request.header(REFERER, referer);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => return error_outcome(map_reqwest_error(err), &self.settings),
        };

        let status = response.status();
        match classify_status(status.as_u16(), &self.settings.extra_retryable_statuses) {
            StatusClass::Success => {}
            StatusClass::Retryable(_) => {
                return FetchOutcome::RetryableFailure(FetchError::new(
                    FailureKind::HttpStatus(status.as_u16()),
                    status.to_string(),
                ))
            }
            StatusClass::Fatal => {
                return FetchOutcome::FatalFailure(FetchError::new(
                    FailureKind::HttpStatus(status.as_u16()),
                    status.to_string(),
                ))
            }
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return FetchOutcome::FatalFailure(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(content_len),
                    },
                    "response too large",
                ));
            }
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if let Some(ct) = content_type.as_deref() {
            if !self.is_content_type_allowed(ct) {
                return FetchOutcome::FatalFailure(FetchError::new(
                    FailureKind::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    "unsupported content type",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => return error_outcome(map_reqwest_error(err), &self.settings),
            };
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return FetchOutcome::FatalFailure(FetchError::new(
                    FailureKind::TooLarge {
                        max_bytes: self.settings.max_bytes,
                        actual: Some(next_len),
                    },
                    "response too large",
                ));
            }
            bytes.extend_from_slice(&chunk);
        }

        let decoded = decode_body(&bytes, content_type.as_deref());
        if decoded.lossy {
            engine_warn!(
                "Body of {} had invalid {} sequences; decoded lossily",
                url,
                decoded.encoding_label
            );
        }
        FetchOutcome::Success {
            body: decoded.text,
            status: status.as_u16(),
        }
    }
}

#[async_trait::async_trait]
impl Transport for ResilientTransport {
    async fn fetch(&self, url: &str, ctx: &FetchContext<'_>) -> FetchOutcome {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(err) => {
                engine_warn!("Refusing to fetch {} ({}): {}", url, ctx.purpose, err);
                return FetchOutcome::FatalFailure(FetchError::new(
                    FailureKind::InvalidUrl,
                    err.to_string(),
                ));
            }
        };
        // Retries present themselves as in-site navigation.
        let origin_referer = format!("{}/", parsed.origin().ascii_serialization());

        let mut state = RetryState::new(self.retry.max_attempts);
        let mut previous_identity = None;
        loop {
            if self.cancel.is_cancelled() {
                return FetchOutcome::FatalFailure(FetchError::cancelled());
            }
            let attempt = state.begin_attempt();
            ctx.sink.emit(EngineEvent::Attempt {
                purpose: ctx.purpose,
                attempt,
                max_attempts: state.max_attempts(),
            });

            if !self.pacing.delay_before_request(&self.cancel).await {
                return FetchOutcome::FatalFailure(FetchError::cancelled());
            }

            let selected = self.identities.select(previous_identity, self.jitter.as_ref());
            previous_identity = selected.map(|(index, _)| index);
            let referer = ctx
                .referer
                .or_else(|| (attempt > 1).then_some(origin_referer.as_str()));

            engine_info!(
                "GET {} ({}, attempt {}/{}, identity {:?})",
                url,
                ctx.purpose,
                attempt,
                state.max_attempts(),
                previous_identity
            );
            let outcome = self
                .attempt(&parsed, selected.map(|(_, identity)| identity), referer)
                .await;

            let err = match outcome {
                FetchOutcome::RetryableFailure(err) => err,
                FetchOutcome::FatalFailure(err) => {
                    engine_warn!("{} failed without retry: {}", ctx.purpose, err);
                    return FetchOutcome::FatalFailure(err);
                }
                success => {
                    engine_debug!("{} fetched on attempt {}", ctx.purpose, attempt);
                    return success;
                }
            };

            let Some(class) = failure_class(&err.kind, &self.settings.extra_retryable_statuses)
            else {
                return FetchOutcome::FatalFailure(err);
            };
            if !state.can_retry() {
                engine_warn!(
                    "{} exhausted {} attempts; last failure: {}",
                    ctx.purpose,
                    state.attempt(),
                    err
                );
                return FetchOutcome::RetryableFailure(err);
            }

            let wait = self.retry.backoff(class, attempt, self.jitter.as_ref());
            engine_warn!(
                "{} failed ({}, {}); backing off {:.1}s",
                ctx.purpose,
                err,
                class,
                wait.as_secs_f64()
            );
            ctx.sink.emit(EngineEvent::Backoff {
                purpose: ctx.purpose,
                class,
                wait,
            });
            if !sleep_unless_cancelled(self.sleeper.as_ref(), wait, &self.cancel).await {
                return FetchOutcome::FatalFailure(FetchError::cancelled());
            }
        }
    }
}

fn error_outcome(err: FetchError, settings: &TransportSettings) -> FetchOutcome {
    match failure_class(&err.kind, &settings.extra_retryable_statuses) {
        Some(_) => FetchOutcome::RetryableFailure(err),
        None => FetchOutcome::FatalFailure(err),
    }
}

fn map_reqwest_error(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        return FetchError::new(FailureKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return FetchError::new(FailureKind::RedirectLimitExceeded, err.to_string());
    }
    if err.is_builder() {
        return FetchError::new(FailureKind::InvalidUrl, err.to_string());
    }
    FetchError::new(FailureKind::Network, err.to_string())
}
