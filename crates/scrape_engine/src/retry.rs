use std::fmt;
use std::time::Duration;

use crate::timing::{secs_between, JitterSource};
use crate::FailureKind;

/// Retryable failure classes, each with its own backoff rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// Timeouts, resets and other transport-level errors.
    Network,
    /// 500, 502, 503, 504 and any extra retryable status.
    ServerError,
    /// 429.
    RateLimited,
    /// 521, 522, 524: the edge proxy cannot reach (or refuses to reach) the origin.
    OriginUnavailable,
    /// 403: the client is being actively blocked.
    AccessDenied,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureClass::Network => "network",
            FailureClass::ServerError => "server error",
            FailureClass::RateLimited => "rate limited",
            FailureClass::OriginUnavailable => "origin unavailable",
            FailureClass::AccessDenied => "access denied",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    Retryable(FailureClass),
    Fatal,
}

/// Classifies an HTTP status. `extra_retryable` statuses are retried as server errors.
pub fn classify_status(status: u16, extra_retryable: &[u16]) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        429 => StatusClass::Retryable(FailureClass::RateLimited),
        500 | 502 | 503 | 504 => StatusClass::Retryable(FailureClass::ServerError),
        521 | 522 | 524 => StatusClass::Retryable(FailureClass::OriginUnavailable),
        403 => StatusClass::Retryable(FailureClass::AccessDenied),
        other if extra_retryable.contains(&other) => {
            StatusClass::Retryable(FailureClass::ServerError)
        }
        _ => StatusClass::Fatal,
    }
}

/// Failure class of an error kind, or `None` when the kind must not be retried.
pub fn failure_class(kind: &FailureKind, extra_retryable: &[u16]) -> Option<FailureClass> {
    match kind {
        FailureKind::Timeout | FailureKind::Network => Some(FailureClass::Network),
        FailureKind::HttpStatus(code) => match classify_status(*code, extra_retryable) {
            StatusClass::Retryable(class) => Some(class),
            StatusClass::Success | StatusClass::Fatal => None,
        },
        FailureKind::InvalidUrl
        | FailureKind::RedirectLimitExceeded
        | FailureKind::TooLarge { .. }
        | FailureKind::UnsupportedContentType { .. }
        | FailureKind::Cancelled => None,
    }
}

/// Wait after the n-th failed attempt: `n * base + U(jitter_min, jitter_max)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffRule {
    pub base: Duration,
    pub jitter_min: Duration,
    pub jitter_max: Duration,
}

impl BackoffRule {
    pub const fn new(base_secs: u64, jitter_min_secs: u64, jitter_max_secs: u64) -> Self {
        Self {
            base: Duration::from_secs(base_secs),
            jitter_min: Duration::from_secs(jitter_min_secs),
            jitter_max: Duration::from_secs(jitter_max_secs),
        }
    }

    fn linear(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(attempt.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub max_backoff: Duration,
    pub network: BackoffRule,
    pub server_error: BackoffRule,
    pub rate_limited: BackoffRule,
    pub origin_unavailable: BackoffRule,
    pub access_denied: BackoffRule,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            max_backoff: Duration::from_secs(120),
            network: BackoffRule::new(3, 0, 2),
            server_error: BackoffRule::new(5, 1, 4),
            rate_limited: BackoffRule::new(10, 5, 15),
            origin_unavailable: BackoffRule::new(10, 5, 15),
            access_denied: BackoffRule::new(15, 10, 20),
        }
    }
}

impl RetryPolicy {
    /// Policy with every wait set to zero; attempts are still bounded.
    pub fn immediate(max_attempts: u32) -> Self {
        let zero = BackoffRule::new(0, 0, 0);
        Self {
            max_attempts,
            max_backoff: Duration::ZERO,
            network: zero,
            server_error: zero,
            rate_limited: zero,
            origin_unavailable: zero,
            access_denied: zero,
        }
    }

    pub fn rule(&self, class: FailureClass) -> &BackoffRule {
        match class {
            FailureClass::Network => &self.network,
            FailureClass::ServerError => &self.server_error,
            FailureClass::RateLimited => &self.rate_limited,
            FailureClass::OriginUnavailable => &self.origin_unavailable,
            FailureClass::AccessDenied => &self.access_denied,
        }
    }

    /// Wait before retrying after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, class: FailureClass, attempt: u32, jitter: &dyn JitterSource) -> Duration {
        let rule = self.rule(class);
        let wait = rule.linear(attempt) + secs_between(jitter, rule.jitter_min, rule.jitter_max);
        wait.min(self.max_backoff)
    }

    /// Mean of [`RetryPolicy::backoff`] over the jitter range.
    pub fn expected_backoff(&self, class: FailureClass, attempt: u32) -> Duration {
        let rule = self.rule(class);
        let mid = (rule.jitter_min + rule.jitter_max) / 2;
        (rule.linear(attempt) + mid).min(self.max_backoff)
    }
}

/// Attempt counter for a single logical fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryState {
    attempt: u32,
    max_attempts: u32,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 0,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Starts the next attempt and returns its 1-based number.
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempt += 1;
        self.attempt
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn can_retry(&self) -> bool {
        self.attempt < self.max_attempts
    }
}
