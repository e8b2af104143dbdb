//! Randomness and sleeping seams shared by pacing, backoff and identity rotation.
use std::sync::Mutex;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

pub trait JitterSource: Send + Sync {
    /// Uniform sample from `[low, high)`; returns `low` for an empty range.
    fn uniform(&self, low: f64, high: f64) -> f64;
    /// `true` with the given probability.
    fn chance(&self, probability: f64) -> bool;
    /// Index in `0..len`; `len` is never zero.
    fn pick(&self, len: usize) -> usize;
}

/// Production jitter backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRngJitter;

impl JitterSource for ThreadRngJitter {
    fn uniform(&self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        rand::random_range(low..high)
    }

    fn chance(&self, probability: f64) -> bool {
        rand::random_bool(probability.clamp(0.0, 1.0))
    }

    fn pick(&self, len: usize) -> usize {
        if len <= 1 {
            return 0;
        }
        rand::random_range(0..len)
    }
}

/// Deterministic jitter for tests: samples at a fixed fraction of each range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedJitter {
    pub fraction: f64,
    pub pause: bool,
}

impl FixedJitter {
    pub fn new(fraction: f64) -> Self {
        Self {
            fraction: fraction.clamp(0.0, 1.0),
            pause: false,
        }
    }

    pub fn with_reading_pause(mut self) -> Self {
        self.pause = true;
        self
    }
}

impl Default for FixedJitter {
    fn default() -> Self {
        Self::new(0.5)
    }
}

impl JitterSource for FixedJitter {
    fn uniform(&self, low: f64, high: f64) -> f64 {
        if high <= low {
            return low;
        }
        low + (high - low) * self.fraction
    }

    fn chance(&self, _probability: f64) -> bool {
        self.pause
    }

    fn pick(&self, _len: usize) -> usize {
        0
    }
}

#[async_trait::async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait::async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Sleeper that returns immediately and remembers every requested duration.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn durations(&self) -> Vec<Duration> {
        self.slept
            .lock()
            .map(|slept| slept.clone())
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        if let Ok(mut slept) = self.slept.lock() {
            slept.push(duration);
        }
    }
}

/// Sleeps unless cancelled first. Returns `false` when the token fired.
pub(crate) async fn sleep_unless_cancelled(
    sleeper: &dyn Sleeper,
    duration: Duration,
    cancel: &CancellationToken,
) -> bool {
    if cancel.is_cancelled() {
        return false;
    }
    if duration.is_zero() {
        return true;
    }
    tokio::select! {
        _ = sleeper.sleep(duration) => !cancel.is_cancelled(),
        _ = cancel.cancelled() => false,
    }
}

pub(crate) fn secs_between(jitter: &dyn JitterSource, low: Duration, high: Duration) -> Duration {
    Duration::from_secs_f64(jitter.uniform(low.as_secs_f64(), high.as_secs_f64()).max(0.0))
}
