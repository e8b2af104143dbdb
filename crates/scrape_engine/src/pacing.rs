use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info};
use tokio_util::sync::CancellationToken;

use crate::timing::{secs_between, sleep_unless_cancelled, JitterSource, Sleeper};

#[derive(Debug, Clone, PartialEq)]
pub struct PacingSettings {
    pub base_delay: Duration,
    pub jitter_min: Duration,
    pub jitter_max: Duration,
    /// Probability of adding a reading pause before a request.
    pub reading_pause_probability: f64,
    pub reading_pause_min: Duration,
    pub reading_pause_max: Duration,
}

impl Default for PacingSettings {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            jitter_min: Duration::from_secs(1),
            jitter_max: Duration::from_secs(4),
            reading_pause_probability: 0.1,
            reading_pause_min: Duration::from_secs(5),
            reading_pause_max: Duration::from_secs(15),
        }
    }
}

impl PacingSettings {
    /// No delay at all; for tests and local targets.
    pub fn none() -> Self {
        Self {
            base_delay: Duration::ZERO,
            jitter_min: Duration::ZERO,
            jitter_max: Duration::ZERO,
            reading_pause_probability: 0.0,
            reading_pause_min: Duration::ZERO,
            reading_pause_max: Duration::ZERO,
        }
    }
}

/// Delay drawn before one request, split so the reading pause can be logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delay {
    pub regular: Duration,
    pub reading_pause: Option<Duration>,
}

impl Delay {
    pub fn total(&self) -> Duration {
        self.regular + self.reading_pause.unwrap_or_default()
    }
}

/// Human-like pacing in front of every request attempt, retries included.
///
/// Stateless between calls; delays depend only on the settings and the jitter source.
#[derive(Clone)]
pub struct PacingController {
    settings: PacingSettings,
    jitter: Arc<dyn JitterSource>,
    sleeper: Arc<dyn Sleeper>,
}

impl PacingController {
    pub fn new(
        settings: PacingSettings,
        jitter: Arc<dyn JitterSource>,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            settings,
            jitter,
            sleeper,
        }
    }

    pub fn settings(&self) -> &PacingSettings {
        &self.settings
    }

    pub fn next_delay(&self) -> Delay {
        let s = &self.settings;
        let regular = s.base_delay + secs_between(self.jitter.as_ref(), s.jitter_min, s.jitter_max);
        let reading_pause = (s.reading_pause_probability > 0.0
            && self.jitter.chance(s.reading_pause_probability))
        .then(|| secs_between(self.jitter.as_ref(), s.reading_pause_min, s.reading_pause_max));
        Delay {
            regular,
            reading_pause,
        }
    }

    /// Blocks the caller for the next delay. Returns `false` if cancelled while waiting.
    pub async fn delay_before_request(&self, cancel: &CancellationToken) -> bool {
        let delay = self.next_delay();
        match delay.reading_pause {
            Some(pause) => engine_info!(
                "Reading pause: waiting {:.1}s (+{:.1}s extra)",
                delay.total().as_secs_f64(),
                pause.as_secs_f64()
            ),
            None => engine_debug!("Pacing delay {:.2}s", delay.regular.as_secs_f64()),
        }
        sleep_unless_cancelled(self.sleeper.as_ref(), delay.total(), cancel).await
    }
}
