//! Request pacing shared by every page fetch
//!
//! This module handles:
//! - Spacing requests so the configured budget per interval is never exceeded
//! - Widening that spacing when the platform signals throttling
//! - Narrowing it back toward the baseline after successful calls

use crate::config::CrawlerConfig;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// How the limiter reacts to throttling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Factor applied to the spacing on every penalty, and undone on every success
    pub multiplier: u32,

    /// Upper bound for the widened spacing and for honoured retry-after delays
    pub max_spacing: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            multiplier: 2,
            max_spacing: Duration::from_secs(60),
        }
    }
}

#[derive(Debug)]
struct LimiterState {
    /// Earliest instant the next caller may proceed
    next_slot: Instant,

    /// Current gap between consecutive slots
    spacing: Duration,
}

/// Paces outbound requests to at most `budget` per `interval`
///
/// Callers reserve the next free slot under a lock and then sleep until it
/// arrives, so concurrent callers queue up one spacing apart and the budget
/// cannot be bypassed by parallelism. The limiter never fails; it only delays.
#[derive(Debug)]
pub struct RateLimiter {
    state: Mutex<LimiterState>,
    baseline: Duration,
    policy: BackoffPolicy,
}

impl RateLimiter {
    /// Creates a limiter allowing `budget` requests per `interval`
    ///
    /// # Arguments
    ///
    /// * `budget` - Maximum requests per interval (treated as at least 1)
    /// * `interval` - Length of the budget interval
    /// * `policy` - Backoff behaviour on throttling
    pub fn new(budget: u32, interval: Duration, policy: BackoffPolicy) -> Self {
        let baseline = interval / budget.max(1);
        Self {
            state: Mutex::new(LimiterState {
                next_slot: Instant::now(),
                spacing: baseline,
            }),
            baseline,
            policy,
        }
    }

    /// Creates a limiter from the crawler configuration
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.rate_limiter_budget,
            Duration::from_millis(config.rate_limiter_interval_ms),
            BackoffPolicy {
                multiplier: 2,
                max_spacing: Duration::from_millis(config.max_backoff_ms),
            },
        )
    }

    /// Waits until the caller is permitted to send one request
    pub async fn acquire(&self) {
        let slot = {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            let slot = state.next_slot.max(now);
            state.next_slot = slot + state.spacing;
            slot
        };

        tokio::time::sleep_until(slot).await;
    }

    /// Widens the spacing after a throttling signal or a failed call
    ///
    /// The spacing grows by the policy multiplier up to `max_spacing`, and no
    /// slot is handed out before `retry_after` (or one new spacing) has passed.
    pub async fn penalize(&self, retry_after: Option<Duration>) {
        let mut state = self.state.lock().await;
        let widened = state.spacing.saturating_mul(self.policy.multiplier.max(1));
        state.spacing = widened.min(self.policy.max_spacing).max(self.baseline);

        let pause = retry_after
            .unwrap_or(state.spacing)
            .min(self.policy.max_spacing);
        let resume_at = Instant::now() + pause;
        if resume_at > state.next_slot {
            state.next_slot = resume_at;
        }

        tracing::debug!(
            "Rate limiter backing off: spacing {:?}, paused for {:?}",
            state.spacing,
            pause
        );
    }

    /// Narrows the spacing back toward the baseline after a successful call
    pub async fn record_success(&self) {
        let mut state = self.state.lock().await;
        if state.spacing > self.baseline {
            state.spacing = (state.spacing / self.policy.multiplier.max(1)).max(self.baseline);
            tracing::trace!("Rate limiter recovering: spacing {:?}", state.spacing);
        }
    }

    /// Current gap between consecutive requests
    pub async fn current_spacing(&self) -> Duration {
        self.state.lock().await.spacing
    }

    pub fn baseline(&self) -> Duration {
        self.baseline
    }
}
