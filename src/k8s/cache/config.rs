/**
 * Configuration constants and settings for the watch cache
 */
use rand::Rng;
use std::time::Duration;

/// Watch stream timeout in seconds (294 vs 300 to allow 6 seconds for graceful shutdown)
pub const WATCH_TIMEOUT_SECONDS: u32 = 294;

/// Initial backoff after a fault, in milliseconds
pub const INITIAL_BACKOFF_MILLIS: u64 = 500;

/// Maximum backoff time in seconds between restart attempts
pub const MAX_BACKOFF_SECONDS: u64 = 60;

/// Fraction of the delay added as random jitter
pub const DEFAULT_JITTER_FACTOR: f64 = 0.2;

/// Channel buffer size for subscriptions
pub const SUBSCRIPTION_CHANNEL_CAPACITY: usize = 100;

/// Bounded exponential backoff with jitter, applied between retries after faults
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    pub initial: Duration,
    pub max: Duration,
    pub jitter_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(INITIAL_BACKOFF_MILLIS),
            max: Duration::from_secs(MAX_BACKOFF_SECONDS),
            jitter_factor: DEFAULT_JITTER_FACTOR,
        }
    }
}

impl BackoffPolicy {
    /// Retry immediately, forever
    #[must_use]
    pub const fn immediate() -> Self {
        Self {
            initial: Duration::ZERO,
            max: Duration::ZERO,
            jitter_factor: 0.0,
        }
    }

    /// Delay before retry number `attempt` (0-based), without jitter
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt.min(16));
        self.initial.saturating_mul(factor).min(self.max)
    }

    /// Delay before retry number `attempt` with jitter applied
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if base.is_zero() || !self.jitter_factor.is_finite() || self.jitter_factor <= 0.0 {
            return base;
        }
        let base_ms = base.as_millis() as f64;
        let jitter = rand::thread_rng().gen_range(0.0..=base_ms * self.jitter_factor);
        Duration::from_millis((base_ms + jitter) as u64)
    }
}

/// Settings for a [`super::WatchCache`]
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Restrict listing and watching to one namespace; `None` means all namespaces
    pub namespace: Option<String>,
    pub watch_timeout_secs: u32,
    pub backoff: BackoffPolicy,
    pub subscription_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            watch_timeout_secs: WATCH_TIMEOUT_SECONDS,
            backoff: BackoffPolicy::default(),
            subscription_capacity: SUBSCRIPTION_CHANNEL_CAPACITY,
        }
    }
}

impl CacheConfig {
    #[must_use]
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    #[must_use]
    pub const fn with_watch_timeout(mut self, secs: u32) -> Self {
        self.watch_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub const fn with_subscription_capacity(mut self, capacity: usize) -> Self {
        self.subscription_capacity = capacity;
        self
    }
}

/// Validate configuration constants at compile time
const _: () = {
    assert!(WATCH_TIMEOUT_SECONDS > 0, "WATCH_TIMEOUT_SECONDS must be greater than 0");
    assert!(INITIAL_BACKOFF_MILLIS > 0, "INITIAL_BACKOFF_MILLIS must be greater than 0");
    assert!(MAX_BACKOFF_SECONDS > 0, "MAX_BACKOFF_SECONDS must be greater than 0");
    assert!(SUBSCRIPTION_CHANNEL_CAPACITY > 0, "SUBSCRIPTION_CHANNEL_CAPACITY must be greater than 0");
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_grows_and_caps() {
        let policy = BackoffPolicy {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(10),
            jitter_factor: 0.0,
        };
        assert_eq!(policy.delay(0), Duration::from_secs(1));
        assert_eq!(policy.delay(1), Duration::from_secs(2));
        assert_eq!(policy.delay(3), Duration::from_secs(8));
        assert_eq!(policy.delay(4), Duration::from_secs(10));
        assert_eq!(policy.delay(u32::MAX), Duration::from_secs(10));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let policy = BackoffPolicy {
            initial: Duration::from_millis(100),
            max: Duration::from_secs(1),
            jitter_factor: 0.5,
        };
        for _ in 0..50 {
            let delay = policy.delay(0);
            assert!(delay >= Duration::from_millis(100));
            assert!(delay <= Duration::from_millis(150));
        }
    }

    #[test]
    fn test_non_finite_jitter_is_ignored() {
        for jitter_factor in [f64::NAN, f64::INFINITY] {
            let policy = BackoffPolicy {
                initial: Duration::from_millis(100),
                max: Duration::from_secs(1),
                jitter_factor,
            };
            assert_eq!(policy.delay(1), Duration::from_millis(200));
        }
    }

    #[test]
    fn test_immediate_never_waits() {
        let policy = BackoffPolicy::immediate();
        assert!(policy.delay(0).is_zero());
        assert!(policy.delay(30).is_zero());
    }
}
