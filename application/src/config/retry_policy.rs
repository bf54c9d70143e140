//! Retry policy for rate-limited external services.

use coach_domain::{ConfigIssue, ConfigIssueCode};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Exponential backoff with jitter, plus a per-call timeout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first call.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
    /// Fraction of the delay added or removed at random, in `[0, 1]`.
    pub jitter: f64,
    /// Timeout of each individual call.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            factor: 2.0,
            max_delay: Duration::from_secs(8),
            jitter: 0.2,
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    // ==================== Builder Methods ====================

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn without_jitter(mut self) -> Self {
        self.jitter = 0.0;
        self
    }

    /// Delay before retry number `attempt` (0-based): `base * factor^attempt`,
    /// capped at `max_delay`, then jittered.
    pub fn delay_for(&self, attempt: u32, rng: &mut impl Rng) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let capped = (base_ms * self.factor.powi(attempt as i32)).min(self.max_delay.as_millis() as f64);
        let jitter_range = capped * self.jitter.clamp(0.0, 1.0);
        let jitter = if jitter_range > 0.0 {
            rng.gen_range(-jitter_range..=jitter_range)
        } else {
            0.0
        };
        Duration::from_millis((capped + jitter).max(0.0) as u64)
    }

    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();
        if self.timeout.is_zero() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::ZeroTimeout,
                "retry.timeout must be greater than zero",
            ));
        }
        if self.factor < 1.0 || !self.factor.is_finite() {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::InvalidRetryPolicy,
                format!("retry.factor must be at least 1.0 (got {})", self.factor),
            ));
        }
        if self.max_delay < self.base_delay {
            issues.push(ConfigIssue::error(
                ConfigIssueCode::InvalidRetryPolicy,
                "retry.max_delay is shorter than retry.base_delay",
            ));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            issues.push(ConfigIssue::warning(
                ConfigIssueCode::InvalidRetryPolicy,
                format!("retry.jitter {} is outside [0, 1] and will be clamped", self.jitter),
            ));
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.timeout, Duration::from_secs(30));
        assert!(policy.validate().is_empty());
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy::default().without_jitter();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(policy.delay_for(0, &mut rng), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2, &mut rng), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(10, &mut rng), Duration::from_secs(8));
    }

    #[test]
    fn test_jitter_stays_in_band() {
        let policy = RetryPolicy::default();
        let mut rng = StdRng::seed_from_u64(42);
        for attempt in 0..6 {
            let nominal = (500.0 * 2f64.powi(attempt)).min(8000.0);
            let delay = policy.delay_for(attempt as u32, &mut rng).as_millis() as f64;
            assert!(delay >= nominal * 0.8 - 1.0 && delay <= nominal * 1.2, "{delay} vs {nominal}");
        }
    }

    #[test]
    fn test_validate_flags_inverted_bounds() {
        let policy = RetryPolicy {
            max_delay: Duration::from_millis(10),
            timeout: Duration::ZERO,
            ..RetryPolicy::default()
        };
        let codes: Vec<ConfigIssueCode> = policy.validate().into_iter().map(|i| i.code).collect();
        assert_eq!(
            codes,
            vec![ConfigIssueCode::ZeroTimeout, ConfigIssueCode::InvalidRetryPolicy]
        );
    }
}
