use rand::Rng;
use std::time::Duration;

/// High-level classification of an item failure for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Operation timed out (connect/read).
    Timeout,
    /// Server asked us to slow down (e.g. 429, 503).
    Throttled,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// HTTP status that is retryable but not strictly throttling (5xx).
    Http5xx(u16),
    /// External accelerator tool unavailable or misbehaving.
    ToolUnavailable,
    /// Downloaded file rejected by validation; retried under the smaller
    /// validation policy since re-downloads rarely fix site-side truncation.
    Validation,
    /// Filesystem failure; never retried.
    Storage,
    /// Any other error (typically not retried).
    Other,
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Do not retry this error.
    NoRetry,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Exponential backoff policy with cap and jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Base delay for backoff.
    pub base_delay: Duration,
    /// Upper bound on backoff delay.
    pub max_delay: Duration,
    /// Jitter fraction in [0, 1]; each delay is scaled by a uniform factor
    /// in [1 - jitter, 1 + jitter].
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(60),
            jitter: 0.25,
        }
    }
}

impl RetryPolicy {
    /// Policy for transport failures, from config. `max_retries` counts
    /// retries, so attempts = retries + 1; an explicit `[retry]` table
    /// overrides everything.
    pub fn transport_from_config(cfg: &crate::config::VarcConfig) -> Self {
        match &cfg.retry {
            Some(r) => Self {
                max_attempts: r.max_attempts.max(1),
                base_delay: Duration::from_secs_f64(r.base_delay_secs.max(0.0)),
                max_delay: Duration::from_secs(r.max_delay_secs),
                jitter: r.jitter.clamp(0.0, 1.0),
            },
            None => Self {
                max_attempts: cfg.max_retries.saturating_add(1),
                ..Self::default()
            },
        }
    }

    /// Policy for validation failures: one re-download, shorter backoff.
    pub fn validation() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
            jitter: 0.25,
        }
    }

    /// Compute the next backoff decision for a given attempt and error kind.
    ///
    /// `attempt` is 1-based (1 = first attempt). Returns `NoRetry` when we
    /// should stop retrying.
    pub fn decide(&self, attempt: u32, kind: ErrorKind) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::NoRetry;
        }

        match kind {
            ErrorKind::Other | ErrorKind::Storage => RetryDecision::NoRetry,
            ErrorKind::Timeout
            | ErrorKind::Connection
            | ErrorKind::Throttled
            | ErrorKind::ToolUnavailable
            | ErrorKind::Validation
            | ErrorKind::Http5xx(_) => {
                // base * 2^(attempt-1), capped, then jittered.
                let exp = 1u32.saturating_mul(1 << attempt.saturating_sub(1).min(8));
                let raw = self.base_delay.saturating_mul(exp);
                let capped = raw.min(self.max_delay);
                RetryDecision::RetryAfter(self.apply_jitter(capped))
            }
        }
    }

    fn apply_jitter(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 {
            return delay;
        }
        let factor = rand::thread_rng().gen_range(1.0 - self.jitter..=1.0 + self.jitter);
        let jittered = delay.as_secs_f64() * factor;
        Duration::from_secs_f64(jittered.max(0.0)).min(self.max_delay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter(policy: RetryPolicy) -> RetryPolicy {
        RetryPolicy { jitter: 0.0, ..policy }
    }

    #[test]
    fn no_retry_for_other_and_storage() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(1, ErrorKind::Other), RetryDecision::NoRetry);
        assert_eq!(p.decide(1, ErrorKind::Storage), RetryDecision::NoRetry);
    }

    #[test]
    fn exponential_backoff_grows_and_is_capped() {
        let mut p = no_jitter(RetryPolicy::default());
        p.max_attempts = 20;
        let d1 = match p.decide(1, ErrorKind::Timeout) {
            RetryDecision::RetryAfter(d) => d,
            _ => panic!("expected retry"),
        };
        let d2 = match p.decide(2, ErrorKind::Timeout) {
            RetryDecision::RetryAfter(d) => d,
            _ => panic!("expected retry"),
        };
        assert!(d2 >= d1);

        let d_last = match p.decide(10, ErrorKind::Timeout) {
            RetryDecision::RetryAfter(d) => d,
            _ => panic!("expected retry"),
        };
        assert!(d_last <= p.max_delay);
    }

    #[test]
    fn respects_max_attempts() {
        let mut p = no_jitter(RetryPolicy::default());
        p.max_attempts = 3;
        assert!(matches!(
            p.decide(1, ErrorKind::Throttled),
            RetryDecision::RetryAfter(_)
        ));
        assert!(matches!(
            p.decide(2, ErrorKind::Throttled),
            RetryDecision::RetryAfter(_)
        ));
        assert_eq!(p.decide(3, ErrorKind::Throttled), RetryDecision::NoRetry);
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let p = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(600),
            jitter: 0.25,
        };
        for _ in 0..100 {
            match p.decide(1, ErrorKind::Connection) {
                RetryDecision::RetryAfter(d) => {
                    assert!(d >= Duration::from_secs(3), "delay {:?} below jitter floor", d);
                    assert!(d <= Duration::from_secs(5), "delay {:?} above jitter ceiling", d);
                }
                _ => panic!("expected retry"),
            }
        }
    }

    #[test]
    fn validation_policy_allows_exactly_one_retry() {
        let p = no_jitter(RetryPolicy::validation());
        assert!(matches!(
            p.decide(1, ErrorKind::Validation),
            RetryDecision::RetryAfter(_)
        ));
        assert_eq!(p.decide(2, ErrorKind::Validation), RetryDecision::NoRetry);
    }

    #[test]
    fn transport_policy_from_config_counts_retries() {
        let mut cfg = crate::config::VarcConfig::default();
        cfg.max_retries = 3;
        let p = RetryPolicy::transport_from_config(&cfg);
        assert_eq!(p.max_attempts, 4);

        cfg.retry = Some(crate::config::RetryConfig {
            max_attempts: 2,
            base_delay_secs: 0.1,
            max_delay_secs: 1,
            jitter: 0.0,
        });
        let p = RetryPolicy::transport_from_config(&cfg);
        assert_eq!(p.max_attempts, 2);
        assert_eq!(p.base_delay, Duration::from_millis(100));
    }
}
