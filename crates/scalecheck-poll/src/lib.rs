//! scalecheck-poll — bounded wait-for-condition.
//!
//! `wait_for` samples an observable value at a fixed cadence until a
//! predicate holds or the deadline budget is spent. A deadline that
//! elapses is a normal negative result, not an error; a failing
//! observation is a non-matching tick, logged and tolerated, so one
//! connectivity blip does not abort a sixty-second wait.
//!
//! The primitive holds no state between calls, so a caller can reuse
//! it with a different predicate for each assertion of a scenario.

use std::time::Duration;

use tracing::{debug, warn};

/// Poll cadence: a deadline budget and the interval between samples.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    /// Total observation budget.
    pub max_wait: Duration,
    /// Sleep between consecutive observations.
    pub interval: Duration,
}

impl PollConfig {
    pub fn new(max_wait: Duration, interval: Duration) -> Self {
        Self { max_wait, interval }
    }

    /// Number of observations the budget affords.
    ///
    /// At least one observation is always made, even when the budget
    /// is smaller than the interval.
    pub fn attempts(&self) -> u64 {
        if self.interval.is_zero() {
            return 1;
        }
        (self.max_wait.as_millis() / self.interval.as_millis()).max(1) as u64
    }
}

/// Outcome of one `wait_for` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollOutcome<V> {
    /// Whether the predicate held before the budget ran out.
    pub satisfied: bool,
    /// Most recent successfully observed value, for diagnostics.
    pub last_observed: Option<V>,
    /// Observations performed.
    pub attempts: u64,
    /// Observations that failed and were counted as non-matching.
    pub observe_errors: u64,
}

/// Poll `observe` until `predicate` holds or the budget is spent.
///
/// The first observation is immediate; each subsequent observation
/// follows one `interval` of sleep, for at most
/// `max(1, floor(max_wait / interval))` observations. Total wall
/// clock is therefore bounded by roughly `max_wait` plus one
/// interval, regardless of outcome.
///
/// Observation errors are logged and treated as a non-matching tick
/// for that attempt.
pub async fn wait_for<V, F, Fut, P>(mut observe: F, predicate: P, config: PollConfig) -> PollOutcome<V>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<V>>,
    P: Fn(&V) -> bool,
    V: std::fmt::Debug,
{
    let attempts = config.attempts();
    let mut last_observed = None;
    let mut observe_errors = 0;

    for attempt in 1..=attempts {
        match observe().await {
            Ok(value) => {
                if predicate(&value) {
                    debug!(?value, attempt, "condition satisfied");
                    return PollOutcome {
                        satisfied: true,
                        last_observed: Some(value),
                        attempts: attempt,
                        observe_errors,
                    };
                }
                debug!(?value, attempt, "condition not yet satisfied");
                last_observed = Some(value);
            }
            Err(e) => {
                observe_errors += 1;
                warn!(error = %e, attempt, "observation failed, counting as non-matching tick");
            }
        }

        if attempt < attempts {
            tokio::time::sleep(config.interval).await;
        }
    }

    PollOutcome {
        satisfied: false,
        last_observed,
        attempts,
        observe_errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::time::Instant;

    fn config(max_wait_secs: u64, interval_secs: u64) -> PollConfig {
        PollConfig::new(
            Duration::from_secs(max_wait_secs),
            Duration::from_secs(interval_secs),
        )
    }

    /// Observation source that yields `values[n]` on the n-th call and
    /// repeats the last value once exhausted.
    fn stepped(values: Vec<u32>) -> impl FnMut() -> std::future::Ready<anyhow::Result<u32>> {
        let calls = Arc::new(AtomicU64::new(0));
        move || {
            let n = calls.fetch_add(1, Ordering::SeqCst) as usize;
            let v = *values.get(n).unwrap_or(values.last().unwrap());
            std::future::ready(Ok(v))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_true_on_first_match() {
        let outcome = wait_for(stepped(vec![1]), |v| *v == 1, config(60, 1)).await;
        assert!(outcome.satisfied);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(outcome.last_observed, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn returns_true_once_value_reaches_expected() {
        let outcome = wait_for(stepped(vec![0, 0, 0, 1]), |v| *v == 1, config(60, 1)).await;
        assert!(outcome.satisfied);
        assert_eq!(outcome.attempts, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_false_after_deadline() {
        let outcome = wait_for(stepped(vec![0]), |v| *v == 1, config(10, 1)).await;
        assert!(!outcome.satisfied);
        assert_eq!(outcome.attempts, 10);
        assert_eq!(outcome.last_observed, Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn wall_clock_stays_within_budget() {
        let start = Instant::now();
        let outcome = wait_for(stepped(vec![0]), |v| *v == 1, config(60, 1)).await;
        let elapsed = start.elapsed();

        assert!(!outcome.satisfied);
        // 60 observations, 59 sleeps of 1s in paused time.
        assert!(elapsed <= Duration::from_secs(61), "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn observation_errors_count_as_non_matching_ticks() {
        let calls = Arc::new(AtomicU64::new(0));
        let calls2 = calls.clone();
        let observe = move || {
            let n = calls2.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if n < 2 {
                Err(anyhow::anyhow!("connection refused"))
            } else {
                Ok(7u32)
            })
        };

        let outcome = wait_for(observe, |v| *v == 7, config(60, 1)).await;
        assert!(outcome.satisfied);
        assert_eq!(outcome.observe_errors, 2);
        assert_eq!(outcome.attempts, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn all_errors_is_a_negative_result_not_a_hang() {
        let observe = || std::future::ready(Err::<u32, _>(anyhow::anyhow!("down")));
        let outcome = wait_for(observe, |v| *v == 0, config(5, 1)).await;
        assert!(!outcome.satisfied);
        assert_eq!(outcome.last_observed, None);
        assert_eq!(outcome.observe_errors, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_smaller_than_interval_still_observes_once() {
        let outcome = wait_for(stepped(vec![1]), |v| *v == 1, config(0, 1)).await;
        assert!(outcome.satisfied);
        assert_eq!(outcome.attempts, 1);
    }

    #[test]
    fn attempts_calculation() {
        assert_eq!(config(60, 1).attempts(), 60);
        assert_eq!(config(10, 3).attempts(), 3);
        assert_eq!(config(1, 2).attempts(), 1);
        assert_eq!(PollConfig::new(Duration::from_secs(5), Duration::ZERO).attempts(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restartable_with_different_predicates() {
        let cfg = config(10, 1);
        let up = wait_for(stepped(vec![0, 1]), |v| *v == 1, cfg).await;
        assert!(up.satisfied);
        let down = wait_for(stepped(vec![1, 0]), |v| *v == 0, cfg).await;
        assert!(down.satisfied);
    }
}
