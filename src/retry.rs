use crate::config::RetryConfig;
use crate::error::EngineError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Exponential backoff with half-to-full jitter, matching the attempt
/// sequence and bounds this document fixes in §5 for `BookingEngine::Create`.
fn backoff_delay(cfg: &RetryConfig, attempt: u32) -> Duration {
    let exp = cfg.base_delay.as_millis() as u64 * 2u64.saturating_pow(attempt);
    let capped = exp.min(cfg.max_delay.as_millis() as u64);
    let jitter_factor = rand::thread_rng().gen_range(0.5..=1.0);
    Duration::from_millis(((capped as f64) * jitter_factor) as u64)
}

/// Runs `op` up to `cfg.max_attempts` times, retrying only on
/// [`EngineError::is_transient`] errors and sleeping a jittered exponential
/// backoff between attempts. Non-transient errors return immediately.
pub async fn retry_transient<F, Fut, T>(cfg: &RetryConfig, mut op: F) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, EngineError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if e.is_transient() && attempt + 1 < cfg.max_attempts => {
                let delay = backoff_delay(cfg, attempt);
                log::warn!(
                    "transient error on attempt {}/{}: {e}; retrying in {:?}",
                    attempt + 1,
                    cfg.max_attempts,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_stays_within_configured_bounds() {
        let cfg = RetryConfig::default();
        for attempt in 0..6 {
            let d = backoff_delay(&cfg, attempt);
            assert!(d <= cfg.max_delay);
        }
    }

    #[test]
    fn backoff_grows_with_attempt_before_capping() {
        let cfg = RetryConfig {
            max_attempts: 10,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
        };
        // Upper bound (jitter factor 1.0) should roughly double each step
        // until the cap; we only assert monotonic non-decrease of the cap
        // itself since jitter makes exact growth non-deterministic.
        let exp0 = cfg.base_delay.as_millis() as u64;
        let exp1 = exp0 * 2;
        assert!(exp1 > exp0);
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let cfg = RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };
        let mut calls = 0;
        let result: Result<i32, EngineError> = retry_transient(&cfg, || {
            calls += 1;
            let call = calls;
            async move {
                if call < 2 {
                    Err(EngineError::StaleVersion(uuid::Uuid::nil()))
                } else {
                    Ok(42)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn does_not_retry_non_transient_errors() {
        let cfg = RetryConfig::default();
        let mut calls = 0;
        let result: Result<i32, EngineError> = retry_transient(&cfg, || {
            calls += 1;
            async move { Err(EngineError::EventNotFound(uuid::Uuid::nil())) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn retries_seat_held_by_another_user_but_not_seat_already_booked() {
        let cfg = RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        };
        let mut calls = 0;
        let result: Result<i32, EngineError> = retry_transient(&cfg, || {
            calls += 1;
            async move {
                Err(EngineError::SeatNotAvailable {
                    seat_id: uuid::Uuid::nil(),
                    status: "Held".into(),
                })
            }
        })
        .await;
        assert!(matches!(result, Err(EngineError::SeatNotAvailable { .. })));
        assert_eq!(calls, 3, "a seat merely HELD by someone else should be retried up to the attempt cap");

        let mut calls2 = 0;
        let result2: Result<i32, EngineError> = retry_transient(&cfg, || {
            calls2 += 1;
            async move {
                Err(EngineError::SeatNotAvailable {
                    seat_id: uuid::Uuid::nil(),
                    status: "Booked".into(),
                })
            }
        })
        .await;
        assert!(result2.is_err());
        assert_eq!(calls2, 1, "a seat already BOOKED is a definitive loss, not retried");
    }
}
