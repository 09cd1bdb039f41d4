//! Retry helpers for throttled DuploCloud APIs
//!
//! Two strategies are provided:
//!
//! - [`RetryConf`] retries calls failing with AWS throttling ("Rate exceeded")
//!   or transient HRESULT/400 errors, with randomized per-attempt delays.
//! - [`retry_with_exponential_backoff`] retries any call while a caller
//!   predicate says the error is retryable, until a total timeout elapses.

use super::client::DuploClient;
use super::error::{ClientError, ClientResult};
use rand::Rng;
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::time::Duration;

/// Rate-limit retry settings; delays are whole seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConf {
    pub max_attempts: u32,
    pub min_starting_delay: u64,
    pub max_starting_delay: u64,
    pub min_delay: u64,
    pub max_delay: u64,
    pub min_jitter_delay: u64,
}

impl Default for RetryConf {
    fn default() -> Self {
        Self {
            max_attempts: 9,
            min_starting_delay: 1,
            max_starting_delay: 7,
            min_delay: 3,
            max_delay: 15,
            min_jitter_delay: 6,
        }
    }
}

impl RetryConf {
    /// No waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            min_starting_delay: 0,
            max_starting_delay: 0,
            min_delay: 0,
            max_delay: 0,
            min_jitter_delay: 0,
        }
    }

    /// Inclusive delay bounds, in seconds, for a 1-based attempt number
    pub fn backoff_bounds(&self, attempt: u32) -> (u64, u64) {
        match attempt {
            0 | 1 => (self.min_starting_delay, self.max_starting_delay),
            2 | 3 => (self.min_delay, self.max_delay),
            _ => (
                self.min_jitter_delay,
                self.min_jitter_delay + u64::from(attempt) * self.min_starting_delay,
            ),
        }
    }

    /// Random delay for a 1-based attempt number
    pub fn backoff_interval(&self, attempt: u32) -> Duration {
        let (min, max) = self.backoff_bounds(attempt);
        let secs = if max > min {
            rand::rng().random_range(min..=max)
        } else {
            min
        };
        Duration::from_secs(secs)
    }

    /// Run `op` until it succeeds, fails with a non-throttling error, or
    /// the attempts are exhausted
    ///
    /// The delay for attempt N is slept before attempt N, the first one
    /// included.
    pub async fn run<T, F, Fut>(&self, api_caller: &str, mut op: F) -> ClientResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ClientResult<T>>,
    {
        let mut total_sleep = Duration::ZERO;
        let mut attempt = 1;

        while attempt <= self.max_attempts {
            let delay = self.backoff_interval(attempt);
            total_sleep += delay;
            tracing::trace!(
                "retryApiCall sleep start (loop_sleep, retry_attempts, api) ({},{},{})",
                delay.as_secs(),
                attempt,
                api_caller
            );
            tokio::time::sleep(delay).await;

            let err = match op().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let label = if err.is_rate_exceeded() {
                "FAILED_WITH_RATE_EXCEEDED"
            } else if err.is_400_or_timeout() {
                "FAILED_WITH_400_OR_TIMEOUT"
            } else {
                return Err(err);
            };
            tracing::warn!(
                "{}: retryApiCall (total_sleep, retry_attempts, api) ({},{},{})",
                label,
                total_sleep.as_secs(),
                attempt,
                api_caller
            );
            attempt += 1;
        }

        Err(ClientError::new(format!(
            "API_RETRIES: Max retry attempts exceeded. (total_sleep, retry_attempts, api) ({},{},{})",
            total_sleep.as_secs(),
            attempt,
            api_caller
        )))
    }
}

impl DuploClient {
    /// GET with rate-limit retries
    pub async fn get_api_with_retry<Rp: DeserializeOwned>(
        &self,
        api_name: &str,
        api_path: &str,
    ) -> ClientResult<Rp> {
        let caller = format!("{} ({}, {})", Method::GET, api_name, api_path);
        self.retry
            .run(&caller, || self.get_api(api_name, api_path))
            .await
    }

    /// DELETE with rate-limit retries, expecting an empty body
    pub async fn delete_api_unit_with_retry(&self, api_name: &str, api_path: &str) -> ClientResult<()> {
        let caller = format!("{} ({}, {})", Method::DELETE, api_name, api_path);
        self.retry
            .run(&caller, || self.delete_api_unit(api_name, api_path))
            .await
    }

    /// POST with rate-limit retries
    pub async fn post_api_with_retry<Rq: Serialize + ?Sized, Rp: DeserializeOwned>(
        &self,
        api_name: &str,
        api_path: &str,
        rq: &Rq,
    ) -> ClientResult<Rp> {
        let caller = format!("{} ({}, {})", Method::POST, api_name, api_path);
        self.retry
            .run(&caller, || self.post_api(api_name, api_path, rq))
            .await
    }

    /// PUT with rate-limit retries
    pub async fn put_api_with_retry<Rq: Serialize + ?Sized, Rp: DeserializeOwned>(
        &self,
        api_name: &str,
        api_path: &str,
        rq: &Rq,
    ) -> ClientResult<Rp> {
        let caller = format!("{} ({}, {})", Method::PUT, api_name, api_path);
        self.retry
            .run(&caller, || self.put_api(api_name, api_path, rq))
            .await
    }

    /// PUT with rate-limit retries, expecting an empty body
    pub async fn put_api_unit_with_retry<Rq: Serialize + ?Sized>(
        &self,
        api_name: &str,
        api_path: &str,
        rq: &Rq,
    ) -> ClientResult<()> {
        let caller = format!("{} ({}, {})", Method::PUT, api_name, api_path);
        self.retry
            .run(&caller, || self.put_api_unit(api_name, api_path, rq))
            .await
    }
}

/// Settings for [`retry_with_exponential_backoff`]
pub struct BackoffConfig<P>
where
    P: Fn(&ClientError) -> bool,
{
    pub min_delay: Duration,
    pub max_delay: Duration,
    /// Maximum random jitter added to each delay, in milliseconds
    pub max_jitter_ms: u64,
    /// Total time budget for all attempts
    pub timeout: Duration,
    pub is_retryable: P,
}

/// Exponential delay for a 1-based retry attempt, capped at `max_delay`
pub fn exponential_backoff(attempt: u32, min_delay: Duration, max_delay: Duration) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    min_delay.saturating_mul(factor).min(max_delay)
}

/// Retry `op` with exponential backoff and jitter
///
/// Non-retryable errors are returned immediately. Once the total timeout
/// has elapsed the last retryable error is returned.
pub async fn retry_with_exponential_backoff<T, F, Fut, P>(
    api_caller: &str,
    config: BackoffConfig<P>,
    mut op: F,
) -> ClientResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<T>>,
    P: Fn(&ClientError) -> bool,
{
    let started = tokio::time::Instant::now();
    let mut attempt: u32 = 0;

    loop {
        tracing::debug!("Calling {}, attempt #{}", api_caller, attempt);
        let err = match op().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !(config.is_retryable)(&err) {
            tracing::debug!(
                "Method call {} attempt #{} failed with unrecoverable error",
                api_caller,
                attempt
            );
            return Err(err);
        }

        tracing::debug!(
            "Method call {} attempt #{} failed with retryable error, retrying soon",
            api_caller,
            attempt
        );
        attempt += 1;

        if started.elapsed() >= config.timeout {
            tracing::warn!("Method {} failed to succeed before retry timeout", api_caller);
            return Err(err);
        }

        let jitter = if config.max_jitter_ms > 0 {
            Duration::from_millis(rand::rng().random_range(0..config.max_jitter_ms))
        } else {
            Duration::ZERO
        };
        tokio::time::sleep(exponential_backoff(attempt, config.min_delay, config.max_delay) + jitter)
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn throttled() -> ClientError {
        ClientError::from_response(
            "u",
            "/v3/x",
            400,
            Some("application/json"),
            Some(r#"{"Message":"Rate exceeded"}"#),
        )
    }

    #[test]
    fn test_backoff_bounds_follow_attempt_phases() {
        let conf = RetryConf::default();
        assert_eq!(conf.backoff_bounds(1), (1, 7));
        assert_eq!(conf.backoff_bounds(2), (3, 15));
        assert_eq!(conf.backoff_bounds(3), (3, 15));
        assert_eq!(conf.backoff_bounds(4), (6, 10));
        assert_eq!(conf.backoff_bounds(9), (6, 15));
    }

    #[test]
    fn test_backoff_interval_within_bounds() {
        let conf = RetryConf::default();
        for attempt in 1..=9 {
            let (min, max) = conf.backoff_bounds(attempt);
            let secs = conf.backoff_interval(attempt).as_secs();
            assert!(secs >= min && secs <= max);
        }
    }

    #[tokio::test]
    async fn test_run_retries_throttled_calls() {
        let calls = AtomicU32::new(0);
        let result = RetryConf::immediate(5)
            .run("GET (X, y)", || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(throttled())
                } else {
                    Ok(42)
                }
            })
            .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_waits_before_first_attempt() {
        let start = tokio::time::Instant::now();
        let first_call = std::sync::Mutex::new(None);
        let result = RetryConf::default()
            .run("GET (X, y)", || async {
                first_call.lock().unwrap().get_or_insert(start.elapsed());
                Ok(())
            })
            .await;
        assert!(result.is_ok());
        let waited = first_call.lock().unwrap().unwrap();
        assert!(waited >= Duration::from_secs(1), "waited {:?}", waited);
        assert!(waited <= Duration::from_secs(7), "waited {:?}", waited);
    }

    #[tokio::test]
    async fn test_run_stops_on_other_errors() {
        let calls = AtomicU32::new(0);
        let result: ClientResult<()> = RetryConf::immediate(5)
            .run("GET (X, y)", || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::new("boom"))
            })
            .await;
        assert_eq!(result.unwrap_err().message(), "boom");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_reports_exhaustion() {
        let result: ClientResult<()> = RetryConf::immediate(3)
            .run("GET (X, y)", || async { Err(throttled()) })
            .await;
        assert_eq!(
            result.unwrap_err().message(),
            "API_RETRIES: Max retry attempts exceeded. (total_sleep, retry_attempts, api) (0,4,GET (X, y))"
        );
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let min = Duration::from_secs(1);
        let max = Duration::from_secs(5);
        assert_eq!(exponential_backoff(1, min, max), Duration::from_secs(2));
        assert_eq!(exponential_backoff(2, min, max), Duration::from_secs(4));
        assert_eq!(exponential_backoff(3, min, max), max);
        assert_eq!(exponential_backoff(40, min, max), max);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exponential_retry_gives_up_after_timeout() {
        let calls = AtomicU32::new(0);
        let result: ClientResult<()> = retry_with_exponential_backoff(
            "TenantGetLbSettings",
            BackoffConfig {
                min_delay: Duration::from_secs(1),
                max_delay: Duration::from_secs(5),
                max_jitter_ms: 0,
                timeout: Duration::from_secs(10),
                is_retryable: |e: &ClientError| e.status() == 400,
            },
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(ClientError::with_status("busy", 400, "u"))
            },
        )
        .await;
        assert_eq!(result.unwrap_err().message(), "busy");
        assert!(calls.load(Ordering::SeqCst) > 1);
    }
}
