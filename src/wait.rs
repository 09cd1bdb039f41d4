//! Polling and retry helpers
//!
//! # Module Structure
//!
//! - [`Context`] - Deadline plus cancellation shared by a callback's waits
//! - [`StateChangeConf`] - Poll a refresh function until a target state
//! - [`retry_context`] - Retry a closure until it succeeds or times out
//! - `wait_for_resource_*` - Create/delete convergence helpers for resources
//!
//! # Example
//!
//! ```ignore
//! let conf = StateChangeConf::new(|| async {
//!     let efs = client.duplo_efs_get(&tenant_id, &id).await?;
//!     Ok(efs.map(|e| { let state = e.state(); (e, state) }))
//! })
//! .pending(&["creating"])
//! .target(&["available"])
//! .timeout(d.timeout(Operation::Create));
//! conf.wait_for_state(&ctx).await?;
//! ```

use crate::diag::{DiagResult, Diagnostics};
use crate::duplosdk::ClientResult;
use crate::resource_data::ResourceData;
use crate::schema::Operation;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::time::Instant;

const DEFAULT_NOT_FOUND_CHECKS: u32 = 20;
const INITIAL_WAIT: Duration = Duration::from_millis(100);
const MAX_WAIT: Duration = Duration::from_secs(10);
const RETRY_MIN_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("timeout while waiting for state to become '{}' (last state: '{last_state}', timeout: {timeout:?})", expected.join(", "))]
    Timeout {
        last_state: String,
        expected: Vec<String>,
        timeout: Duration,
    },

    #[error("unexpected state '{state}', wanted target '{}'", expected.join(", "))]
    UnexpectedState { state: String, expected: Vec<String> },

    #[error("couldn't find resource ({retries} retries)")]
    NotFound { retries: u32 },

    #[error("context canceled")]
    Canceled,

    #[error("context deadline exceeded")]
    DeadlineExceeded,

    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

/// Cancellation and deadline for a callback
#[derive(Clone, Default)]
pub struct Context {
    cancel: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Cancels every [`Context`] cloned from the one it was created with
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("canceled", &self.is_canceled())
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl Context {
    /// Never canceled, no deadline
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_cancel() -> (Self, CancelHandle) {
        let (tx, rx) = watch::channel(false);
        (
            Self {
                cancel: Some(rx),
                deadline: None,
            },
            CancelHandle(tx),
        )
    }

    /// Same context with a deadline `timeout` from now, keeping an earlier one
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.deadline = Some(self.deadline.map_or(deadline, |d| d.min(deadline)));
        self
    }

    pub fn is_canceled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Why the context is done, if it is
    pub fn err(&self) -> Option<WaitError> {
        if self.is_canceled() {
            Some(WaitError::Canceled)
        } else if self.deadline.is_some_and(|d| Instant::now() >= d) {
            Some(WaitError::DeadlineExceeded)
        } else {
            None
        }
    }

    /// Resolves once the context is canceled or past its deadline
    pub async fn done(&self) -> WaitError {
        let canceled = async {
            match &self.cancel {
                Some(rx) => {
                    let mut rx = rx.clone();
                    loop {
                        if *rx.borrow_and_update() {
                            return;
                        }
                        if rx.changed().await.is_err() {
                            std::future::pending::<()>().await;
                        }
                    }
                }
                None => std::future::pending::<()>().await,
            }
        };

        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = canceled => WaitError::Canceled,
                _ = tokio::time::sleep_until(deadline) => WaitError::DeadlineExceeded,
            },
            None => {
                canceled.await;
                WaitError::Canceled
            }
        }
    }
}

/// Sleep for `duration` unless the context is done first
pub async fn sleep(ctx: &Context, duration: Duration) -> Result<(), WaitError> {
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(()),
        err = ctx.done() => Err(err),
    }
}

/// Next delay of the exponential schedule, kept within `[min, MAX_WAIT]`
fn next_wait(previous: Duration, min: Duration) -> Duration {
    (previous * 2).clamp(min.min(MAX_WAIT), MAX_WAIT)
}

/// Result of one refresh: `None` when the object was not found
pub type RefreshResult<T> = anyhow::Result<Option<(T, String)>>;

/// Polls `refresh` until the object reaches one of the `target` states
pub struct StateChangeConf<F> {
    pub pending: Vec<String>,
    pub target: Vec<String>,
    pub refresh: F,
    pub timeout: Duration,
    /// Wait before the first refresh
    pub delay: Duration,
    /// Fixed interval between refreshes; exponential when zero
    pub poll_interval: Duration,
    /// Lower bound of the exponential interval
    pub min_timeout: Duration,
    pub not_found_checks: u32,
    pub continuous_target_occurence: u32,
}

impl<F, Fut, T> StateChangeConf<F>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = RefreshResult<T>>,
{
    pub fn new(refresh: F) -> Self {
        Self {
            pending: Vec::new(),
            target: Vec::new(),
            refresh,
            timeout: crate::schema::DEFAULT_TIMEOUT,
            delay: Duration::ZERO,
            poll_interval: Duration::ZERO,
            min_timeout: Duration::ZERO,
            not_found_checks: DEFAULT_NOT_FOUND_CHECKS,
            continuous_target_occurence: 1,
        }
    }

    pub fn pending(mut self, states: &[&str]) -> Self {
        self.pending = states.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn target(mut self, states: &[&str]) -> Self {
        self.target = states.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }

    pub fn not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    pub fn continuous_target_occurence(mut self, occurences: u32) -> Self {
        self.continuous_target_occurence = occurences.max(1);
        self
    }

    /// Poll until a target state, returning the last refreshed object
    ///
    /// `Ok(None)` is returned when `target` is empty and the object is gone.
    pub async fn wait_for_state(mut self, ctx: &Context) -> Result<Option<T>, WaitError> {
        let deadline = Instant::now() + self.timeout;
        let mut last_state = String::new();

        let outcome = {
            let poll = self.poll(&mut last_state);
            tokio::select! {
                res = poll => res,
                err = ctx.done() => Err(err),
                _ = tokio::time::sleep_until(deadline) => Err(WaitError::Timeout {
                    last_state: String::new(),
                    expected: Vec::new(),
                    timeout: Duration::ZERO,
                }),
            }
        };

        match outcome {
            Err(WaitError::Timeout { .. }) => Err(WaitError::Timeout {
                last_state,
                expected: self.target.clone(),
                timeout: self.timeout,
            }),
            other => other,
        }
    }

    async fn poll(&mut self, last_state: &mut String) -> Result<Option<T>, WaitError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let mut wait = INITIAL_WAIT;
        let mut not_found_tick = 0;
        let mut target_occurence = 0;

        loop {
            match (self.refresh)().await? {
                None => {
                    if self.target.is_empty() {
                        target_occurence += 1;
                        if target_occurence >= self.continuous_target_occurence {
                            return Ok(None);
                        }
                    } else {
                        target_occurence = 0;
                        not_found_tick += 1;
                        if not_found_tick > self.not_found_checks {
                            return Err(WaitError::NotFound {
                                retries: not_found_tick,
                            });
                        }
                    }
                }
                Some((object, state)) => {
                    not_found_tick = 0;
                    tracing::trace!("[WaitForState] current state: {}", state);
                    *last_state = state.clone();

                    if self.target.contains(&state) {
                        target_occurence += 1;
                        if target_occurence >= self.continuous_target_occurence {
                            return Ok(Some(object));
                        }
                    } else {
                        target_occurence = 0;
                        if !self.pending.contains(&state) {
                            return Err(WaitError::UnexpectedState {
                                state,
                                expected: self.target.clone(),
                            });
                        }
                    }
                }
            }

            let interval = if self.poll_interval.is_zero() {
                wait = next_wait(wait, self.min_timeout);
                wait
            } else {
                self.poll_interval
            };
            tracing::trace!("[WaitForState] waiting {:?} before next try", interval);
            tokio::time::sleep(interval).await;
        }
    }
}

/// Outcome of one [`retry_context`] attempt
#[derive(Debug)]
pub enum RetryError {
    Retryable(anyhow::Error),
    NonRetryable(anyhow::Error),
}

impl RetryError {
    pub fn retryable(message: impl fmt::Display) -> Self {
        RetryError::Retryable(anyhow::anyhow!("{}", message))
    }

    pub fn non_retryable(message: impl fmt::Display) -> Self {
        RetryError::NonRetryable(anyhow::anyhow!("{}", message))
    }
}

/// Retry `f` while it fails with [`RetryError::Retryable`]
///
/// Delays grow from 500ms to a 10s cap. On timeout the last retryable error
/// is returned in place of the timeout.
pub async fn retry_context<T, F, Fut>(ctx: &Context, timeout: Duration, mut f: F) -> Result<T, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RetryError>>,
{
    let mut last_err: Option<anyhow::Error> = None;

    let outcome = {
        let attempts = async {
            let mut wait = INITIAL_WAIT;
            loop {
                match f().await {
                    Ok(value) => return Ok(value),
                    Err(RetryError::NonRetryable(err)) => return Err(WaitError::Failed(err)),
                    Err(RetryError::Retryable(err)) => {
                        tracing::debug!("[RetryContext] retryable error: {}", err);
                        last_err = Some(err);
                    }
                }
                wait = next_wait(wait, RETRY_MIN_TIMEOUT);
                tokio::time::sleep(wait).await;
            }
        };
        tokio::select! {
            res = attempts => res,
            err = ctx.done() => Err(err),
            _ = tokio::time::sleep(timeout) => Err(WaitError::Timeout {
                last_state: "retryableerror".to_string(),
                expected: vec!["success".to_string()],
                timeout,
            }),
        }
    };

    match outcome {
        Err(WaitError::Timeout { .. }) if last_err.is_some() => {
            Err(last_err.map_or(WaitError::DeadlineExceeded, WaitError::Failed))
        }
        other => other,
    }
}

/// Wait until `get` returns the object created as `id`
pub async fn wait_for_resource_to_be_present_after_create<T, F, Fut>(
    ctx: &Context,
    d: &ResourceData,
    kind: &str,
    id: &str,
    mut get: F,
) -> DiagResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<Option<T>>>,
{
    let result = retry_context(ctx, d.timeout(Operation::Create), || {
        let fut = get();
        async move {
            match fut.await {
                Err(err) if err.status() == 404 => Err(RetryError::retryable(format!(
                    "expected {} '{}' to be retrieved, but got a 404",
                    kind, id
                ))),
                Err(err) => Err(RetryError::non_retryable(format!(
                    "error getting {} '{}': {}",
                    kind, id, err
                ))),
                Ok(None) => Err(RetryError::retryable(format!(
                    "expected {} '{}' to be retrieved, but got: nil",
                    kind, id
                ))),
                Ok(Some(_)) => Ok(()),
            }
        }
    })
    .await;

    result.map_err(|err| Diagnostics::errorf(format!("error creating {} '{}': {}", kind, id, err)))
}

/// Wait until `get` no longer finds the object deleted as `id`
pub async fn wait_for_resource_to_be_missing_after_delete<T, F, Fut>(
    ctx: &Context,
    d: &ResourceData,
    kind: &str,
    id: &str,
    mut get: F,
) -> DiagResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<Option<T>>>,
{
    let result = retry_context(ctx, d.timeout(Operation::Delete), || {
        let fut = get();
        async move {
            match fut.await {
                Err(err) if err.status() == 404 || err.status() == 400 => Ok(()),
                Err(err) => Err(RetryError::non_retryable(format!(
                    "error getting {} '{}': {}",
                    kind, id, err
                ))),
                Ok(Some(_)) => Err(RetryError::retryable(format!(
                    "expected {} '{}' to be missing, but it still exists",
                    kind, id
                ))),
                Ok(None) => Ok(()),
            }
        }
    })
    .await;

    result.map_err(|err| Diagnostics::errorf(format!("error deleting {} '{}': {}", kind, id, err)))
}

/// Wait until `get` reports the object as done; a 404 counts as done
pub async fn wait_for_resource_with_status_done<F, Fut>(
    ctx: &Context,
    d: &ResourceData,
    kind: &str,
    id: &str,
    mut get: F,
) -> DiagResult<()>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ClientResult<bool>>,
{
    let result = retry_context(ctx, d.timeout(Operation::Delete), || {
        let fut = get();
        async move {
            match fut.await {
                Err(err) if err.status() == 404 => Ok(()),
                Err(err) => Err(RetryError::non_retryable(format!(
                    "error getting {} '{}': {}",
                    kind, id, err
                ))),
                Ok(false) => Err(RetryError::retryable(format!(
                    "expected {} '{}' to be missing, but it still exists",
                    kind, id
                ))),
                Ok(true) => Ok(()),
            }
        }
    })
    .await;

    result.map_err(|err| Diagnostics::errorf(format!("error deleting {} '{}': {}", kind, id, err)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duplosdk::ClientError;
    use crate::schema::Timeouts;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn data(timeout: Duration) -> ResourceData {
        ResourceData::new(Timeouts::default().create(timeout).delete(timeout))
    }

    fn not_found() -> ClientError {
        ClientError::with_status("not found", 404, "https://duplo.test/x")
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_state_reaches_target() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let conf = StateChangeConf::new(move || {
            let n = c.fetch_add(1, Ordering::SeqCst);
            async move {
                let state = if n < 2 { "creating" } else { "available" };
                Ok(Some((n, state.to_string())))
            }
        })
        .pending(&["creating"])
        .target(&["available"])
        .poll_interval(Duration::from_secs(30));

        let result = conf.wait_for_state(&Context::background()).await.unwrap();
        assert_eq!(result, Some(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_state_unexpected_state() {
        let conf = StateChangeConf::new(|| async { Ok(Some(((), "error".to_string()))) })
            .pending(&["creating"])
            .target(&["available"]);
        let err = conf.wait_for_state(&Context::background()).await.unwrap_err();
        assert_eq!(err.to_string(), "unexpected state 'error', wanted target 'available'");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_state_times_out_with_last_state() {
        let conf = StateChangeConf::new(|| async { Ok(Some(((), "creating".to_string()))) })
            .pending(&["creating"])
            .target(&["available"])
            .timeout(Duration::from_secs(60));
        match conf.wait_for_state(&Context::background()).await {
            Err(WaitError::Timeout { last_state, .. }) => assert_eq!(last_state, "creating"),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_state_not_found_checks() {
        let conf = StateChangeConf::new(|| async { Ok(None::<((), String)>) })
            .target(&["available"])
            .not_found_checks(3);
        match conf.wait_for_state(&Context::background()).await {
            Err(WaitError::NotFound { retries }) => assert_eq!(retries, 4),
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_state_canceled() {
        let (ctx, handle) = Context::with_cancel();
        handle.cancel();
        let conf = StateChangeConf::new(|| async { Ok(Some(((), "creating".to_string()))) })
            .pending(&["creating"])
            .target(&["available"]);
        let err = conf.wait_for_state(&ctx).await.unwrap_err();
        assert_eq!(err.to_string(), "context canceled");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_context_returns_last_retryable_error() {
        let err = retry_context(&Context::background(), Duration::from_secs(5), || async {
            Err::<(), _>(RetryError::retryable("still waiting"))
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "still waiting");
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_context_stops_on_non_retryable() {
        let calls = AtomicU32::new(0);
        let err = retry_context(&Context::background(), Duration::from_secs(60), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>(RetryError::non_retryable("boom")) }
        })
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), "boom");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_present_after_create_retries_404() {
        let calls = AtomicU32::new(0);
        let d = data(Duration::from_secs(60));
        wait_for_resource_to_be_present_after_create(&Context::background(), &d, "tenant", "dev", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                match n {
                    0 => Err(not_found()),
                    1 => Ok(None),
                    _ => Ok(Some(())),
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_present_after_create_times_out() {
        let d = data(Duration::from_secs(2));
        let err = wait_for_resource_to_be_present_after_create(&Context::background(), &d, "tenant", "dev", || async {
            Err::<Option<()>, _>(not_found())
        })
        .await
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "error creating tenant 'dev': expected tenant 'dev' to be retrieved, but got a 404"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_after_delete() {
        let d = data(Duration::from_secs(60));
        wait_for_resource_to_be_missing_after_delete(&Context::background(), &d, "tenant", "dev", || async {
            Err::<Option<()>, _>(not_found())
        })
        .await
        .unwrap();

        let short = data(Duration::from_secs(2));
        let err = wait_for_resource_to_be_missing_after_delete(&Context::background(), &short, "tenant", "dev", || async {
            Ok(Some(()))
        })
        .await
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "error deleting tenant 'dev': expected tenant 'dev' to be missing, but it still exists"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_done() {
        let d = data(Duration::from_secs(60));
        let calls = AtomicU32::new(0);
        wait_for_resource_with_status_done(&Context::background(), &d, "bucket", "b", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { Ok(n >= 1) }
        })
        .await
        .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_stops_at_deadline() {
        let ctx = Context::background().with_timeout(Duration::from_secs(1));
        let err = sleep(&ctx, Duration::from_secs(10)).await.unwrap_err();
        assert_eq!(err.to_string(), WaitError::DeadlineExceeded.to_string());
        sleep(&Context::background(), Duration::from_secs(10)).await.unwrap();
    }

    #[test]
    fn test_next_wait_bounds() {
        assert_eq!(next_wait(INITIAL_WAIT, RETRY_MIN_TIMEOUT), RETRY_MIN_TIMEOUT);
        assert_eq!(next_wait(Duration::from_secs(8), RETRY_MIN_TIMEOUT), MAX_WAIT);
        assert_eq!(next_wait(INITIAL_WAIT, Duration::ZERO), Duration::from_millis(200));
    }
}
