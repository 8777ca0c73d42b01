//! Retrying executor for remote calls.
//!
//! Every request to the remote service goes through [`RemoteCallExecutor`],
//! which owns the retry policy:
//!
//! - rate limits sleep `retry_after * n + base_delay`, where `n` counts the
//!   rate-limited attempts of this call so far
//! - authorization failures refresh the credential (once across concurrent
//!   callers) and retry without sleeping
//! - other transient failures sleep the generic backoff
//! - anything else is surfaced immediately as [`ExecutorError::Rejected`]
//!
//! Exhausting the attempt budget yields exactly one [`ExecutorError::Exhausted`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use super::auth::SingleFlightRefresher;
use super::error::{RemoteError, RemoteResult};
use super::models::Page;
use crate::protocol_constants::{GENERIC_BACKOFF_SECS, MAX_REMOTE_ATTEMPTS, RATE_LIMIT_BASE_DELAY_MS};

/// Retry parameters of the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per call, including the first one.
    pub max_attempts: u32,
    /// Constant term added to every rate-limit sleep.
    pub rate_limit_base_delay: Duration,
    /// Sleep after a generic transient failure.
    pub generic_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_REMOTE_ATTEMPTS,
            rate_limit_base_delay: Duration::from_millis(RATE_LIMIT_BASE_DELAY_MS),
            generic_backoff: Duration::from_secs(GENERIC_BACKOFF_SECS),
        }
    }
}

/// Terminal outcome of an executed remote call.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// Every attempt failed with a retryable error.
    #[error("{action} failed after {attempts} attempts: {last}")]
    Exhausted {
        action: String,
        attempts: u32,
        #[source]
        last: RemoteError,
    },

    /// The service refused the request; retrying would not help.
    #[error("{action} rejected: {source}")]
    Rejected {
        action: String,
        #[source]
        source: RemoteError,
    },
}

impl ExecutorError {
    /// Returns true if the retry budget was used up.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }
}

/// Convenient Result alias for executed calls.
pub type ExecutorResult<T> = Result<T, ExecutorError>;

/// Runs remote calls under the retry policy.
pub struct RemoteCallExecutor {
    policy: RetryPolicy,
    refresher: Arc<SingleFlightRefresher>,
}

impl RemoteCallExecutor {
    /// Creates an executor that refreshes credentials through `refresher`.
    pub fn new(policy: RetryPolicy, refresher: Arc<SingleFlightRefresher>) -> Self {
        Self { policy, refresher }
    }

    #[must_use]
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Executes `call` until it succeeds, fails fatally, or the attempt
    /// budget runs out.
    ///
    /// # Arguments
    /// * `action` - Action name for logging and errors
    /// * `call` - Closure that performs one request
    pub async fn execute<T, F, Fut>(&self, action: &str, mut call: F) -> ExecutorResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RemoteResult<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut rate_limit_hits: u32 = 0;
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            // Read before the request so a refresh completed concurrently is detected.
            let generation = self.refresher.generation();

            let error = match call().await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            let delay = match &error {
                RemoteError::RateLimited { retry_after } => {
                    rate_limit_hits += 1;
                    Some(*retry_after * rate_limit_hits + self.policy.rate_limit_base_delay)
                }
                RemoteError::Unauthorized(_) => {
                    log::info!("[Remote] {} unauthorized, refreshing credential", action);
                    match self.refresher.refresh(generation).await {
                        Ok(()) => None,
                        Err(e) => {
                            log::warn!("[Remote] Credential refresh failed: {}", e);
                            Some(self.policy.generic_backoff)
                        }
                    }
                }
                e if e.is_transient() => Some(self.policy.generic_backoff),
                _ => {
                    log::warn!("[Remote] {} rejected: {}", action, error);
                    return Err(ExecutorError::Rejected {
                        action: action.to_string(),
                        source: error,
                    });
                }
            };

            if attempt >= max_attempts {
                log::error!(
                    "[Remote] {} failed after {} attempts: {}",
                    action,
                    attempt,
                    error
                );
                return Err(ExecutorError::Exhausted {
                    action: action.to_string(),
                    attempts: attempt,
                    last: error,
                });
            }

            match delay {
                Some(delay) => {
                    log::warn!(
                        "[Remote] {} failed ({}), retrying (attempt {}/{}) after {:?}",
                        action,
                        error,
                        attempt + 1,
                        max_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                None => log::debug!(
                    "[Remote] Retrying {} (attempt {}/{})",
                    action,
                    attempt + 1,
                    max_attempts
                ),
            }
        }
    }

    /// Executes a paginated call, following continuation offsets.
    ///
    /// Each page is fetched under the full retry policy. `null` items are
    /// dropped. Stops at the last page or once `max_items` items were
    /// collected (the result is truncated to that many).
    pub async fn execute_paged<T, F, Fut>(
        &self,
        action: &str,
        start_offset: u32,
        max_items: Option<usize>,
        mut call: F,
    ) -> ExecutorResult<Vec<T>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = RemoteResult<Page<T>>>,
    {
        let mut items = Vec::new();
        let mut offset = start_offset;

        loop {
            let page = self.execute(action, || call(offset)).await?;
            let next = page.next_offset();
            items.extend(page.items.into_iter().flatten());

            if let Some(max) = max_items {
                if items.len() >= max {
                    items.truncate(max);
                    break;
                }
            }
            match next {
                Some(n) => offset = n,
                None => break,
            }
        }

        log::debug!("[Remote] {} collected {} items", action, items.len());
        Ok(items)
    }
}
