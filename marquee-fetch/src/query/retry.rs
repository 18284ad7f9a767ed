use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use super::config::QueryConfig;
use crate::error::FetchError;

/// Result of running a fetcher through the retry loop.
#[derive(Debug)]
pub enum AttemptOutcome<T> {
    Success { value: T, attempts: u32 },
    Failed { error: FetchError, attempts: u32 },
    Cancelled,
}

/// Retry decision after `failures` failed attempts (1-based).
///
/// Every failure other than cancellation is retried while the budget lasts;
/// timeouts count as ordinary failed attempts. The error kind only decides
/// how loudly the failure is logged.
pub fn should_retry(
    error: &FetchError,
    failures: u32,
    retry_count: u32,
) -> bool {
    !error.is_cancelled() && failures <= retry_count
}

/// Run `fetcher` until it succeeds, the retry budget is spent, or `cancel`
/// fires.
///
/// Each attempt gets a child token of `cancel` and is bounded by
/// `config.request_timeout`; a timed-out attempt has its token cancelled so
/// cooperative fetchers can drop outstanding work.
///
/// A fetcher that panics ends the loop with a `Failed` outcome. A cancelled
/// error only counts as cancellation when `cancel` itself fired.
pub async fn run_with_retry<T, F, Fut>(
    key: &str,
    config: &QueryConfig,
    fetcher: &F,
    cancel: &CancellationToken,
) -> AttemptOutcome<T>
where
    F: Fn(CancellationToken) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let mut failures: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            return AttemptOutcome::Cancelled;
        }

        let attempt_token = cancel.child_token();
        let guarded =
            AssertUnwindSafe(async { fetcher(attempt_token.clone()).await })
                .catch_unwind();
        let attempt = tokio::time::timeout(config.request_timeout, guarded);

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => return AttemptOutcome::Cancelled,
            result = attempt => match result {
                Ok(Ok(result)) => result,
                Ok(Err(payload)) => {
                    let error = FetchError::other(format!(
                        "fetcher panicked: {}",
                        panic_message(&*payload)
                    ));
                    log::error!("Query {} aborted: {}", key, error);
                    return AttemptOutcome::Failed {
                        error,
                        attempts: failures + 1,
                    };
                }
                Err(_) => {
                    attempt_token.cancel();
                    Err(FetchError::timeout(config.request_timeout))
                }
            },
        };

        let error = match result {
            Ok(value) => {
                return AttemptOutcome::Success {
                    value,
                    attempts: failures + 1,
                };
            }
            Err(_) if cancel.is_cancelled() => {
                return AttemptOutcome::Cancelled;
            }
            Err(error) => error,
        };

        failures += 1;
        if !should_retry(&error, failures, config.retry_count) {
            return AttemptOutcome::Failed {
                error,
                attempts: failures,
            };
        }

        let delay = config.backoff_for(failures);
        if error.is_transient() {
            log::debug!(
                "Query {} attempt {} failed ({}): {}; retrying in {:?}",
                key,
                failures,
                error.kind(),
                error,
                delay
            );
        } else {
            log::info!(
                "Query {} attempt {} failed ({}, not transient): {}; \
                 retrying in {:?}",
                key,
                failures,
                error.kind(),
                error,
                delay
            );
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => return AttemptOutcome::Cancelled,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
