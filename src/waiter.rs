//! Polling a report until the service finishes generating it.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::{InspectorError, Result};
use crate::executor::RequestExecutor;
use crate::models::{BackoffFn, Report, ReportStatus, ReportWaitOptions};

/// Tracing target for report polling.
const TRACING_TARGET: &str = "inspector::waiter";

/// Polls one report until it is `READY` or `ERROR`, the deadline passes, or
/// the caller cancels.
///
/// Fetch failures are returned on the spot; retrying them is left to the
/// transport and the caller.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use inspector::{exponential_backoff, Client, ReportWaitOptions, ReportWaiter};
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example(client: Client, cancel: CancellationToken) -> inspector::Result<()> {
/// let opts = ReportWaitOptions::default()
///     .backoff(exponential_backoff(2, Duration::from_secs(30)))
///     .on_progress(|r| println!("report {} is {:?}", r.id, r.status));
///
/// let report = ReportWaiter::new(&client, opts)
///     .with_cancellation(cancel)
///     .wait(14621)
///     .await?;
/// # Ok(())
/// # }
/// ```
pub struct ReportWaiter<'a, E: ?Sized> {
    executor: &'a E,
    options: ReportWaitOptions,
    cancel: CancellationToken,
}

impl<'a, E> ReportWaiter<'a, E>
where
    E: RequestExecutor + ?Sized,
{
    pub fn new(executor: &'a E, options: ReportWaitOptions) -> Self {
        Self {
            executor,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop waiting with [`InspectorError::Cancelled`] once `token` fires.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Poll report `id` until it reaches a terminal status.
    ///
    /// # Errors
    ///
    /// - [`InspectorError::ReportFetch`] if a fetch fails.
    /// - [`InspectorError::ReportFailed`] if the report reaches `ERROR`.
    /// - [`InspectorError::Timeout`] if the deadline passes first.
    /// - [`InspectorError::Cancelled`] if the token fires first.
    pub async fn wait(&self, id: i64) -> Result<Report> {
        let timeout = self.options.effective_timeout();
        let deadline = Deadline {
            at: timeout.map(|t| Instant::now() + t),
            timeout: timeout.unwrap_or_default(),
        };
        let mut interval = self.options.effective_interval();
        let mut attempt: u32 = 1;

        loop {
            self.check_interrupted(&deadline)?;

            let report = self
                .interruptible(&deadline, self.executor.fetch_report(id))
                .await?
                .map_err(|source| InspectorError::ReportFetch {
                    id,
                    attempt,
                    source: Box::new(source),
                })?;

            match report.status {
                ReportStatus::Ready => {
                    tracing::debug!(target: TRACING_TARGET, report_id = id, attempt, "report ready");
                    return Ok(report);
                }
                ReportStatus::Error => {
                    tracing::debug!(target: TRACING_TARGET, report_id = id, attempt, "report failed");
                    return Err(InspectorError::ReportFailed {
                        id,
                        message: report.error,
                    });
                }
                ReportStatus::NotReady | ReportStatus::Unknown => {}
            }

            tracing::debug!(
                target: TRACING_TARGET,
                report_id = id,
                attempt,
                status = ?report.status,
                next_poll_in = ?interval,
                "report not ready"
            );

            if let Some(ref cb) = self.options.on_progress {
                cb(&report);
            }

            if interval.is_zero() {
                // Nothing to sleep; give the scheduler a turn before re-polling.
                tokio::task::yield_now().await;
            } else {
                self.interruptible(&deadline, tokio::time::sleep(interval))
                    .await?;
            }

            if let Some(ref backoff) = self.options.backoff {
                interval = backoff(attempt, interval);
            }
            attempt = attempt.saturating_add(1);
        }
    }

    fn check_interrupted(&self, deadline: &Deadline) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(InspectorError::Cancelled);
        }
        if deadline.at.is_some_and(|at| Instant::now() >= at) {
            return Err(InspectorError::Timeout(deadline.timeout));
        }
        Ok(())
    }

    /// Run `fut` unless cancellation or the deadline comes first.
    async fn interruptible<F: Future>(&self, deadline: &Deadline, fut: F) -> Result<F::Output> {
        let expired = async {
            match deadline.at {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(InspectorError::Cancelled),
            _ = expired => Err(InspectorError::Timeout(deadline.timeout)),
            out = fut => Ok(out),
        }
    }
}

struct Deadline {
    at: Option<Instant>,
    timeout: Duration,
}

/// Add `step` to the interval after every attempt.
pub fn linear_backoff(step: Duration) -> BackoffFn {
    Box::new(move |_attempt: u32, prev: Duration| prev.saturating_add(step))
}

/// Multiply the interval by `factor` after every attempt, up to `max`.
pub fn exponential_backoff(factor: u32, max: Duration) -> BackoffFn {
    Box::new(move |_attempt: u32, prev: Duration| {
        prev.saturating_mul(factor).min(max)
    })
}
