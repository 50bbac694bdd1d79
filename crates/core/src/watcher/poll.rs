//! Poll-Mode Watcher
//!
//! Repeatedly asks a `StatusSource` whether a job is done, with a fixed
//! delay between calls and a hard attempt budget. Transport errors end the
//! job immediately as `Failed`; running out of attempts ends it as
//! `TimedOut`, so callers can tell "still running" from "something broke".

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::job::{JobHandle, JobOutcome};
use crate::streaming::{JobStatus, StatusSource};

/// One non-erroring status observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollUpdate {
    /// 1-based attempt number that produced this status
    pub attempt: u32,
    pub status: JobStatus,
}

/// Drives a `JobHandle` to a terminal state by polling.
#[derive(Debug, Clone, Default)]
pub struct PollWatcher {
    cancellation_token: CancellationToken,
}

impl PollWatcher {
    pub fn new(cancellation_token: CancellationToken) -> Self {
        Self { cancellation_token }
    }

    /// Token that cancels this watcher when triggered.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation_token.is_cancelled()
    }

    /// Poll until the job completes, fails, exhausts `handle.max_attempts`,
    /// or the watcher is cancelled.
    ///
    /// Only one status call is in flight at a time; the next one is scheduled
    /// `handle.poll_interval()` after the previous one resolved. `on_update`
    /// sees every successful status, `on_terminal` fires once at the end and
    /// never after cancellation.
    pub async fn watch<S, U, T>(
        &self,
        handle: &mut JobHandle,
        source: &S,
        mut on_update: U,
        on_terminal: T,
    ) -> JobOutcome
    where
        S: StatusSource + ?Sized,
        U: FnMut(&PollUpdate),
        T: FnOnce(&JobOutcome),
    {
        if handle.state().is_terminal() {
            warn!(job_id = %handle.job_id, state = %handle.state(), "watch called on a finished job");
            return JobOutcome::Cancelled;
        }

        let outcome = loop {
            if self.is_cancelled() {
                return JobOutcome::Cancelled;
            }

            handle.attempts += 1;
            let attempt = handle.attempts;

            let result = tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => return JobOutcome::Cancelled,
                result = source.check_status(&handle.job_id) => result,
            };

            if self.is_cancelled() {
                return JobOutcome::Cancelled;
            }

            let report = match result {
                Ok(report) => report,
                Err(e) => {
                    warn!(job_id = %handle.job_id, attempt, error = %e, "status check failed");
                    break JobOutcome::failed(e.to_string());
                }
            };

            debug!(job_id = %handle.job_id, attempt, status = ?report.status, "polled job status");
            on_update(&PollUpdate {
                attempt,
                status: report.status.clone(),
            });

            if report.status.is_completed() {
                break JobOutcome::Completed {
                    payload: report.payload,
                };
            }

            if handle.attempts_exhausted() {
                break JobOutcome::TimedOut;
            }

            tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => return JobOutcome::Cancelled,
                _ = tokio::time::sleep(handle.poll_interval()) => {}
            }
        };

        if let Some(state) = outcome.state() {
            handle.transition(state);
        }
        info!(
            job_id = %handle.job_id,
            attempts = handle.attempts,
            state = %handle.state(),
            "poll watcher finished"
        );
        on_terminal(&outcome);
        outcome
    }
}
