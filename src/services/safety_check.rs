//! Safety Check Service
//!
//! Submits a safety check for a work order and follows the resulting job to
//! a terminal state, either by polling its status or by subscribing to the
//! streamed report. The service task is the single owner of the `Job`:
//! subscription callbacks only enqueue events, which this task applies in
//! order.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use workorder_safety_core::{
    Chunk, ChunkOutcome, Job, JobHandle, JobOutcome, JobState, JobSubmitter, PollWatcher,
    StatusSource, Subscription, WatchConfig,
};

use crate::models::workorder::{SafetyCheckRequest, WorkOrder};
use crate::services::push::PushConnector;
use crate::utils::error::{AppError, AppResult};

/// Shown when a job fails.
pub const FAILED_MESSAGE: &str = "Failed to fetch status";
/// Shown when a job runs out of time or attempts.
pub const TIMED_OUT_MESSAGE: &str = "Error in getting safety check response";

/// How a submitted job is followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum WatchMode {
    #[default]
    Poll,
    Subscribe,
}

/// The assembled report as of one accepted chunk, for progressive rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportSnapshot {
    pub job_id: String,
    pub text: String,
    pub missing_indices: Vec<u64>,
}

/// Final result of a safety check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyCheckReport {
    pub job_id: String,
    pub outcome: JobOutcome,
    /// Cleaned report text; may be partial when the job did not complete
    pub text: String,
    pub missing_indices: Vec<u64>,
}

impl SafetyCheckReport {
    pub fn state(&self) -> Option<JobState> {
        self.outcome.state()
    }

    /// User-facing message for jobs that did not complete.
    pub fn user_message(&self) -> Option<&'static str> {
        match self.outcome {
            JobOutcome::Completed { .. } => None,
            JobOutcome::Failed { .. } => Some(FAILED_MESSAGE),
            JobOutcome::TimedOut => Some(TIMED_OUT_MESSAGE),
            JobOutcome::Cancelled => None,
        }
    }
}

/// Tidy model output for display: drop one surrounding pair of quotes,
/// remove literal `\n` escapes and decode the escaped degree sign.
pub fn clean_report_text(raw: &str) -> String {
    let text = clean_partial_text(raw);
    match text.strip_suffix('"') {
        Some(trimmed) => trimmed.to_string(),
        None => text,
    }
}

/// `clean_report_text` for a report still streaming in. A trailing quote may
/// be the middle of the text, so it is kept.
fn clean_partial_text(raw: &str) -> String {
    let text = raw.strip_prefix('"').unwrap_or(raw);
    text.replace("\\n", "").replace("\\u00b0C", "°C")
}

enum SubscriptionEvent {
    Chunk(Chunk),
    Terminal(JobOutcome),
}

/// Drives safety checks against a backend and an optional push connector.
pub struct SafetyCheckService<'a, B, P> {
    backend: &'a B,
    push: Option<&'a P>,
    watch: WatchConfig,
    snapshots: Option<mpsc::Sender<ReportSnapshot>>,
    cancellation_token: CancellationToken,
}

impl<'a, B, P> SafetyCheckService<'a, B, P>
where
    B: JobSubmitter<Request = SafetyCheckRequest> + StatusSource,
    P: PushConnector,
{
    pub fn new(backend: &'a B, push: Option<&'a P>, watch: WatchConfig) -> Self {
        Self {
            backend,
            push,
            watch,
            snapshots: None,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Send a snapshot to `tx` each time the assembled text changes.
    pub fn with_snapshots(mut self, tx: mpsc::Sender<ReportSnapshot>) -> Self {
        self.snapshots = Some(tx);
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    /// Cancel any running check. It ends with `JobOutcome::Cancelled`.
    pub fn cancel(&self) {
        self.cancellation_token.cancel();
    }

    /// Submit a safety check for `work_order` and follow it to the end.
    pub async fn run(&self, work_order: &WorkOrder, mode: WatchMode) -> AppResult<SafetyCheckReport> {
        self.watch.validate()?;
        let request = SafetyCheckRequest::for_work_order(work_order);
        let job_id = self.backend.submit(&request).await?;
        info!(
            job_id = %job_id,
            work_order_id = %work_order.work_order_id,
            ?mode,
            "safety check started"
        );

        let mut job = Job::new(JobHandle::new(job_id.clone(), &self.watch));
        let outcome = match mode {
            WatchMode::Poll => self.follow_poll(&mut job).await,
            WatchMode::Subscribe => self.follow_subscription(&mut job).await?,
        };

        let adopted = match &outcome {
            JobOutcome::Completed {
                payload: Some(payload),
            } => job.adopt_payload(payload.clone()),
            _ => false,
        };
        let raw = job.text();
        let quote_trimmed = clean_report_text(&raw) != clean_partial_text(&raw);
        // The last streamed snapshot still carries the closing quote.
        if adopted || (job.state().is_terminal() && quote_trimmed) {
            self.publish(&job).await;
        }

        let report = SafetyCheckReport {
            job_id,
            text: clean_report_text(&raw),
            missing_indices: job.missing_indices(),
            outcome,
        };
        match report.user_message() {
            Some(message) => warn!(job_id = %report.job_id, outcome = ?report.outcome, "{}", message),
            None => info!(job_id = %report.job_id, outcome = ?report.outcome, "safety check finished"),
        }
        Ok(report)
    }

    async fn follow_poll(&self, job: &mut Job) -> JobOutcome {
        let watcher = PollWatcher::new(self.cancellation_token.child_token());
        watcher
            .watch(
                job.handle_mut(),
                self.backend,
                |update| debug!(attempt = update.attempt, status = ?update.status, "poll tick"),
                |_| {},
            )
            .await
    }

    async fn follow_subscription(&self, job: &mut Job) -> AppResult<JobOutcome> {
        let connector = self
            .push
            .ok_or_else(|| AppError::config("subscribe mode needs a websocket_endpoint"))?;
        let job_id = job.handle().job_id.clone();

        // The connect counts against the subscription deadline.
        let deadline = Instant::now() + self.watch.subscription_timeout;
        let channel = tokio::select! {
            biased;

            _ = self.cancellation_token.cancelled() => return Ok(JobOutcome::Cancelled),
            connected = tokio::time::timeout_at(deadline, connector.connect(&job_id)) => match connected {
                Ok(channel) => channel?,
                Err(_) => {
                    warn!(job_id = %job_id, "push channel did not connect before the deadline");
                    job.finish(JobState::TimedOut);
                    return Ok(JobOutcome::TimedOut);
                }
            },
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        let terminal_tx = tx.clone();
        let subscription = Subscription::open(
            job_id.clone(),
            channel,
            move |chunk| {
                let _ = tx.send(SubscriptionEvent::Chunk(chunk));
            },
            move |outcome: &JobOutcome| {
                let _ = terminal_tx.send(SubscriptionEvent::Terminal(outcome.clone()));
            },
            deadline.saturating_duration_since(Instant::now()),
        );

        let outcome = loop {
            tokio::select! {
                biased;

                _ = self.cancellation_token.cancelled() => {
                    subscription.cancel();
                    break JobOutcome::Cancelled;
                }
                event = rx.recv() => match event {
                    Some(SubscriptionEvent::Chunk(chunk)) => self.apply_chunk(job, chunk).await,
                    Some(SubscriptionEvent::Terminal(outcome)) => break outcome,
                    None => break subscription.finished().await,
                },
            }
        };

        if let Some(state) = outcome.state() {
            job.finish(state);
        }
        Ok(outcome)
    }

    async fn apply_chunk(&self, job: &mut Job, chunk: Chunk) {
        match job.accept_chunk(chunk) {
            Ok(ChunkOutcome::Inserted { .. } | ChunkOutcome::Replaced { .. }) => {
                self.publish(job).await
            }
            Ok(ChunkOutcome::Ignored) => {
                debug!(job_id = %job.handle().job_id, "chunk after terminal state ignored")
            }
            Err(e) => warn!(job_id = %job.handle().job_id, error = %e, "chunk rejected"),
        }
    }

    async fn publish(&self, job: &Job) {
        let Some(tx) = &self.snapshots else {
            return;
        };
        let raw = job.text();
        let text = if job.state().is_terminal() {
            clean_report_text(&raw)
        } else {
            clean_partial_text(&raw)
        };
        let snapshot = ReportSnapshot {
            job_id: job.handle().job_id.clone(),
            text,
            missing_indices: job.missing_indices(),
        };
        if tx.send(snapshot).await.is_err() {
            debug!(job_id = %job.handle().job_id, "snapshot receiver dropped");
        }
    }
}
