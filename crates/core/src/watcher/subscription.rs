//! Subscription-Mode Watcher
//!
//! Listens on a push channel for chunk and terminal messages with a hard
//! wall-clock timeout. The returned `Subscription` is the only way to reach
//! the running listener: cancelling or dropping it disarms every callback
//! before returning, then the listener closes the channel.
//!
//! A terminal message can race a chunk still in flight. Chunks that arrive
//! after the terminal message are not delivered, so the tail of the content
//! may be lost.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::assembler::Chunk;
use crate::job::JobOutcome;
use crate::streaming::{PushChannel, PushMessage, TerminalEvent};

type ChunkCallback = Box<dyn FnMut(Chunk) + Send>;
type TerminalCallback = Box<dyn FnOnce(&JobOutcome) + Send>;

/// Callbacks that are still allowed to fire. `None` once cancelled or done.
struct Callbacks {
    on_chunk: ChunkCallback,
    on_terminal: TerminalCallback,
}

type SharedCallbacks = Arc<Mutex<Option<Callbacks>>>;

fn lock(callbacks: &SharedCallbacks) -> MutexGuard<'_, Option<Callbacks>> {
    callbacks.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Scoped handle to a running push subscription.
pub struct Subscription {
    job_id: String,
    cancellation_token: CancellationToken,
    callbacks: SharedCallbacks,
    task: Option<JoinHandle<JobOutcome>>,
}

impl Subscription {
    /// Start listening on `channel` for `job_id`. Must be called inside a
    /// tokio runtime.
    ///
    /// The timeout clock starts now. Callbacks run on the listener task while
    /// it holds the callback lock, so they must not call `cancel` on this
    /// subscription themselves.
    pub fn open<C, F, T>(
        job_id: impl Into<String>,
        channel: C,
        on_chunk: F,
        on_terminal: T,
        timeout: Duration,
    ) -> Self
    where
        C: PushChannel,
        F: FnMut(Chunk) + Send + 'static,
        T: FnOnce(&JobOutcome) + Send + 'static,
    {
        let job_id = job_id.into();
        let deadline = Instant::now() + timeout;
        let cancellation_token = CancellationToken::new();
        let callbacks: SharedCallbacks = Arc::new(Mutex::new(Some(Callbacks {
            on_chunk: Box::new(on_chunk),
            on_terminal: Box::new(on_terminal),
        })));

        let task = tokio::spawn(listen(
            job_id.clone(),
            channel,
            callbacks.clone(),
            cancellation_token.clone(),
            deadline,
        ));

        Self {
            job_id,
            cancellation_token,
            callbacks,
            task: Some(task),
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// Stop the subscription. Idempotent, and safe to call after the
    /// subscription finished on its own. No callback fires after this returns.
    pub fn cancel(&self) {
        if !self.cancellation_token.is_cancelled() {
            debug!(job_id = %self.job_id, "cancelling subscription");
        }
        self.cancellation_token.cancel();
        lock(&self.callbacks).take();
    }

    /// Whether callbacks can no longer fire (cancelled or terminated).
    pub fn is_closed(&self) -> bool {
        lock(&self.callbacks).is_none()
    }

    /// Wait for the listener to stop and return how it ended.
    pub async fn finished(mut self) -> JobOutcome {
        let Some(task) = self.task.take() else {
            return JobOutcome::Cancelled;
        };
        match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(job_id = %self.job_id, error = %e, "subscription task aborted");
                JobOutcome::failed(format!("subscription task aborted: {}", e))
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("job_id", &self.job_id)
            .field("cancelled", &self.cancellation_token.is_cancelled())
            .finish()
    }
}

async fn listen<C: PushChannel>(
    job_id: String,
    mut channel: C,
    callbacks: SharedCallbacks,
    cancellation_token: CancellationToken,
    deadline: Instant,
) -> JobOutcome {
    let timeout = tokio::time::sleep_until(deadline);
    tokio::pin!(timeout);

    let outcome = loop {
        tokio::select! {
            biased;
            _ = cancellation_token.cancelled() => break JobOutcome::Cancelled,
            _ = &mut timeout => {
                warn!(job_id = %job_id, "subscription timed out without a terminal event");
                break JobOutcome::TimedOut;
            }
            message = channel.next_message() => match message {
                Some(Ok(PushMessage::Chunk(chunk))) => {
                    debug!(job_id = %job_id, index = ?chunk.index, "chunk received");
                    match lock(&callbacks).as_mut() {
                        Some(cb) => (cb.on_chunk)(chunk),
                        None => break JobOutcome::Cancelled,
                    }
                }
                Some(Ok(PushMessage::Terminal(TerminalEvent::Completed { payload }))) => {
                    break JobOutcome::Completed { payload };
                }
                Some(Ok(PushMessage::Terminal(TerminalEvent::Failed { reason }))) => {
                    break JobOutcome::Failed { reason };
                }
                Some(Err(e)) if e.is_terminal() => {
                    warn!(job_id = %job_id, error = %e, "push channel failed");
                    break JobOutcome::failed(e.to_string());
                }
                Some(Err(e)) => {
                    warn!(job_id = %job_id, error = %e, "rejected push message");
                }
                None => {
                    break JobOutcome::failed("push channel closed before completion");
                }
            }
        }
    };

    channel.close().await;

    if outcome == JobOutcome::Cancelled {
        return outcome;
    }

    // Hold the lock across the callback so a concurrent cancel waits for it.
    let mut guard = lock(&callbacks);
    match guard.take() {
        Some(cb) => {
            info!(job_id = %job_id, outcome = ?outcome.state(), "subscription finished");
            (cb.on_terminal)(&outcome);
            outcome
        }
        None => JobOutcome::Cancelled,
    }
}
