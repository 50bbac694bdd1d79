//! Job Handle and State Machine
//!
//! A job is a long-running asynchronous operation identified by an opaque id.
//! Its state moves from `Pending` to exactly one terminal state and never
//! leaves it; once terminal, the job's assembler stops accepting chunks.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::assembler::{Chunk, ChunkAssembler, ChunkOutcome};
use crate::error::CoreResult;
use crate::watcher::WatchConfig;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Completed,
    Failed,
    TimedOut,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::TimedOut => write!(f, "timed_out"),
        }
    }
}

/// How a watcher finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobOutcome {
    /// The job reported completion, optionally with its final payload
    Completed {
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<String>,
    },
    /// The job or its transport failed
    Failed { reason: String },
    /// Attempt budget or wall-clock bound exhausted
    TimedOut,
    /// The caller cancelled the watcher; no terminal callback was emitted
    Cancelled,
}

impl JobOutcome {
    /// The terminal job state this outcome maps to, `None` for cancellation.
    pub fn state(&self) -> Option<JobState> {
        match self {
            Self::Completed { .. } => Some(JobState::Completed),
            Self::Failed { .. } => Some(JobState::Failed),
            Self::TimedOut => Some(JobState::TimedOut),
            Self::Cancelled => None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Book-keeping for one submitted job, mutated only by the watcher driving it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: String,
    pub started_at: DateTime<Utc>,
    pub attempts: u32,
    pub max_attempts: u32,
    pub poll_interval_ms: u64,
    state: JobState,
}

impl JobHandle {
    pub fn new(job_id: impl Into<String>, config: &WatchConfig) -> Self {
        Self {
            job_id: job_id.into(),
            started_at: Utc::now(),
            attempts: 0,
            max_attempts: config.max_attempts,
            poll_interval_ms: config.interval.as_millis() as u64,
            state: JobState::Pending,
        }
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn attempts_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// Move to `next`. Returns false (and changes nothing) when the job is
    /// already terminal or `next` is `Pending`.
    pub fn transition(&mut self, next: JobState) -> bool {
        if self.state.is_terminal() || !next.is_terminal() {
            return false;
        }
        self.state = next;
        true
    }
}

/// A job handle plus the assembler for its streamed output.
#[derive(Debug, Clone)]
pub struct Job {
    handle: JobHandle,
    assembler: Option<ChunkAssembler>,
}

impl Job {
    pub fn new(handle: JobHandle) -> Self {
        Self {
            handle,
            assembler: None,
        }
    }

    pub fn handle(&self) -> &JobHandle {
        &self.handle
    }

    pub fn handle_mut(&mut self) -> &mut JobHandle {
        &mut self.handle
    }

    pub fn state(&self) -> JobState {
        self.handle.state()
    }

    /// Hand a chunk to the job's assembler, creating it on first use.
    /// Chunks arriving after a terminal state are ignored.
    pub fn accept_chunk(&mut self, chunk: Chunk) -> CoreResult<ChunkOutcome> {
        if self.handle.state().is_terminal() {
            return Ok(ChunkOutcome::Ignored);
        }
        self.assembler
            .get_or_insert_with(ChunkAssembler::new)
            .add_chunk(chunk)
    }

    /// Apply a terminal state and seal the assembler.
    pub fn finish(&mut self, state: JobState) -> bool {
        let moved = self.handle.transition(state);
        if moved {
            if let Some(assembler) = self.assembler.as_mut() {
                assembler.seal();
            }
        }
        moved
    }

    pub fn text(&self) -> String {
        self.assembler
            .as_ref()
            .map(ChunkAssembler::current_text)
            .unwrap_or_default()
    }

    pub fn missing_indices(&self) -> Vec<u64> {
        self.assembler
            .as_ref()
            .map(ChunkAssembler::missing_indices)
            .unwrap_or_default()
    }

    pub fn has_output(&self) -> bool {
        self.assembler.as_ref().is_some_and(|a| !a.is_empty())
    }

    /// Use a completion payload as the whole document.
    ///
    /// Only applies to a completed job with no streamed output, which is the
    /// normal case for polled jobs. Returns whether the payload was taken.
    pub fn adopt_payload(&mut self, payload: impl Into<String>) -> bool {
        if self.handle.state() != JobState::Completed || self.has_output() {
            return false;
        }
        let mut assembler = ChunkAssembler::new();
        if assembler.add_chunk(Chunk::indexed(0, payload)).is_err() {
            return false;
        }
        assembler.seal();
        self.assembler = Some(assembler);
        true
    }
}
