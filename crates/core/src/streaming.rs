//! Job Stream Wire Types
//!
//! Boundary types for the three external collaborators a job watcher talks
//! to: the submission endpoint, the status endpoint (poll mode) and the push
//! channel (subscription mode). Untrusted replies are validated here and
//! turned into tagged types, so nothing downstream sees a half-formed shape.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::assembler::Chunk;
use crate::error::{CoreError, CoreResult};

/// Wire status string that marks a finished job. Every other value means
/// "still pending".
pub const COMPLETED_STATUS: &str = "COMPLETED";

/// Status of a job as seen by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "raw", rename_all = "snake_case")]
pub enum JobStatus {
    Completed,
    /// Any non-completed status, with the raw string for logging
    Pending(String),
}

impl JobStatus {
    pub fn parse(raw: &str) -> Self {
        if raw == COMPLETED_STATUS {
            Self::Completed
        } else {
            Self::Pending(raw.to_string())
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

/// One validated reply from the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

impl StatusReport {
    pub fn pending(raw: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Pending(raw.into()),
            payload: None,
        }
    }

    pub fn completed(payload: Option<String>) -> Self {
        Self {
            status: JobStatus::Completed,
            payload,
        }
    }
}

/// Terminal message delivered over a push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TerminalEvent {
    Completed {
        #[serde(skip_serializing_if = "Option::is_none")]
        payload: Option<String>,
    },
    Failed { reason: String },
}

/// A validated push-channel message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushMessage {
    Chunk(Chunk),
    Terminal(TerminalEvent),
}

/// Frame shapes accepted from the push channel before validation.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPushFrame {
    Chunk {
        #[serde(default)]
        index: Option<i64>,
        chunk: String,
    },
    Event {
        #[serde(rename = "type")]
        kind: String,
        #[serde(default)]
        payload: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

impl PushMessage {
    /// Parse one text frame.
    ///
    /// `{"index"?: int, "chunk": string}` is a chunk; `{"type": "complete"}`
    /// and `{"type": "error", "message": ..}` are terminal. Negative indices
    /// fail with `InvalidChunkIndex`, anything else unrecognised with
    /// `Validation`.
    pub fn parse(frame: &str) -> CoreResult<Self> {
        let raw: RawPushFrame = serde_json::from_str(frame)
            .map_err(|e| CoreError::validation(format!("unrecognised push frame: {}", e)))?;

        match raw {
            RawPushFrame::Chunk {
                index: Some(index), ..
            } if index < 0 => Err(CoreError::InvalidChunkIndex(index)),
            RawPushFrame::Chunk { index, chunk } => Ok(Self::Chunk(Chunk {
                index,
                content: chunk,
            })),
            RawPushFrame::Event {
                kind,
                payload,
                message,
            } => match kind.as_str() {
                "complete" | "completed" => {
                    Ok(Self::Terminal(TerminalEvent::Completed { payload }))
                }
                "error" | "failed" => Ok(Self::Terminal(TerminalEvent::Failed {
                    reason: message.unwrap_or_else(|| "job failed".to_string()),
                })),
                other => Err(CoreError::validation(format!(
                    "unknown push event type: {}",
                    other
                ))),
            },
        }
    }
}

/// Submits a job and returns its identifier.
#[async_trait]
pub trait JobSubmitter: Send + Sync {
    type Request: Send + Sync;

    async fn submit(&self, request: &Self::Request) -> CoreResult<String>;
}

/// Answers "is this job done yet?" for poll mode.
///
/// Any `Err` is treated by the poll watcher as a terminal transport failure.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn check_status(&self, job_id: &str) -> CoreResult<StatusReport>;
}

/// Push channel keyed by job id, for subscription mode.
#[async_trait]
pub trait PushChannel: Send + 'static {
    /// Next message, or `None` once the upstream has closed. Per-message
    /// parse failures are returned as `Some(Err(..))` and do not end the
    /// stream; a terminal error (`CoreError::is_terminal`) does.
    async fn next_message(&mut self) -> Option<CoreResult<PushMessage>>;

    /// Release the underlying resource. Must tolerate repeated calls.
    async fn close(&mut self);
}
