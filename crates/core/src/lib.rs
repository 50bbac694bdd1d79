//! Work Order Safety Core
//!
//! Foundational types for observing long-running safety-check jobs: ordered
//! reassembly of streamed report chunks, the job state machine, and the poll
//! and subscription watchers. This crate has no dependency on application
//! code (HTTP clients, configuration files, CLI).
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `assembler` - Index-keyed chunk reassembly (`ChunkAssembler`)
//! - `job` - Job handle, state machine and outcome types
//! - `streaming` - Wire types and collaborator traits (`StatusSource`, `PushChannel`, `JobSubmitter`)
//! - `watcher` - Poll-mode and subscription-mode watchers

pub mod assembler;
pub mod error;
pub mod job;
pub mod streaming;
pub mod watcher;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Chunk Reassembly ───────────────────────────────────────────────────
pub use assembler::{Chunk, ChunkAssembler, ChunkOutcome, MISSING_INDICES_LIMIT};

// ── Jobs ───────────────────────────────────────────────────────────────
pub use job::{Job, JobHandle, JobOutcome, JobState};

// ── Wire Types & Collaborators ─────────────────────────────────────────
pub use streaming::{
    JobStatus, JobSubmitter, PushChannel, PushMessage, StatusReport, StatusSource, TerminalEvent,
    COMPLETED_STATUS,
};

// ── Watchers ───────────────────────────────────────────────────────────
pub use watcher::{PollUpdate, PollWatcher, Subscription, WatchConfig};
