//! Work Order Safety - Application Library
//!
//! Field-workforce safety checks for work orders. It includes:
//! - Data models for work orders, emergencies and settings
//! - Services: REST client, WebSocket push channel, safety-check orchestration
//! - Storage layer (JSON config)
//! - Utilities (errors, paths)
//!
//! Job tracking and report reassembly live in `workorder_safety_core`.

pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

// ── Models ─────────────────────────────────────────────────────────────
pub use models::settings::{AppConfig, LogFormat, LogLevel, LoggingConfig, SettingsUpdate};
pub use models::workorder::{LocationDetails, WorkOrder};

// ── Services ───────────────────────────────────────────────────────────
pub use services::{ApiClient, SafetyCheckReport, SafetyCheckService, WatchMode};

// ── Storage & Errors ───────────────────────────────────────────────────
pub use storage::ConfigService;
pub use utils::error::{AppError, AppResult};
