//! Services
//!
//! Business logic for the application: API access, the push channel, the
//! work-order join, the runtime config writer and safety-check orchestration.
//! Services are called by the CLI.

pub mod api;
pub mod push;
pub mod runtime_config;
pub mod safety_check;
pub mod workorders;

pub use api::ApiClient;
pub use push::{PushConnector, WebSocketChannel, WebSocketConnector};
pub use runtime_config::{handle_resource_event, render_config_js, RuntimeConfigParams};
pub use safety_check::{
    clean_report_text, ReportSnapshot, SafetyCheckReport, SafetyCheckService, WatchMode,
};
pub use workorders::join_locations;
