//! Settings Models
//!
//! Application configuration and settings data structures. The configuration
//! is loaded once at startup and passed by reference to every component that
//! needs an endpoint, credential or timing value.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;
use workorder_safety_core::WatchConfig;

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

/// Log severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

/// Application configuration stored in config.json
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the safety-check REST API
    pub api_endpoint: String,
    /// Base URL of the work-order REST API
    pub workorder_api_endpoint: String,
    /// WebSocket URL for streamed safety-check reports
    #[serde(default)]
    pub websocket_endpoint: Option<String>,
    /// AWS region the deployment lives in
    pub region_name: String,
    #[serde(default)]
    pub cognito_user_pool_id: String,
    #[serde(default)]
    pub cognito_user_pool_client_id: String,
    #[serde(default)]
    pub cognito_identity_pool_id: String,
    /// Hosted UI domain; derived from the region when empty
    #[serde(default)]
    pub cognito_domain: String,
    #[serde(default = "default_api_name")]
    pub api_name: String,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default = "default_workorder_api_name")]
    pub workorder_api_name: String,
    #[serde(default = "default_prototype_name")]
    pub prototype_name: String,
    /// Bearer token sent with every API call. Never written back to disk.
    #[serde(skip_serializing, default)]
    pub auth_token: Option<String>,
    /// Status polls before giving up
    #[serde(default = "default_poll_max_attempts")]
    pub poll_max_attempts: u32,
    /// Delay between status polls in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Hard timeout for a streamed report in milliseconds
    #[serde(default = "default_subscription_timeout_ms")]
    pub subscription_timeout_ms: u64,
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_api_name() -> String {
    "RestAPI".to_string()
}

fn default_app_name() -> String {
    "Field Workforce safety assistant".to_string()
}

fn default_workorder_api_name() -> String {
    "WorkOrderAPI".to_string()
}

fn default_prototype_name() -> String {
    "WorkOrderSafetyDemo".to_string()
}

fn default_poll_max_attempts() -> u32 {
    20
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_subscription_timeout_ms() -> u64 {
    60_000
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_endpoint: "http://localhost:3000".to_string(),
            workorder_api_endpoint: "http://localhost:3000".to_string(),
            websocket_endpoint: None,
            region_name: "us-east-1".to_string(),
            cognito_user_pool_id: String::new(),
            cognito_user_pool_client_id: String::new(),
            cognito_identity_pool_id: String::new(),
            cognito_domain: String::new(),
            api_name: default_api_name(),
            app_name: default_app_name(),
            workorder_api_name: default_workorder_api_name(),
            prototype_name: default_prototype_name(),
            auth_token: None,
            poll_max_attempts: default_poll_max_attempts(),
            poll_interval_ms: default_poll_interval_ms(),
            subscription_timeout_ms: default_subscription_timeout_ms(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Settings update request (partial update)
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SettingsUpdate {
    pub api_endpoint: Option<String>,
    pub workorder_api_endpoint: Option<String>,
    pub websocket_endpoint: Option<String>,
    pub region_name: Option<String>,
    pub poll_max_attempts: Option<u32>,
    pub poll_interval_ms: Option<u64>,
    pub subscription_timeout_ms: Option<u64>,
    pub logging: Option<LoggingConfig>,
}

impl AppConfig {
    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: SettingsUpdate) {
        if let Some(endpoint) = update.api_endpoint {
            self.api_endpoint = endpoint;
        }
        if let Some(endpoint) = update.workorder_api_endpoint {
            self.workorder_api_endpoint = endpoint;
        }
        if let Some(endpoint) = update.websocket_endpoint {
            self.websocket_endpoint = Some(endpoint).filter(|e| !e.is_empty());
        }
        if let Some(region) = update.region_name {
            self.region_name = region;
        }
        if let Some(attempts) = update.poll_max_attempts {
            self.poll_max_attempts = attempts;
        }
        if let Some(interval) = update.poll_interval_ms {
            self.poll_interval_ms = interval;
        }
        if let Some(timeout) = update.subscription_timeout_ms {
            self.subscription_timeout_ms = timeout;
        }
        if let Some(logging) = update.logging {
            self.logging = logging;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        Url::parse(&self.api_endpoint)
            .map_err(|e| format!("Invalid api_endpoint '{}': {}", self.api_endpoint, e))?;
        Url::parse(&self.workorder_api_endpoint).map_err(|e| {
            format!(
                "Invalid workorder_api_endpoint '{}': {}",
                self.workorder_api_endpoint, e
            )
        })?;

        if let Some(ws) = &self.websocket_endpoint {
            let url = Url::parse(ws).map_err(|e| format!("Invalid websocket_endpoint '{}': {}", ws, e))?;
            if !["ws", "wss"].contains(&url.scheme()) {
                return Err(format!(
                    "websocket_endpoint must use ws:// or wss://, got '{}'",
                    url.scheme()
                ));
            }
        }

        if self.region_name.trim().is_empty() {
            return Err("region_name must not be empty".to_string());
        }

        if self.poll_max_attempts == 0 {
            return Err("poll_max_attempts must be at least 1".to_string());
        }

        if self.subscription_timeout_ms == 0 {
            return Err("subscription_timeout_ms must be greater than zero".to_string());
        }

        Ok(())
    }

    /// Hosted UI domain, derived from the region when not set explicitly
    pub fn cognito_domain(&self) -> String {
        if self.cognito_domain.is_empty() {
            format!(".auth.{}.amazoncognito.com/", self.region_name)
        } else {
            self.cognito_domain.clone()
        }
    }

    /// Attempt budget and timing for job watchers
    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            max_attempts: self.poll_max_attempts,
            interval: Duration::from_millis(self.poll_interval_ms),
            subscription_timeout: Duration::from_millis(self.subscription_timeout_ms),
        }
    }
}
