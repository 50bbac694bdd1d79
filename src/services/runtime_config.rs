//! Runtime Config Writer
//!
//! Renders the browser-side `config.js` (`window.APP_CONFIG = {...}`) from
//! deployment outputs, and handles the deploy-time resource lifecycle that
//! keeps the file current.

use std::fs;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::settings::AppConfig;
use crate::utils::error::AppResult;
use crate::utils::paths::ensure_parent_dir;

pub const CONFIG_UPDATED_MESSAGE: &str = "Config.js updated successfully";

const API_NAME: &str = "RestAPI";
const APP_NAME: &str = "Field Workforce safety assistant";
const WORKORDER_API_NAME: &str = "WorkOrderAPI";
const PROTOTYPE_NAME: &str = "WorkOrderSafetyDemo";

/// Deployment values written into `config.js`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct RuntimeConfigParams {
    pub api_endpoint: String,
    pub workorder_api_endpoint: String,
    pub region_name: String,
    pub cognito_user_pool_id: String,
    pub cognito_user_pool_client_id: String,
    pub cognito_identity_pool_id: String,
}

impl From<&AppConfig> for RuntimeConfigParams {
    fn from(config: &AppConfig) -> Self {
        Self {
            api_endpoint: config.api_endpoint.clone(),
            workorder_api_endpoint: config.workorder_api_endpoint.clone(),
            region_name: config.region_name.clone(),
            cognito_user_pool_id: config.cognito_user_pool_id.clone(),
            cognito_user_pool_client_id: config.cognito_user_pool_client_id.clone(),
            cognito_identity_pool_id: config.cognito_identity_pool_id.clone(),
        }
    }
}

/// Render `config.js`. Values are emitted as JSON string literals.
pub fn render_config_js(params: &RuntimeConfigParams, generated_at: DateTime<Utc>) -> String {
    let cognito_domain = format!(".auth.{}.amazoncognito.com/", params.region_name);
    let entries: [(&str, &str); 11] = [
        ("VITE_API_ENDPOINT", params.api_endpoint.as_str()),
        ("VITE_WORKORDER_API_ENDPOINT", params.workorder_api_endpoint.as_str()),
        ("VITE_REGION_NAME", params.region_name.as_str()),
        ("VITE_COGNITO_USER_POOL_ID", params.cognito_user_pool_id.as_str()),
        (
            "VITE_COGNITO_USER_POOL_CLIENT_ID",
            params.cognito_user_pool_client_id.as_str(),
        ),
        (
            "VITE_COGNITO_IDENTITY_POOL_ID",
            params.cognito_identity_pool_id.as_str(),
        ),
        ("VITE_API_NAME", API_NAME),
        ("VITE_APP_NAME", APP_NAME),
        ("VITE_WorkOrder_API_NAME", WORKORDER_API_NAME),
        ("VITE_PROTOTYPE_NAME", PROTOTYPE_NAME),
        ("VITE_COGNITO_DOMAIN", cognito_domain.as_str()),
    ];

    let body = entries
        .iter()
        .map(|(key, value)| format!("  {}: {}", key, js_string(value)))
        .collect::<Vec<_>>()
        .join(",\n");

    format!(
        "// Runtime configuration - Generated at {}\nwindow.APP_CONFIG = {{\n{}\n}};",
        generated_at.to_rfc3339_opts(SecondsFormat::Millis, true),
        body
    )
}

fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

/// Render and write `config.js` to `path`.
pub fn write_config_js(
    path: &Path,
    params: &RuntimeConfigParams,
    generated_at: DateTime<Utc>,
) -> AppResult<()> {
    ensure_parent_dir(path)?;
    fs::write(path, render_config_js(params, generated_at))?;
    info!(path = %path.display(), "runtime config written");
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestType {
    Create,
    Update,
    Delete,
}

/// Deploy-time lifecycle event for the runtime config resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceEvent {
    pub request_type: RequestType,
    #[serde(default)]
    pub physical_resource_id: Option<String>,
    #[serde(default)]
    pub resource_properties: RuntimeConfigParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceResponse {
    pub physical_resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Apply a lifecycle event: create and update (re)write `out`, delete leaves
/// it alone and echoes the existing physical id.
pub fn handle_resource_event(
    event: &ResourceEvent,
    out: &Path,
    physical_resource_id: &str,
    now: DateTime<Utc>,
) -> AppResult<ResourceResponse> {
    match event.request_type {
        RequestType::Create | RequestType::Update => {
            write_config_js(out, &event.resource_properties, now)?;
            Ok(ResourceResponse {
                physical_resource_id: Some(physical_resource_id.to_string()),
                message: Some(CONFIG_UPDATED_MESSAGE.to_string()),
            })
        }
        RequestType::Delete => Ok(ResourceResponse {
            physical_resource_id: event.physical_resource_id.clone(),
            message: None,
        }),
    }
}
