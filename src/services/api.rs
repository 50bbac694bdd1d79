//! REST API Client
//!
//! Thin client over the safety-check and work-order REST APIs. Every call
//! carries the configured bearer token. Replies are validated at this
//! boundary: anything that is not a well-formed reply becomes a
//! `CoreError::Transport` for the job it belongs to.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};
use url::Url;
use workorder_safety_core::{CoreError, CoreResult, JobSubmitter, StatusReport, StatusSource};

use crate::models::emergency::Emergency;
use crate::models::settings::AppConfig;
use crate::models::workorder::{
    EmergencyCheckQuery, SafetyCheckRequest, StatusReply, SubmitReply, WorkOrder,
};
use crate::utils::error::{AppError, AppResult};

const SAFETY_CHECK_REQUEST_PATH: &str = "safetycheck/request";
const SAFETY_CHECK_STATUS_PATH: &str = "safetycheck/status";
const EMERGENCY_CHECK_PATH: &str = "emergencycheck/request";
const WORK_ORDERS_PATH: &str = "workorders";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Join `path` onto `base`, treating `base` as a directory.
pub fn endpoint_url(base: &str, path: &str) -> AppResult<Url> {
    let mut base = Url::parse(base)
        .map_err(|e| AppError::config(format!("Invalid endpoint '{}': {}", base, e)))?;
    if !base.path().ends_with('/') {
        let dir = format!("{}/", base.path());
        base.set_path(&dir);
    }
    base.join(path.trim_start_matches('/'))
        .map_err(|e| AppError::config(format!("Invalid path '{}': {}", path, e)))
}

fn request_error(url: &Url, e: reqwest::Error) -> CoreError {
    if e.is_timeout() {
        CoreError::timeout(format!("POST {} timed out", url))
    } else {
        CoreError::transport(format!("POST {} failed: {}", url, e))
    }
}

/// Client for the safety-check API and the work-order API.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    submit_url: Url,
    status_url: Url,
    emergency_url: Url,
    work_orders_url: Url,
    auth_token: Option<String>,
}

impl ApiClient {
    pub fn new(config: &AppConfig) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("workorder-safety/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            submit_url: endpoint_url(&config.api_endpoint, SAFETY_CHECK_REQUEST_PATH)?,
            status_url: endpoint_url(&config.api_endpoint, SAFETY_CHECK_STATUS_PATH)?,
            emergency_url: endpoint_url(&config.api_endpoint, EMERGENCY_CHECK_PATH)?,
            work_orders_url: endpoint_url(&config.workorder_api_endpoint, WORK_ORDERS_PATH)?,
            auth_token: config.auth_token.clone(),
        })
    }

    fn post(&self, url: &Url) -> reqwest::RequestBuilder {
        let request = self.http.post(url.clone());
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// POST `body` and decode a JSON reply, accepting only `accepted` codes.
    async fn post_json<B, R>(&self, url: &Url, body: &B, accepted: &[StatusCode]) -> CoreResult<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| request_error(url, e))?;

        let status = response.status();
        if !accepted.contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::transport(format!(
                "POST {} returned {}: {}",
                url, status, body
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CoreError::transport(format!("reading reply from {}: {}", url, e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| CoreError::transport(format!("malformed reply from {}: {}", url, e)))
    }

    /// Fetch all work orders, joined with their locations and sorted by id.
    pub async fn list_work_orders(&self) -> AppResult<Vec<WorkOrder>> {
        let orders: Vec<WorkOrder> = self
            .post_json(&self.work_orders_url, &json!({}), &[StatusCode::OK])
            .await?;
        debug!(count = orders.len(), "fetched work orders");
        Ok(orders)
    }

    /// Find one work order by id.
    pub async fn get_work_order(&self, work_order_id: &str) -> AppResult<WorkOrder> {
        self.list_work_orders()
            .await?
            .into_iter()
            .find(|o| o.work_order_id == work_order_id)
            .ok_or_else(|| AppError::not_found(format!("work order {}", work_order_id)))
    }

    /// Emergency and hazard features near a work order's location.
    pub async fn check_emergencies(&self, work_order: &WorkOrder) -> AppResult<Vec<Emergency>> {
        let query = EmergencyCheckQuery::for_work_order(work_order)?;
        let emergencies: Vec<Emergency> = self
            .post_json(&self.emergency_url, &query, &[StatusCode::OK])
            .await?;
        debug!(
            work_order_id = %work_order.work_order_id,
            count = emergencies.len(),
            "fetched emergencies"
        );
        Ok(emergencies)
    }
}

#[async_trait]
impl JobSubmitter for ApiClient {
    type Request = SafetyCheckRequest;

    async fn submit(&self, request: &SafetyCheckRequest) -> CoreResult<String> {
        let reply: SubmitReply = self
            .post_json(
                &self.submit_url,
                request,
                &[StatusCode::OK, StatusCode::ACCEPTED],
            )
            .await?;
        if reply.request_id.trim().is_empty() {
            return Err(CoreError::transport("submission reply has an empty requestId"));
        }
        debug!(
            job_id = %reply.request_id,
            work_order_id = %request.workorderdetails.work_order_id,
            "safety check submitted"
        );
        Ok(reply.request_id)
    }
}

#[async_trait]
impl StatusSource for ApiClient {
    async fn check_status(&self, job_id: &str) -> CoreResult<StatusReport> {
        let reply: StatusReply = self
            .post_json(
                &self.status_url,
                &json!({ "requestId": job_id }),
                &[StatusCode::OK, StatusCode::ACCEPTED],
            )
            .await
            .inspect_err(|e| warn!(job_id, error = %e, "status request failed"))?;
        reply.into_report(job_id)
    }
}
