//! Work Order Models
//!
//! Work orders, their joined location records, and the request/reply bodies
//! of the safety-check API. Records come from a schemaless key-value store,
//! so numeric attributes are accepted as JSON numbers or numeric strings and
//! attributes this crate does not model are carried through untouched.

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use workorder_safety_core::{CoreError, CoreResult, JobStatus, StatusReport};

/// Message used whenever an operation needs coordinates the record lacks.
pub const INCOMPLETE_LOCATION: &str = "Work order location details are incomplete.";

/// Prompt sent with every safety-check request.
pub const SAFETY_CHECK_QUERY: &str =
    "Perform hazard safety and weather safety checks for WorkOrder::";

const SESSION_ID_LEN: usize = 20;

#[derive(Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Float(f64),
    Text(String),
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<NumberOrString>::deserialize(deserializer)? {
        Some(NumberOrString::Float(v)) => Some(v),
        Some(NumberOrString::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_f64(deserializer)?.map(|v| v as i64))
}

/// A location record, keyed by `location_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct LocationDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64", skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A field work order as stored, optionally joined with its location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct WorkOrder {
    #[serde(default)]
    pub work_order_id: String,
    #[serde(default)]
    pub asset_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_i64", skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_start_timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_finish_timestamp: Option<String>,
    #[serde(
        rename = "safetyCheckPerformedAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub safety_check_performed_at: Option<String>,
    #[serde(
        rename = "safetycheckresponse",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub safety_check_response: Option<String>,
    /// Joined location; `None` when no location matched (serialized as null)
    #[serde(default)]
    pub location_details: Option<LocationDetails>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WorkOrder {
    /// Latitude/longitude of the joined location.
    pub fn coordinates(&self) -> CoreResult<(f64, f64)> {
        let location = self
            .location_details
            .as_ref()
            .ok_or_else(|| CoreError::incomplete_input(INCOMPLETE_LOCATION))?;
        match (location.latitude, location.longitude) {
            (Some(lat), Some(lon)) if lat.is_finite() && lon.is_finite() => Ok((lat, lon)),
            _ => Err(CoreError::incomplete_input(INCOMPLETE_LOCATION)),
        }
    }

    /// User-facing status category, following the list view's colour coding.
    pub fn status_indicator(&self) -> &'static str {
        match self.status.as_deref() {
            Some("Approved") => "success",
            Some("In Progress") => "info",
            Some("Pending") => "warning",
            _ => "error",
        }
    }
}

/// Work order details sent along with a safety-check request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyCheckDetails {
    pub work_order_id: String,
    #[serde(rename = "workOrderLocationAssetDetails")]
    pub work_order: WorkOrder,
}

/// Body of `POST safetycheck/request`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyCheckRequest {
    pub query: String,
    pub workorderdetails: SafetyCheckDetails,
    pub session_id: String,
}

impl SafetyCheckRequest {
    pub fn for_work_order(work_order: &WorkOrder) -> Self {
        Self {
            query: SAFETY_CHECK_QUERY.to_string(),
            workorderdetails: SafetyCheckDetails {
                work_order_id: work_order.work_order_id.clone(),
                work_order: work_order.clone(),
            },
            session_id: new_session_id(),
        }
    }
}

/// Random 20-digit numeric session identifier.
pub fn new_session_id() -> String {
    let mut rng = rand::thread_rng();
    (0..SESSION_ID_LEN)
        .map(|_| char::from(b'0' + rng.gen_range(0..10u8)))
        .collect()
}

/// Body of `POST emergencycheck/request`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EmergencyCheckQuery {
    pub latitude: f64,
    pub longitude: f64,
}

impl EmergencyCheckQuery {
    pub fn for_work_order(work_order: &WorkOrder) -> CoreResult<Self> {
        let (latitude, longitude) = work_order.coordinates()?;
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Reply of `POST safetycheck/request`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReply {
    #[serde(rename = "requestId")]
    pub request_id: String,
}

/// Reply of `POST safetycheck/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReply {
    #[serde(rename = "requestId")]
    pub request_id: String,
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safetycheckresponse: Option<String>,
}

impl StatusReply {
    /// Validate a reply for `job_id` and turn it into a `StatusReport`.
    pub fn into_report(self, job_id: &str) -> CoreResult<StatusReport> {
        if self.request_id != job_id {
            return Err(CoreError::transport(format!(
                "status reply for '{}' while polling '{}'",
                self.request_id, job_id
            )));
        }
        match JobStatus::parse(&self.status) {
            JobStatus::Completed => Ok(StatusReport::completed(self.safetycheckresponse)),
            JobStatus::Pending(raw) => Ok(StatusReport::pending(raw)),
        }
    }
}
