//! Request and response bodies.
//!
//! Every field is a plain JSON type. Enumerations travel as the strings stored in the
//! admission row (`"Discharged"`, `"delivered"`, `"improved"`, ...) so a front end can show
//! them without a lookup table.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct AdmissionStatusRes {
    pub admission_id: String,
    /// `"Active"` or `"Discharged"`.
    pub admission_status: String,
}

/// Discharge form.
///
/// Missing fields deserialize as empty strings and are reported by validation together,
/// rather than failing JSON extraction on the first one.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct DischargeReq {
    pub final_diagnosis: String,
    pub final_diagnosis_icd_code: String,
    /// One of `delivered`, `referred`, `died`.
    pub result_status: String,
    /// One of `improved`, `unimproved`.
    pub result_condition: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct MessageRes {
    /// `info`, `warning` or `error`.
    pub level: String,
    pub message: String,
}

/// Outcome of one archive step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct StepRes {
    /// `admission_snapshot`, `doctors_orders`, `medications` or `notes`.
    pub step: String,
    /// `archived`, `nothing_to_do` or `degraded`.
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archived: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub removed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DischargeRes {
    pub admission_id: String,
    #[schema(value_type = Object)]
    pub patient_id: serde_json::Value,
    /// RFC 3339, UTC, millisecond precision.
    pub discharge_datetime: Option<String>,
    pub length_of_stay_hours: Option<f64>,
    /// False when any archive step degraded; resume archival to finish.
    pub complete: bool,
    pub steps: Vec<StepRes>,
    pub messages: Vec<MessageRes>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DeletePatientRes {
    pub deleted_rows: u64,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    /// Stable machine-readable code, e.g. `already_discharged`.
    pub error: String,
    /// User-facing message.
    pub message: String,
}
