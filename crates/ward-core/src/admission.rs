//! Admission domain types.
//!
//! An admission moves through exactly one transition, `Active → Discharged`, carrying the
//! clinical outcome captured on the discharge form. This module owns:
//!
//! - the status and outcome enumerations and their wire spellings
//! - validation of the raw discharge form into a [`DischargeOutcome`]
//! - the typed [`Admission`] view over a raw `Admissions` row
//! - timestamp parsing/formatting and the length-of-stay calculation

use crate::constants::*;
use crate::store::Row;
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;
use ward_types::NonEmptyText;

// ============================================================================
// ENUMERATIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{value:?} is not one of {expected}")]
pub struct ParseEnumError {
    pub value: String,
    pub expected: &'static str,
}

/// Lifecycle state of an admission.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdmissionStatus {
    Active,
    Discharged,
}

impl AdmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionStatus::Active => "Active",
            AdmissionStatus::Discharged => "Discharged",
        }
    }
}

impl FromStr for AdmissionStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(AdmissionStatus::Active),
            "Discharged" => Ok(AdmissionStatus::Discharged),
            other => Err(ParseEnumError {
                value: other.to_owned(),
                expected: "Active, Discharged",
            }),
        }
    }
}

/// Where the patient went at the end of the stay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Delivered,
    Referred,
    Died,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Delivered => "delivered",
            ResultStatus::Referred => "referred",
            ResultStatus::Died => "died",
        }
    }
}

impl FromStr for ResultStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "delivered" => Ok(ResultStatus::Delivered),
            "referred" => Ok(ResultStatus::Referred),
            "died" => Ok(ResultStatus::Died),
            other => Err(ParseEnumError {
                value: other.to_owned(),
                expected: "delivered, referred, died",
            }),
        }
    }
}

/// The patient's condition at discharge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultCondition {
    Improved,
    Unimproved,
}

impl ResultCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultCondition::Improved => "improved",
            ResultCondition::Unimproved => "unimproved",
        }
    }
}

impl FromStr for ResultCondition {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "improved" => Ok(ResultCondition::Improved),
            "unimproved" => Ok(ResultCondition::Unimproved),
            other => Err(ParseEnumError {
                value: other.to_owned(),
                expected: "improved, unimproved",
            }),
        }
    }
}

// ============================================================================
// DISCHARGE FORM VALIDATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldProblem {
    Missing { field: &'static str },
    Invalid { field: &'static str, reason: String },
}

impl FieldProblem {
    pub fn field(&self) -> &'static str {
        match self {
            FieldProblem::Missing { field } | FieldProblem::Invalid { field, .. } => field,
        }
    }
}

impl std::fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldProblem::Missing { field } => write!(f, "{field} is required"),
            FieldProblem::Invalid { field, reason } => write!(f, "{field}: {reason}"),
        }
    }
}

/// One or more discharge fields were missing or out of range.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", join_problems(.problems))]
pub struct ValidationError {
    pub problems: Vec<FieldProblem>,
}

fn join_problems(problems: &[FieldProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationError {
    pub fn missing(field: &'static str) -> Self {
        Self {
            problems: vec![FieldProblem::Missing { field }],
        }
    }

    pub fn fields(&self) -> Vec<&'static str> {
        self.problems.iter().map(FieldProblem::field).collect()
    }
}

/// Raw discharge form input, exactly as typed or selected by the clinician.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DischargeRequest {
    #[serde(default)]
    pub final_diagnosis: String,
    #[serde(default)]
    pub final_diagnosis_icd_code: String,
    #[serde(default)]
    pub result_status: String,
    #[serde(default)]
    pub result_condition: String,
}

/// Validated clinical outcome of a discharge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DischargeOutcome {
    pub final_diagnosis: NonEmptyText,
    pub final_diagnosis_icd_code: NonEmptyText,
    pub result_status: ResultStatus,
    pub result_condition: ResultCondition,
}

impl DischargeRequest {
    /// Checks every field and reports all problems at once.
    pub fn validate(&self) -> Result<DischargeOutcome, ValidationError> {
        let mut problems = Vec::new();

        let final_diagnosis = required(&mut problems, COL_FINAL_DIAGNOSIS, &self.final_diagnosis);
        let icd_code = required(
            &mut problems,
            COL_FINAL_DIAGNOSIS_ICD_CODE,
            &self.final_diagnosis_icd_code,
        );
        let result_status = required_enum::<ResultStatus>(
            &mut problems,
            COL_RESULT_STATUS,
            &self.result_status,
        );
        let result_condition = required_enum::<ResultCondition>(
            &mut problems,
            COL_RESULT_CONDITION,
            &self.result_condition,
        );

        match (final_diagnosis, icd_code, result_status, result_condition) {
            (Some(final_diagnosis), Some(final_diagnosis_icd_code), Some(result_status), Some(result_condition))
                if problems.is_empty() =>
            {
                Ok(DischargeOutcome {
                    final_diagnosis,
                    final_diagnosis_icd_code,
                    result_status,
                    result_condition,
                })
            }
            _ => Err(ValidationError { problems }),
        }
    }
}

fn required(
    problems: &mut Vec<FieldProblem>,
    field: &'static str,
    value: &str,
) -> Option<NonEmptyText> {
    match NonEmptyText::new(value) {
        Ok(text) => Some(text),
        Err(_) => {
            problems.push(FieldProblem::Missing { field });
            None
        }
    }
}

fn required_enum<T>(problems: &mut Vec<FieldProblem>, field: &'static str, value: &str) -> Option<T>
where
    T: FromStr<Err = ParseEnumError>,
{
    if value.trim().is_empty() {
        problems.push(FieldProblem::Missing { field });
        return None;
    }
    match value.parse::<T>() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            problems.push(FieldProblem::Invalid {
                field,
                reason: e.to_string(),
            });
            None
        }
    }
}

/// Validates a caller-supplied record identifier.
pub fn validate_id(field: &'static str, value: &str) -> Result<NonEmptyText, ValidationError> {
    NonEmptyText::new(value).map_err(|_| ValidationError::missing(field))
}

impl DischargeOutcome {
    /// Builds the column patch applied to the admission row at discharge.
    pub fn patch(&self, discharged_at: DateTime<Utc>, length_of_stay_hours: f64) -> Row {
        let mut patch = Row::new();
        patch.insert(
            COL_ADMISSION_STATUS.into(),
            json!(AdmissionStatus::Discharged.as_str()),
        );
        patch.insert(COL_FINAL_DIAGNOSIS.into(), json!(self.final_diagnosis.as_str()));
        patch.insert(
            COL_FINAL_DIAGNOSIS_ICD_CODE.into(),
            json!(self.final_diagnosis_icd_code.as_str()),
        );
        patch.insert(
            COL_DISCHARGE_DATETIME.into(),
            json!(format_timestamp(discharged_at)),
        );
        patch.insert(COL_LENGTH_OF_STAY_HOURS.into(), json!(length_of_stay_hours));
        patch.insert(COL_RESULT_STATUS.into(), json!(self.result_status.as_str()));
        patch.insert(
            COL_RESULT_CONDITION.into(),
            json!(self.result_condition.as_str()),
        );
        patch
    }
}

// ============================================================================
// ADMISSION ROW VIEW
// ============================================================================

/// Typed view over the columns of an `Admissions` row the engine relies on.
#[derive(Clone, Debug, PartialEq)]
pub struct Admission {
    pub admission_id: String,
    /// Kept as the raw JSON value so dependent-record filters match the stored type.
    pub patient_id: Value,
    pub created_at: DateTime<Utc>,
    pub status: AdmissionStatus,
    pub discharged_at: Option<DateTime<Utc>>,
    pub length_of_stay_hours: Option<f64>,
}

impl Admission {
    /// Reads the typed view from a raw row.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason if a required column is missing or unreadable.
    pub fn from_row(admission_id: &str, row: &Row) -> Result<Self, String> {
        let status = status_from_row(row)?;

        let patient_id = match row.get(COL_PATIENT_ID) {
            Some(Value::Null) | None => return Err(format!("{COL_PATIENT_ID} is missing")),
            Some(value) => value.clone(),
        };

        let created_at = row
            .get(COL_CREATED_AT)
            .and_then(Value::as_str)
            .ok_or_else(|| format!("{COL_CREATED_AT} is missing"))?;
        let created_at = parse_timestamp(created_at)
            .ok_or_else(|| format!("{COL_CREATED_AT} {created_at:?} is not a timestamp"))?;

        let discharged_at = row
            .get(COL_DISCHARGE_DATETIME)
            .and_then(Value::as_str)
            .and_then(parse_timestamp);
        let length_of_stay_hours = row.get(COL_LENGTH_OF_STAY_HOURS).and_then(Value::as_f64);

        Ok(Self {
            admission_id: admission_id.to_owned(),
            patient_id,
            created_at,
            status,
            discharged_at,
            length_of_stay_hours,
        })
    }
}

/// Reads only the status column, for callers that do not need the rest of the row.
pub fn status_from_row(row: &Row) -> Result<AdmissionStatus, String> {
    let raw = row
        .get(COL_ADMISSION_STATUS)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("{COL_ADMISSION_STATUS} is missing"))?;
    raw.parse::<AdmissionStatus>()
        .map_err(|e| format!("{COL_ADMISSION_STATUS}: {e}"))
}

// ============================================================================
// TIME
// ============================================================================

/// Parses an RFC 3339 timestamp, or a zone-less ISO 8601 timestamp taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

/// Formats a timestamp as RFC 3339 UTC with millisecond precision, e.g.
/// `2024-01-02T06:00:00.000Z`.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Hours between admission and discharge, rounded half-up to one decimal place.
pub fn length_of_stay_hours(created_at: DateTime<Utc>, discharged_at: DateTime<Utc>) -> f64 {
    let elapsed_ms = (discharged_at - created_at).num_milliseconds();
    let tenths = (elapsed_ms as f64 * 10.0 / MILLIS_PER_HOUR as f64 + 0.5).floor();
    tenths / 10.0
}
