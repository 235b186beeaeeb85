//! Constants used throughout the ward core crate.
//!
//! Column names are the ones the hosted patient database exposes; keeping them in one place
//! means the engine, the backends and the tests agree on the row shape.

/// Default directory for the file-backed store when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "ward_data";

/// Default REST listen address.
pub const DEFAULT_REST_ADDR: &str = "0.0.0.0:3000";

/// File extension used by the file-backed store for table files.
pub const TABLE_FILE_EXTENSION: &str = "json";

pub const COL_ADMISSION_ID: &str = "admission_id";
pub const COL_PATIENT_ID: &str = "patient_id";
pub const COL_CREATED_AT: &str = "created_at";
pub const COL_ADMISSION_STATUS: &str = "admission_status";
pub const COL_FINAL_DIAGNOSIS: &str = "final_diagnosis";
pub const COL_FINAL_DIAGNOSIS_ICD_CODE: &str = "final_diagnosis_icd_code";
pub const COL_DISCHARGE_DATETIME: &str = "discharge_datetime";
pub const COL_LENGTH_OF_STAY_HOURS: &str = "length_of_stay_hours";
pub const COL_RESULT_STATUS: &str = "result_status";
pub const COL_RESULT_CONDITION: &str = "result_condition";

/// Milliseconds in one hour, the unit of length-of-stay.
pub const MILLIS_PER_HOUR: i64 = 3_600_000;
