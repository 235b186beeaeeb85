use std::path::PathBuf;

use crate::admission::ValidationError;

/// Failures reported by a [`RecordStore`](crate::store::RecordStore) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to create data directory {path}: {source}", path = path.display())]
    DataDirCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read table file {path}: {source}", path = path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write table file {path}: {source}", path = path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("table {table} contains malformed data: {source}")]
    Deserialization {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize table {table}: {source}")]
    Serialization {
        table: &'static str,
        #[source]
        source: serde_json::Error,
    },
    /// The backend refused the request and returned an error descriptor.
    #[error("store rejected request: {0}")]
    Rejected(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Terminal failures of the discharge workflow.
///
/// Anything listed here aborts the operation before (or instead of) the admission update.
/// Failures after the update are reported as warnings on the
/// [`DischargeReport`](crate::repositories::discharge::DischargeReport) instead.
#[derive(Debug, thiserror::Error)]
pub enum DischargeError {
    #[error("invalid discharge request: {0}")]
    Validation(#[from] ValidationError),
    #[error("admission {admission_id} has already been discharged")]
    AlreadyDischarged { admission_id: String },
    #[error("admission {admission_id} has not been discharged")]
    NotDischarged { admission_id: String },
    #[error("admission {admission_id} not found")]
    AdmissionNotFound { admission_id: String },
    #[error("admission {admission_id} is malformed: {reason}")]
    InvalidAdmission {
        admission_id: String,
        reason: String,
    },
    #[error("failed to read admission: {0}")]
    StatusRead(#[source] StoreError),
    #[error("failed to update admission: {0}")]
    Update(#[source] StoreError),
}

pub type DischargeResult<T> = std::result::Result<T, DischargeError>;

#[derive(Debug, thiserror::Error)]
pub enum PatientError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to delete patient: {0}")]
    Store(#[from] StoreError),
}

pub type PatientResult<T> = std::result::Result<T, PatientError>;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
