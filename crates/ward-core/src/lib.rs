//! # Ward Core
//!
//! Core business logic for the ward admissions system.
//!
//! This crate contains the discharge workflow and the data operations behind it:
//! - Admission discharge with a compare-and-set status flip
//! - Best-effort archival of the admission and its clinical records into history tables
//! - Resumable archival for admissions whose archive steps degraded
//! - Patient record deletion
//! - The [`RecordStore`](store::RecordStore) collaborator with in-memory and JSON-file backends
//!
//! **No API concerns**: HTTP servers and command-line parsing belong in `api-rest` and
//! `ward-cli`. User-facing messages leave this crate through a [`Notifier`](notify::Notifier).

pub mod admission;
pub mod clock;
pub mod config;
pub mod constants;
pub mod error;
pub mod notify;
pub mod repositories;
pub mod store;

pub use admission::{
    AdmissionStatus, DischargeRequest, FieldProblem, ResultCondition, ResultStatus,
    ValidationError,
};
pub use config::{CoreConfig, StoreBackend};
pub use error::{
    ConfigError, ConfigResult, DischargeError, DischargeResult, PatientError, PatientResult,
    StoreError, StoreResult,
};
pub use repositories::archive::{ArchiveStep, DependentKind, StepOutcome, StepReport, StepWarning};
pub use repositories::discharge::{DischargeReport, DischargeService};
pub use repositories::patient::PatientService;
pub use ward_types::NonEmptyText;
