//! Admission discharge workflow.
//!
//! Discharging an admission is a one-way transition followed by best-effort archival:
//!
//! 1. validate the form (no I/O before this passes)
//! 2. read the admission and refuse if it is already `Discharged`
//! 3. compute length of stay against the current clock
//! 4. flip the status with a conditional update (`admission_status = Active`); zero affected
//!    rows means another caller discharged it first
//! 5. snapshot the admission into `AdmissionsHistory`
//! 6. migrate doctors' orders, medications and notes into their history tables
//!
//! Steps 1–4 are fatal on failure and leave the store untouched. Steps 5–6 never fail the
//! operation; each one reports its own [`StepOutcome`] in the returned [`DischargeReport`].
//! [`DischargeService::resume_archival`] re-runs 5–6 for an admission whose archival was left
//! incomplete.

use crate::admission::{
    length_of_stay_hours, status_from_row, validate_id, Admission, AdmissionStatus,
    DischargeRequest, ValidationError,
};
use crate::clock::{Clock, SystemClock};
use crate::constants::{COL_ADMISSION_ID, COL_ADMISSION_STATUS};
use crate::error::{DischargeError, DischargeResult};
use crate::notify::{self, Notification, Notifier, Operation, TracingNotifier};
use crate::repositories::archive::{
    archive_admission_snapshot, migrate_dependents, ArchiveStep, DependentKind, StepOutcome,
    StepReport, StepWarning,
};
use crate::store::{Filter, RecordStore, Row, Table};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Result of a discharge or a resumed archival.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DischargeReport {
    pub admission_id: String,
    pub patient_id: Value,
    pub discharged_at: Option<DateTime<Utc>>,
    pub length_of_stay_hours: Option<f64>,
    pub steps: Vec<StepReport>,
}

impl DischargeReport {
    /// Steps that degraded, in the order they ran.
    pub fn warnings(&self) -> Vec<(ArchiveStep, &StepWarning)> {
        self.steps
            .iter()
            .filter_map(|report| report.warning().map(|warning| (report.step, warning)))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|report| report.warning().is_none())
    }

    pub fn step(&self, step: ArchiveStep) -> Option<&StepReport> {
        self.steps.iter().find(|report| report.step == step)
    }
}

#[derive(Clone)]
pub struct DischargeService {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl DischargeService {
    /// Creates a service using the system clock and logging notifications through `tracing`.
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            notifier: Arc::new(TracingNotifier),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Reads the admission's current status.
    ///
    /// Front ends call this when the discharge form opens so they can show the
    /// "already discharged" state up front. [`attempt_discharge`](Self::attempt_discharge)
    /// does not trust this value and checks again.
    ///
    /// # Errors
    ///
    /// - [`DischargeError::Validation`] if `admission_id` is blank
    /// - [`DischargeError::StatusRead`] if the store fails
    /// - [`DischargeError::AdmissionNotFound`] if no row matches
    /// - [`DischargeError::InvalidAdmission`] if the status column is unreadable
    pub async fn admission_status(&self, admission_id: &str) -> DischargeResult<AdmissionStatus> {
        self.notifier.processing_started(Operation::StatusCheck);
        let result = self.read_status(admission_id).await;
        match &result {
            Ok(AdmissionStatus::Discharged) => self
                .notifier
                .notify(Notification::warning(notify::MSG_ALREADY_DISCHARGED)),
            Ok(AdmissionStatus::Active) => {}
            Err(e) => {
                tracing::error!("error checking admission status: {e}");
                self.notifier
                    .notify(Notification::error(notify::MSG_STATUS_CHECK_FAILED));
            }
        }
        self.notifier.processing_finished(Operation::StatusCheck);
        result
    }

    /// Discharges an active admission and archives its records.
    ///
    /// # Returns
    ///
    /// A [`DischargeReport`] once every archive step has been attempted. Archive failures
    /// appear as degraded steps in the report, not as errors.
    ///
    /// # Errors
    ///
    /// - [`DischargeError::Validation`] if any form field is missing or invalid; the store is
    ///   not touched
    /// - [`DischargeError::AlreadyDischarged`] if the admission is already discharged, either
    ///   at the initial read or when the conditional update matches nothing
    /// - [`DischargeError::AdmissionNotFound`], [`DischargeError::InvalidAdmission`] or
    ///   [`DischargeError::StatusRead`] if the admission cannot be read
    /// - [`DischargeError::Update`] if the status update fails; nothing is archived
    pub async fn attempt_discharge(
        &self,
        admission_id: &str,
        request: &DischargeRequest,
    ) -> DischargeResult<DischargeReport> {
        self.notifier.processing_started(Operation::Discharge);
        let result = self.discharge(admission_id, request).await;
        self.notify_outcome(&result, notify::MSG_DISCHARGED);
        self.notifier.processing_finished(Operation::Discharge);
        result
    }

    /// Re-runs the archive steps for an admission that is already discharged.
    ///
    /// Rows and snapshots that were archived by an earlier run are not copied again.
    ///
    /// # Errors
    ///
    /// - [`DischargeError::NotDischarged`] if the admission is still active
    /// - read errors as for [`admission_status`](Self::admission_status)
    pub async fn resume_archival(&self, admission_id: &str) -> DischargeResult<DischargeReport> {
        self.notifier.processing_started(Operation::ResumeArchival);
        let result = self.resume(admission_id).await;
        self.notify_outcome(&result, notify::MSG_ARCHIVAL_RESUMED);
        self.notifier.processing_finished(Operation::ResumeArchival);
        result
    }

    async fn discharge(
        &self,
        admission_id: &str,
        request: &DischargeRequest,
    ) -> DischargeResult<DischargeReport> {
        let validated = (validate_id(COL_ADMISSION_ID, admission_id), request.validate());
        let (admission_id, outcome) = match validated {
            (Ok(id), Ok(outcome)) => (id, outcome),
            (id, outcome) => {
                let mut problems = Vec::new();
                if let Err(e) = id {
                    problems.extend(e.problems);
                }
                if let Err(e) = outcome {
                    problems.extend(e.problems);
                }
                return Err(ValidationError { problems }.into());
            }
        };
        let admission_id = admission_id.as_str();

        let admission = self.read_admission(admission_id).await?;
        if admission.status == AdmissionStatus::Discharged {
            tracing::info!("admission {admission_id} is already discharged");
            return Err(DischargeError::AlreadyDischarged {
                admission_id: admission_id.to_owned(),
            });
        }

        let discharged_at = self.clock.now();
        let length_of_stay = length_of_stay_hours(admission.created_at, discharged_at);
        let patch = outcome.patch(discharged_at, length_of_stay);

        let still_active = Filter::new()
            .eq(COL_ADMISSION_ID, admission_id)
            .eq(COL_ADMISSION_STATUS, AdmissionStatus::Active.as_str());
        let affected = self
            .store
            .update(Table::Admissions, &still_active, &patch)
            .await
            .map_err(|e| {
                tracing::error!("error updating admission record {admission_id}: {e}");
                DischargeError::Update(e)
            })?;
        if affected == 0 {
            tracing::warn!("admission {admission_id} was discharged concurrently");
            return Err(DischargeError::AlreadyDischarged {
                admission_id: admission_id.to_owned(),
            });
        }
        tracing::info!(
            "admission {admission_id} discharged after {length_of_stay} hours ({} {})",
            outcome.result_status.as_str(),
            outcome.result_condition.as_str()
        );

        let steps = self
            .archive(admission_id, &admission.patient_id, Some(&patch))
            .await;

        Ok(DischargeReport {
            admission_id: admission_id.to_owned(),
            patient_id: admission.patient_id,
            discharged_at: Some(discharged_at),
            length_of_stay_hours: Some(length_of_stay),
            steps,
        })
    }

    async fn resume(&self, admission_id: &str) -> DischargeResult<DischargeReport> {
        let admission_id = validate_id(COL_ADMISSION_ID, admission_id)?;
        let admission_id = admission_id.as_str();

        let admission = self.read_admission(admission_id).await?;
        if admission.status != AdmissionStatus::Discharged {
            return Err(DischargeError::NotDischarged {
                admission_id: admission_id.to_owned(),
            });
        }
        tracing::info!("resuming archival for admission {admission_id}");

        let steps = self.archive(admission_id, &admission.patient_id, None).await;

        Ok(DischargeReport {
            admission_id: admission_id.to_owned(),
            patient_id: admission.patient_id,
            discharged_at: admission.discharged_at,
            length_of_stay_hours: admission.length_of_stay_hours,
            steps,
        })
    }

    /// Runs every archive step in order, emitting a warning notification per degraded step.
    async fn archive(
        &self,
        admission_id: &str,
        patient_id: &Value,
        patch: Option<&Row>,
    ) -> Vec<StepReport> {
        let store = self.store.as_ref();
        let mut steps = Vec::with_capacity(1 + DependentKind::ALL.len());

        let outcome = archive_admission_snapshot(store, admission_id, patch).await;
        steps.push(self.record_step(ArchiveStep::AdmissionSnapshot, outcome));

        for kind in DependentKind::ALL {
            let outcome = migrate_dependents(store, kind, admission_id, patient_id).await;
            steps.push(self.record_step(ArchiveStep::Dependent(kind), outcome));
        }

        steps
    }

    fn record_step(&self, step: ArchiveStep, outcome: StepOutcome) -> StepReport {
        let report = StepReport { step, outcome };
        if let Some(warning) = report.warning() {
            self.notifier
                .notify(Notification::warning(warning.message(step)));
        }
        report
    }

    async fn read_row(&self, admission_id: &str) -> DischargeResult<Row> {
        let admission_id = validate_id(COL_ADMISSION_ID, admission_id)?;
        let filter = Filter::new().eq(COL_ADMISSION_ID, admission_id.as_str());
        let mut rows = self
            .store
            .select(Table::Admissions, &filter)
            .await
            .map_err(|e| {
                tracing::error!("error retrieving admission {admission_id}: {e}");
                DischargeError::StatusRead(e)
            })?;

        match rows.len() {
            0 => Err(DischargeError::AdmissionNotFound {
                admission_id: admission_id.into_string(),
            }),
            1 => Ok(rows.remove(0)),
            n => Err(DischargeError::InvalidAdmission {
                admission_id: admission_id.into_string(),
                reason: format!("{n} rows share this admission_id"),
            }),
        }
    }

    async fn read_status(&self, admission_id: &str) -> DischargeResult<AdmissionStatus> {
        let row = self.read_row(admission_id).await?;
        status_from_row(&row).map_err(|reason| DischargeError::InvalidAdmission {
            admission_id: admission_id.trim().to_owned(),
            reason,
        })
    }

    async fn read_admission(&self, admission_id: &str) -> DischargeResult<Admission> {
        let row = self.read_row(admission_id).await?;
        Admission::from_row(admission_id, &row).map_err(|reason| {
            tracing::error!("admission {admission_id} is unreadable: {reason}");
            DischargeError::InvalidAdmission {
                admission_id: admission_id.to_owned(),
                reason,
            }
        })
    }

    fn notify_outcome(&self, result: &DischargeResult<DischargeReport>, success: &str) {
        let notification = match result {
            Ok(_) => Notification::info(success),
            Err(DischargeError::Validation(_)) => {
                Notification::error(notify::MSG_MISSING_FIELDS)
            }
            Err(DischargeError::AlreadyDischarged { .. }) => {
                Notification::warning(notify::MSG_ALREADY_DISCHARGED)
            }
            Err(DischargeError::NotDischarged { .. }) => {
                Notification::warning(notify::MSG_NOT_DISCHARGED)
            }
            Err(DischargeError::Update(_)) => Notification::error(notify::MSG_DISCHARGE_FAILED),
            Err(
                DischargeError::StatusRead(_)
                | DischargeError::AdmissionNotFound { .. }
                | DischargeError::InvalidAdmission { .. },
            ) => Notification::error(notify::MSG_ADMISSION_READ_FAILED),
        };
        self.notifier.notify(notification);
    }
}
