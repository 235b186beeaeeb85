//! Patient record deletion.
//!
//! Deleting a patient removes the root `patient_basic_info` row and nothing else. Admissions
//! and clinical records that reference the patient are left in place; callers that need them
//! gone must remove them separately.

use crate::constants::COL_PATIENT_ID;
use crate::error::{PatientError, PatientResult};
use crate::notify::{self, Notification, Notifier, Operation, TracingNotifier};
use crate::store::{Filter, RecordStore, Table};
use std::sync::Arc;
use ward_types::NonEmptyText;

#[derive(Clone)]
pub struct PatientService {
    store: Arc<dyn RecordStore>,
    notifier: Arc<dyn Notifier>,
}

impl PatientService {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            notifier: Arc::new(TracingNotifier),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Deletes the patient's root record.
    ///
    /// The delete is unconditional: an identifier that matches nothing still succeeds, with
    /// zero rows removed.
    ///
    /// # Returns
    ///
    /// The number of rows removed.
    ///
    /// # Errors
    ///
    /// - [`PatientError::InvalidInput`] if `patient_id` is blank; the store is not touched
    /// - [`PatientError::Store`] if the store reports an error
    pub async fn delete_patient(&self, patient_id: &str) -> PatientResult<u64> {
        self.notifier.processing_started(Operation::DeletePatient);
        let result = self.delete(patient_id).await;
        let notification = match &result {
            Ok(_) => Notification::info(notify::MSG_PATIENT_DELETED),
            Err(e) => {
                tracing::error!("error deleting patient: {e}");
                Notification::error(notify::MSG_PATIENT_DELETE_FAILED)
            }
        };
        self.notifier.notify(notification);
        self.notifier.processing_finished(Operation::DeletePatient);
        result
    }

    async fn delete(&self, patient_id: &str) -> PatientResult<u64> {
        let patient_id = NonEmptyText::new(patient_id)
            .map_err(|_| PatientError::InvalidInput("patient_id cannot be empty".into()))?;

        let filter = Filter::new().eq(COL_PATIENT_ID, patient_id.as_str());
        let removed = self.store.delete(Table::Patients, &filter).await?;

        tracing::info!("deleted patient {patient_id} ({removed} rows)");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::notify::{NotifierEvent, RecordingNotifier};
    use crate::repositories::test_support::row;
    use crate::store::{MemoryStore, MockRecordStore};
    use serde_json::json;

    async fn seeded() -> MemoryStore {
        let mem = MemoryStore::new();
        mem.seed(
            Table::Patients,
            [
                row(json!({ "patient_id": "PAT-1", "first_name": "Ada" })),
                row(json!({ "patient_id": "PAT-2", "first_name": "Grace" })),
            ],
        )
        .await;
        mem.seed(
            Table::Admissions,
            [row(json!({ "admission_id": "ADM-1", "patient_id": "PAT-1" }))],
        )
        .await;
        mem
    }

    #[tokio::test]
    async fn test_delete_existing_patient_removes_one_row() {
        let mem = seeded().await;
        let notifier = Arc::new(RecordingNotifier::new());
        let service = PatientService::new(Arc::new(mem.clone())).with_notifier(notifier.clone());

        let removed = service
            .delete_patient("PAT-1")
            .await
            .expect("delete should succeed");

        assert_eq!(removed, 1);
        let remaining = mem.rows(Table::Patients).await;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0]["patient_id"], "PAT-2");
        assert_eq!(
            notifier.events(),
            vec![
                NotifierEvent::Started(Operation::DeletePatient),
                NotifierEvent::Message(Notification::info(notify::MSG_PATIENT_DELETED)),
                NotifierEvent::Finished(Operation::DeletePatient),
            ]
        );
    }

    #[tokio::test]
    async fn test_delete_matches_numeric_patient_id() {
        let mem = MemoryStore::new();
        mem.seed(
            Table::Patients,
            [
                row(json!({ "patient_id": 7, "first_name": "Ada" })),
                row(json!({ "patient_id": 70, "first_name": "Grace" })),
            ],
        )
        .await;
        let service = PatientService::new(Arc::new(mem.clone()));

        let removed = service
            .delete_patient("7")
            .await
            .expect("delete should succeed");

        assert_eq!(removed, 1);
        assert_eq!(
            mem.rows(Table::Patients).await,
            vec![row(json!({ "patient_id": 70, "first_name": "Grace" }))]
        );
    }

    #[tokio::test]
    async fn test_delete_does_not_cascade() {
        let mem = seeded().await;
        let service = PatientService::new(Arc::new(mem.clone()));

        service.delete_patient("PAT-1").await.unwrap();

        assert_eq!(mem.rows(Table::Admissions).await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_unknown_patient_still_succeeds() {
        let mem = seeded().await;
        let notifier = Arc::new(RecordingNotifier::new());
        let service = PatientService::new(Arc::new(mem.clone())).with_notifier(notifier.clone());

        let removed = service
            .delete_patient("PAT-404")
            .await
            .expect("unconditional delete should succeed");

        assert_eq!(removed, 0);
        assert_eq!(mem.rows(Table::Patients).await.len(), 2);
        assert_eq!(
            notifier.notifications(),
            vec![Notification::info(notify::MSG_PATIENT_DELETED)]
        );
    }

    #[tokio::test]
    async fn test_store_error_is_reported() {
        let mut store = MockRecordStore::new();
        store
            .expect_delete()
            .withf(|table, filter| {
                *table == Table::Patients
                    && filter.conditions().to_vec()
                        == vec![(COL_PATIENT_ID.to_string(), json!("PAT-1"))]
            })
            .times(1)
            .returning(|_, _| Err(StoreError::Rejected("permission denied".into())));
        let notifier = Arc::new(RecordingNotifier::new());
        let service = PatientService::new(Arc::new(store)).with_notifier(notifier.clone());

        let err = service
            .delete_patient("PAT-1")
            .await
            .expect_err("store error should surface");

        assert!(matches!(err, PatientError::Store(StoreError::Rejected(_))));
        assert_eq!(
            notifier.notifications(),
            vec![Notification::error(notify::MSG_PATIENT_DELETE_FAILED)]
        );
    }

    #[tokio::test]
    async fn test_blank_patient_id_is_rejected_without_store_call() {
        let service = PatientService::new(Arc::new(MockRecordStore::new()));

        let err = service
            .delete_patient("   ")
            .await
            .expect_err("blank id should be rejected");

        assert!(matches!(err, PatientError::InvalidInput(_)));
    }
}
