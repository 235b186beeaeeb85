//! # API REST
//!
//! REST API implementation for the ward service.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - Mapping core errors onto status codes and `ErrorRes` bodies
//!
//! Each request gets its own [`RecordingNotifier`] alongside the tracing one, so the
//! notifications a core operation emits come back to the caller in the response.

#![warn(rust_2018_idioms)]

use api_shared::{
    AdmissionStatusRes, DeletePatientRes, DischargeReq, DischargeRes, ErrorRes, HealthRes,
    HealthService, MessageRes, StepRes,
};
use axum::{
    extract::{Path as AxumPath, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use ward_core::{
    admission::format_timestamp,
    clock::{Clock, SystemClock},
    notify::{self, Level, Notifier, RecordingNotifier, Tee, TracingNotifier},
    store::RecordStore,
    ArchiveStep, DependentKind, DischargeError, DischargeReport, DischargeRequest,
    DischargeService, PatientError, PatientService, StepOutcome, StepReport,
};

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    store: Arc<dyn RecordStore>,
    clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn notifier(recorder: &Arc<RecordingNotifier>) -> Arc<dyn Notifier> {
        Arc::new(Tee(TracingNotifier, Arc::clone(recorder)))
    }

    fn discharge_service(&self, recorder: &Arc<RecordingNotifier>) -> DischargeService {
        DischargeService::new(self.store.clone())
            .with_clock(self.clock.clone())
            .with_notifier(Self::notifier(recorder))
    }

    fn patient_service(&self, recorder: &Arc<RecordingNotifier>) -> PatientService {
        PatientService::new(self.store.clone()).with_notifier(Self::notifier(recorder))
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        admission_status,
        discharge_admission,
        resume_archival,
        delete_patient,
    ),
    components(schemas(
        HealthRes,
        AdmissionStatusRes,
        DischargeReq,
        DischargeRes,
        StepRes,
        MessageRes,
        DeletePatientRes,
        ErrorRes,
    ))
)]
struct ApiDoc;

/// Builds the REST router with Swagger UI and permissive CORS.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/admissions/:id/status", get(admission_status))
        .route("/admissions/:id/discharge", post(discharge_admission))
        .route("/admissions/:id/discharge/resume", post(resume_archival))
        .route("/patients/:id", delete(delete_patient))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Error response: a status code plus an [`ErrorRes`] body.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorRes,
}

impl ApiError {
    fn new(status: StatusCode, error: &str, message: String) -> Self {
        Self {
            status,
            body: ErrorRes {
                error: error.to_owned(),
                message,
            },
        }
    }

    /// The message shown to the user is the last notification the operation emitted, so the
    /// HTTP body matches what any other front end would have displayed.
    fn from_discharge(e: &DischargeError, recorder: &RecordingNotifier) -> Self {
        let (status, code) = match e {
            DischargeError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_failed"),
            DischargeError::AlreadyDischarged { .. } => {
                (StatusCode::CONFLICT, "already_discharged")
            }
            DischargeError::NotDischarged { .. } => (StatusCode::CONFLICT, "not_discharged"),
            DischargeError::AdmissionNotFound { .. } => {
                (StatusCode::NOT_FOUND, "admission_not_found")
            }
            DischargeError::InvalidAdmission { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "invalid_admission")
            }
            DischargeError::StatusRead(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "admission_read_failed")
            }
            DischargeError::Update(_) => (StatusCode::INTERNAL_SERVER_ERROR, "discharge_failed"),
        };
        Self::new(status, code, last_message(recorder, e))
    }

    fn from_patient(e: &PatientError, recorder: &RecordingNotifier) -> Self {
        let (status, code) = match e {
            PatientError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            PatientError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "delete_failed"),
        };
        Self::new(status, code, last_message(recorder, e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn last_message(recorder: &RecordingNotifier, fallback: &dyn std::fmt::Display) -> String {
    recorder
        .notifications()
        .pop()
        .map(|n| n.message)
        .unwrap_or_else(|| fallback.to_string())
}

fn level_name(level: Level) -> &'static str {
    match level {
        Level::Info => "info",
        Level::Warning => "warning",
        Level::Error => "error",
    }
}

fn messages(recorder: &RecordingNotifier) -> Vec<MessageRes> {
    recorder
        .notifications()
        .into_iter()
        .map(|n| MessageRes {
            level: level_name(n.level).to_owned(),
            message: n.message,
        })
        .collect()
}

fn step_name(step: ArchiveStep) -> &'static str {
    match step {
        ArchiveStep::AdmissionSnapshot => "admission_snapshot",
        ArchiveStep::Dependent(DependentKind::DoctorsOrders) => "doctors_orders",
        ArchiveStep::Dependent(DependentKind::Medications) => "medications",
        ArchiveStep::Dependent(DependentKind::Notes) => "notes",
    }
}

fn step_res(report: &StepReport) -> StepRes {
    let step = step_name(report.step).to_owned();
    match &report.outcome {
        StepOutcome::Archived { archived, removed } => StepRes {
            step,
            status: "archived".into(),
            archived: Some(*archived as u64),
            removed: Some(*removed),
            warning: None,
        },
        StepOutcome::NothingToDo => StepRes {
            step,
            status: "nothing_to_do".into(),
            archived: None,
            removed: None,
            warning: None,
        },
        StepOutcome::Degraded(warning) => StepRes {
            step,
            status: "degraded".into(),
            archived: None,
            removed: None,
            warning: Some(warning.message(report.step)),
        },
    }
}

fn discharge_res(report: DischargeReport, recorder: &RecordingNotifier) -> DischargeRes {
    DischargeRes {
        complete: report.is_complete(),
        steps: report.steps.iter().map(step_res).collect(),
        admission_id: report.admission_id,
        patient_id: report.patient_id,
        discharge_datetime: report.discharged_at.map(format_timestamp),
        length_of_stay_hours: report.length_of_stay_hours,
        messages: messages(recorder),
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    get,
    path = "/admissions/{id}/status",
    params(("id" = String, Path, description = "Admission identifier")),
    responses(
        (status = 200, description = "Current admission status", body = AdmissionStatusRes),
        (status = 404, description = "Unknown admission", body = ErrorRes),
        (status = 500, description = "Store error", body = ErrorRes)
    )
)]
/// Reads an admission's status so a front end can show the discharged state before the
/// form is submitted.
#[axum::debug_handler]
async fn admission_status(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<AdmissionStatusRes>, ApiError> {
    let recorder = Arc::new(RecordingNotifier::new());
    let status = state
        .discharge_service(&recorder)
        .admission_status(&id)
        .await
        .map_err(|e| ApiError::from_discharge(&e, &recorder))?;

    Ok(Json(AdmissionStatusRes {
        admission_id: id,
        admission_status: status.as_str().to_owned(),
    }))
}

#[utoipa::path(
    post,
    path = "/admissions/{id}/discharge",
    params(("id" = String, Path, description = "Admission identifier")),
    request_body = DischargeReq,
    responses(
        (status = 200, description = "Admission discharged; see steps for archival", body = DischargeRes),
        (status = 400, description = "Missing or invalid form fields", body = ErrorRes),
        (status = 404, description = "Unknown admission", body = ErrorRes),
        (status = 409, description = "Admission already discharged", body = ErrorRes),
        (status = 500, description = "Store error", body = ErrorRes)
    )
)]
/// Discharges an admission and archives its records.
///
/// A `200` means the admission is discharged. Archive steps that degraded are listed in
/// `steps` with `complete = false`; `POST .../discharge/resume` finishes them.
#[axum::debug_handler]
async fn discharge_admission(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<DischargeReq>,
) -> Result<Json<DischargeRes>, ApiError> {
    let request = DischargeRequest {
        final_diagnosis: req.final_diagnosis,
        final_diagnosis_icd_code: req.final_diagnosis_icd_code,
        result_status: req.result_status,
        result_condition: req.result_condition,
    };

    let recorder = Arc::new(RecordingNotifier::new());
    match state
        .discharge_service(&recorder)
        .attempt_discharge(&id, &request)
        .await
    {
        Ok(report) => Ok(Json(discharge_res(report, &recorder))),
        Err(e) => Err(ApiError::from_discharge(&e, &recorder)),
    }
}

#[utoipa::path(
    post,
    path = "/admissions/{id}/discharge/resume",
    params(("id" = String, Path, description = "Admission identifier")),
    responses(
        (status = 200, description = "Archive steps re-run", body = DischargeRes),
        (status = 404, description = "Unknown admission", body = ErrorRes),
        (status = 409, description = "Admission is still active", body = ErrorRes),
        (status = 500, description = "Store error", body = ErrorRes)
    )
)]
#[axum::debug_handler]
async fn resume_archival(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<DischargeRes>, ApiError> {
    let recorder = Arc::new(RecordingNotifier::new());
    match state.discharge_service(&recorder).resume_archival(&id).await {
        Ok(report) => Ok(Json(discharge_res(report, &recorder))),
        Err(e) => Err(ApiError::from_discharge(&e, &recorder)),
    }
}

#[utoipa::path(
    delete,
    path = "/patients/{id}",
    params(("id" = String, Path, description = "Patient identifier")),
    responses(
        (status = 200, description = "Patient record deleted", body = DeletePatientRes),
        (status = 400, description = "Blank patient identifier", body = ErrorRes),
        (status = 500, description = "Store error", body = ErrorRes)
    )
)]
/// Deletes the patient's root record. Admissions and clinical records are left in place.
#[axum::debug_handler]
async fn delete_patient(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<DeletePatientRes>, ApiError> {
    let recorder = Arc::new(RecordingNotifier::new());
    let deleted_rows = state
        .patient_service(&recorder)
        .delete_patient(&id)
        .await
        .map_err(|e| ApiError::from_patient(&e, &recorder))?;

    Ok(Json(DeletePatientRes {
        deleted_rows,
        message: notify::MSG_PATIENT_DELETED.to_owned(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use chrono::{TimeZone, Utc};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use ward_core::clock::FixedClock;
    use ward_core::error::{StoreError, StoreResult};
    use ward_core::store::{Filter, MemoryStore, Row, Table};

    fn row(value: Value) -> Row {
        value.as_object().cloned().expect("test row must be an object")
    }

    async fn seeded_store(status: &str) -> MemoryStore {
        let store = MemoryStore::new();
        store
            .seed(
                Table::Admissions,
                [row(json!({
                    "admission_id": "ADM-1",
                    "patient_id": "PAT-1",
                    "created_at": "2024-01-01T00:00:00Z",
                    "admission_status": status,
                }))],
            )
            .await;
        store
            .seed(
                Table::Notes,
                [row(json!({ "admission_id": "ADM-1", "patient_id": "PAT-1", "note": "stable" }))],
            )
            .await;
        store
            .seed(Table::Patients, [row(json!({ "patient_id": "PAT-1" }))])
            .await;
        store
    }

    fn router(store: MemoryStore) -> Router {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 2, 6, 0, 0).unwrap());
        app(AppState::new(Arc::new(store)).with_clock(Arc::new(clock)))
    }

    async fn send(
        app: Router,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        }
        .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    fn form() -> Value {
        json!({
            "final_diagnosis": "Community-acquired pneumonia",
            "final_diagnosis_icd_code": "J18.9",
            "result_status": "delivered",
            "result_condition": "improved",
        })
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(router(MemoryStore::new()), Method::GET, "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], json!(true));
    }

    #[tokio::test]
    async fn test_status_reports_stored_value() {
        let app = router(seeded_store("Active").await);
        let (status, body) = send(app, Method::GET, "/admissions/ADM-1/status", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["admission_status"], json!("Active"));
    }

    #[tokio::test]
    async fn test_status_of_unknown_admission_is_404() {
        let app = router(MemoryStore::new());
        let (status, body) = send(app, Method::GET, "/admissions/ADM-9/status", None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], json!("admission_not_found"));
    }

    #[tokio::test]
    async fn test_discharge_returns_report_and_messages() {
        let store = seeded_store("Active").await;
        let app = router(store.clone());

        let (status, body) = send(
            app,
            Method::POST,
            "/admissions/ADM-1/discharge",
            Some(form()),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["complete"], json!(true));
        assert_eq!(body["length_of_stay_hours"], json!(30.0));
        assert_eq!(body["discharge_datetime"], json!("2024-01-02T06:00:00.000Z"));
        assert_eq!(body["steps"].as_array().unwrap().len(), 4);
        assert_eq!(body["steps"][3]["step"], json!("notes"));
        assert_eq!(body["steps"][3]["archived"], json!(1));
        assert_eq!(
            body["messages"].as_array().unwrap().last().unwrap()["message"],
            json!(notify::MSG_DISCHARGED)
        );

        assert!(store.rows(Table::Notes).await.is_empty());
        assert_eq!(store.rows(Table::NotesHistory).await.len(), 1);
    }

    #[tokio::test]
    async fn test_discharge_with_missing_fields_is_400() {
        let app = router(seeded_store("Active").await);
        let (status, body) = send(
            app,
            Method::POST,
            "/admissions/ADM-1/discharge",
            Some(json!({ "final_diagnosis": "Pneumonia" })),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], json!("validation_failed"));
        assert_eq!(body["message"], json!(notify::MSG_MISSING_FIELDS));
    }

    #[tokio::test]
    async fn test_discharging_twice_is_409() {
        let store = seeded_store("Active").await;

        let (first, _) = send(
            router(store.clone()),
            Method::POST,
            "/admissions/ADM-1/discharge",
            Some(form()),
        )
        .await;
        let (second, body) = send(
            router(store),
            Method::POST,
            "/admissions/ADM-1/discharge",
            Some(form()),
        )
        .await;

        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::CONFLICT);
        assert_eq!(body["message"], json!(notify::MSG_ALREADY_DISCHARGED));
    }

    #[tokio::test]
    async fn test_resume_on_active_admission_is_409() {
        let app = router(seeded_store("Active").await);
        let (status, body) =
            send(app, Method::POST, "/admissions/ADM-1/discharge/resume", None).await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"], json!("not_discharged"));
    }

    #[tokio::test]
    async fn test_resume_on_discharged_admission_archives_leftovers() {
        let store = seeded_store("Discharged").await;
        let app = router(store.clone());

        let (status, body) =
            send(app, Method::POST, "/admissions/ADM-1/discharge/resume", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["complete"], json!(true));
        assert_eq!(store.rows(Table::NotesHistory).await.len(), 1);
        assert_eq!(store.rows(Table::AdmissionsHistory).await.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_patient() {
        let store = seeded_store("Active").await;
        let app = router(store.clone());

        let (status, body) = send(app, Method::DELETE, "/patients/PAT-1", None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["deleted_rows"], json!(1));
        assert!(store.rows(Table::Patients).await.is_empty());
        assert_eq!(store.rows(Table::Admissions).await.len(), 1);
    }

    struct BrokenStore;

    #[async_trait::async_trait]
    impl RecordStore for BrokenStore {
        async fn select(&self, _table: Table, _filter: &Filter) -> StoreResult<Vec<Row>> {
            Err(StoreError::Rejected("connection refused".into()))
        }

        async fn insert(&self, _table: Table, _rows: Vec<Row>) -> StoreResult<()> {
            Err(StoreError::Rejected("connection refused".into()))
        }

        async fn update(&self, _table: Table, _filter: &Filter, _patch: &Row) -> StoreResult<u64> {
            Err(StoreError::Rejected("connection refused".into()))
        }

        async fn delete(&self, _table: Table, _filter: &Filter) -> StoreResult<u64> {
            Err(StoreError::Rejected("connection refused".into()))
        }
    }

    #[tokio::test]
    async fn test_store_failures_are_500() {
        let app = app(AppState::new(Arc::new(BrokenStore)));

        let (status, body) = send(
            app.clone(),
            Method::POST,
            "/admissions/ADM-1/discharge",
            Some(form()),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], json!(notify::MSG_ADMISSION_READ_FAILED));

        let (status, body) = send(app, Method::DELETE, "/patients/PAT-1", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], json!(notify::MSG_PATIENT_DELETE_FAILED));
    }

    /// Serves reads and inserts from memory but refuses every update.
    struct ReadOnlyStore(MemoryStore);

    #[async_trait::async_trait]
    impl RecordStore for ReadOnlyStore {
        async fn select(&self, table: Table, filter: &Filter) -> StoreResult<Vec<Row>> {
            self.0.select(table, filter).await
        }

        async fn insert(&self, table: Table, rows: Vec<Row>) -> StoreResult<()> {
            self.0.insert(table, rows).await
        }

        async fn update(&self, _table: Table, _filter: &Filter, _patch: &Row) -> StoreResult<u64> {
            Err(StoreError::Rejected("read-only replica".into()))
        }

        async fn delete(&self, table: Table, filter: &Filter) -> StoreResult<u64> {
            self.0.delete(table, filter).await
        }
    }

    #[tokio::test]
    async fn test_failed_status_update_is_500_discharge_failed() {
        let store = seeded_store("Active").await;
        let app = app(AppState::new(Arc::new(ReadOnlyStore(store.clone()))));

        let (status, body) = send(
            app,
            Method::POST,
            "/admissions/ADM-1/discharge",
            Some(form()),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], json!("discharge_failed"));
        assert_eq!(body["message"], json!(notify::MSG_DISCHARGE_FAILED));
        assert_eq!(store.rows(Table::Admissions).await[0]["admission_status"], "Active");
        assert!(store.rows(Table::AdmissionsHistory).await.is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_admission_is_500_invalid_admission() {
        let store = MemoryStore::new();
        store
            .seed(
                Table::Admissions,
                [row(json!({
                    "admission_id": "ADM-1",
                    "patient_id": "PAT-1",
                    "created_at": "sometime last week",
                    "admission_status": "Active",
                }))],
            )
            .await;
        let app = router(store.clone());

        let (status, body) = send(
            app,
            Method::POST,
            "/admissions/ADM-1/discharge",
            Some(form()),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], json!("invalid_admission"));
        assert_eq!(body["message"], json!(notify::MSG_ADMISSION_READ_FAILED));
        assert_eq!(store.rows(Table::Admissions).await[0]["admission_status"], "Active");
    }
}
