//! Archive steps run after an admission has been discharged.
//!
//! Each step copies live rows into their history table and then clears the live rows. The
//! steps are independent: a failure inside one is recorded as a [`StepWarning`] and the
//! next step still runs.
//!
//! Every step is safe to run again:
//! - the admission snapshot is skipped when the history table already holds one for the
//!   admission
//! - dependent rows already present verbatim in history are not copied a second time
//! - live rows are only deleted after their archive insert succeeded

use crate::constants::{COL_ADMISSION_ID, COL_PATIENT_ID};
use crate::error::StoreError;
use crate::store::{Filter, RecordStore, Row, Table};
use serde::Serialize;
use serde_json::Value;

/// Clinical record types that hang off an admission and move to history at discharge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DependentKind {
    DoctorsOrders,
    Medications,
    Notes,
}

impl DependentKind {
    /// Processing order.
    pub const ALL: [DependentKind; 3] = [
        DependentKind::DoctorsOrders,
        DependentKind::Medications,
        DependentKind::Notes,
    ];

    pub fn live_table(&self) -> Table {
        match self {
            DependentKind::DoctorsOrders => Table::DoctorsOrders,
            DependentKind::Medications => Table::Medications,
            DependentKind::Notes => Table::Notes,
        }
    }

    pub fn history_table(&self) -> Table {
        match self {
            DependentKind::DoctorsOrders => Table::DoctorsOrdersHistory,
            DependentKind::Medications => Table::MedicationsHistory,
            DependentKind::Notes => Table::NotesHistory,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DependentKind::DoctorsOrders => "doctor's orders",
            DependentKind::Medications => "medications",
            DependentKind::Notes => "notes",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveStep {
    AdmissionSnapshot,
    Dependent(DependentKind),
}

impl ArchiveStep {
    pub fn label(&self) -> &'static str {
        match self {
            ArchiveStep::AdmissionSnapshot => "admission record",
            ArchiveStep::Dependent(kind) => kind.label(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    Fetch,
    Archive,
    Delete,
}

/// A non-fatal failure inside one archive step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StepWarning {
    pub kind: WarningKind,
    pub table: &'static str,
    pub error: String,
}

impl StepWarning {
    fn new(kind: WarningKind, table: Table, error: &StoreError) -> Self {
        Self {
            kind,
            table: table.name(),
            error: error.to_string(),
        }
    }

    /// Operator-facing text for this warning.
    pub fn message(&self, step: ArchiveStep) -> String {
        let label = step.label();
        match self.kind {
            WarningKind::Fetch => format!("Warning: Failed to fetch {label} for archiving"),
            WarningKind::Archive => format!("Warning: Failed to archive {label}"),
            WarningKind::Delete => format!("Warning: Failed to delete active {label}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum StepOutcome {
    /// `archived` rows were copied to history and `removed` live rows were deleted.
    Archived { archived: usize, removed: u64 },
    /// No live rows, or everything was already archived.
    NothingToDo,
    Degraded(StepWarning),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StepReport {
    pub step: ArchiveStep,
    pub outcome: StepOutcome,
}

impl StepReport {
    pub fn warning(&self) -> Option<&StepWarning> {
        match &self.outcome {
            StepOutcome::Degraded(warning) => Some(warning),
            _ => None,
        }
    }
}

fn degraded(kind: WarningKind, table: Table, error: &StoreError) -> StepOutcome {
    StepOutcome::Degraded(StepWarning::new(kind, table, error))
}

/// Copies the current admission row into `AdmissionsHistory`.
///
/// `patch` is overlaid on the re-read row so the snapshot carries the discharge columns even
/// if the backend returns a stale read.
pub(crate) async fn archive_admission_snapshot(
    store: &dyn RecordStore,
    admission_id: &str,
    patch: Option<&Row>,
) -> StepOutcome {
    let filter = Filter::new().eq(COL_ADMISSION_ID, admission_id);

    let current = match store.select(Table::Admissions, &filter).await {
        Ok(rows) => rows.into_iter().next(),
        Err(e) => {
            tracing::warn!("failed to re-read admission {admission_id}: {e}");
            return degraded(WarningKind::Fetch, Table::Admissions, &e);
        }
    };
    let Some(mut snapshot) = current else {
        tracing::warn!("admission {admission_id} disappeared before it could be archived");
        return degraded(
            WarningKind::Fetch,
            Table::Admissions,
            &StoreError::Rejected(format!("admission {admission_id} not found")),
        );
    };
    if let Some(patch) = patch {
        for (column, value) in patch {
            snapshot.insert(column.clone(), value.clone());
        }
    }

    match store.select(Table::AdmissionsHistory, &filter).await {
        Ok(existing) if !existing.is_empty() => {
            tracing::debug!("admission {admission_id} already has a history snapshot");
            return StepOutcome::NothingToDo;
        }
        Ok(_) => {}
        Err(e) => {
            tracing::warn!("failed to read admission history for {admission_id}: {e}");
            return degraded(WarningKind::Fetch, Table::AdmissionsHistory, &e);
        }
    }

    match store.insert(Table::AdmissionsHistory, vec![snapshot]).await {
        Ok(()) => StepOutcome::Archived {
            archived: 1,
            removed: 0,
        },
        Err(e) => {
            tracing::warn!("failed to archive admission {admission_id}: {e}");
            degraded(WarningKind::Archive, Table::AdmissionsHistory, &e)
        }
    }
}

/// Moves every live row of `kind` for (admission, patient) into its history table.
pub(crate) async fn migrate_dependents(
    store: &dyn RecordStore,
    kind: DependentKind,
    admission_id: &str,
    patient_id: &Value,
) -> StepOutcome {
    let live_table = kind.live_table();
    let history_table = kind.history_table();
    let filter = Filter::new()
        .eq(COL_ADMISSION_ID, admission_id)
        .eq(COL_PATIENT_ID, patient_id.clone());

    let live = match store.select(live_table, &filter).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!("failed to fetch {} for archiving: {e}", kind.label());
            return degraded(WarningKind::Fetch, live_table, &e);
        }
    };
    if live.is_empty() {
        return StepOutcome::NothingToDo;
    }

    let archived = match store.select(history_table, &filter).await {
        Ok(rows) => rows,
        Err(e) => {
            tracing::warn!("failed to read {history_table} before archiving: {e}");
            return degraded(WarningKind::Fetch, history_table, &e);
        }
    };
    let pending: Vec<Row> = live
        .into_iter()
        .filter(|row| !archived.contains(row))
        .collect();
    let pending_count = pending.len();

    if !pending.is_empty() {
        if let Err(e) = store.insert(history_table, pending).await {
            tracing::warn!(
                "failed to archive {}; live rows kept for retry: {e}",
                kind.label()
            );
            return degraded(WarningKind::Archive, history_table, &e);
        }
    }

    match store.delete(live_table, &filter).await {
        Ok(removed) => {
            tracing::info!(
                "archived {pending_count} and removed {removed} {} for admission {admission_id}",
                kind.label()
            );
            StepOutcome::Archived {
                archived: pending_count,
                removed,
            }
        }
        Err(e) => {
            tracing::warn!("failed to delete active {}: {e}", kind.label());
            degraded(WarningKind::Delete, live_table, &e)
        }
    }
}
