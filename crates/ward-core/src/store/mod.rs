//! Data store collaborator.
//!
//! The ward engine never talks to a database directly. Every read and write goes through
//! [`RecordStore`], a four-operation interface over named tables of schemaless JSON rows:
//!
//! - `select(table, filter)` returns every matching row
//! - `insert(table, rows)` appends one or more rows, all or nothing
//! - `update(table, filter, patch)` merges `patch` into every matching row and reports how
//!   many rows changed
//! - `delete(table, filter)` removes every matching row and reports how many went
//!
//! `update` is expected to be atomic with respect to its filter. The discharge workflow
//! relies on this: filtering on `admission_status = Active` turns the status flip into a
//! compare-and-set.
//!
//! Two backends ship with the crate: [`MemoryStore`] and the JSON-file-backed [`FileStore`].

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::{StoreError, StoreResult};
use serde_json::{Map, Value};

/// A single table row.
pub type Row = Map<String, Value>;

/// The closed set of tables the ward engine touches.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Table {
    Admissions,
    AdmissionsHistory,
    DoctorsOrders,
    DoctorsOrdersHistory,
    Medications,
    MedicationsHistory,
    Notes,
    NotesHistory,
    Patients,
}

impl Table {
    pub const ALL: [Table; 9] = [
        Table::Admissions,
        Table::AdmissionsHistory,
        Table::DoctorsOrders,
        Table::DoctorsOrdersHistory,
        Table::Medications,
        Table::MedicationsHistory,
        Table::Notes,
        Table::NotesHistory,
        Table::Patients,
    ];

    /// Table name as exposed by the hosted database.
    pub fn name(&self) -> &'static str {
        match self {
            Table::Admissions => "Admissions",
            Table::AdmissionsHistory => "AdmissionsHistory",
            Table::DoctorsOrders => "DoctorsOrders",
            Table::DoctorsOrdersHistory => "DoctorsOrdersHistory",
            Table::Medications => "Medications",
            Table::MedicationsHistory => "MedicationsHistory",
            Table::Notes => "Notes",
            Table::NotesHistory => "NotesHistory",
            Table::Patients => "patient_basic_info",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Conjunction of `column = value` predicates.
///
/// An empty filter matches every row. Backends refuse to update or delete with an empty
/// filter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Value)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an equality predicate on `column`.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn conditions(&self) -> &[(String, Value)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Returns true if every predicate holds for `row`. A missing column never matches.
    ///
    /// Identifiers reach the engine as strings while the hosted database may store them as
    /// numbers, so a string and a number compare equal when they denote the same value.
    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|(column, value)| {
            row.get(column)
                .is_some_and(|stored| same_value(stored, value))
        })
    }
}

fn same_value(stored: &Value, wanted: &Value) -> bool {
    match (stored, wanted) {
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            number_matches_text(n, s)
        }
        _ => stored == wanted,
    }
}

fn number_matches_text(n: &serde_json::Number, s: &str) -> bool {
    let s = s.trim();
    if let Some(i) = n.as_i64() {
        return s.parse::<i64>() == Ok(i);
    }
    if let Some(u) = n.as_u64() {
        return s.parse::<u64>() == Ok(u);
    }
    match (n.as_f64(), s.parse::<f64>()) {
        (Some(f), Ok(parsed)) => f == parsed,
        _ => false,
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.conditions.is_empty() {
            return f.write_str("<all>");
        }
        let parts: Vec<String> = self
            .conditions
            .iter()
            .map(|(column, value)| format!("{column}={value}"))
            .collect();
        f.write_str(&parts.join(" and "))
    }
}

/// Create/read/update/delete access to the named tables.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait RecordStore: Send + Sync {
    async fn select(&self, table: Table, filter: &Filter) -> StoreResult<Vec<Row>>;

    async fn insert(&self, table: Table, rows: Vec<Row>) -> StoreResult<()>;

    /// Merges `patch` into every row matching `filter`. Returns the number of rows changed.
    async fn update(&self, table: Table, filter: &Filter, patch: &Row) -> StoreResult<u64>;

    /// Removes every row matching `filter`. Returns the number of rows removed.
    async fn delete(&self, table: Table, filter: &Filter) -> StoreResult<u64>;
}

/// Refuses table-wide writes. Both backends call this before `update` and `delete`.
pub(crate) fn reject_unfiltered(op: &str, table: Table, filter: &Filter) -> StoreResult<()> {
    if filter.is_empty() {
        return Err(StoreError::Rejected(format!(
            "{op} on {table} without a filter is not allowed"
        )));
    }
    Ok(())
}

pub(crate) fn apply_update(rows: &mut [Row], filter: &Filter, patch: &Row) -> u64 {
    let mut affected = 0;
    for row in rows.iter_mut().filter(|row| filter.matches(row)) {
        for (column, value) in patch {
            row.insert(column.clone(), value.clone());
        }
        affected += 1;
    }
    affected
}

pub(crate) fn apply_delete(rows: &mut Vec<Row>, filter: &Filter) -> u64 {
    let before = rows.len();
    rows.retain(|row| !filter.matches(row));
    (before - rows.len()) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> Row {
        value.as_object().cloned().expect("test row must be an object")
    }

    #[test]
    fn test_filter_matches_all_predicates() {
        let filter = Filter::new()
            .eq("admission_id", "ADM-1")
            .eq("patient_id", "PAT-1");

        assert!(filter.matches(&row(json!({
            "admission_id": "ADM-1",
            "patient_id": "PAT-1",
            "drug": "amoxicillin"
        }))));
        assert!(!filter.matches(&row(json!({
            "admission_id": "ADM-1",
            "patient_id": "PAT-2"
        }))));
    }

    #[test]
    fn test_filter_missing_column_never_matches() {
        let filter = Filter::new().eq("patient_id", "PAT-1");
        assert!(!filter.matches(&row(json!({ "admission_id": "ADM-1" }))));
    }

    #[test]
    fn test_filter_matches_numeric_column_against_text_id() {
        let filter = Filter::new().eq("admission_id", "42");
        assert!(filter.matches(&row(json!({ "admission_id": 42 }))));
        assert!(!filter.matches(&row(json!({ "admission_id": 420 }))));

        let filter = Filter::new().eq("patient_id", json!(7));
        assert!(filter.matches(&row(json!({ "patient_id": "7" }))));
        assert!(filter.matches(&row(json!({ "patient_id": 7 }))));
        assert!(!filter.matches(&row(json!({ "patient_id": "PAT-7" }))));
    }

    #[test]
    fn test_filter_does_not_coerce_other_types() {
        let filter = Filter::new().eq("flag", "true");
        assert!(!filter.matches(&row(json!({ "flag": true }))));
        assert!(!filter.matches(&row(json!({ "flag": null }))));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = Filter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&row(json!({ "anything": true }))));
        assert_eq!(filter.to_string(), "<all>");
    }

    #[test]
    fn test_apply_update_merges_patch_into_matching_rows_only() {
        let mut rows = vec![
            row(json!({ "admission_id": "ADM-1", "admission_status": "Active" })),
            row(json!({ "admission_id": "ADM-2", "admission_status": "Active" })),
        ];
        let patch = row(json!({ "admission_status": "Discharged", "result_status": "referred" }));

        let affected = apply_update(&mut rows, &Filter::new().eq("admission_id", "ADM-2"), &patch);

        assert_eq!(affected, 1);
        assert_eq!(rows[0]["admission_status"], "Active");
        assert_eq!(rows[1]["admission_status"], "Discharged");
        assert_eq!(rows[1]["result_status"], "referred");
    }

    #[test]
    fn test_apply_delete_counts_removed_rows() {
        let mut rows = vec![
            row(json!({ "patient_id": "PAT-1" })),
            row(json!({ "patient_id": "PAT-1" })),
            row(json!({ "patient_id": "PAT-2" })),
        ];

        assert_eq!(apply_delete(&mut rows, &Filter::new().eq("patient_id", "PAT-1")), 2);
        assert_eq!(rows.len(), 1);
        assert_eq!(apply_delete(&mut rows, &Filter::new().eq("patient_id", "PAT-9")), 0);
    }

    #[test]
    fn test_reject_unfiltered_refuses_empty_filter() {
        let err = reject_unfiltered("delete", Table::Patients, &Filter::new())
            .expect_err("empty filter should be refused");
        assert!(matches!(err, StoreError::Rejected(_)));
        assert!(reject_unfiltered("delete", Table::Patients, &Filter::new().eq("patient_id", "P")).is_ok());
    }

    #[test]
    fn test_table_names_are_unique() {
        let mut names: Vec<&str> = Table::ALL.iter().map(Table::name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), Table::ALL.len());
    }
}
