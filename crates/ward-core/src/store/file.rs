//! JSON-file store backend.
//!
//! Each table lives in its own file under the data directory:
//!
//! ```text
//! ward_data/
//!   Admissions.json
//!   AdmissionsHistory.json
//!   DoctorsOrders.json
//!   ...
//!   patient_basic_info.json
//! ```
//!
//! A file holds a JSON array of row objects. A missing or zero-length file is an empty table.
//! Writes go to a sibling `.tmp` file that is then renamed over the original, so a crash
//! mid-write never leaves a truncated table behind. A store-wide mutex serialises every call,
//! which makes each operation (including a filtered `update`) atomic within one process.
//!
//! There is no cross-process lock. Two processes opening the same data directory (for
//! example `ward-run` and the `ward` CLI) can both see an admission as `Active` and both
//! discharge it, and one can overwrite the other's table file. Point each process at its
//! own directory, or stop the server before running write commands from the CLI.

use super::{apply_delete, apply_update, reject_unfiltered, Filter, RecordStore, Row, Table};
use crate::constants::TABLE_FILE_EXTENSION;
use crate::error::{StoreError, StoreResult};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;

#[derive(Clone, Debug)]
pub struct FileStore {
    data_dir: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl FileStore {
    /// Opens a store rooted at `data_dir`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DataDirCreation`] if the directory cannot be created.
    pub async fn open(data_dir: impl Into<PathBuf>) -> StoreResult<Self> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)
            .await
            .map_err(|source| StoreError::DataDirCreation {
                path: data_dir.clone(),
                source,
            })?;

        Ok(Self {
            data_dir,
            lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn table_path(&self, table: Table) -> PathBuf {
        self.data_dir
            .join(format!("{}.{}", table.name(), TABLE_FILE_EXTENSION))
    }

    async fn load(&self, table: Table) -> StoreResult<Vec<Row>> {
        let path = self.table_path(table);
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::FileRead { path, source }),
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&bytes).map_err(|source| StoreError::Deserialization {
            table: table.name(),
            source,
        })
    }

    async fn save(&self, table: Table, rows: &[Row]) -> StoreResult<()> {
        let path = self.table_path(table);
        let contents =
            serde_json::to_vec_pretty(rows).map_err(|source| StoreError::Serialization {
                table: table.name(),
                source,
            })?;

        let tmp_path = path.with_extension(format!("{TABLE_FILE_EXTENSION}.tmp"));
        fs::write(&tmp_path, contents)
            .await
            .map_err(|source| StoreError::FileWrite {
                path: tmp_path.clone(),
                source,
            })?;
        fs::rename(&tmp_path, &path)
            .await
            .map_err(|source| StoreError::FileWrite { path, source })
    }
}

#[async_trait::async_trait]
impl RecordStore for FileStore {
    async fn select(&self, table: Table, filter: &Filter) -> StoreResult<Vec<Row>> {
        let _guard = self.lock.lock().await;
        let rows = self.load(table).await?;
        Ok(rows.into_iter().filter(|row| filter.matches(row)).collect())
    }

    async fn insert(&self, table: Table, rows: Vec<Row>) -> StoreResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let _guard = self.lock.lock().await;
        let mut existing = self.load(table).await?;
        existing.extend(rows);
        self.save(table, &existing).await
    }

    async fn update(&self, table: Table, filter: &Filter, patch: &Row) -> StoreResult<u64> {
        reject_unfiltered("update", table, filter)?;
        let _guard = self.lock.lock().await;
        let mut rows = self.load(table).await?;
        let affected = apply_update(&mut rows, filter, patch);
        if affected > 0 {
            self.save(table, &rows).await?;
        }
        Ok(affected)
    }

    async fn delete(&self, table: Table, filter: &Filter) -> StoreResult<u64> {
        reject_unfiltered("delete", table, filter)?;
        let _guard = self.lock.lock().await;
        let mut rows = self.load(table).await?;
        let affected = apply_delete(&mut rows, filter);
        if affected > 0 {
            self.save(table, &rows).await?;
        }
        Ok(affected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn row(value: serde_json::Value) -> Row {
        value.as_object().cloned().expect("test row must be an object")
    }

    #[tokio::test]
    async fn test_open_creates_missing_data_dir() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let data_dir = temp_dir.path().join("nested").join("ward_data");

        let store = FileStore::open(&data_dir).await.expect("open should succeed");

        assert!(data_dir.is_dir());
        assert_eq!(store.data_dir(), data_dir.as_path());
    }

    #[tokio::test]
    async fn test_missing_table_file_reads_as_empty() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = FileStore::open(temp_dir.path()).await.unwrap();

        let rows = store
            .select(Table::Notes, &Filter::new())
            .await
            .expect("select should succeed");

        assert!(rows.is_empty());
        assert!(!store.table_path(Table::Notes).exists());
    }

    #[tokio::test]
    async fn test_rows_persist_across_store_instances() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let store = FileStore::open(temp_dir.path()).await.unwrap();
        store
            .insert(
                Table::Admissions,
                vec![row(json!({
                    "admission_id": "ADM-1",
                    "patient_id": "PAT-1",
                    "admission_status": "Active"
                }))],
            )
            .await
            .expect("insert should succeed");

        let reopened = FileStore::open(temp_dir.path()).await.unwrap();
        let affected = reopened
            .update(
                Table::Admissions,
                &Filter::new().eq("admission_id", "ADM-1"),
                &row(json!({ "admission_status": "Discharged" })),
            )
            .await
            .expect("update should succeed");
        assert_eq!(affected, 1);

        let raw = std::fs::read_to_string(reopened.table_path(Table::Admissions))
            .expect("table file should exist");
        let parsed: Vec<Row> = serde_json::from_str(&raw).expect("table file should be JSON");
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0]["admission_status"], "Discharged");
        assert!(!reopened
            .table_path(Table::Admissions)
            .with_extension("json.tmp")
            .exists());
    }

    #[tokio::test]
    async fn test_delete_reports_affected_rows() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = FileStore::open(temp_dir.path()).await.unwrap();
        store
            .insert(
                Table::Patients,
                vec![
                    row(json!({ "patient_id": "PAT-1" })),
                    row(json!({ "patient_id": "PAT-2" })),
                ],
            )
            .await
            .unwrap();

        let filter = Filter::new().eq("patient_id", "PAT-1");
        assert_eq!(store.delete(Table::Patients, &filter).await.unwrap(), 1);
        assert_eq!(store.delete(Table::Patients, &filter).await.unwrap(), 0);

        let remaining = store.select(Table::Patients, &Filter::new()).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0]["patient_id"], "PAT-2");
    }

    #[tokio::test]
    async fn test_malformed_table_file_is_reported() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let store = FileStore::open(temp_dir.path()).await.unwrap();
        std::fs::write(store.table_path(Table::Medications), "{ not json")
            .expect("should write malformed file");

        let err = store
            .select(Table::Medications, &Filter::new())
            .await
            .expect_err("malformed file should fail");

        assert!(matches!(
            err,
            StoreError::Deserialization {
                table: "Medications",
                ..
            }
        ));
    }
}
