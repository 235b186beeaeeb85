//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services.
//! Parsing helpers take the raw `Option<String>` an environment lookup would produce, so they
//! can be tested without touching process-wide environment variables.

use crate::constants::{DEFAULT_DATA_DIR, DEFAULT_REST_ADDR};
use crate::error::{ConfigError, ConfigResult, StoreResult};
use crate::store::{FileStore, MemoryStore, RecordStore};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

pub const ENV_DATA_DIR: &str = "WARD_DATA_DIR";
pub const ENV_STORE: &str = "WARD_STORE";
pub const ENV_REST_ADDR: &str = "WARD_REST_ADDR";

/// Which [`RecordStore`] backend to run against.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum StoreBackend {
    #[default]
    File,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StoreBackend::File),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::InvalidValue {
                key: ENV_STORE,
                value: s.to_owned(),
            }),
        }
    }
}

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    store_backend: StoreBackend,
    rest_addr: SocketAddr,
}

impl CoreConfig {
    pub fn new(data_dir: PathBuf, store_backend: StoreBackend, rest_addr: SocketAddr) -> Self {
        Self {
            data_dir,
            store_backend,
            rest_addr,
        }
    }

    /// Builds the configuration from raw environment values, applying defaults for unset
    /// or blank values.
    pub fn from_env_values(
        data_dir: Option<String>,
        store_backend: Option<String>,
        rest_addr: Option<String>,
    ) -> ConfigResult<Self> {
        Ok(Self {
            data_dir: data_dir_from_env_value(data_dir),
            store_backend: store_backend_from_env_value(store_backend)?,
            rest_addr: rest_addr_from_env_value(rest_addr)?,
        })
    }

    /// Reads `WARD_DATA_DIR`, `WARD_STORE` and `WARD_REST_ADDR` from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_env_values(
            std::env::var(ENV_DATA_DIR).ok(),
            std::env::var(ENV_STORE).ok(),
            std::env::var(ENV_REST_ADDR).ok(),
        )
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn store_backend(&self) -> StoreBackend {
        self.store_backend
    }

    pub fn rest_addr(&self) -> SocketAddr {
        self.rest_addr
    }

    /// Opens the configured store backend.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::error::StoreError) if the file-backed store cannot
    /// create its data directory.
    pub async fn open_store(&self) -> StoreResult<Arc<dyn RecordStore>> {
        match self.store_backend {
            StoreBackend::File => Ok(Arc::new(FileStore::open(&self.data_dir).await?)),
            StoreBackend::Memory => {
                tracing::warn!("using in-memory store; records are lost on exit");
                Ok(Arc::new(MemoryStore::new()))
            }
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn data_dir_from_env_value(value: Option<String>) -> PathBuf {
    non_blank(value)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

/// If `value` is `None` or blank, returns the file backend.
pub fn store_backend_from_env_value(value: Option<String>) -> ConfigResult<StoreBackend> {
    non_blank(value)
        .map(|v| v.parse())
        .transpose()
        .map(Option::unwrap_or_default)
}

pub fn rest_addr_from_env_value(value: Option<String>) -> ConfigResult<SocketAddr> {
    let raw = non_blank(value).unwrap_or_else(|| DEFAULT_REST_ADDR.to_string());
    raw.parse().map_err(|_| ConfigError::InvalidValue {
        key: ENV_REST_ADDR,
        value: raw,
    })
}
