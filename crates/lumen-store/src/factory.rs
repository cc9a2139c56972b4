//! # Storage Factory
//!
//! Selects and constructs the storage backend at process start.
//!
//! ## Selection Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │  StoreConfig.backend                                                │
//! │       │                                                             │
//! │       ├── Memory ──────────────────► MemoryStore                    │
//! │       │                                                             │
//! │       └── Sqlite ── open OK? ──yes─► SqliteStore                    │
//! │                        │                                            │
//! │                        no                                           │
//! │                        ▼                                            │
//! │                  warn! + fall back ─► MemoryStore                   │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The factory hands back an `Arc<dyn Storage>` for the caller to inject
//! wherever persistence is needed. There is deliberately no process-wide
//! `get_instance()` cache: one construction at startup, explicit
//! injection everywhere else, and test isolation is simply constructing
//! another store.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};

use crate::contract::Storage;
use crate::memory::{MemoryConfig, MemoryStore};
use crate::retention::RetentionPolicy;
use crate::sqlite::{SqliteConfig, SqliteStore};

/// Which backend the host environment calls for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Embedded relational store; native runtimes.
    Sqlite,
    /// In-process object store; environments without a SQL engine, and
    /// the fallback when SQLite cannot open.
    Memory,
}

/// Backend-agnostic storage configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: BackendKind,

    /// SQLite database file (ignored by the memory backend).
    pub database_path: PathBuf,

    /// Optional JSON snapshot file for the memory backend.
    pub snapshot_path: Option<PathBuf>,

    /// Audit retention, applied uniformly by whichever backend is
    /// selected.
    pub retention: RetentionPolicy,
}

impl StoreConfig {
    /// SQLite-backed configuration for the given database file.
    pub fn sqlite(path: impl Into<PathBuf>) -> Self {
        StoreConfig {
            backend: BackendKind::Sqlite,
            database_path: path.into(),
            snapshot_path: None,
            retention: RetentionPolicy::unbounded(),
        }
    }

    /// Purely in-process configuration.
    pub fn memory() -> Self {
        StoreConfig {
            backend: BackendKind::Memory,
            database_path: PathBuf::new(),
            snapshot_path: None,
            retention: RetentionPolicy::unbounded(),
        }
    }

    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.snapshot_path = Some(path.into());
        self
    }

    pub fn retention(mut self, retention: RetentionPolicy) -> Self {
        self.retention = retention;
        self
    }

    fn memory_config(&self) -> MemoryConfig {
        MemoryConfig {
            snapshot_path: self.snapshot_path.clone(),
            retention: self.retention,
        }
    }
}

/// Opens the configured backend, falling back to the memory store with
/// a logged warning when SQLite fails to open. The memory store itself
/// always comes up, so this function cannot fail.
pub async fn open_store(config: StoreConfig) -> Arc<dyn Storage> {
    match config.backend {
        BackendKind::Memory => {
            info!("Storage factory: memory backend selected");
            Arc::new(MemoryStore::open(config.memory_config()))
        }
        BackendKind::Sqlite => {
            let sqlite_config = SqliteConfig::new(config.database_path.clone())
                .retention(config.retention);
            match SqliteStore::open(sqlite_config).await {
                Ok(store) => {
                    info!("Storage factory: sqlite backend selected");
                    Arc::new(store)
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        path = %config.database_path.display(),
                        "SQLite backend failed to open, falling back to memory backend"
                    );
                    Arc::new(MemoryStore::open(config.memory_config()))
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_config_opens_memory_backend() {
        let store = open_store(StoreConfig::memory()).await;
        assert_eq!(store.backend_name(), "memory");
    }

    #[tokio::test]
    async fn sqlite_open_failure_falls_back_to_memory() {
        // A directory path is not a valid database file, so the SQLite
        // open fails and the factory must substitute the memory backend.
        let config = StoreConfig::sqlite("/this/path/does/not/exist/lumen.db");
        let store = open_store(config).await;
        assert_eq!(store.backend_name(), "memory");
        assert!(store.health_check().await);
    }
}
