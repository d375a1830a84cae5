#![forbid(unsafe_code)]

mod contexts;
mod error;
mod nodes;
mod pool;
mod requests;
mod support;
mod types;

pub use error::StoreError;
pub use nodes::{NodeReader, insert_nodes_tx};
pub use pool::{DB_FILE_NAME, PoolConfig, PooledConnection, SqlitePool, open_pool};
pub use requests::*;
pub use types::*;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, Weak};
use support::{install_schema, preflight_gate};
use uc_core::ProjectId;

/// Context store over an owned SQLite connection pool.
///
/// Writes to one lineage are serialized in-process (per-root mutex) and in
/// SQLite (`BEGIN IMMEDIATE`); the chain engine itself never locks.
#[derive(Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
    lineage_locks: Mutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Result<Self, StoreError> {
        {
            let conn = pool.get()?;
            preflight_gate(&conn)?;
            install_schema(&conn)?;
        }
        Ok(Self {
            pool,
            lineage_locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn open(storage_dir: impl AsRef<Path>, config: &PoolConfig) -> Result<Self, StoreError> {
        Self::new(open_pool(storage_dir, config)?)
    }

    pub fn conn(&self) -> Result<PooledConnection, StoreError> {
        Ok(self.pool.get()?)
    }

    fn acquire_lineage_lock(&self, root_id: &str) -> Result<Arc<Mutex<()>>, StoreError> {
        let mut locks = self
            .lineage_locks
            .lock()
            .map_err(|_| StoreError::LockPoisoned)?;

        if locks.len() > 128 {
            locks.retain(|_, weak| weak.strong_count() > 0);
        }

        if let Some(existing) = locks.get(root_id).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let lock = Arc::new(Mutex::new(()));
        locks.insert(root_id.to_string(), Arc::downgrade(&lock));
        Ok(lock)
    }

    fn with_lineage_write_lock<T>(
        &self,
        root_id: &str,
        f: impl FnOnce() -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let lock = self.acquire_lineage_lock(root_id)?;
        let _guard = lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        f()
    }
}

fn canonicalize_project(value: &str) -> Result<String, StoreError> {
    ProjectId::try_new(value)
        .map(ProjectId::into_string)
        .map_err(|_| StoreError::InvalidInput("invalid project_id"))
}
