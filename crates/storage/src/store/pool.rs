#![forbid(unsafe_code)]

use super::StoreError;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::Path;
use std::time::Duration;

pub type SqlitePool = r2d2::Pool<SqliteConnectionManager>;
pub type PooledConnection = r2d2::PooledConnection<SqliteConnectionManager>;

pub const DB_FILE_NAME: &str = "ultracontext.db";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolConfig {
    pub max_size: u32,
    pub busy_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 4,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Builds the process-wide connection pool for `<storage_dir>/ultracontext.db`.
///
/// Construct it once at startup and hand it to [`super::SqliteStore::new`].
pub fn open_pool(
    storage_dir: impl AsRef<Path>,
    config: &PoolConfig,
) -> Result<SqlitePool, StoreError> {
    let storage_dir = storage_dir.as_ref();
    std::fs::create_dir_all(storage_dir)?;

    let busy_timeout = config.busy_timeout;
    let manager = SqliteConnectionManager::file(storage_dir.join(DB_FILE_NAME)).with_init(
        move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.execute_batch("PRAGMA foreign_keys = ON; PRAGMA synchronous = NORMAL;")
        },
    );

    let pool = r2d2::Pool::builder()
        .max_size(config.max_size.max(1))
        .build(manager)?;
    Ok(pool)
}
