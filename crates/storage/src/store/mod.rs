#![forbid(unsafe_code)]

mod appointment_requests;
mod appointments;
mod campaigns;
mod child_status;
mod children;
mod error;
mod notifications;
mod reports;
mod stock;
mod support;
mod sweep;
mod types;
mod users;
mod vaccinations;
mod vaccines;

pub use error::StoreError;
pub use notifications::MAX_DISPATCH_ATTEMPTS;
pub use types::*;

use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vt_core::schedule::DAY_MS;
use vt_core::status::StatusPolicy;

const DB_FILE_NAME: &str = "vaxtrack.db";

/// Tunables that shape derived state. Everything else in the store is policy-free.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StorePolicy {
    pub status: StatusPolicy,
    pub stock_expiry_warning_ms: i64,
    pub default_stock_alert_threshold: i64,
}

impl Default for StorePolicy {
    fn default() -> Self {
        Self {
            status: StatusPolicy::default(),
            stock_expiry_warning_ms: 30 * DAY_MS,
            default_stock_alert_threshold: 10,
        }
    }
}

#[derive(Debug)]
pub struct SqliteStore {
    conn: Connection,
    storage_dir: Option<PathBuf>,
    policy: StorePolicy,
}

impl SqliteStore {
    pub fn open(storage_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let storage_dir = storage_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&storage_dir)?;

        let db_path = storage_dir.join(DB_FILE_NAME);
        let conn = Connection::open(db_path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        Self::init(conn, Some(storage_dir))
    }

    /// A private database that disappears with the store. Used by tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, storage_dir: Option<PathBuf>) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        support::migrate_sqlite_schema(&conn)?;
        Ok(Self {
            conn,
            storage_dir,
            policy: StorePolicy::default(),
        })
    }

    pub fn with_policy(mut self, policy: StorePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &StorePolicy {
        &self.policy
    }

    pub fn storage_dir(&self) -> Option<&Path> {
        self.storage_dir.as_deref()
    }
}
