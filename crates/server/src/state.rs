#![forbid(unsafe_code)]

use crate::config::Config;
use crate::error::ApiError;
use crate::realtime::Hub;
use std::sync::{Arc, Mutex};
use vt_storage::{SqliteStore, StoreError};

const HUB_CAPACITY: usize = 1_024;

#[derive(Clone)]
pub struct AppState {
    store: Arc<Mutex<SqliteStore>>,
    pub hub: Hub,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(store: SqliteStore, config: Config) -> Self {
        Self {
            store: Arc::new(Mutex::new(store)),
            hub: Hub::new(HUB_CAPACITY),
            config: Arc::new(config),
        }
    }

    /// Runs `op` against the store on the blocking pool. The lock is never held across an
    /// await point.
    pub async fn run<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteStore) -> Result<T, StoreError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || {
            let mut guard = store
                .lock()
                .map_err(|_| ApiError::internal("store lock poisoned"))?;
            op(&mut guard).map_err(ApiError::from)
        })
        .await
        .map_err(|err| ApiError::internal(format!("store task failed: {err}")))?
    }
}
