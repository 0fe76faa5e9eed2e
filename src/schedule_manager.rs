use crate::store::Store;

use tokio::sync::{Mutex, OwnedMutexGuard};

use std::sync::{Arc, RwLock};

/// Holds the ingestion lock until the replacement store is committed. Dropping it
/// without committing leaves the current store in place.
pub struct TransactionalWriter {
    store_ref: Arc<RwLock<Arc<Store>>>,
    _transaction_lock: OwnedMutexGuard<()>,
}

impl TransactionalWriter {
    pub fn commit(self, store: Store) {
        let mut current = match self.store_ref.write() {
            Ok(x) => x,
            Err(poisoned) => poisoned.into_inner(),
        };
        *current = Arc::new(store);
    }
}

/// Owns the committed store. Readers get a cheap handle that stays valid even if
/// a new store is committed while they hold it.
pub struct ScheduleManager {
    store: Arc<RwLock<Arc<Store>>>,
    transaction_lock: Arc<Mutex<()>>,
}

impl Default for ScheduleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ScheduleManager {
    pub fn new() -> Self {
        Self::with_store(Store::default())
    }

    pub fn with_store(store: Store) -> Self {
        Self {
            store: Arc::new(RwLock::new(Arc::new(store))),
            transaction_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn read(&self) -> Arc<Store> {
        match self.store.read() {
            Ok(x) => x.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub async fn transactional_write(&self) -> TransactionalWriter {
        let trans_lock = self.transaction_lock.clone().lock_owned().await;

        TransactionalWriter {
            store_ref: self.store.clone(),
            _transaction_lock: trans_lock,
        }
    }
}
