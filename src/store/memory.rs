use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
};

use tokio::sync::Mutex;

use crate::{ChatError, username::eq_ignore_case};

use super::{Collection, CollectionStore, Fields, StoreRecord};

#[derive(Default)]
struct Tables {
    next_id: i64,
    rows: HashMap<Collection, Vec<StoreRecord>>,
}

/// In-process store. Clones share the same tables.
///
/// Can be switched offline to make every call fail with `StoreUnavailable`,
/// and counts calls so callers can check that nothing reached the store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    offline: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Number of calls made against this store, including failed ones.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<(), ChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(ChatError::StoreUnavailable("memory store is offline".to_owned()));
        }
        Ok(())
    }
}

impl CollectionStore for MemoryStore {
    async fn create(&self, collection: Collection, fields: Fields) -> Result<StoreRecord, ChatError> {
        self.check()?;
        let mut tables = self.tables.lock().await;
        tables.next_id += 1;
        let record = StoreRecord {
            id: tables.next_id,
            attributes: fields,
        };
        tables.rows.entry(collection).or_default().push(record.clone());
        Ok(record)
    }

    async fn list(&self, collection: Collection) -> Result<Vec<StoreRecord>, ChatError> {
        self.check()?;
        let tables = self.tables.lock().await;
        Ok(tables.rows.get(&collection).cloned().unwrap_or_default())
    }

    async fn find_eqi(&self, collection: Collection, field: &str, value: &str) -> Result<Vec<StoreRecord>, ChatError> {
        self.check()?;
        let tables = self.tables.lock().await;
        let Some(rows) = tables.rows.get(&collection) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .iter()
            .filter(|r| r.str_attr(field).is_some_and(|v| eq_ignore_case(v, value)))
            .cloned()
            .collect())
    }

    async fn delete(&self, collection: Collection, id: i64) -> Result<(), ChatError> {
        self.check()?;
        let mut tables = self.tables.lock().await;
        let rows = tables.rows.entry(collection).or_default();
        let Some(pos) = rows.iter().position(|r| r.id == id) else {
            return Err(ChatError::NotFound(format!("{collection}/{id}")));
        };
        rows.remove(pos);
        Ok(())
    }
}
