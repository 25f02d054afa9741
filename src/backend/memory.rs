//! In-process backend
//!
//! Same record semantics as the document database, held in memory. Useful
//! for tests and for running the provider without a database. Reachability,
//! latency and corrupt records can be controlled to exercise error paths.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::traits::{
    BackendClient, BackendConnector, BackendError, BackendResult, Record, RecordFilter,
};
use crate::config::BackendConfig;

type CollectionId = (String, String);
type RecordId = (String, String);

#[derive(Debug, Default)]
struct Collections {
    /// (database, collection) -> (namespace, key) -> value
    records: HashMap<CollectionId, BTreeMap<RecordId, Vec<u8>>>,
    corrupt: HashSet<(CollectionId, RecordId)>,
}

#[derive(Debug)]
struct MemoryState {
    collections: Mutex<Collections>,
    reachable: AtomicBool,
    latency: Mutex<Option<Duration>>,
    connects: AtomicUsize,
    closes: AtomicUsize,
}

impl MemoryState {
    fn collections(&self) -> MutexGuard<'_, Collections> {
        self.collections.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Connector handing out clients over shared in-memory state.
///
/// Clients connected with different databases see different data; clones
/// of the connector share everything.
#[derive(Debug, Clone)]
pub struct MemoryConnector {
    state: Arc<MemoryState>,
}

impl MemoryConnector {
    /// Create a reachable, empty backend
    pub fn new() -> Self {
        Self {
            state: Arc::new(MemoryState {
                collections: Mutex::new(Collections::default()),
                reachable: AtomicBool::new(true),
                latency: Mutex::new(None),
                connects: AtomicUsize::new(0),
                closes: AtomicUsize::new(0),
            }),
        }
    }

    /// Make the backend (un)reachable for new connections and existing clients
    pub fn set_reachable(&self, reachable: bool) {
        self.state.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Delay every client operation by `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.state.latency.lock().unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Number of successful connects so far
    pub fn connect_count(&self) -> usize {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Number of clients closed so far
    pub fn close_count(&self) -> usize {
        self.state.closes.load(Ordering::SeqCst)
    }

    /// Mark a stored record as undecodable
    pub fn corrupt(&self, database: &str, collection: &str, filter: &RecordFilter) {
        self.state.collections().corrupt.insert((
            (database.to_string(), collection.to_string()),
            (filter.namespace.clone(), filter.key.clone()),
        ));
    }

    /// Number of records stored in a collection, across namespaces
    pub fn record_count(&self, database: &str, collection: &str) -> usize {
        self.state
            .collections()
            .records
            .get(&(database.to_string(), collection.to_string()))
            .map_or(0, BTreeMap::len)
    }
}

impl Default for MemoryConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendConnector for MemoryConnector {
    async fn connect(&self, config: &BackendConfig) -> BackendResult<Arc<dyn BackendClient>> {
        if !self.state.reachable.load(Ordering::SeqCst) {
            return Err(BackendError::Connection(format!(
                "memory backend unreachable for {}",
                config.name()
            )));
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(MemoryBackend {
            state: Arc::clone(&self.state),
            database: config.database().to_string(),
        }))
    }
}

/// Client bound to one database of a [`MemoryConnector`]
#[derive(Debug)]
pub struct MemoryBackend {
    state: Arc<MemoryState>,
    database: String,
}

impl MemoryBackend {
    async fn enter(&self) -> BackendResult<()> {
        let latency = *self.state.latency.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.state.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::Connection("memory backend unreachable".to_string()))
        }
    }

    fn collection_id(&self, collection: &str) -> CollectionId {
        (self.database.clone(), collection.to_string())
    }
}

fn record_id(filter: &RecordFilter) -> RecordId {
    (filter.namespace.clone(), filter.key.clone())
}

#[async_trait]
impl BackendClient for MemoryBackend {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> BackendResult<()> {
        self.enter().await
    }

    async fn find_value(
        &self,
        collection: &str,
        filter: &RecordFilter,
    ) -> BackendResult<Option<Vec<u8>>> {
        self.enter().await?;
        let collection = self.collection_id(collection);
        let id = record_id(filter);
        let collections = self.state.collections();

        let Some(value) = collections.records.get(&collection).and_then(|c| c.get(&id)) else {
            return Ok(None);
        };
        if collections.corrupt.contains(&(collection, id)) {
            return Err(BackendError::Decode(format!(
                "record {} holds an unsupported value type",
                filter.key
            )));
        }
        Ok(Some(value.clone()))
    }

    async fn upsert(&self, collection: &str, record: &Record) -> BackendResult<()> {
        self.enter().await?;
        let collection = self.collection_id(collection);
        let id = (record.namespace.clone(), record.key.clone());
        let mut collections = self.state.collections();

        collections.corrupt.remove(&(collection.clone(), id.clone()));
        collections
            .records
            .entry(collection)
            .or_default()
            .insert(id, record.value.clone());
        Ok(())
    }

    async fn delete_one(&self, collection: &str, filter: &RecordFilter) -> BackendResult<u64> {
        self.enter().await?;
        let collection = self.collection_id(collection);
        let id = record_id(filter);
        let mut collections = self.state.collections();

        collections.corrupt.remove(&(collection.clone(), id.clone()));
        let removed = collections
            .records
            .get_mut(&collection)
            .and_then(|c| c.remove(&id))
            .is_some();
        Ok(u64::from(removed))
    }

    async fn count(&self, collection: &str, filter: &RecordFilter) -> BackendResult<u64> {
        self.enter().await?;
        let found = self
            .state
            .collections()
            .records
            .get(&self.collection_id(collection))
            .is_some_and(|c| c.contains_key(&record_id(filter)));
        Ok(u64::from(found))
    }

    async fn find_keys(&self, collection: &str, namespace: &str) -> BackendResult<Vec<String>> {
        self.enter().await?;
        let keys = self
            .state
            .collections()
            .records
            .get(&self.collection_id(collection))
            .map(|c| {
                c.keys()
                    .filter(|(ns, _)| ns == namespace)
                    .map(|(_, key)| key.clone())
                    .collect()
            })
            .unwrap_or_default();
        Ok(keys)
    }

    async fn close(&self) {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
    }
}
