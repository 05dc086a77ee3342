//! Persistence Adapter.
//!
//! Mirrors step-sequence state into a key-value store. Persistence is a
//! convenience: every failure (corrupt value, store disabled, quota) is logged
//! and treated as "nothing persisted". Nothing here returns an error to the
//! controller.
//!
//! Writes go through [`PersistenceWriter`], a detached thread fed by a channel,
//! so a slow or failing store never delays an edit.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use playpen_core::{PersistedRecord, StorageKey};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Storage is disabled or could not be opened.
    Unavailable(String),
    /// Store refused the write (quota, read-only, ...).
    Rejected(String),
    Io(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable(msg) => write!(f, "storage unavailable: {msg}"),
            Self::Rejected(msg) => write!(f, "storage rejected write: {msg}"),
            Self::Io(msg) => write!(f, "storage IO error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Raw string key-value store.
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

impl<T: KvStore + ?Sized> KvStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

/// Shared in-memory store. Clones see the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every operation fail, as a disabled or full store would.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Write a raw value, bypassing the failure switch.
    pub fn insert_raw(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }

    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().ok().and_then(|e| e.get(key).cloned())
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("memory store disabled".to_string()))
        } else {
            Ok(())
        }
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.check()?;
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.check()?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("poisoned".to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.check()?;
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("poisoned".to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

/// What the controller talks to. Neither method can fail.
pub trait RecordStore: Send {
    fn load(&self, key: &StorageKey) -> Option<PersistedRecord>;
    fn save(&self, key: &StorageKey, record: &PersistedRecord);
    fn clear(&self, key: &StorageKey);

    /// Block until earlier saves have reached the store.
    fn flush(&self) {}
}

/// Synchronous record codec over a [`KvStore`].
#[derive(Debug, Clone)]
pub struct PersistenceAdapter<S> {
    store: S,
}

impl<S: KvStore> PersistenceAdapter<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

impl<S: KvStore> RecordStore for PersistenceAdapter<S> {
    fn load(&self, key: &StorageKey) -> Option<PersistedRecord> {
        let raw = match self.store.get(key.as_str()) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                log::debug!("Persisted state for {} unreadable: {}", key, e);
                return None;
            }
        };
        let record = PersistedRecord::decode_lenient(&raw);
        if record.is_none() {
            log::warn!("Ignoring corrupt persisted state under {}", key);
        }
        record
    }

    fn save(&self, key: &StorageKey, record: &PersistedRecord) {
        let json = match record.encode() {
            Ok(json) => json,
            Err(e) => {
                log::warn!("Failed to encode state for {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.store.set(key.as_str(), &json) {
            log::debug!("Dropped write for {}: {}", key, e);
        }
    }

    fn clear(&self, key: &StorageKey) {
        if let Err(e) = self.store.remove(key.as_str()) {
            log::debug!("Failed to clear {}: {}", key, e);
        }
    }
}

enum WriteMsg {
    Save(StorageKey, PersistedRecord),
    Clear(StorageKey),
    Flush(Sender<()>),
}

/// Fire-and-forget writer thread in front of a [`PersistenceAdapter`].
///
/// Loads stay synchronous (hydration happens once, at mount). Saves are queued
/// and applied in order. If the thread cannot be spawned, saves fall back to
/// inline writes.
pub struct PersistenceWriter {
    adapter: Arc<PersistenceAdapter<Arc<dyn KvStore>>>,
    tx: Option<Sender<WriteMsg>>,
    handle: Option<JoinHandle<()>>,
}

impl PersistenceWriter {
    pub fn spawn(store: Arc<dyn KvStore>) -> Self {
        let adapter = Arc::new(PersistenceAdapter::new(store));
        let (tx, rx) = mpsc::channel::<WriteMsg>();
        let worker = Arc::clone(&adapter);

        let spawned = thread::Builder::new()
            .name("playpen-persist".to_string())
            .spawn(move || {
                for msg in rx {
                    match msg {
                        WriteMsg::Save(key, record) => worker.save(&key, &record),
                        WriteMsg::Clear(key) => worker.clear(&key),
                        WriteMsg::Flush(done) => {
                            let _ = done.send(());
                        }
                    }
                }
            });

        match spawned {
            Ok(handle) => Self {
                adapter,
                tx: Some(tx),
                handle: Some(handle),
            },
            Err(e) => {
                log::warn!("Persistence writer thread unavailable, writing inline: {}", e);
                Self {
                    adapter,
                    tx: None,
                    handle: None,
                }
            }
        }
    }

    fn send(&self, msg: WriteMsg) {
        let Some(tx) = &self.tx else {
            match msg {
                WriteMsg::Save(key, record) => self.adapter.save(&key, &record),
                WriteMsg::Clear(key) => self.adapter.clear(&key),
                WriteMsg::Flush(_) => {}
            }
            return;
        };
        if tx.send(msg).is_err() {
            log::debug!("Persistence writer gone; write dropped");
        }
    }
}

impl RecordStore for PersistenceWriter {
    fn load(&self, key: &StorageKey) -> Option<PersistedRecord> {
        self.adapter.load(key)
    }

    fn save(&self, key: &StorageKey, record: &PersistedRecord) {
        self.send(WriteMsg::Save(key.clone(), record.clone()));
    }

    fn clear(&self, key: &StorageKey) {
        self.send(WriteMsg::Clear(key.clone()));
    }

    fn flush(&self) {
        if self.tx.is_none() {
            return;
        }
        let (done_tx, done_rx) = mpsc::channel();
        self.send(WriteMsg::Flush(done_tx));
        let _ = done_rx.recv();
    }
}

impl Drop for PersistenceWriter {
    fn drop(&mut self) {
        // Closing the channel ends the worker loop after queued writes.
        self.tx.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playpen_core::{EditBuffers, SlotId};

    fn sample() -> PersistedRecord {
        let mut buffers = EditBuffers::new();
        buffers.set(SlotId(1), "B2");
        PersistedRecord::new(SlotId(1), &buffers, true)
    }

    #[test]
    fn test_adapter_round_trip() {
        let adapter = PersistenceAdapter::new(MemoryStore::new());
        let key = StorageKey::derive("Round Trip");
        adapter.save(&key, &sample());
        assert_eq!(adapter.load(&key), Some(sample()));
        adapter.clear(&key);
        assert_eq!(adapter.load(&key), None);
    }

    #[test]
    fn test_corrupt_value_reads_as_absent() {
        let store = MemoryStore::new();
        let key = StorageKey::derive("Corrupt");
        store.insert_raw(key.as_str(), "{\"step\": tru");
        let adapter = PersistenceAdapter::new(store);
        assert_eq!(adapter.load(&key), None);
    }

    #[test]
    fn test_failing_store_is_swallowed() {
        let store = MemoryStore::new();
        store.set_failing(true);
        let adapter = PersistenceAdapter::new(store.clone());
        let key = StorageKey::derive("Quota");
        adapter.save(&key, &sample());
        assert_eq!(adapter.load(&key), None);
        store.set_failing(false);
        assert!(store.is_empty());
    }

    #[test]
    fn test_writer_applies_writes_in_order() {
        let store = MemoryStore::new();
        let writer = PersistenceWriter::spawn(Arc::new(store.clone()));
        let key = StorageKey::derive("Ordered");

        let mut record = sample();
        for step in 0..20 {
            record.step = step;
            writer.save(&key, &record);
        }
        writer.flush();

        assert_eq!(writer.load(&key).map(|r| r.step), Some(19));
    }

    #[test]
    fn test_writer_drains_queue_on_drop() {
        let store = MemoryStore::new();
        let key = StorageKey::derive("Drop");
        {
            let writer = PersistenceWriter::spawn(Arc::new(store.clone()));
            writer.save(&key, &sample());
        }
        assert!(store.raw(key.as_str()).is_some());
    }
}
