// ## src/store/memory.rs

//! In-process key-value store: a mutex-guarded map with lazy expiry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::store::KeyValueStore;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Process-local store. Expired entries are dropped lazily on access and
/// during prefix scans; nothing here blocks long enough to need an async
/// mutex.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries (test/monitoring helper).
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.lock().unwrap().values().filter(|e| e.is_live(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), ServiceError> {
        let entry = Entry { value, expires_at: Instant::now() + ttl };
        self.entries.lock().unwrap().insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, ServiceError> {
        let now = Instant::now();
        match self.entries.lock().unwrap().remove(key) {
            Some(entry) => Ok(entry.is_live(now)),
            None => Ok(false),
        }
    }

    async fn put_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<bool, ServiceError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        if let Some(existing) = entries.get(key) {
            if existing.is_live(now) {
                return Ok(false);
            }
        }
        entries.insert(key.to_string(), Entry { value, expires_at: now + ttl });
        Ok(true)
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, ServiceError> {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();

        // Drop whatever expired on the way through; the scan doubles as the
        // lazy garbage pass.
        entries.retain(|_, entry| entry.is_live(now));

        Ok(entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, entry)| (key.clone(), entry.value.clone()))
            .collect())
    }
}
