// ## src/lock.rs

//! Exclusive per-track processing locks.
//!
//! Design notes:
//! - A lock is the pair of (a) a record under `processing_lock:track:op`
//!   claimed with atomic put-if-absent, and (b) a per-track cooperative
//!   mutex that serializes work on the asset inside this process.
//! - The guard releases on every exit path: explicitly via `release`, or
//!   from `Drop` (the record delete is spawned) when the holder's future is
//!   cancelled mid-operation.
//! - Stale records are reclaimed on contact and by a lazy 5-minute sweep.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::runtime::Handle;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::error::ServiceError;
use crate::store::{prefix, KeyValueStore};

/// Concurrent processing cap per user.
pub const MAX_CONCURRENT_PER_USER: usize = 3;

/// Lifetime of a processing-lock record.
pub const LOCK_LIFETIME_MINUTES: i64 = 30;

/// Default wait for the per-track mutex.
pub const DEFAULT_ACQUIRE_WAIT: Duration = Duration::from_secs(60);

/// Default wait in `wait_for_completion`.
pub const DEFAULT_COMPLETION_WAIT: Duration = Duration::from_secs(300);

/// Minimum gap between lazy sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

/// Poll period in `wait_for_completion`.
const COMPLETION_POLL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockRecord {
    pub track_id: String,
    pub user_id: String,
    pub operation: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub process_id: String,
}

impl LockRecord {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Processing view exposed to pollers.
#[derive(Debug, Clone)]
pub struct ActiveLock {
    pub operation: String,
    pub started_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct LockManager {
    store: Arc<dyn KeyValueStore>,
    secret_key: String,
    max_concurrent_per_user: usize,
    lock_lifetime: ChronoDuration,
    mutexes: StdMutex<HashMap<String, Arc<AsyncMutex<()>>>>,
    /// None until the first sweep, so a fresh manager sweeps immediately.
    sweep: AsyncMutex<Option<Instant>>,
}

impl LockManager {
    pub fn new(store: Arc<dyn KeyValueStore>, secret_key: impl Into<String>) -> Self {
        Self {
            store,
            secret_key: secret_key.into(),
            max_concurrent_per_user: MAX_CONCURRENT_PER_USER,
            lock_lifetime: ChronoDuration::minutes(LOCK_LIFETIME_MINUTES),
            mutexes: StdMutex::new(HashMap::new()),
            sweep: AsyncMutex::new(None),
        }
    }

    /// Acquire the processing lock for `(track_id, operation)`.
    ///
    /// Failure kinds: `TooManyRequests` at the per-user cap, `Conflict` when
    /// the key is held (by this user or another), `Timeout` when the
    /// per-track mutex cannot be taken within `max_wait`.
    pub async fn acquire(
        &self,
        track_id: &str,
        user_id: &str,
        operation: &str,
        max_wait: Duration,
    ) -> Result<ProcessingGuard, ServiceError> {
        self.maybe_sweep().await?;

        if self.user_processing_count(user_id).await? >= self.max_concurrent_per_user {
            return Err(ServiceError::TooManyRequests(format!(
                "too many concurrent processing operations (limit: {})",
                self.max_concurrent_per_user
            )));
        }

        let key = lock_key(track_id, operation);
        if let Some(existing) = self.read_lock(&key).await? {
            if existing.user_id == user_id {
                warn!(%user_id, %track_id, "duplicate processing attempt");
                return Err(ServiceError::Conflict(
                    "track is already being processed by you".to_string(),
                ));
            }
            if existing.is_expired(Utc::now()) {
                info!(%track_id, %operation, "reclaiming expired processing lock");
                self.store.delete(&key).await?;
            } else {
                return Err(ServiceError::Conflict(
                    "track is currently being processed by another operation".to_string(),
                ));
            }
        }

        let mutex = {
            let mut mutexes = self.mutexes.lock().unwrap();
            Arc::clone(mutexes.entry(track_id.to_string()).or_default())
        };
        let permit = timeout(max_wait, mutex.lock_owned()).await.map_err(|_| {
            warn!(%track_id, "timeout acquiring per-track mutex");
            ServiceError::Timeout("processing timeout - please try again later".to_string())
        })?;

        let now = Utc::now();
        let record = LockRecord {
            track_id: track_id.to_string(),
            user_id: user_id.to_string(),
            operation: operation.to_string(),
            created_at: now,
            expires_at: now + self.lock_lifetime,
            process_id: self.process_id(track_id, user_id, operation, now),
        };
        let value = serde_json::to_string(&record)
            .map_err(|e| ServiceError::Internal(format!("lock record encode: {e}")))?;

        let lifetime = Duration::from_secs(LOCK_LIFETIME_MINUTES as u64 * 60);
        if !self.store.put_if_absent(&key, value, lifetime).await? {
            // Another process claimed the record between our check and now.
            return Err(ServiceError::Conflict(
                "track is currently being processed by another operation".to_string(),
            ));
        }

        info!(%track_id, %operation, %user_id, "acquired processing lock");
        Ok(ProcessingGuard {
            store: Arc::clone(&self.store),
            key,
            record,
            _permit: permit,
            released: false,
        })
    }

    /// Whether any operation currently holds `track_id`.
    pub async fn get_processing_status(
        &self,
        track_id: &str,
    ) -> Result<Option<ActiveLock>, ServiceError> {
        let now = Utc::now();
        for (_, raw) in self.store.scan_prefix(prefix::PROCESSING_LOCK).await? {
            if let Ok(record) = serde_json::from_str::<LockRecord>(&raw) {
                if record.track_id == track_id && !record.is_expired(now) {
                    return Ok(Some(ActiveLock {
                        operation: record.operation,
                        started_at: record.created_at,
                        expires_at: record.expires_at,
                    }));
                }
            }
        }
        Ok(None)
    }

    /// Tracks this user is currently processing.
    pub async fn user_processing_tracks(&self, user_id: &str) -> Result<Vec<String>, ServiceError> {
        let now = Utc::now();
        let mut tracks = Vec::new();
        for (_, raw) in self.store.scan_prefix(prefix::PROCESSING_LOCK).await? {
            if let Ok(record) = serde_json::from_str::<LockRecord>(&raw) {
                if record.user_id == user_id && !record.is_expired(now) {
                    tracks.push(record.track_id);
                }
            }
        }
        Ok(tracks)
    }

    async fn user_processing_count(&self, user_id: &str) -> Result<usize, ServiceError> {
        Ok(self.user_processing_tracks(user_id).await?.len())
    }

    /// Admin escape hatch: drop every lock a user holds.
    pub async fn force_release_user(&self, user_id: &str) -> Result<usize, ServiceError> {
        let mut released = 0usize;
        for (key, raw) in self.store.scan_prefix(prefix::PROCESSING_LOCK).await? {
            if let Ok(record) = serde_json::from_str::<LockRecord>(&raw) {
                if record.user_id == user_id {
                    self.store.delete(&key).await?;
                    released += 1;
                }
            }
        }
        info!(%user_id, released, "force released user locks");
        Ok(released)
    }

    /// Poll until no lock remains on `track_id`. Returns false on timeout.
    pub async fn wait_for_completion(
        &self,
        track_id: &str,
        max_wait: Duration,
    ) -> Result<bool, ServiceError> {
        let deadline = Instant::now() + max_wait;
        loop {
            if self.get_processing_status(track_id).await?.is_none() {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(COMPLETION_POLL).await;
        }
    }

    async fn maybe_sweep(&self) -> Result<(), ServiceError> {
        {
            let mut last = self.sweep.lock().await;
            if let Some(last) = *last {
                if last.elapsed() < SWEEP_INTERVAL {
                    return Ok(());
                }
            }
            *last = Some(Instant::now());
        }

        let now = Utc::now();
        let mut removed = 0usize;
        for (key, raw) in self.store.scan_prefix(prefix::PROCESSING_LOCK).await? {
            if let Ok(record) = serde_json::from_str::<LockRecord>(&raw) {
                if record.is_expired(now) {
                    warn!(%key, "cleaning up expired processing lock");
                    self.store.delete(&key).await?;
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            info!(removed, "cleaned up expired processing locks");
        }
        Ok(())
    }

    async fn read_lock(&self, key: &str) -> Result<Option<LockRecord>, ServiceError> {
        match self.store.get(key).await? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(record) => Ok(Some(record)),
                Err(err) => {
                    warn!(%err, "unreadable lock record; dropping");
                    self.store.delete(key).await?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    fn process_id(
        &self,
        track_id: &str,
        user_id: &str,
        operation: &str,
        now: DateTime<Utc>,
    ) -> String {
        let mut hasher = Sha256::new();
        hasher.update(
            format!("{track_id}:{user_id}:{operation}:{}:{}", now.to_rfc3339(), self.secret_key)
                .as_bytes(),
        );
        hex::encode(hasher.finalize())[..16].to_string()
    }
}

fn lock_key(track_id: &str, operation: &str) -> String {
    format!("{}{track_id}:{operation}", prefix::PROCESSING_LOCK)
}

/// Held processing lock. Release is idempotent and runs on every exit path;
/// dropping the guard (cancellation included) spawns the record delete.
pub struct ProcessingGuard {
    store: Arc<dyn KeyValueStore>,
    key: String,
    record: LockRecord,
    _permit: OwnedMutexGuard<()>,
    released: bool,
}

impl ProcessingGuard {
    pub fn record(&self) -> &LockRecord {
        &self.record
    }

    /// Remove the lock record and free the per-track mutex.
    pub async fn release(mut self) -> Result<(), ServiceError> {
        self.released = true;
        self.store.delete(&self.key).await?;
        info!(key = %self.key, "released processing lock");
        Ok(())
    }
}

impl Drop for ProcessingGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let store = Arc::clone(&self.store);
        let key = std::mem::take(&mut self.key);
        if let Ok(handle) = Handle::try_current() {
            handle.spawn(async move {
                if store.delete(&key).await.is_ok() {
                    info!(%key, "released processing lock on drop");
                }
            });
        }
    }
}
