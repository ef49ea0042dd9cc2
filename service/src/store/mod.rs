// ## src/store/mod.rs

//! Shared mutable state behind one seam.
//!
//! Design notes:
//! - Sessions, access tokens, processing locks and progress records all live
//!   behind this trait; no component touches a map directly. Values are
//!   UTF-8 JSON, keyed under stable prefixes, each entry carrying its own
//!   TTL.
//! - `put_if_absent` is the atomic set-if-absent the lock manager claims
//!   records with.
//! - Two implementations: the in-process `MemoryStore`, and a Redis adapter
//!   behind the `redis-store` feature with identical semantics.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::ServiceError;

pub mod memory;
#[cfg(feature = "redis-store")]
pub mod redis;

pub use memory::MemoryStore;
#[cfg(feature = "redis-store")]
pub use self::redis::RedisStore;

/// Key prefixes per record family.
pub mod prefix {
    pub const PROGRESS: &str = "progress:";
    pub const SESSION: &str = "session:";
    pub const TRACK_ACCESS: &str = "track_access:";
    pub const PROCESSING_LOCK: &str = "processing_lock:";
    pub const ALIAS: &str = "alias:";
    pub const REVOKED: &str = "revoked:";
}

/// Key-value persistence with per-key TTLs.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Fetch a live value; expired entries read as absent.
    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError>;

    /// Insert or overwrite a value with a fresh TTL.
    async fn put(&self, key: &str, value: String, ttl: Duration) -> Result<(), ServiceError>;

    /// Remove a key; returns whether a live entry existed.
    async fn delete(&self, key: &str) -> Result<bool, ServiceError>;

    /// Atomically insert only when the key has no live entry. Returns true
    /// when this call claimed the key.
    async fn put_if_absent(
        &self,
        key: &str,
        value: String,
        ttl: Duration,
    ) -> Result<bool, ServiceError>;

    /// All live `(key, value)` pairs under a prefix. Used by the sweeps and
    /// the per-user record counts; record families stay small.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, String)>, ServiceError>;
}
