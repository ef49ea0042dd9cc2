// ## src/session.rs

//! User session tracking with per-user caps and revocation.
//!
//! Design notes:
//! - Sessions live under `session:` in the shared store; the revoked set is
//!   `revoked:` keys with a 24 h TTL, so audit retention and purge both fall
//!   out of store expiry.
//! - Create/validate/revoke serialize on one async mutex so read-modify-
//!   write sequences (evict oldest, slide expiry) stay atomic in-process.
//! - A user-agent change is logged but not fatal: browsers update.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::ServiceError;
use crate::ip::ips_match_with_tolerance;
use crate::store::{prefix, KeyValueStore};

/// Concurrent session cap per user.
pub const MAX_SESSIONS_PER_USER: usize = 5;

/// How long a revoked session id stays around for audit.
pub const REVOKED_RETENTION_HOURS: i64 = 24;

/// Expiry slides forward by the full TTL once less than this remains.
pub const RENEWAL_WINDOW_MINUTES: i64 = 30;

/// Minimum gap between lazy sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: String,
    pub client_ip: String,
    /// First 16 hex chars of SHA-256 of the creating user agent.
    pub user_agent_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_fingerprint: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub access_count: u64,
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoked_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revoke_reason: Option<String>,
}

pub struct SessionManager {
    store: Arc<dyn KeyValueStore>,
    secret_key: String,
    max_sessions_per_user: usize,
    session_timeout: ChronoDuration,
    ops: Mutex<SweepState>,
}

struct SweepState {
    /// None until the first sweep, so a fresh manager sweeps immediately.
    last_sweep: Option<Instant>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        secret_key: impl Into<String>,
        session_timeout_minutes: i64,
    ) -> Self {
        Self {
            store,
            secret_key: secret_key.into(),
            max_sessions_per_user: MAX_SESSIONS_PER_USER,
            session_timeout: ChronoDuration::minutes(session_timeout_minutes),
            ops: Mutex::new(SweepState { last_sweep: None }),
        }
    }

    /// Create a session, evicting the user's oldest one at the cap.
    pub async fn create_session(
        &self,
        user_id: &str,
        client_ip: &str,
        user_agent: &str,
        device_fingerprint: Option<&str>,
    ) -> Result<String, ServiceError> {
        let mut state = self.ops.lock().await;
        self.maybe_sweep(&mut state).await?;

        let current = self.active_user_sessions(user_id).await?;
        if current.len() >= self.max_sessions_per_user {
            if let Some(oldest) = current.iter().min_by_key(|s| s.created_at) {
                let oldest_id = oldest.session_id.clone();
                self.revoke_locked(&oldest_id, "session_limit_exceeded").await?;
                info!(
                    session = &oldest_id[..8],
                    %user_id,
                    "revoked oldest session at the per-user cap"
                );
            }
        }

        let now = Utc::now();
        let mut random = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut random);
        let entropy = format!(
            "{user_id}:{client_ip}:{user_agent}:{}:{}",
            now.to_rfc3339(),
            hex::encode(random)
        );
        let session_id = {
            let mut hasher = Sha256::new();
            hasher.update(entropy.as_bytes());
            hasher.update(self.secret_key.as_bytes());
            hex::encode(hasher.finalize())
        };

        let record = SessionRecord {
            session_id: session_id.clone(),
            user_id: user_id.to_string(),
            client_ip: client_ip.to_string(),
            user_agent_hash: user_agent_hash(user_agent),
            device_fingerprint: device_fingerprint.map(str::to_string),
            created_at: now,
            last_accessed: now,
            expires_at: now + self.session_timeout,
            access_count: 0,
            is_active: true,
            revoked_at: None,
            revoke_reason: None,
        };
        self.write_session(&record).await?;

        info!(session = &session_id[..8], %user_id, %client_ip, "created session");
        Ok(session_id)
    }

    /// Validate a session for one request, updating its activity counters
    /// and sliding the expiry when it is close to running out.
    ///
    /// Returns the live record, or `None` when the session must not be
    /// honoured (missing, revoked, expired, or IP outside tolerance).
    pub async fn validate_session(
        &self,
        session_id: &str,
        client_ip: &str,
        user_agent: &str,
        require_ip_match: bool,
    ) -> Result<Option<SessionRecord>, ServiceError> {
        let mut state = self.ops.lock().await;
        self.maybe_sweep(&mut state).await?;

        let short = &session_id[..session_id.len().min(8)];
        let mut record = match self.read_session(session_id).await? {
            Some(record) => record,
            None => {
                warn!(session = short, "session not found");
                return Ok(None);
            }
        };

        if self.is_revoked(session_id).await? || !record.is_active {
            warn!(session = short, "attempt to use revoked session");
            return Ok(None);
        }

        let now = Utc::now();
        if now > record.expires_at {
            warn!(session = short, "expired session access attempt");
            self.revoke_locked(session_id, "expired").await?;
            return Ok(None);
        }

        if require_ip_match && !ips_match_with_tolerance(&record.client_ip, client_ip) {
            warn!(
                session = short,
                expected = %record.client_ip,
                got = %client_ip,
                "ip mismatch for session"
            );
            return Ok(None);
        }

        if record.user_agent_hash != user_agent_hash(user_agent) {
            // Not fatal: a browser update changes the UA. Log for monitoring.
            warn!(session = short, "user agent mismatch for session");
        }

        record.last_accessed = now;
        record.access_count += 1;
        if record.expires_at - now < ChronoDuration::minutes(RENEWAL_WINDOW_MINUTES) {
            record.expires_at = now + self.session_timeout;
            debug!(session = short, "extended session expiration");
        }
        self.write_session(&record).await?;

        Ok(Some(record))
    }

    pub async fn revoke_session(&self, session_id: &str, reason: &str) -> Result<(), ServiceError> {
        let _state = self.ops.lock().await;
        self.revoke_locked(session_id, reason).await
    }

    /// Revoke all of a user's sessions, optionally keeping one.
    pub async fn revoke_user_sessions(
        &self,
        user_id: &str,
        except_session: Option<&str>,
    ) -> Result<usize, ServiceError> {
        let _state = self.ops.lock().await;
        let mut revoked = 0usize;
        for record in self.active_user_sessions(user_id).await? {
            if Some(record.session_id.as_str()) != except_session {
                self.revoke_locked(&record.session_id, "user_logout_all").await?;
                revoked += 1;
            }
        }
        info!(%user_id, revoked, "revoked user sessions");
        Ok(revoked)
    }

    /// Monitoring view of one session, with the device fingerprint redacted.
    pub async fn get_session_info(
        &self,
        session_id: &str,
    ) -> Result<Option<SessionRecord>, ServiceError> {
        Ok(self.read_session(session_id).await?.map(|mut record| {
            record.device_fingerprint = None;
            record
        }))
    }

    pub async fn user_session_count(&self, user_id: &str) -> Result<usize, ServiceError> {
        Ok(self.active_user_sessions(user_id).await?.len())
    }

    /// Run the sweep immediately regardless of the interval gate.
    pub async fn sweep_now(&self) -> Result<(), ServiceError> {
        let mut state = self.ops.lock().await;
        state.last_sweep = Some(Instant::now());
        self.sweep().await
    }

    // ---- internals (callers hold the ops mutex) ----

    async fn maybe_sweep(&self, state: &mut SweepState) -> Result<(), ServiceError> {
        if let Some(last) = state.last_sweep {
            if last.elapsed() < SWEEP_INTERVAL {
                return Ok(());
            }
        }
        state.last_sweep = Some(Instant::now());
        self.sweep().await
    }

    /// Revoke expired-but-still-active sessions. Purge of old revoked ids
    /// is the store's TTL doing its job; nothing to do here.
    async fn sweep(&self) -> Result<(), ServiceError> {
        let now = Utc::now();
        let mut expired = Vec::new();
        for (_, raw) in self.store.scan_prefix(prefix::SESSION).await? {
            if let Ok(record) = serde_json::from_str::<SessionRecord>(&raw) {
                if record.is_active && record.expires_at < now {
                    expired.push(record.session_id);
                }
            }
        }
        let count = expired.len();
        for session_id in expired {
            self.revoke_locked(&session_id, "expired").await?;
        }
        if count > 0 {
            info!(count, "cleaned up expired sessions");
        }
        Ok(())
    }

    async fn revoke_locked(&self, session_id: &str, reason: &str) -> Result<(), ServiceError> {
        let retention = Duration::from_secs(REVOKED_RETENTION_HOURS as u64 * 3600);

        if let Some(mut record) = self.read_session(session_id).await? {
            record.is_active = false;
            record.revoked_at = Some(Utc::now());
            record.revoke_reason = Some(reason.to_string());

            // Keep the tombstone readable for the audit window.
            let value = encode_session(&record)?;
            self.store
                .put(&format!("{}{session_id}", prefix::SESSION), value, retention)
                .await?;

            let short = &session_id[..session_id.len().min(8)];
            info!(session = short, user_id = %record.user_id, %reason, "revoked session");
        }

        self.store
            .put(
                &format!("{}{session_id}", prefix::REVOKED),
                reason.to_string(),
                retention,
            )
            .await?;
        Ok(())
    }

    async fn is_revoked(&self, session_id: &str) -> Result<bool, ServiceError> {
        Ok(self
            .store
            .get(&format!("{}{session_id}", prefix::REVOKED))
            .await?
            .is_some())
    }

    async fn active_user_sessions(
        &self,
        user_id: &str,
    ) -> Result<Vec<SessionRecord>, ServiceError> {
        let now = Utc::now();
        let mut sessions = Vec::new();
        for (_, raw) in self.store.scan_prefix(prefix::SESSION).await? {
            if let Ok(record) = serde_json::from_str::<SessionRecord>(&raw) {
                if record.user_id == user_id && record.is_active && record.expires_at >= now {
                    sessions.push(record);
                }
            }
        }
        Ok(sessions)
    }

    async fn read_session(&self, session_id: &str) -> Result<Option<SessionRecord>, ServiceError> {
        match self.store.get(&format!("{}{session_id}", prefix::SESSION)).await? {
            Some(raw) => match serde_json::from_str(&raw) {
                Ok(record) => Ok(Some(record)),
                Err(err) => {
                    warn!(%err, "unreadable session record; dropping");
                    self.store.delete(&format!("{}{session_id}", prefix::SESSION)).await?;
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    async fn write_session(&self, record: &SessionRecord) -> Result<(), ServiceError> {
        let ttl = (record.expires_at - Utc::now())
            .to_std()
            .unwrap_or(Duration::from_secs(1));
        self.store
            .put(&format!("{}{}", prefix::SESSION, record.session_id), encode_session(record)?, ttl)
            .await
    }
}

fn encode_session(record: &SessionRecord) -> Result<String, ServiceError> {
    serde_json::to_string(record)
        .map_err(|e| ServiceError::Internal(format!("session record encode: {e}")))
}

/// First 16 hex chars of SHA-256 of the user agent.
fn user_agent_hash(user_agent: &str) -> String {
    hex::encode(Sha256::digest(user_agent.as_bytes()))[..16].to_string()
}
