// ## src/authz.rs

//! Centralized track authorization.
//!
//! Design notes:
//! - One access matrix, one place. Route handlers never compare owner ids
//!   themselves; they ask this service and receive a scoped access token.
//! - Tokens are opaque 32-hex references to store records under
//!   `track_access:`, TTL 30 minutes; validation re-checks every bound
//!   field. IP binding tolerates carrier NAT rotating the last IPv4 octet.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::ServiceError;
use crate::ip::ips_match_with_tolerance;
use crate::store::{prefix, KeyValueStore};

/// Default lifetime of a track access token.
pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 30;

/// User id recorded for unauthenticated grants on public tracks.
pub const ANONYMOUS_USER: &str = "anonymous";

/// Operation a caller requests on a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackOperation {
    Read,
    Stream,
    Write,
    Delete,
}

impl TrackOperation {
    pub const fn as_str(self) -> &'static str {
        match self {
            TrackOperation::Read => "read",
            TrackOperation::Stream => "stream",
            TrackOperation::Write => "write",
            TrackOperation::Delete => "delete",
        }
    }

    /// Parse a wire operation name. Unknown names yield `None`; the caller
    /// denies them before reaching the matrix.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "read" => Some(TrackOperation::Read),
            "stream" => Some(TrackOperation::Stream),
            "write" => Some(TrackOperation::Write),
            "delete" => Some(TrackOperation::Delete),
            _ => None,
        }
    }
}

impl fmt::Display for TrackOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Track metadata supplied by the external metadata store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackMeta {
    pub owner_id: String,
    pub is_public: bool,
}

/// Metadata-store collaborator.
#[async_trait]
pub trait TrackStore: Send + Sync {
    async fn get_track_by_id(&self, track_id: &str) -> Result<Option<TrackMeta>, ServiceError>;
}

/// Stored access grant, keyed by its token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessRecord {
    pub track_id: String,
    pub user_id: String,
    pub operation: TrackOperation,
    pub client_ip: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

pub struct AuthorizationService {
    tracks: Arc<dyn TrackStore>,
    store: Arc<dyn KeyValueStore>,
    secret_key: String,
}

impl AuthorizationService {
    pub fn new(
        tracks: Arc<dyn TrackStore>,
        store: Arc<dyn KeyValueStore>,
        secret_key: impl Into<String>,
    ) -> Self {
        Self { tracks, store, secret_key: secret_key.into() }
    }

    /// Check the access matrix and, on success, mint a scoped access token.
    ///
    /// | operation     | public track | private track |
    /// |---------------|--------------|---------------|
    /// | read, stream  | anyone       | owner only    |
    /// | write, delete | owner only   | owner only    |
    pub async fn check_track_access(
        &self,
        track_id: &str,
        user_id: Option<&str>,
        operation: TrackOperation,
        client_ip: Option<&str>,
    ) -> Result<(TrackMeta, String), ServiceError> {
        let track = match self.tracks.get_track_by_id(track_id).await? {
            Some(track) => track,
            None => {
                warn!(%track_id, user = user_id.unwrap_or(ANONYMOUS_USER), "track not found");
                return Err(ServiceError::NotFound(format!("track {track_id} not found")));
            }
        };

        let is_owner = user_id.is_some_and(|u| u == track.owner_id);
        let granted = match operation {
            TrackOperation::Read | TrackOperation::Stream => track.is_public || is_owner,
            TrackOperation::Write | TrackOperation::Delete => is_owner,
        };

        if !granted {
            warn!(
                %track_id,
                %operation,
                user = user_id.unwrap_or(ANONYMOUS_USER),
                "access denied"
            );
            return Err(match user_id {
                None => ServiceError::Unauthenticated("authentication required".to_string()),
                Some(_) => ServiceError::Forbidden(
                    "you do not have permission to access this track".to_string(),
                ),
            });
        }

        let token = self.mint_access_token(track_id, user_id, operation, client_ip).await?;
        info!(%track_id, %operation, user = user_id.unwrap_or(ANONYMOUS_USER), "access granted");
        Ok((track, token))
    }

    async fn mint_access_token(
        &self,
        track_id: &str,
        user_id: Option<&str>,
        operation: TrackOperation,
        client_ip: Option<&str>,
    ) -> Result<String, ServiceError> {
        let now = Utc::now();
        let user = user_id.unwrap_or(ANONYMOUS_USER);
        let session_data = format!(
            "{track_id}:{user}:{operation}:{ip}:{now}",
            ip = client_ip.unwrap_or_default(),
            now = now.to_rfc3339()
        );
        let token = {
            let mut hasher = Sha256::new();
            hasher.update(session_data.as_bytes());
            hasher.update(self.secret_key.as_bytes());
            hasher.update(random_hex_16().as_bytes());
            hex::encode(hasher.finalize())[..32].to_string()
        };

        let record = AccessRecord {
            track_id: track_id.to_string(),
            user_id: user.to_string(),
            operation,
            client_ip: client_ip.map(str::to_string),
            created_at: now,
            expires_at: now + ChronoDuration::minutes(ACCESS_TOKEN_TTL_MINUTES),
        };
        let value = serde_json::to_string(&record)
            .map_err(|e| ServiceError::Internal(format!("access record encode: {e}")))?;
        self.store
            .put(
                &format!("{}{token}", prefix::TRACK_ACCESS),
                value,
                Duration::from_secs(ACCESS_TOKEN_TTL_MINUTES as u64 * 60),
            )
            .await?;
        Ok(token)
    }

    /// Validate a previously minted token against the request at hand.
    pub async fn validate_access_token(
        &self,
        token: &str,
        track_id: &str,
        user_id: Option<&str>,
        operation: TrackOperation,
        client_ip: Option<&str>,
    ) -> Result<bool, ServiceError> {
        let key = format!("{}{token}", prefix::TRACK_ACCESS);
        let raw = match self.store.get(&key).await? {
            Some(raw) => raw,
            None => {
                warn!(token = &token[..token.len().min(8)], "invalid or expired access token");
                return Ok(false);
            }
        };
        let record: AccessRecord = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(err) => {
                warn!(%err, "unreadable access record; dropping");
                self.store.delete(&key).await?;
                return Ok(false);
            }
        };

        if Utc::now() > record.expires_at {
            self.store.delete(&key).await?;
            return Ok(false);
        }
        if record.track_id != track_id {
            warn!(expected = %track_id, got = %record.track_id, "track id mismatch in access token");
            return Ok(false);
        }
        if record.operation != operation {
            warn!(expected = %operation, got = %record.operation, "operation mismatch in access token");
            return Ok(false);
        }
        if let Some(user) = user_id {
            if record.user_id != user {
                warn!("user id mismatch in access token");
                return Ok(false);
            }
        }
        if let (Some(current), Some(stored)) = (client_ip, record.client_ip.as_deref()) {
            if !ips_match_with_tolerance(stored, current) {
                warn!(%stored, %current, "ip mismatch in access token");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Drop every access token held by one user.
    pub async fn revoke_user_tokens(&self, user_id: &str) -> Result<usize, ServiceError> {
        let mut revoked = 0usize;
        for (key, raw) in self.store.scan_prefix(prefix::TRACK_ACCESS).await? {
            if let Ok(record) = serde_json::from_str::<AccessRecord>(&raw) {
                if record.user_id == user_id {
                    self.store.delete(&key).await?;
                    revoked += 1;
                }
            }
        }
        info!(%user_id, revoked, "revoked user access tokens");
        Ok(revoked)
    }

    /// Per-session watermark id: unpredictable, not reversible, stable only
    /// for the audit log that records it.
    pub fn generate_watermark_id(
        &self,
        track_id: &str,
        user_id: Option<&str>,
        client_ip: Option<&str>,
        session_token: &str,
    ) -> String {
        let entropy = format!(
            "{track_id}:{user}:{ip}:{session_token}:{now}",
            user = user_id.unwrap_or(ANONYMOUS_USER),
            ip = client_ip.unwrap_or_default(),
            now = Utc::now().to_rfc3339()
        );
        let mut hasher = Sha256::new();
        hasher.update(entropy.as_bytes());
        hasher.update(self.secret_key.as_bytes());
        hasher.update(random_hex_16().as_bytes());
        let tag = hex::encode(hasher.finalize())[..16].to_string();
        format!("{track_id}_{tag}")
    }
}

/// 16 random bytes as 32 hex chars.
fn random_hex_16() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
