// ## src/token.rs

//! Short-lived signed URL tokens for HLS resources.
//!
//! Goal: allow public playback while making casual downloading and link
//! sharing expire under the fetcher's feet. Tokens are JWTs (HS256) bound
//! to the track id and optionally to the caller's IP and Range header.
//!
//! Unlike session validation there is no IP tolerance here: these tokens
//! are per-request, so the binding is exact.

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ServiceError;

/// Default token lifetime: two minutes, tightened against scraping.
pub const TRACK_TOKEN_TTL: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackClaims {
    pub track_id: String,
    /// Unix seconds; enforced by the JWT layer.
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng: Option<String>,
}

/// Sign a short-lived envelope for one HLS resource.
pub fn create_track_token(
    secret_key: &str,
    track_id: &str,
    ip: Option<&str>,
    range_header: Option<&str>,
    ttl: Duration,
) -> Result<String, ServiceError> {
    let claims = TrackClaims {
        track_id: track_id.to_string(),
        exp: Utc::now().timestamp() + ttl.as_secs() as i64,
        ip: ip.map(str::to_string),
        rng: range_header.map(str::to_string),
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret_key.as_bytes()),
    )
    .map_err(|e| ServiceError::Internal(format!("track token encode: {e}")))
}

/// Verify a signed envelope against the resource being fetched.
///
/// Signature and expiry problems are `Unauthenticated`; a valid token bound
/// to different parameters is `Forbidden`.
pub fn verify_track_token(
    secret_key: &str,
    token: &str,
    expected_track_id: &str,
    ip: Option<&str>,
    range_header: Option<&str>,
) -> Result<(), ServiceError> {
    let mut validation = Validation::new(Algorithm::HS256);
    // A 2-minute token cannot afford the default 60 s leeway.
    validation.leeway = 0;

    let claims = decode::<TrackClaims>(
        token,
        &DecodingKey::from_secret(secret_key.as_bytes()),
        &validation,
    )
    .map_err(|_| ServiceError::Unauthenticated("invalid token".to_string()))?
    .claims;

    if claims.track_id != expected_track_id {
        return Err(ServiceError::Forbidden("token track mismatch".to_string()));
    }
    if let Some(bound_ip) = claims.ip.as_deref() {
        if ip != Some(bound_ip) {
            return Err(ServiceError::Forbidden("ip mismatch".to_string()));
        }
    }
    if let Some(bound_range) = claims.rng.as_deref() {
        if range_header.unwrap_or_default() != bound_range {
            return Err(ServiceError::Forbidden("range header mismatch".to_string()));
        }
    }
    Ok(())
}
