// ## src/error.rs

//! Classified service errors and the disclosure policy.
//!
//! Design notes:
//! - One enum, one variant per stable kind. Call sites propagate with `?`;
//!   only the cleanup tasks recover (log and continue).
//! - Production responses carry a fixed generic sentence per kind. Internal
//!   failures additionally get an 8-char id that correlates the response
//!   with the server log. Development responses carry the full detail.

use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

use sectify_core::CipherError;

/// The single classified error type returned by every public operation.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("too many requests: {0}")]
    TooManyRequests(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("payload too large: {0}")]
    PayloadTooLarge(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("weak key: {0}")]
    WeakKey(String),
    #[error("integrity failure: {0}")]
    IntegrityFailure(String),
    #[error("malformed blob: {0}")]
    MalformedBlob(String),
    #[error("internal: {0}")]
    Internal(String),
}

/// What a client is allowed to see for one failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicError {
    pub kind: &'static str,
    pub message: String,
    /// Present only for `Internal` in production; correlates with the log.
    pub error_id: Option<String>,
}

impl ServiceError {
    /// Stable kind name, independent of the carried detail.
    pub fn kind(&self) -> &'static str {
        match self {
            ServiceError::Unauthenticated(_) => "unauthenticated",
            ServiceError::Forbidden(_) => "forbidden",
            ServiceError::NotFound(_) => "not_found",
            ServiceError::Conflict(_) => "conflict",
            ServiceError::TooManyRequests(_) => "too_many_requests",
            ServiceError::Timeout(_) => "timeout",
            ServiceError::PayloadTooLarge(_) => "payload_too_large",
            ServiceError::Validation(_) => "validation",
            ServiceError::WeakKey(_) => "weak_key",
            ServiceError::IntegrityFailure(_) => "integrity_failure",
            ServiceError::MalformedBlob(_) => "malformed_blob",
            ServiceError::Internal(_) => "internal",
        }
    }

    /// HTTP status the delivery layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            ServiceError::Unauthenticated(_) => 401,
            ServiceError::Forbidden(_) => 403,
            ServiceError::NotFound(_) => 404,
            ServiceError::Conflict(_) => 409,
            ServiceError::TooManyRequests(_) => 429,
            ServiceError::Timeout(_) => 408,
            ServiceError::PayloadTooLarge(_) => 413,
            ServiceError::Validation(_) | ServiceError::WeakKey(_) => 400,
            ServiceError::IntegrityFailure(_) | ServiceError::MalformedBlob(_) => 422,
            ServiceError::Internal(_) => 500,
        }
    }

    fn generic_message(&self) -> &'static str {
        match self {
            ServiceError::Unauthenticated(_) => "Authentication required",
            ServiceError::Forbidden(_) => "Access denied",
            ServiceError::NotFound(_) => "Resource not found",
            ServiceError::Conflict(_) => "Resource conflict",
            ServiceError::TooManyRequests(_) => "Too many requests",
            ServiceError::Timeout(_) => "Operation timed out - please try again later",
            ServiceError::PayloadTooLarge(_) => "Request entity too large",
            ServiceError::Validation(_) => "Invalid request parameters",
            ServiceError::WeakKey(_) => "Key does not meet strength requirements",
            ServiceError::IntegrityFailure(_) => "Integrity verification failed",
            ServiceError::MalformedBlob(_) => "Invalid protected data",
            ServiceError::Internal(_) => "An unexpected error occurred",
        }
    }

    /// True for the kinds logged as security events.
    pub fn is_security_event(&self) -> bool {
        matches!(
            self,
            ServiceError::Unauthenticated(_)
                | ServiceError::Forbidden(_)
                | ServiceError::NotFound(_)
                | ServiceError::TooManyRequests(_)
        )
    }

    /// Apply the disclosure policy.
    ///
    /// Production suppresses the detail string; an `Internal` error gets a
    /// short id that is also written to the log at error level. Development
    /// returns the original detail prefixed with the kind.
    pub fn public_message(&self, is_production: bool) -> PublicError {
        if !is_production {
            return PublicError {
                kind: self.kind(),
                message: self.to_string(),
                error_id: None,
            };
        }

        let error_id = match self {
            ServiceError::Internal(detail) => {
                let id = short_error_id();
                error!(error_id = %id, %detail, "internal error");
                Some(id)
            }
            _ => None,
        };

        PublicError {
            kind: self.kind(),
            message: self.generic_message().to_string(),
            error_id,
        }
    }
}

impl From<CipherError> for ServiceError {
    fn from(err: CipherError) -> Self {
        let detail = err.to_string();
        match err {
            CipherError::WeakKey => ServiceError::WeakKey(detail),
            CipherError::InputTooLarge { .. } => ServiceError::PayloadTooLarge(detail),
            CipherError::MalformedBlob { .. } => ServiceError::MalformedBlob(detail),
            CipherError::IntegrityFailure => ServiceError::IntegrityFailure(detail),
            CipherError::ChaosCheckFailed { .. } => ServiceError::Validation(detail),
        }
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            ServiceError::NotFound(err.to_string())
        } else {
            ServiceError::Internal(err.to_string())
        }
    }
}

/// 8-char id for correlating a generic client response with the log.
fn short_error_id() -> String {
    Uuid::new_v4().to_string()[..8].to_string()
}

/// Request context attached to security-event log lines. The delivery layer
/// fills this from its own request type.
#[derive(Debug, Clone, Default)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: String,
    pub endpoint: String,
}

/// Log a security-relevant failure at warning level, with the suspicion
/// indicators the monitoring side keys on.
pub fn log_security_event(event: &ServiceError, client: &ClientInfo) {
    let ua = truncate(&client.user_agent, 100);
    let mut indicators: Vec<&str> = Vec::new();
    if client.user_agent.len() < 10 {
        indicators.push("short_ua");
    }
    let ua_lower = client.user_agent.to_lowercase();
    if ua_lower.contains("bot") || ua_lower.contains("crawler") {
        indicators.push("bot_ua");
    }

    warn!(
        kind = event.kind(),
        client_ip = %client.ip,
        user_agent = %ua,
        endpoint = %client.endpoint,
        suspicion = ?indicators,
        "security event"
    );
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
