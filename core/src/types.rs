// ## src/types.rs

use thiserror::Error;

use crate::constants::{BLOB_OVERHEAD, MAX_PLAINTEXT_LEN, MIN_KEY_LEN};

/// Cipher-level failures. Every public cipher operation returns exactly one
/// of these; decryption never yields partial plaintext alongside an error.
#[derive(Debug, Error)]
pub enum CipherError {
    /// Secret key failed the length/diversity strength gate. Raised before
    /// any key derivation work is performed.
    #[error("secret key not strong enough: need at least 12 characters spanning 3 character classes")]
    WeakKey,

    /// Plaintext exceeds the hard size cap. No keystream is allocated.
    #[error("input too large: {actual} bytes exceeds the {limit}-byte cap")]
    InputTooLarge { actual: usize, limit: usize },

    /// Blob shorter than the fixed `salt || mac` overhead.
    #[error("malformed protected blob: {actual} bytes, need at least {min}")]
    MalformedBlob { actual: usize, min: usize },

    /// MAC mismatch, or a decrypted file hashing to the wrong digest.
    #[error("integrity verification failed: data may have been tampered with")]
    IntegrityFailure,

    /// Derived chaos parameters left the chaotic regime and the cipher was
    /// built in strict mode. Non-strict ciphers log and proceed instead.
    #[error("chaos sanity check failed: {}", .warnings.join("; "))]
    ChaosCheckFailed { warnings: Vec<String> },
}

impl CipherError {
    pub(crate) fn input_too_large(actual: usize) -> Self {
        CipherError::InputTooLarge { actual, limit: MAX_PLAINTEXT_LEN }
    }

    pub(crate) fn malformed_blob(actual: usize) -> Self {
        CipherError::MalformedBlob { actual, min: BLOB_OVERHEAD }
    }
}

// MIN_KEY_LEN is baked into the WeakKey message; keep the two in sync.
const _: () = assert!(MIN_KEY_LEN == 12);
