// ## src/constants.rs

//! Stable geometry and tuning constants for the protected-blob format and
//! the key-derivation schedule.

/// Salt length prepended to every protected blob (bytes).
pub const SALT_LEN: usize = 32;

/// HMAC-SHA256 tag length (bytes).
pub const MAC_LEN: usize = 32;

/// Fixed blob overhead: `salt[32] || mac[32]` precedes the ciphertext.
pub const BLOB_OVERHEAD: usize = SALT_LEN + MAC_LEN;

/// Hard cap on plaintext size accepted by the cipher (50 MiB).
pub const MAX_PLAINTEXT_LEN: usize = 50 * 1024 * 1024;

/// Minimum secret-key length accepted by the strength gate.
pub const MIN_KEY_LEN: usize = 12;

/// Master key length derived by PBKDF2 before domain separation (512 bits).
pub const MASTER_KEY_LEN: usize = 64;

/// Derived subkey length for each lattice component (256 bits).
pub const SUBKEY_LEN: usize = 32;

/// Largest lattice across all performance modes.
pub const MAX_LATTICE_SIZE: usize = 16;

/// Domain-separation personalisation strings for the BLAKE2b subkey
/// derivation. BLAKE2b `personal` accepts at most 16 bytes.
pub mod domains {
    pub const INIT_STATE: &[u8] = b"CML_INIT_STATE"; // 14 bytes
    pub const PARAMETERS: &[u8] = b"CML_PARAMETERS"; // 14 bytes
    pub const COUPLING: &[u8] = b"CML_COUPLING"; // 12 bytes
}

/// Suffix appended to the blob salt when deriving the MAC key, so the MAC
/// key can never collide with the keystream master key.
pub const HMAC_SALT_SUFFIX: &[u8] = b"HMAC_DERIVE";

/// PBKDF2 iteration count for per-track protection keys. Deliberately below
/// the Secure-mode keystream schedule: this key feeds the cipher's own
/// PBKDF2 a second time.
pub const TRACK_KEY_ITERATIONS: u32 = 50_000;

/// Salt domain prefix for per-track protection keys.
pub const TRACK_KEY_SALT_PREFIX: &str = "audio_protection:";
