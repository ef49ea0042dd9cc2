// ## src/crypto/kdf.rs

//! Key derivation for the chaotic cipher.
//!
//! Design:
//! - PBKDF2-HMAC-SHA256(password, salt) -> 64-byte master key.
//! - BLAKE2b with a distinct `personal` string per lattice component
//!   separates the master key into state, parameter and coupling subkeys.
//! - The MAC key comes from a second PBKDF2 run under `salt || "HMAC_DERIVE"`
//!   so keystream and MAC keys can never coincide.
//!
//! Security notes:
//! - Never feed the master key to the lattice directly; always derive.
//! - Salt must be fresh per encryption and stored in the blob.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use byteorder::{BigEndian, ByteOrder};
use pbkdf2::pbkdf2_hmac;
use sha2::{Digest, Sha256};

use crate::constants::{
    domains, MASTER_KEY_LEN, SUBKEY_LEN, TRACK_KEY_ITERATIONS, TRACK_KEY_SALT_PREFIX,
};
use crate::crypto::lattice::CmlState;
use crate::modes::PerformanceMode;

/// Derive the 64-byte master key for one encryption.
pub fn derive_master_key(password: &str, salt: &[u8], iterations: u32) -> [u8; MASTER_KEY_LEN] {
    let mut master = [0u8; MASTER_KEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut master);
    master
}

/// BLAKE2b-personalised 32-byte subkey of the master key.
fn personalised_subkey(master: &[u8], personal: &[u8]) -> [u8; SUBKEY_LEN] {
    let hash = blake2b_simd::Params::new()
        .hash_length(SUBKEY_LEN)
        .personal(personal)
        .hash(master);
    let mut subkey = [0u8; SUBKEY_LEN];
    subkey.copy_from_slice(hash.as_bytes());
    subkey
}

/// Derive the full lattice state for `(password, salt, mode)`.
///
/// Each site takes two big-endian subkey bytes `s` and maps them into the
/// open intervals that keep the logistic maps chaotic and off their fixed
/// points: `x[i] = 0.1 + (s/65535)*0.8`, `r[i] = 3.8 + (s/65535)*0.2`.
/// The coupling takes the first four bytes of its subkey as big-endian
/// `q` and maps `eps = 0.1 + (q/(2^32-1))*0.3`.
pub fn derive_cml_state(password: &str, salt: &[u8], mode: PerformanceMode) -> CmlState {
    let master = derive_master_key(password, salt, mode.pbkdf2_iterations());

    let x_key = personalised_subkey(&master, domains::INIT_STATE);
    let r_key = personalised_subkey(&master, domains::PARAMETERS);
    let eps_key = personalised_subkey(&master, domains::COUPLING);

    let lattice = mode.lattice_size();
    let mut x = [0f64; crate::constants::MAX_LATTICE_SIZE];
    let mut r = [0f64; crate::constants::MAX_LATTICE_SIZE];
    for i in 0..lattice {
        // Two bytes per site; 2 * 16 sites exactly consumes a 32-byte subkey.
        let s = BigEndian::read_u16(&x_key[i * 2..i * 2 + 2]) as f64;
        x[i] = 0.1 + (s / 65535.0) * 0.8;

        let s = BigEndian::read_u16(&r_key[i * 2..i * 2 + 2]) as f64;
        r[i] = 3.8 + (s / 65535.0) * 0.2;
    }

    let q = BigEndian::read_u32(&eps_key[..4]) as f64;
    let epsilon = 0.1 + (q / (u32::MAX as f64)) * 0.3;

    CmlState::new(x, r, lattice, epsilon, mode)
}

/// Derive the 32-byte HMAC key bound to this blob's salt.
pub fn derive_hmac_key(password: &str, salt: &[u8], iterations: u32) -> [u8; SUBKEY_LEN] {
    let mut salted = Vec::with_capacity(salt.len() + crate::constants::HMAC_SALT_SUFFIX.len());
    salted.extend_from_slice(salt);
    salted.extend_from_slice(crate::constants::HMAC_SALT_SUFFIX);

    let mut key = [0u8; SUBKEY_LEN];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), &salted, iterations, &mut key);
    key
}

/// Derive the per-track protection password from `(user_id, track_id)` and
/// the deployment master secret.
///
/// The salt is deterministic per track (`SHA-256("audio_protection:" ||
/// track_id)`) so the same triplet always yields the same key; the output is
/// Base64 so it can flow through the cipher's string password interface and
/// always passes the strength gate.
pub fn derive_track_key(user_id: &str, track_id: &str, master_secret: &str) -> String {
    let salt = Sha256::digest(format!("{TRACK_KEY_SALT_PREFIX}{track_id}").as_bytes());
    let combined = format!("{user_id}:{track_id}:{master_secret}");

    let mut key = [0u8; SUBKEY_LEN];
    pbkdf2_hmac::<Sha256>(combined.as_bytes(), &salt, TRACK_KEY_ITERATIONS, &mut key);
    BASE64.encode(key)
}
