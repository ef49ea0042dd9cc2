// ## src/crypto/cipher.rs

//! Authenticated encrypt-then-MAC wrapper over the CML keystream.
//!
//! Design notes:
//! - Encrypt: strength gate -> size cap -> fresh salt -> derive state ->
//!   chaos sanity check -> keystream XOR -> HMAC-SHA256(salt || ciphertext).
//! - Decrypt verifies the MAC in constant time before any keystream work
//!   and fails closed: no partial plaintext ever leaves this module.
//! - The mode is fixed at construction; both sides must use the same one.

use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use tracing::warn;

use crate::blob::ProtectedBlob;
use crate::constants::{MAC_LEN, MAX_PLAINTEXT_LEN, MIN_KEY_LEN, SALT_LEN};
use crate::crypto::kdf;
use crate::crypto::lattice::CmlState;
use crate::modes::PerformanceMode;
use crate::types::CipherError;

type HmacSha256 = Hmac<Sha256>;

/// Chaotic stream cipher with authenticated encryption.
#[derive(Debug, Clone, Copy)]
pub struct ChaoticCipher {
    mode: PerformanceMode,
    strict_chaos: bool,
}

impl ChaoticCipher {
    /// Cipher that logs chaos-sanity warnings and proceeds.
    pub fn new(mode: PerformanceMode) -> Self {
        Self { mode, strict_chaos: false }
    }

    /// Cipher that rejects on chaos-sanity warnings (production policy).
    pub fn strict(mode: PerformanceMode) -> Self {
        Self { mode, strict_chaos: true }
    }

    pub fn mode(&self) -> PerformanceMode {
        self.mode
    }

    /// Encrypt `plaintext` under `password` into a protected blob.
    pub fn encrypt(&self, plaintext: &[u8], password: &str) -> Result<Vec<u8>, CipherError> {
        self.encrypt_with_progress(plaintext, password, &mut |_, _| {})
    }

    /// Encrypt, reporting `(bytes_emitted, bytes_total)` after every
    /// keystream chunk. The callback runs on the caller's thread.
    pub fn encrypt_with_progress(
        &self,
        plaintext: &[u8],
        password: &str,
        progress: &mut dyn FnMut(u64, u64),
    ) -> Result<Vec<u8>, CipherError> {
        validate_key_strength(password)?;
        if plaintext.len() > MAX_PLAINTEXT_LEN {
            return Err(CipherError::input_too_large(plaintext.len()));
        }

        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);

        let mut state = kdf::derive_cml_state(password, &salt, self.mode);
        self.check_chaos(&state)?;

        let total = plaintext.len() as u64;
        let mut keystream = vec![0u8; plaintext.len()];
        state.generate_into(&mut keystream, |emitted| progress(emitted as u64, total));

        let mut ciphertext = plaintext.to_vec();
        for (c, k) in ciphertext.iter_mut().zip(&keystream) {
            *c ^= k;
        }

        let hmac_key = kdf::derive_hmac_key(password, &salt, self.mode.pbkdf2_iterations());
        let mac = compute_mac(&hmac_key, &salt, &ciphertext);

        Ok(ProtectedBlob::assemble(&salt, &mac, &ciphertext))
    }

    /// Decrypt a protected blob. MAC verification precedes all keystream
    /// work; any failure is terminal.
    pub fn decrypt(&self, blob_bytes: &[u8], password: &str) -> Result<Vec<u8>, CipherError> {
        validate_key_strength(password)?;

        let blob = ProtectedBlob::split(blob_bytes)?;

        let hmac_key = kdf::derive_hmac_key(password, blob.salt, self.mode.pbkdf2_iterations());
        verify_mac(&hmac_key, blob.salt, blob.ciphertext, blob.mac)?;

        let mut state = kdf::derive_cml_state(password, blob.salt, self.mode);
        let mut plaintext = blob.ciphertext.to_vec();
        let keystream = state.generate(plaintext.len());
        for (p, k) in plaintext.iter_mut().zip(&keystream) {
            *p ^= k;
        }
        Ok(plaintext)
    }

    fn check_chaos(&self, state: &CmlState) -> Result<(), CipherError> {
        let analysis = state.analyze();
        if analysis.is_chaotic {
            return Ok(());
        }
        if self.strict_chaos {
            return Err(CipherError::ChaosCheckFailed { warnings: analysis.warnings });
        }
        for warning in &analysis.warnings {
            warn!(%warning, "chaotic cipher parameter outside expected regime");
        }
        Ok(())
    }
}

/// Length/diversity gate for cipher passwords: at least 12 characters and
/// at least 3 of {lowercase, uppercase, digit, non-alphanumeric}.
pub fn validate_key_strength(password: &str) -> Result<(), CipherError> {
    if password.chars().count() < MIN_KEY_LEN {
        return Err(CipherError::WeakKey);
    }

    let has_lower = password.chars().any(|c| c.is_lowercase());
    let has_upper = password.chars().any(|c| c.is_uppercase());
    let has_digit = password.chars().any(|c| c.is_numeric());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());

    let classes = [has_lower, has_upper, has_digit, has_special]
        .iter()
        .filter(|&&present| present)
        .count();
    if classes < 3 {
        return Err(CipherError::WeakKey);
    }
    Ok(())
}

fn keyed_mac(key: &[u8], salt: &[u8], ciphertext: &[u8]) -> HmacSha256 {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(salt);
    mac.update(ciphertext);
    mac
}

fn compute_mac(key: &[u8], salt: &[u8], ciphertext: &[u8]) -> [u8; MAC_LEN] {
    keyed_mac(key, salt, ciphertext).finalize().into_bytes().into()
}

/// Constant-time tag comparison via the Mac trait.
fn verify_mac(key: &[u8], salt: &[u8], ciphertext: &[u8], expected: &[u8]) -> Result<(), CipherError> {
    keyed_mac(key, salt, ciphertext)
        .verify_slice(expected)
        .map_err(|_| CipherError::IntegrityFailure)
}
