// ## src/blob.rs

//! On-disk protected blob: `salt[32] || mac[32] || ciphertext[N]`.
//!
//! Design notes:
//! - All fields sit at fixed offsets; there is no header versioning. The
//!   MAC covers `salt || ciphertext` so neither can be swapped between
//!   blobs without detection.
//! - `split` borrows: callers verify the MAC before copying anything out.

use crate::constants::{BLOB_OVERHEAD, MAC_LEN, SALT_LEN};
use crate::types::CipherError;

/// Borrowed view over an encoded protected blob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProtectedBlob<'a> {
    pub salt: &'a [u8],
    pub mac: &'a [u8],
    pub ciphertext: &'a [u8],
}

impl<'a> ProtectedBlob<'a> {
    /// Split an encoded blob into its fixed-offset parts.
    ///
    /// Errors with `MalformedBlob` when the input cannot hold the
    /// `salt || mac` overhead. Zero-length ciphertext is valid.
    pub fn split(bytes: &'a [u8]) -> Result<Self, CipherError> {
        if bytes.len() < BLOB_OVERHEAD {
            return Err(CipherError::malformed_blob(bytes.len()));
        }
        let (salt, rest) = bytes.split_at(SALT_LEN);
        let (mac, ciphertext) = rest.split_at(MAC_LEN);
        Ok(Self { salt, mac, ciphertext })
    }

    /// Assemble the wire encoding from its parts.
    pub fn assemble(salt: &[u8; SALT_LEN], mac: &[u8; MAC_LEN], ciphertext: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(BLOB_OVERHEAD + ciphertext.len());
        out.extend_from_slice(salt);
        out.extend_from_slice(mac);
        out.extend_from_slice(ciphertext);
        out
    }
}
