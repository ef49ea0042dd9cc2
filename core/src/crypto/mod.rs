// ## src/crypto/mod.rs

//! Cipher internals: key derivation, the coupled-map-lattice keystream,
//! the authenticated encrypt/decrypt wrapper and digest helpers.

pub mod cipher;
pub mod digest;
pub mod kdf;
pub mod lattice;

pub use cipher::{validate_key_strength, ChaoticCipher};
pub use kdf::{derive_cml_state, derive_hmac_key, derive_master_key, derive_track_key};
pub use lattice::{ChaosAnalysis, CmlState};
