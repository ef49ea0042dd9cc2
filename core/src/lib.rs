//! sectify-core
//!
//! Pure Rust chaotic stream cipher engine for protected audio at rest.
//! No async runtime, no I/O beyond the digest helpers: the service layer
//! owns scheduling and offloads this crate's CPU-bound work to workers.

#![forbid(unsafe_code)]

// Shared and top level
pub mod blob;
pub mod constants;
pub mod modes;
pub mod types;

// Cipher layers
pub mod crypto;

pub use blob::ProtectedBlob;
pub use crypto::cipher::ChaoticCipher;
pub use modes::PerformanceMode;
pub use types::CipherError;
