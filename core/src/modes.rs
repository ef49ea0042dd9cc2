// ## src/modes.rs

//! Performance profiles for the chaotic cipher.
//!
//! Design notes:
//! - Each mode fixes the full tuple the keystream depends on: lattice size,
//!   transient length, PBKDF2 schedule, emission chunk size and mixing
//!   policy. Two parties must agree on the mode to interoperate.
//! - The mode is always an explicit parameter. Nothing in the cipher reads
//!   the environment; only the service configuration layer does.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Cipher tuning profile.
///
/// `Fast` is a development profile: a single lattice site, a near-empty
/// transient and a 10-iteration PBKDF2 schedule. Production configuration
/// refuses it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PerformanceMode {
    Fast,
    #[default]
    Balanced,
    Secure,
}

impl PerformanceMode {
    /// Number of coupled logistic-map sites.
    pub const fn lattice_size(self) -> usize {
        match self {
            PerformanceMode::Fast => 1,
            PerformanceMode::Balanced => 8,
            PerformanceMode::Secure => 16,
        }
    }

    /// Leading evolutions discarded before any byte is emitted.
    pub const fn transient_steps(self) -> u32 {
        match self {
            PerformanceMode::Fast => 5,
            PerformanceMode::Balanced => 500,
            PerformanceMode::Secure => 1000,
        }
    }

    /// PBKDF2-HMAC-SHA256 iteration count for master and MAC keys.
    pub const fn pbkdf2_iterations(self) -> u32 {
        match self {
            PerformanceMode::Fast => 10,
            PerformanceMode::Balanced => 5000,
            PerformanceMode::Secure => 10_000,
        }
    }

    /// Emission chunk size. Throughput-only: chunk boundaries never change
    /// the keystream bytes.
    pub const fn chunk_size(self) -> usize {
        match self {
            PerformanceMode::Fast => 8192,
            PerformanceMode::Balanced | PerformanceMode::Secure => 2048,
        }
    }

    /// Transient steps between cyclic lattice rotations.
    pub const fn scramble_freq(self) -> u32 {
        match self {
            PerformanceMode::Fast => 50,
            PerformanceMode::Balanced | PerformanceMode::Secure => 100,
        }
    }

    /// Fast emits raw site bytes (xor-only); the other modes rotate each
    /// site byte by its index and bit-diffuse the result.
    pub const fn full_mixing(self) -> bool {
        !matches!(self, PerformanceMode::Fast)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            PerformanceMode::Fast => "fast",
            PerformanceMode::Balanced => "balanced",
            PerformanceMode::Secure => "secure",
        }
    }
}

impl fmt::Display for PerformanceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognised performance-mode name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownModeError(pub String);

impl fmt::Display for UnknownModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown performance mode: {:?} (expected fast, balanced or secure)", self.0)
    }
}

impl std::error::Error for UnknownModeError {}

impl FromStr for PerformanceMode {
    type Err = UnknownModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(PerformanceMode::Fast),
            "balanced" => Ok(PerformanceMode::Balanced),
            "secure" => Ok(PerformanceMode::Secure),
            other => Err(UnknownModeError(other.to_string())),
        }
    }
}
