// ## src/progress.rs

//! Progress publication for long-running protection jobs.
//!
//! `set` overwrites the record for a track, `get` returns the latest;
//! consumers poll. Records live under `progress:` with a one-hour TTL so
//! finished jobs age out on their own.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use sectify_core::PerformanceMode;

use crate::error::ServiceError;
use crate::store::{prefix, KeyValueStore};

/// TTL for progress records.
const PROGRESS_TTL: Duration = Duration::from_secs(3600);

/// Seconds per encrypted MiB, by mode, for the duration estimate.
const SECONDS_PER_MIB_FAST: f64 = 0.5;
const SECONDS_PER_MIB_BALANCED: f64 = 6.0;
const SECONDS_PER_MIB_SECURE: f64 = 15.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressStatus {
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub track_id: String,
    pub status: ProgressStatus,
    pub progress_percent: f64,
    pub current_step: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_remaining: Option<f64>,
    pub performance_mode: PerformanceMode,
    pub updated_at: DateTime<Utc>,
}

/// Publisher/reader over the shared store.
#[derive(Clone)]
pub struct ProgressTracker {
    store: Arc<dyn KeyValueStore>,
}

impl ProgressTracker {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Publish a progress update. Reaching 100 flips the status to
    /// completed, mirroring how consumers interpret the bar.
    pub async fn update(
        &self,
        track_id: &str,
        progress_percent: f64,
        current_step: &str,
        performance_mode: PerformanceMode,
        estimated_remaining: Option<f64>,
    ) -> Result<(), ServiceError> {
        let status = if progress_percent < 100.0 {
            ProgressStatus::Processing
        } else {
            ProgressStatus::Completed
        };
        self.write(ProgressRecord {
            track_id: track_id.to_string(),
            status,
            progress_percent,
            current_step: current_step.to_string(),
            estimated_remaining,
            performance_mode,
            updated_at: Utc::now(),
        })
        .await
    }

    /// Publish a terminal failure for this processing episode.
    pub async fn fail(
        &self,
        track_id: &str,
        reason: &str,
        performance_mode: PerformanceMode,
    ) -> Result<(), ServiceError> {
        self.write(ProgressRecord {
            track_id: track_id.to_string(),
            status: ProgressStatus::Failed,
            progress_percent: 0.0,
            current_step: reason.to_string(),
            estimated_remaining: None,
            performance_mode,
            updated_at: Utc::now(),
        })
        .await
    }

    pub async fn get(&self, track_id: &str) -> Result<Option<ProgressRecord>, ServiceError> {
        match self.store.get(&format!("{}{track_id}", prefix::PROGRESS)).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| ServiceError::Internal(format!("progress record decode: {e}"))),
            None => Ok(None),
        }
    }

    async fn write(&self, record: ProgressRecord) -> Result<(), ServiceError> {
        let key = format!("{}{}", prefix::PROGRESS, record.track_id);
        let value = serde_json::to_string(&record)
            .map_err(|e| ServiceError::Internal(format!("progress record encode: {e}")))?;
        self.store.put(&key, value, PROGRESS_TTL).await
    }
}

/// Estimate the wall time of one encryption: per-MiB cost by mode, plus the
/// fixed PBKDF2/file-I/O overhead.
pub fn estimate_encryption_time(file_size: u64, mode: PerformanceMode) -> f64 {
    let per_mib = match mode {
        PerformanceMode::Fast => SECONDS_PER_MIB_FAST,
        PerformanceMode::Balanced => SECONDS_PER_MIB_BALANCED,
        PerformanceMode::Secure => SECONDS_PER_MIB_SECURE,
    };
    let size_mib = file_size as f64 / (1024.0 * 1024.0);
    size_mib * per_mib + (2.0 + 0.5 * size_mib)
}
