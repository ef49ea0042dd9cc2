// ## src/protect.rs

//! Audio protection facade: whole-file encrypt/decrypt with user+track
//! scoped keys, progress publication and integrity hashes.
//!
//! Design notes:
//! - The cipher, the PBKDF2 track-key derivation and the SHA-256 passes are
//!   CPU-bound and run on blocking workers; this module only orchestrates.
//! - 40–90% progress is real: the keystream loop reports emitted bytes over
//!   a channel, throttled to roughly 1% steps. 90% is only published once
//!   the ciphertext exists.
//! - Outputs are written to a temp file and renamed, so a crashed or failed
//!   job never leaves a partial blob at the destination.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::fs;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::spawn_blocking;
use tracing::{error, info};

use sectify_core::crypto::{derive_track_key, digest};
use sectify_core::{ChaoticCipher, PerformanceMode};

use crate::config::Config;
use crate::error::ServiceError;
use crate::lock::{LockManager, DEFAULT_ACQUIRE_WAIT};
use crate::progress::{estimate_encryption_time, ProgressTracker};
use crate::store::KeyValueStore;

/// Audio formats accepted for protection.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["wav", "mp3", "m4a", "flac"];

/// Suffix appended to encrypted outputs.
pub const ENCRYPTED_SUFFIX: &str = ".encrypted";

/// Per-request progress callback `(percent, step)`.
pub type ProgressCallback<'a> = &'a (dyn Fn(f64, &str) + Send + Sync);

/// Outcome record of one file encryption.
#[derive(Debug, Clone, Serialize)]
pub struct ProtectionReport {
    pub success: bool,
    pub encrypted_path: PathBuf,
    pub original_sha256: String,
    pub user_id: String,
    pub track_id: String,
    pub performance_mode: PerformanceMode,
    /// Wall time of the whole operation, seconds.
    pub encryption_time: f64,
    pub estimated_time: f64,
}

/// Outcome record of one file decryption.
#[derive(Debug, Clone, Serialize)]
pub struct DecryptionReport {
    pub success: bool,
    pub decrypted_path: PathBuf,
    pub user_id: String,
    pub track_id: String,
    pub performance_mode: PerformanceMode,
}

pub struct AudioProtector {
    master_secret: String,
    progress: ProgressTracker,
    strict_chaos: bool,
}

impl AudioProtector {
    pub fn new(master_secret: impl Into<String>, progress: ProgressTracker) -> Self {
        Self { master_secret: master_secret.into(), progress, strict_chaos: false }
    }

    /// Wire the facade from configuration: production turns on the
    /// fail-closed chaos policy.
    pub fn from_config(config: &Config, store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            master_secret: config.master_secret.clone(),
            progress: ProgressTracker::new(store),
            strict_chaos: config.is_production,
        }
    }

    pub fn progress(&self) -> &ProgressTracker {
        &self.progress
    }

    /// Encrypt one audio file under the user+track scoped key, publishing
    /// milestone progress under `track_id` throughout.
    ///
    /// `output` defaults to `input` with `.encrypted` appended. On failure a
    /// `failed` progress record is published, any partial output is gone,
    /// and the error propagates.
    pub async fn encrypt_file(
        &self,
        input: &Path,
        output: Option<&Path>,
        user_id: &str,
        track_id: &str,
        mode: PerformanceMode,
        progress_cb: Option<ProgressCallback<'_>>,
    ) -> Result<ProtectionReport, ServiceError> {
        let started = Instant::now();
        match self
            .encrypt_file_inner(input, output, user_id, track_id, mode, progress_cb, started)
            .await
        {
            Ok(report) => Ok(report),
            Err(err) => {
                error!(%track_id, %err, "audio encryption failed");
                let _ = self
                    .progress
                    .fail(track_id, &format!("Encryption failed: {err}"), mode)
                    .await;
                Err(err)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn encrypt_file_inner(
        &self,
        input: &Path,
        output: Option<&Path>,
        user_id: &str,
        track_id: &str,
        mode: PerformanceMode,
        progress_cb: Option<ProgressCallback<'_>>,
        started: Instant,
    ) -> Result<ProtectionReport, ServiceError> {
        check_supported_extension(input)?;
        let output = output.map(Path::to_path_buf).unwrap_or_else(|| default_encrypted_path(input));

        let file_size = fs::metadata(input).await?.len();
        let estimated = estimate_encryption_time(file_size, mode);

        self.publish(track_id, mode, 0.0, "Initializing encryption...", Some(estimated), progress_cb)
            .await?;

        self.publish(track_id, mode, 10.0, "Calculating file hash...", None, progress_cb).await?;
        let original_sha256 = {
            let input = input.to_path_buf();
            spawn_blocking(move || digest::sha256_file(&input))
                .await
                .map_err(|e| ServiceError::Internal(format!("hash worker: {e}")))??
        };

        self.publish(track_id, mode, 20.0, "Generating encryption key...", None, progress_cb).await?;
        let secret_key = {
            let (user, track, master) =
                (user_id.to_string(), track_id.to_string(), self.master_secret.clone());
            spawn_blocking(move || derive_track_key(&user, &track, &master))
                .await
                .map_err(|e| ServiceError::Internal(format!("kdf worker: {e}")))?
        };

        self.publish(track_id, mode, 30.0, "Reading audio file...", None, progress_cb).await?;
        let audio_data = fs::read(input).await?;

        self.publish(
            track_id,
            mode,
            40.0,
            &format!("Encrypting with {mode} mode..."),
            Some(seconds_remaining(estimated, started)),
            progress_cb,
        )
        .await?;

        // The keystream loop reports emitted bytes; scale them into the
        // 40–89 band so 90 stays reserved for "ciphertext produced".
        let (tx, mut rx) = mpsc::channel::<(u64, u64)>(64);
        let cipher =
            if self.strict_chaos { ChaoticCipher::strict(mode) } else { ChaoticCipher::new(mode) };
        let worker = spawn_blocking(move || {
            cipher.encrypt_with_progress(&audio_data, &secret_key, &mut |emitted, total| {
                let _ = tx.blocking_send((emitted, total));
            })
        });

        let mut last_published = 40.0;
        while let Some((emitted, total)) = rx.recv().await {
            if total == 0 {
                continue;
            }
            let percent = 40.0 + 49.0 * (emitted as f64 / total as f64);
            if percent - last_published >= 1.0 {
                last_published = percent;
                self.publish(
                    track_id,
                    mode,
                    percent,
                    &format!("Encrypting... ({percent:.0}%)"),
                    Some(seconds_remaining(estimated, started)),
                    progress_cb,
                )
                .await?;
            }
        }
        let blob = worker
            .await
            .map_err(|e| ServiceError::Internal(format!("encryption worker: {e}")))??;

        self.publish(
            track_id,
            mode,
            90.0,
            "Encryption complete, finalizing...",
            Some(seconds_remaining(estimated, started)),
            progress_cb,
        )
        .await?;

        self.publish(track_id, mode, 95.0, "Writing encrypted file...", None, progress_cb).await?;
        write_atomic(&output, &blob).await?;

        let encryption_time = started.elapsed().as_secs_f64();
        self.publish(track_id, mode, 100.0, "Encryption completed!", Some(0.0), progress_cb).await?;

        info!(
            %track_id,
            %user_id,
            output = %output.display(),
            seconds = encryption_time,
            "encrypted audio file"
        );
        Ok(ProtectionReport {
            success: true,
            encrypted_path: output,
            original_sha256,
            user_id: user_id.to_string(),
            track_id: track_id.to_string(),
            performance_mode: mode,
            encryption_time,
            estimated_time: estimated,
        })
    }

    /// Decrypt one protected file. With `expected_sha256` the plaintext is
    /// hashed in a temporary location and only renamed into place when the
    /// digest matches; without it, MAC verification alone protects the
    /// output (that is the cipher's job either way).
    pub async fn decrypt_file(
        &self,
        encrypted: &Path,
        output: &Path,
        user_id: &str,
        track_id: &str,
        expected_sha256: Option<&str>,
        mode: PerformanceMode,
    ) -> Result<DecryptionReport, ServiceError> {
        let secret_key = {
            let (user, track, master) =
                (user_id.to_string(), track_id.to_string(), self.master_secret.clone());
            spawn_blocking(move || derive_track_key(&user, &track, &master))
                .await
                .map_err(|e| ServiceError::Internal(format!("kdf worker: {e}")))?
        };

        let blob = fs::read(encrypted).await?;
        let cipher = ChaoticCipher::new(mode);
        let plaintext = spawn_blocking(move || cipher.decrypt(&blob, &secret_key))
            .await
            .map_err(|e| ServiceError::Internal(format!("decryption worker: {e}")))??;

        let tmp = tmp_path(output);
        if let Err(err) = fs::write(&tmp, &plaintext).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(err.into());
        }

        if let Some(expected) = expected_sha256 {
            let actual = {
                let tmp = tmp.clone();
                spawn_blocking(move || digest::sha256_file(&tmp))
                    .await
                    .map_err(|e| ServiceError::Internal(format!("hash worker: {e}")))??
            };
            if actual != expected {
                let _ = fs::remove_file(&tmp).await;
                return Err(ServiceError::IntegrityFailure(format!(
                    "decrypted file hash mismatch: expected {expected}, got {actual}"
                )));
            }
        }

        if let Err(err) = fs::rename(&tmp, output).await {
            let _ = fs::remove_file(&tmp).await;
            return Err(err.into());
        }

        info!(%track_id, %user_id, output = %output.display(), "decrypted audio file");
        Ok(DecryptionReport {
            success: true,
            decrypted_path: output.to_path_buf(),
            user_id: user_id.to_string(),
            track_id: track_id.to_string(),
            performance_mode: mode,
        })
    }

    async fn publish(
        &self,
        track_id: &str,
        mode: PerformanceMode,
        percent: f64,
        step: &str,
        estimated_remaining: Option<f64>,
        progress_cb: Option<ProgressCallback<'_>>,
    ) -> Result<(), ServiceError> {
        self.progress.update(track_id, percent, step, mode, estimated_remaining).await?;
        if let Some(cb) = progress_cb {
            cb(percent, step);
        }
        Ok(())
    }
}

/// The principal protect-and-serve composition: the processing lock guards
/// the whole encryption, and a dropped (cancelled) run still releases the
/// lock and publishes a failed progress record.
pub async fn protect_track(
    protector: &AudioProtector,
    locks: &LockManager,
    input: &Path,
    output: Option<&Path>,
    user_id: &str,
    track_id: &str,
    mode: PerformanceMode,
) -> Result<ProtectionReport, ServiceError> {
    let guard = locks.acquire(track_id, user_id, "encryption", DEFAULT_ACQUIRE_WAIT).await?;

    let mut episode = ProgressEpisode {
        tracker: protector.progress.clone(),
        track_id: track_id.to_string(),
        mode,
        armed: true,
    };
    let result = protector.encrypt_file(input, output, user_id, track_id, mode, None).await;
    episode.armed = false;

    guard.release().await?;
    result
}

/// Publishes `failed (cancelled)` if the guarded future is dropped before
/// the encryption settles either way.
struct ProgressEpisode {
    tracker: ProgressTracker,
    track_id: String,
    mode: PerformanceMode,
    armed: bool,
}

impl Drop for ProgressEpisode {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let tracker = self.tracker.clone();
        let track_id = std::mem::take(&mut self.track_id);
        let mode = self.mode;
        if let Ok(handle) = Handle::try_current() {
            handle.spawn(async move {
                let _ = tracker.fail(&track_id, "Encryption cancelled", mode).await;
            });
        }
    }
}

// ---- path helpers ----

/// `input` + `.encrypted`, preserving the original extension in the name.
pub fn default_encrypted_path(input: &Path) -> PathBuf {
    let mut name = input.as_os_str().to_owned();
    name.push(ENCRYPTED_SUFFIX);
    PathBuf::from(name)
}

pub fn is_encrypted_name(path: &Path) -> bool {
    path.to_string_lossy().ends_with(ENCRYPTED_SUFFIX)
}

/// Strip the `.encrypted` suffix; identity for anything else.
pub fn original_file_name(path: &Path) -> PathBuf {
    let name = path.to_string_lossy();
    match name.strip_suffix(ENCRYPTED_SUFFIX) {
        Some(stripped) => PathBuf::from(stripped),
        None => path.to_path_buf(),
    }
}

fn check_supported_extension(input: &Path) -> Result<(), ServiceError> {
    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        Ok(())
    } else {
        Err(ServiceError::Validation(format!(
            "unsupported audio format {ext:?}; supported: {SUPPORTED_EXTENSIONS:?}"
        )))
    }
}

fn tmp_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Write to a temp sibling and rename, so the destination is only ever
/// complete or absent.
async fn write_atomic(output: &Path, bytes: &[u8]) -> Result<(), ServiceError> {
    let tmp = tmp_path(output);
    if let Err(err) = fs::write(&tmp, bytes).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(err.into());
    }
    if let Err(err) = fs::rename(&tmp, output).await {
        let _ = fs::remove_file(&tmp).await;
        return Err(err.into());
    }
    Ok(())
}

fn seconds_remaining(estimated: f64, started: Instant) -> f64 {
    (estimated - started.elapsed().as_secs_f64()).max(0.0)
}
