// ## src/hls.rs

//! HLS segment cleanup.
//!
//! This background task deletes old `.ts` files to reclaim storage. Safe by
//! construction:
//! - only segments older than `age` are deleted;
//! - playlists (`.m3u8`), keys (`.key`) and every other extension are
//!   preserved regardless of age;
//! - directories are emptied bottom-up and removed only when empty and not
//!   the HLS root;
//! - a file disappearing mid-sweep is another process doing its job, not an
//!   error.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::watch;
use tokio::task::spawn_blocking;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// Default sweep period.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(120);

/// Default segment age before deletion.
pub const SEGMENT_MAX_AGE: Duration = Duration::from_secs(600);

/// Segment file extension (without the dot).
const SEGMENT_EXT: &str = "ts";

/// What one sweep did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    pub removed_segments: usize,
    pub removed_dirs: usize,
    pub skipped_errors: usize,
}

/// One synchronous cleanup pass over the HLS root.
pub fn sweep_once(root: &Path, age: Duration) -> SweepStats {
    let mut stats = SweepStats::default();
    if root.exists() {
        visit(root, true, age, SystemTime::now(), &mut stats);
    }
    stats
}

fn visit(dir: &Path, is_root: bool, age: Duration, now: SystemTime, stats: &mut SweepStats) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return,
        Err(err) => {
            error!(dir = %dir.display(), %err, "failed to read hls directory");
            stats.skipped_errors += 1;
            return;
        }
    };

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                error!(dir = %dir.display(), %err, "failed to read hls entry");
                stats.skipped_errors += 1;
                continue;
            }
        };
        let path = entry.path();

        if path.is_dir() {
            visit(&path, false, age, now, stats);
        } else {
            sweep_file(&path, age, now, stats);
        }
    }

    // Children handled; prune this directory if it drained, root excepted.
    if !is_root && dir_is_empty(dir) {
        match fs::remove_dir(dir) {
            Ok(()) => {
                debug!(dir = %dir.display(), "removed empty hls directory");
                stats.removed_dirs += 1;
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                error!(dir = %dir.display(), %err, "failed to remove hls directory");
                stats.skipped_errors += 1;
            }
        }
    }
}

fn sweep_file(path: &Path, age: Duration, now: SystemTime, stats: &mut SweepStats) {
    // Everything that is not a segment is metadata and stays.
    if path.extension().and_then(|e| e.to_str()) != Some(SEGMENT_EXT) {
        return;
    }

    let modified = match fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => modified,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return,
        Err(err) => {
            error!(path = %path.display(), %err, "failed to stat segment");
            stats.skipped_errors += 1;
            return;
        }
    };

    let old_enough = now.duration_since(modified).map(|dt| dt > age).unwrap_or(false);
    if !old_enough {
        return;
    }

    match fs::remove_file(path) {
        Ok(()) => {
            debug!(path = %path.display(), "removed old segment");
            stats.removed_segments += 1;
        }
        // Deleted by another process between stat and unlink.
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            error!(path = %path.display(), %err, "failed to remove segment");
            stats.skipped_errors += 1;
        }
    }
}

fn dir_is_empty(dir: &Path) -> bool {
    fs::read_dir(dir).map(|mut entries| entries.next().is_none()).unwrap_or(false)
}

/// Long-running cleanup loop. The walk itself runs on a blocking worker;
/// the loop reacts to `shutdown` at its next suspension point, so
/// termination lands within one iteration.
pub async fn cleanup_loop(
    root: PathBuf,
    interval: Duration,
    age: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(
        root = %root.display(),
        interval_secs = interval.as_secs(),
        age_secs = age.as_secs(),
        "starting hls cleanup task"
    );
    loop {
        tokio::select! {
            _ = sleep(interval) => {
                let sweep_root = root.clone();
                match spawn_blocking(move || sweep_once(&sweep_root, age)).await {
                    Ok(stats) => {
                        if stats != SweepStats::default() {
                            debug!(?stats, "hls sweep finished");
                        }
                    }
                    Err(err) => error!(%err, "hls sweep worker panicked"),
                }
            }
            _ = shutdown.changed() => {
                info!("hls cleanup task cancelled");
                return;
            }
        }
    }
}
