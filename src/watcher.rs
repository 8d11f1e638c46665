//! Directory watch mode.
//!
//! Watches a single directory (non-recursively) for newly created files and
//! hands each one to the placement engine after a short settle delay, giving
//! the writing process time to finish. Per-file errors are reported through
//! the engine's outcome sink and never stop the watch loop; the loop itself
//! ends when the [`StopSignal`] fires.

use crate::organizer::{Organizer, StopSignal};
use notify::{Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError, channel};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

/// How often the watch loop wakes up to check the stop signal.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Interval between size checks while waiting for a file to settle.
const SETTLE_CHECK_INTERVAL: Duration = Duration::from_millis(250);

/// Upper bound on how long to wait for a file to stop growing.
const SETTLE_MAX_WAIT: Duration = Duration::from_secs(10);

/// Errors from the watch machinery itself (not per-file placement errors).
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Watch error: {0}")]
    Notify(#[from] notify::Error),

    #[error("Watch directory not found: {0}")]
    DirNotFound(PathBuf),

    #[error("IO failure: {0}")]
    Io(#[from] io::Error),
}

/// Non-recursive watcher over a single directory, delivering created-file
/// events through a channel.
pub struct DirWatcher {
    // Held for its Drop: dropping the watcher stops event delivery.
    _watcher: RecommendedWatcher,
    event_rx: Receiver<notify::Result<Event>>,
}

impl DirWatcher {
    /// Starts watching `path`. The directory must already exist.
    pub fn new(path: &Path) -> Result<Self, WatchError> {
        if !path.is_dir() {
            return Err(WatchError::DirNotFound(path.to_path_buf()));
        }

        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(tx, NotifyConfig::default())?;
        watcher.watch(path, RecursiveMode::NonRecursive)?;
        info!(dir = %path.display(), "watching directory");

        Ok(Self {
            _watcher: watcher,
            event_rx: rx,
        })
    }

    /// Returns the next created-file path, or `None` if `timeout` elapsed.
    pub fn next_created(&self, timeout: Duration) -> Option<PathBuf> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            match self.event_rx.recv_timeout(remaining) {
                Ok(Ok(event)) => {
                    if matches!(event.kind, EventKind::Create(_))
                        && let Some(path) = event.paths.into_iter().next()
                    {
                        return Some(path);
                    }
                    // Other event kinds are irrelevant here; keep waiting.
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "watch event error");
                }
                Err(RecvTimeoutError::Timeout) => return None,
                Err(RecvTimeoutError::Disconnected) => return None,
            }
        }
    }
}

/// Whether a file name looks like an in-progress download or editor
/// temporary that should never be organized.
pub fn is_temporary(file_name: &str) -> bool {
    const TEMP_SUFFIXES: [&str; 5] = [".tmp", ".part", ".crdownload", ".partial", ".download"];
    TEMP_SUFFIXES
        .iter()
        .any(|suffix| file_name.to_lowercase().ends_with(suffix))
}

/// Waits for a newly created file to stop growing.
///
/// Sleeps `settle_delay` first, then re-checks the size until it is stable.
/// Returns `false` if the file disappeared while waiting; returns `true` on
/// timeout so a slowly written file is still attempted.
pub fn wait_for_settle(path: &Path, settle_delay: Duration) -> bool {
    std::thread::sleep(settle_delay);

    let start = Instant::now();
    let mut last_size = match std::fs::metadata(path) {
        Ok(m) => m.len(),
        Err(_) => return false,
    };

    loop {
        std::thread::sleep(SETTLE_CHECK_INTERVAL);

        if start.elapsed() > SETTLE_MAX_WAIT {
            warn!(file = %path.display(), "settle check timed out, proceeding anyway");
            return true;
        }

        let current_size = match std::fs::metadata(path) {
            Ok(m) => m.len(),
            Err(_) => return false,
        };

        if current_size == last_size {
            return true;
        }

        debug!(file = %path.display(), size = current_size, "file still being written");
        last_size = current_size;
    }
}

/// Runs the watch loop until the stop signal fires.
///
/// Each created file is settled, filtered through the organizer's exclusion
/// rules, then placed under `target_root`. Placement outcomes (including
/// failures) flow through the organizer's sink; nothing here aborts the loop.
pub fn run_watch(
    organizer: &Organizer,
    watch_dir: &Path,
    target_root: &Path,
    settle_delay: Duration,
    stop: &StopSignal,
) -> Result<(), WatchError> {
    let watcher = DirWatcher::new(watch_dir)?;

    while !stop.is_stopped() {
        let Some(path) = watcher.next_created(POLL_INTERVAL) else {
            continue;
        };

        let name = match path.file_name().map(|n| n.to_string_lossy().to_string()) {
            Some(name) => name,
            None => continue,
        };

        if is_temporary(&name) || !organizer.filters().should_process(&name) {
            debug!(file = %name, "ignoring watched file");
            continue;
        }

        if !wait_for_settle(&path, settle_delay) {
            debug!(file = %name, "file vanished before it settled");
            continue;
        }

        // Directories also produce create events; only files are placed.
        if !path.is_file() {
            continue;
        }

        organizer.place_file(&path, target_root);
    }

    info!(dir = %watch_dir.display(), "watch stopped");
    Ok(())
}
