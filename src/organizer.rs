//! The classification-and-placement engine.
//!
//! For a single file the engine decides its category, computes a
//! collision-free destination path and performs the move. Batch runs process
//! the immediate children of a source directory one at a time; a failure on
//! one file never aborts the rest. Every outcome is reported to an injected
//! [`OutcomeSink`].
//!
//! Placement is a single synchronous pass per file with no intermediate
//! state: either the move fully succeeds or the source file is left exactly
//! as it was.

use crate::config::CompiledFilters;
use crate::record::FileRecord;
use crate::rules::RuleSet;
use chrono::Local;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Files at or above this size are compared by modification time instead of
/// content hash during duplicate detection.
const HASH_SIZE_LIMIT: u64 = 1024 * 1024;

/// How many `_1`, `_2`, ... suffixes to probe before falling back to a
/// timestamp suffix.
const RENAME_PROBE_LIMIT: u32 = 1000;

/// Errors from placement operations.
#[derive(Debug, Error)]
pub enum OrganizeError {
    /// The source file vanished before the move.
    #[error("Source file not found: {0}")]
    NotFound(PathBuf),

    /// Read or write access was refused.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The destination already holds a file judged identical to the source.
    /// This is a skip condition, not a failure.
    #[error("Duplicate of existing file: {0}")]
    AlreadyExists(PathBuf),

    /// A category directory could not be created.
    #[error("Failed to create directory {path}: {source}")]
    DirectoryCreation { path: PathBuf, source: io::Error },

    /// The move itself failed; the source file is untouched.
    #[error("Failed to move {from} to {to}: {source}")]
    MoveFailed {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },

    /// The source directory itself cannot be enumerated. Aborts a batch.
    #[error("Cannot read directory {path}: {source}")]
    DirUnreadable { path: PathBuf, source: io::Error },

    #[error("IO failure: {0}")]
    Io(#[from] io::Error),
}

/// Result type for placement operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// What happened to a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementOutcome {
    /// The file was moved to its destination.
    Moved,
    /// The file was left in place (duplicate of an existing target).
    Skipped,
    /// The move failed; the source file is untouched.
    Failed,
}

/// The record of one placement attempt.
#[derive(Debug, Clone)]
pub struct PlacementResult {
    /// Where the file was when the attempt started.
    pub source: PathBuf,
    /// The category chosen for the file, when classification got that far.
    pub category: Option<String>,
    /// The resolved destination directory, when known.
    pub target_dir: Option<PathBuf>,
    /// The final destination path, when known.
    pub target_path: Option<PathBuf>,
    pub outcome: PlacementOutcome,
    /// Human-readable failure or skip reason.
    pub error: Option<String>,
}

impl PlacementResult {
    fn moved(source: &Path, category: &str, target_dir: &Path, target_path: PathBuf) -> Self {
        Self {
            source: source.to_path_buf(),
            category: Some(category.to_string()),
            target_dir: Some(target_dir.to_path_buf()),
            target_path: Some(target_path),
            outcome: PlacementOutcome::Moved,
            error: None,
        }
    }

    fn skipped(source: &Path, category: &str, target_dir: &Path, existing: PathBuf) -> Self {
        Self {
            source: source.to_path_buf(),
            category: Some(category.to_string()),
            target_dir: Some(target_dir.to_path_buf()),
            target_path: Some(existing),
            outcome: PlacementOutcome::Skipped,
            error: Some("duplicate of existing file".to_string()),
        }
    }

    fn failed(source: &Path, category: Option<&str>, error: &OrganizeError) -> Self {
        Self {
            source: source.to_path_buf(),
            category: category.map(String::from),
            target_dir: None,
            target_path: None,
            outcome: PlacementOutcome::Failed,
            error: Some(error.to_string()),
        }
    }
}

/// Tallies for a batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchSummary {
    /// Files considered for placement (hidden and filtered files excluded).
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// A planned placement produced by preview mode. Nothing is moved.
#[derive(Debug, Clone)]
pub struct PlannedMove {
    pub source: PathBuf,
    pub file_name: String,
    pub category: String,
    pub target_dir: PathBuf,
    pub size: u64,
    pub extension: String,
}

/// Statistics over the immediate children of a directory.
#[derive(Debug, Clone, Default)]
pub struct DirStats {
    pub total_files: usize,
    pub total_size: u64,
    /// Count per lower-cased extension (empty string for none).
    pub by_extension: HashMap<String, usize>,
    /// Count per category the files would be classified into.
    pub by_category: HashMap<String, usize>,
}

/// Cooperative stop signal for batch and watch sessions.
///
/// Stopping prevents further files from starting; it never aborts a move
/// already in flight.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Receives one outcome per placement attempt.
///
/// Sinks must not fail: recording is fire-and-forget and never aborts the
/// operation that produced the outcome.
pub trait OutcomeSink: Send + Sync {
    fn record(&self, result: &PlacementResult);
}

/// Default sink: reports outcomes through `tracing`.
pub struct LogSink;

impl OutcomeSink for LogSink {
    fn record(&self, result: &PlacementResult) {
        match result.outcome {
            PlacementOutcome::Moved => {
                if let Some(target) = &result.target_path {
                    info!(
                        source = %result.source.display(),
                        target = %target.display(),
                        "file placed"
                    );
                }
            }
            PlacementOutcome::Skipped => {
                info!(
                    source = %result.source.display(),
                    reason = result.error.as_deref().unwrap_or("skipped"),
                    "file skipped"
                );
            }
            PlacementOutcome::Failed => {
                warn!(
                    source = %result.source.display(),
                    error = result.error.as_deref().unwrap_or("unknown"),
                    "placement failed"
                );
            }
        }
    }
}

/// Classifies files and moves them into category directories.
pub struct Organizer {
    rules: RuleSet,
    filters: CompiledFilters,
    sink: Box<dyn OutcomeSink>,
    // Serializes collision resolution and moves so a watch session and a
    // batch run never race on the same target path.
    move_lock: Mutex<()>,
}

impl Organizer {
    /// Creates an organizer that logs outcomes through `tracing`.
    pub fn new(rules: RuleSet, filters: CompiledFilters) -> Self {
        Self::with_sink(rules, filters, Box::new(LogSink))
    }

    /// Creates an organizer with a custom outcome sink.
    pub fn with_sink(rules: RuleSet, filters: CompiledFilters, sink: Box<dyn OutcomeSink>) -> Self {
        Self {
            rules,
            filters,
            sink,
            move_lock: Mutex::new(()),
        }
    }

    /// The exclusion filters this organizer applies.
    pub fn filters(&self) -> &CompiledFilters {
        &self.filters
    }

    /// The classification rules this organizer applies.
    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Returns the category for a file record; unmatched extensions fall
    /// back to the default category.
    pub fn classify(&self, record: &FileRecord) -> &str {
        self.rules.classify(&record.extension)
    }

    /// Computes the destination directory for a record without touching the
    /// filesystem. Used by preview mode.
    pub fn planned_target_dir(
        &self,
        record: &FileRecord,
        category: &str,
        target_root: &Path,
    ) -> PathBuf {
        let dir = target_root.join(category);
        if self.rules.organize_by_date {
            dir.join(record.created.format(&self.rules.date_format).to_string())
        } else {
            dir
        }
    }

    /// Computes the destination directory and guarantees it exists.
    ///
    /// Safe to call concurrently for the same path: an already-existing
    /// directory is not an error.
    pub fn resolve_target_dir(
        &self,
        record: &FileRecord,
        category: &str,
        target_root: &Path,
    ) -> OrganizeResult<PathBuf> {
        let dir = self.planned_target_dir(record, category, target_root);
        fs::create_dir_all(&dir).map_err(|e| OrganizeError::DirectoryCreation {
            path: dir.clone(),
            source: e,
        })?;
        Ok(dir)
    }

    /// Finds an unused destination path for the record inside `target_dir`.
    ///
    /// If the plain name is taken by a file judged identical to the source,
    /// returns [`OrganizeError::AlreadyExists`]. Otherwise probes
    /// `name_1.ext` through `name_1000.ext` and finally falls back to a
    /// second-resolution timestamp suffix, which is accepted without a
    /// further collision check.
    pub fn resolve_collision_free_name(
        &self,
        record: &FileRecord,
        target_dir: &Path,
    ) -> OrganizeResult<PathBuf> {
        let candidate = target_dir.join(&record.name);
        if !candidate.exists() {
            return Ok(candidate);
        }

        if is_same_file(&record.path, &candidate) {
            return Err(OrganizeError::AlreadyExists(candidate));
        }

        for counter in 1..=RENAME_PROBE_LIMIT {
            let name = format!("{}_{}{}", record.base_name, counter, record.extension);
            let probe = target_dir.join(name);
            if !probe.exists() {
                return Ok(probe);
            }
        }

        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let name = format!("{}_{}{}", record.base_name, timestamp, record.extension);
        Ok(target_dir.join(name))
    }

    /// Classifies and moves one file under `target_root`.
    ///
    /// Never panics and never propagates: every error is converted into a
    /// [`PlacementResult`] and reported to the sink. A duplicate is a
    /// `Skipped` outcome and the source file is left in place.
    ///
    /// # Arguments
    ///
    /// * `file_path` - The file to organize
    /// * `target_root` - Root under which the category directory is created
    pub fn place_file(&self, file_path: &Path, target_root: &Path) -> PlacementResult {
        let _guard = self
            .move_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let record = match FileRecord::inspect(file_path) {
            Ok(record) => record,
            Err(e) => {
                let err = classify_io_error(e, file_path);
                return self.emit(PlacementResult::failed(file_path, None, &err));
            }
        };

        let category = self.classify(&record).to_string();

        let target_dir = match self.resolve_target_dir(&record, &category, target_root) {
            Ok(dir) => dir,
            Err(e) => return self.emit(PlacementResult::failed(file_path, Some(&category), &e)),
        };

        let target_path = match self.resolve_collision_free_name(&record, &target_dir) {
            Ok(path) => path,
            Err(OrganizeError::AlreadyExists(existing)) => {
                return self.emit(PlacementResult::skipped(
                    file_path,
                    &category,
                    &target_dir,
                    existing,
                ));
            }
            Err(e) => return self.emit(PlacementResult::failed(file_path, Some(&category), &e)),
        };

        match move_file(&record.path, &target_path) {
            Ok(()) => self.emit(PlacementResult::moved(
                file_path,
                &category,
                &target_dir,
                target_path,
            )),
            Err(e) => {
                let err = OrganizeError::MoveFailed {
                    from: record.path.clone(),
                    to: target_path,
                    source: e,
                };
                self.emit(PlacementResult::failed(file_path, Some(&category), &err))
            }
        }
    }

    /// Organizes every immediate child file of `source_dir` under
    /// `target_root`.
    ///
    /// Subdirectories are never descended into. Hidden (`.`/`~` prefixed)
    /// and filter-excluded files count as skipped without entering `total`;
    /// files that fail the read-permission check count in both `total` and
    /// `skipped`. One file's failure does not abort the batch. The stop
    /// signal is honored between files only.
    ///
    /// # Arguments
    ///
    /// * `source_dir` - Directory whose immediate child files are organized
    /// * `target_root` - Root for the category directories
    /// * `stop` - Cooperative stop signal, checked before each file
    ///
    /// # Errors
    ///
    /// Returns `OrganizeError::DirUnreadable` if `source_dir` cannot be
    /// enumerated and `OrganizeError::DirectoryCreation` if `target_root`
    /// cannot be created; per-file failures are tallied, not returned.
    pub fn place_all(
        &self,
        source_dir: &Path,
        target_root: &Path,
        stop: &StopSignal,
    ) -> OrganizeResult<BatchSummary> {
        let entries = fs::read_dir(source_dir).map_err(|e| OrganizeError::DirUnreadable {
            path: source_dir.to_path_buf(),
            source: e,
        })?;

        fs::create_dir_all(target_root).map_err(|e| OrganizeError::DirectoryCreation {
            path: target_root.to_path_buf(),
            source: e,
        })?;

        let mut summary = BatchSummary::default();

        for entry in entries.flatten() {
            if stop.is_stopped() {
                info!("Stop requested, leaving remaining files untouched");
                break;
            }

            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                debug!(entry = %entry.path().display(), "skipping non-file entry");
                continue;
            }

            let name = entry.file_name().to_string_lossy().to_string();
            if !self.filters.should_process(&name) {
                debug!(file = %name, "excluded by filters");
                summary.skipped += 1;
                continue;
            }

            let path = entry.path();

            // Permission problems found at read-time are skips, not failures.
            if let Err(e) = fs::File::open(&path) {
                if e.kind() == io::ErrorKind::PermissionDenied {
                    warn!(file = %path.display(), "unreadable, skipping");
                    summary.total += 1;
                    summary.skipped += 1;
                    continue;
                }
            }

            summary.total += 1;
            let result = self.place_file(&path, target_root);
            match result.outcome {
                PlacementOutcome::Moved => summary.success += 1,
                PlacementOutcome::Skipped => summary.skipped += 1,
                PlacementOutcome::Failed => summary.failed += 1,
            }
        }

        Ok(summary)
    }

    /// Computes what a batch run would do, without moving anything.
    pub fn preview(
        &self,
        source_dir: &Path,
        target_root: &Path,
    ) -> OrganizeResult<Vec<PlannedMove>> {
        let entries = fs::read_dir(source_dir).map_err(|e| OrganizeError::DirUnreadable {
            path: source_dir.to_path_buf(),
            source: e,
        })?;

        let mut planned = Vec::new();
        for entry in entries.flatten() {
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if !self.filters.should_process(&name) {
                continue;
            }

            let record = match FileRecord::inspect(&entry.path()) {
                Ok(record) => record,
                Err(_) => continue,
            };
            let category = self.classify(&record).to_string();
            let target_dir = self.planned_target_dir(&record, &category, target_root);

            planned.push(PlannedMove {
                source: record.path.clone(),
                file_name: record.name.clone(),
                category,
                target_dir,
                size: record.size,
                extension: record.extension.clone(),
            });
        }

        Ok(planned)
    }

    /// Tallies the immediate child files of `dir` by extension and by the
    /// category they would be classified into.
    pub fn statistics(&self, dir: &Path) -> OrganizeResult<DirStats> {
        let entries = fs::read_dir(dir).map_err(|e| OrganizeError::DirUnreadable {
            path: dir.to_path_buf(),
            source: e,
        })?;

        let mut stats = DirStats::default();
        for entry in entries.flatten() {
            let is_file = entry.file_type().map(|t| t.is_file()).unwrap_or(false);
            if !is_file {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if self.filters.is_hidden(&name) {
                continue;
            }

            let record = match FileRecord::inspect(&entry.path()) {
                Ok(record) => record,
                Err(_) => continue,
            };

            stats.total_files += 1;
            stats.total_size += record.size;
            *stats
                .by_extension
                .entry(record.extension.clone())
                .or_insert(0) += 1;
            let category = self.classify(&record).to_string();
            *stats.by_category.entry(category).or_insert(0) += 1;
        }

        Ok(stats)
    }

    fn emit(&self, result: PlacementResult) -> PlacementResult {
        self.sink.record(&result);
        result
    }
}

/// Maps an inspection error onto the placement error taxonomy.
fn classify_io_error(e: io::Error, path: &Path) -> OrganizeError {
    match e.kind() {
        io::ErrorKind::NotFound => OrganizeError::NotFound(path.to_path_buf()),
        io::ErrorKind::PermissionDenied => OrganizeError::PermissionDenied(path.to_path_buf()),
        _ => OrganizeError::Io(e),
    }
}

/// Moves a file, falling back to copy-then-delete across volumes.
///
/// On any partial failure the destination copy is removed so the source is
/// the only surviving state.
fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(_) => {
            if let Err(e) = fs::copy(from, to) {
                let _ = fs::remove_file(to);
                return Err(e);
            }
            if let Err(e) = fs::remove_file(from) {
                let _ = fs::remove_file(to);
                return Err(e);
            }
            Ok(())
        }
    }
}

/// Heuristic duplicate check between a source file and an existing target.
///
/// Sizes must match. Small files are compared by content hash; large files
/// are considered identical when their modification times are within one
/// second. Any I/O error makes the files count as different, which routes
/// the placement to the rename path rather than a skip.
fn is_same_file(a: &Path, b: &Path) -> bool {
    let (meta_a, meta_b) = match (fs::metadata(a), fs::metadata(b)) {
        (Ok(x), Ok(y)) => (x, y),
        _ => return false,
    };

    if meta_a.len() != meta_b.len() {
        return false;
    }

    if meta_a.len() < HASH_SIZE_LIMIT {
        return match (hash_file(a), hash_file(b)) {
            (Ok(x), Ok(y)) => x == y,
            _ => false,
        };
    }

    match (meta_a.modified(), meta_b.modified()) {
        (Ok(x), Ok(y)) => {
            let delta = x.duration_since(y).or_else(|_| y.duration_since(x));
            matches!(delta, Ok(d) if d.as_secs_f64() < 1.0)
        }
        _ => false,
    }
}

/// Content hash used for duplicate identity (not security-relevant).
fn hash_file(path: &Path) -> io::Result<blake3::Hash> {
    let data = fs::read(path)?;
    Ok(blake3::hash(&data))
}
