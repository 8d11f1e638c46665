/// Integration tests for sortd
///
/// These tests simulate real-world usage scenarios, testing the complete
/// end-to-end behavior of the classification-and-placement engine.
///
/// Test categories:
/// 1. Basic batch organization
/// 2. Collision resolution and duplicate detection
/// 3. Filtering (hidden files, exclusions) and non-recursion
/// 4. Preview and statistics
/// 5. Configuration round-trips
/// 6. Watch mode
use sortd::config::{Config, ConfigError};
use sortd::organizer::{Organizer, PlacementOutcome, StopSignal};
use sortd::rules::CategoryRule;
use sortd::watcher;
use std::fs::{self, File};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;

// ============================================================================
// Test Utilities
// ============================================================================

/// A test fixture that sets up a temporary directory with configurable
/// file structure for testing.
struct TestFixture {
    temp_dir: TempDir,
}

impl TestFixture {
    fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        TestFixture { temp_dir }
    }

    fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Create a file with content in the test directory.
    fn create_file(&self, name: &str, content: &[u8]) {
        let file_path = self.path().join(name);
        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        let mut file = File::create(&file_path).expect("Failed to create file");
        file.write_all(content)
            .expect("Failed to write file content");
    }

    /// Create a subdirectory in the test directory.
    fn create_subdir(&self, name: &str) {
        let dir_path = self.path().join(name);
        fs::create_dir(&dir_path).expect("Failed to create subdirectory");
    }

    fn assert_file_exists(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(
            path.exists() && path.is_file(),
            "File should exist: {}",
            path.display()
        );
    }

    fn assert_file_absent(&self, rel_path: &str) {
        let path = self.path().join(rel_path);
        assert!(!path.exists(), "File should not exist: {}", path.display());
    }

    fn read_file(&self, rel_path: &str) -> Vec<u8> {
        fs::read(self.path().join(rel_path)).expect("Failed to read file")
    }
}

/// A small fixed rule set used across tests: Images (jpg, png), Docs (pdf),
/// everything else falls into Other.
fn test_config() -> Config {
    let mut config = Config::default();
    config.categories = vec![
        CategoryRule::new("Images", &["jpg", "png"]),
        CategoryRule::new("Docs", &["pdf"]),
    ];
    config.default_category = "Other".to_string();
    config.organize_by_date = false;
    config
}

fn organizer_from(config: &Config) -> Organizer {
    Organizer::new(
        config.rule_set(),
        config.compile_filters().expect("filters should compile"),
    )
}

// ============================================================================
// Basic batch organization
// ============================================================================

#[test]
fn test_organize_places_files_by_category() {
    let fixture = TestFixture::new();
    fixture.create_file("a.jpg", b"jpeg data");
    fixture.create_file("b.pdf", b"pdf data");
    fixture.create_file("c.txt", b"text data");

    let organizer = organizer_from(&test_config());
    let summary = organizer
        .place_all(fixture.path(), fixture.path(), &StopSignal::new())
        .expect("batch should run");

    assert_eq!(summary.total, 3);
    assert_eq!(summary.success, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.skipped, 0);

    fixture.assert_file_exists("Images/a.jpg");
    fixture.assert_file_exists("Docs/b.pdf");
    fixture.assert_file_exists("Other/c.txt");
    fixture.assert_file_absent("a.jpg");
    fixture.assert_file_absent("b.pdf");
    fixture.assert_file_absent("c.txt");
}

#[test]
fn test_organize_into_separate_target_root() {
    let source = TestFixture::new();
    let target = TestFixture::new();
    source.create_file("photo.PNG", b"png data");

    let organizer = organizer_from(&test_config());
    let summary = organizer
        .place_all(source.path(), target.path(), &StopSignal::new())
        .expect("batch should run");

    assert_eq!(summary.success, 1);
    // Extension matching is case-insensitive; the name is kept as-is.
    target.assert_file_exists("Images/photo.PNG");
    source.assert_file_absent("photo.PNG");
}

#[test]
fn test_organize_empty_directory() {
    let fixture = TestFixture::new();

    let organizer = organizer_from(&test_config());
    let summary = organizer
        .place_all(fixture.path(), fixture.path(), &StopSignal::new())
        .expect("batch should run");

    assert_eq!(summary.total, 0);
    assert_eq!(summary.success, 0);
}

#[test]
fn test_organize_missing_directory_fails() {
    let fixture = TestFixture::new();
    let missing = fixture.path().join("nope");

    let organizer = organizer_from(&test_config());
    let result = organizer.place_all(&missing, fixture.path(), &StopSignal::new());
    assert!(result.is_err());
}

#[test]
fn test_organize_with_date_subfolders() {
    let fixture = TestFixture::new();
    fixture.create_file("trip.jpg", b"jpeg data");

    let mut config = test_config();
    config.organize_by_date = true;
    config.date_format = "%Y-%m".to_string();

    let organizer = organizer_from(&config);
    let summary = organizer
        .place_all(fixture.path(), fixture.path(), &StopSignal::new())
        .expect("batch should run");

    assert_eq!(summary.success, 1);
    // The file was just created, so its date folder is the current month.
    let month = chrono::Local::now().format("%Y-%m").to_string();
    fixture.assert_file_exists(&format!("Images/{}/trip.jpg", month));
}

// ============================================================================
// Collision resolution and duplicate detection
// ============================================================================

#[test]
fn test_collision_with_different_content_gets_suffix() {
    let fixture = TestFixture::new();
    fixture.create_file("Images/a.jpg", b"original content");
    fixture.create_file("a.jpg", b"different content");

    let organizer = organizer_from(&test_config());
    let summary = organizer
        .place_all(fixture.path(), fixture.path(), &StopSignal::new())
        .expect("batch should run");

    assert_eq!(summary.success, 1);
    // The existing file is never overwritten.
    assert_eq!(fixture.read_file("Images/a.jpg"), b"original content");
    assert_eq!(fixture.read_file("Images/a_1.jpg"), b"different content");
    fixture.assert_file_absent("a.jpg");
}

#[test]
fn test_collision_suffixes_count_upward() {
    let fixture = TestFixture::new();
    fixture.create_file("Images/a.jpg", b"first");
    fixture.create_file("Images/a_1.jpg", b"second");
    fixture.create_file("a.jpg", b"third");

    let organizer = organizer_from(&test_config());
    organizer
        .place_all(fixture.path(), fixture.path(), &StopSignal::new())
        .expect("batch should run");

    fixture.assert_file_exists("Images/a_2.jpg");
    assert_eq!(fixture.read_file("Images/a_2.jpg"), b"third");
}

#[test]
fn test_collision_probe_exhaustion_falls_back_to_timestamp() {
    let fixture = TestFixture::new();
    fixture.create_file("Images/a.jpg", b"occupant");
    for counter in 1..=1000 {
        fixture.create_file(&format!("Images/a_{}.jpg", counter), b"x");
    }
    fixture.create_file("a.jpg", b"completely new content");

    let organizer = organizer_from(&test_config());
    let result = organizer.place_file(&fixture.path().join("a.jpg"), fixture.path());

    assert_eq!(result.outcome, PlacementOutcome::Moved);
    let placed = result
        .target_path
        .expect("moved result should carry a target path");
    let name = placed
        .file_name()
        .expect("target should have a file name")
        .to_string_lossy();
    // After a_1 .. a_1000 are all taken the name carries a timestamp
    // suffix, e.g. a_20260825_143059.jpg.
    let pattern = regex::Regex::new(r"^a_\d{8}_\d{6}\.jpg$").expect("pattern should compile");
    assert!(
        pattern.is_match(&name),
        "expected timestamp-suffixed name, got {}",
        name
    );
    assert!(placed.is_file());
    fixture.assert_file_absent("a.jpg");
}

#[test]
fn test_identical_duplicate_is_skipped_and_left_in_place() {
    let fixture = TestFixture::new();
    fixture.create_file("Images/a.jpg", b"same bytes");
    fixture.create_file("a.jpg", b"same bytes");

    let organizer = organizer_from(&test_config());
    let summary = organizer
        .place_all(fixture.path(), fixture.path(), &StopSignal::new())
        .expect("batch should run");

    assert_eq!(summary.total, 1);
    assert_eq!(summary.success, 0);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);

    // The source stays where it was; nothing at the destination changed.
    fixture.assert_file_exists("a.jpg");
    assert_eq!(fixture.read_file("Images/a.jpg"), b"same bytes");
    fixture.assert_file_absent("Images/a_1.jpg");
}

#[test]
fn test_duplicate_skip_is_idempotent() {
    let fixture = TestFixture::new();
    fixture.create_file("Images/a.jpg", b"same bytes");
    fixture.create_file("a.jpg", b"same bytes");

    let organizer = organizer_from(&test_config());
    for _ in 0..2 {
        let summary = organizer
            .place_all(fixture.path(), fixture.path(), &StopSignal::new())
            .expect("batch should run");
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.success, 0);
    }
    fixture.assert_file_exists("a.jpg");
}

#[test]
fn test_same_size_different_content_is_not_a_duplicate() {
    let fixture = TestFixture::new();
    fixture.create_file("Docs/r.pdf", b"AAAA");
    fixture.create_file("r.pdf", b"BBBB");

    let organizer = organizer_from(&test_config());
    let summary = organizer
        .place_all(fixture.path(), fixture.path(), &StopSignal::new())
        .expect("batch should run");

    assert_eq!(summary.success, 1);
    fixture.assert_file_exists("Docs/r_1.pdf");
}

#[test]
fn test_place_file_reports_moved_outcome() {
    let fixture = TestFixture::new();
    fixture.create_file("song.mp3", b"audio data");

    let organizer = organizer_from(&test_config());
    let result = organizer.place_file(&fixture.path().join("song.mp3"), fixture.path());

    assert_eq!(result.outcome, PlacementOutcome::Moved);
    assert_eq!(result.category.as_deref(), Some("Other"));
    fixture.assert_file_exists("Other/song.mp3");
}

#[test]
fn test_place_file_missing_source_fails() {
    let fixture = TestFixture::new();

    let organizer = organizer_from(&test_config());
    let result = organizer.place_file(&fixture.path().join("ghost.jpg"), fixture.path());

    assert_eq!(result.outcome, PlacementOutcome::Failed);
    assert!(result.error.is_some());
}

// ============================================================================
// Filtering and non-recursion
// ============================================================================

#[test]
fn test_hidden_files_and_subdirectories_are_not_organized() {
    let fixture = TestFixture::new();
    fixture.create_file("a.jpg", b"jpeg data");
    fixture.create_file(".env", b"SECRET=1");
    fixture.create_subdir("Sub");

    let organizer = organizer_from(&test_config());
    let summary = organizer
        .place_all(fixture.path(), fixture.path(), &StopSignal::new())
        .expect("batch should run");

    // Only the visible file counts toward the batch; the hidden file is
    // tallied as skipped, the subdirectory not at all.
    assert_eq!(summary.total, 1);
    assert_eq!(summary.success, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);

    fixture.assert_file_exists("Images/a.jpg");
    fixture.assert_file_exists(".env");
    assert!(fixture.path().join("Sub").is_dir());
}

#[test]
fn test_subdirectory_contents_are_untouched() {
    let fixture = TestFixture::new();
    fixture.create_file("Sub/nested.jpg", b"jpeg data");

    let organizer = organizer_from(&test_config());
    let summary = organizer
        .place_all(fixture.path(), fixture.path(), &StopSignal::new())
        .expect("batch should run");

    assert_eq!(summary.total, 0);
    fixture.assert_file_exists("Sub/nested.jpg");
    fixture.assert_file_absent("Images/nested.jpg");
}

#[test]
fn test_excluded_extensions_are_skipped() {
    let fixture = TestFixture::new();
    fixture.create_file("download.tmp", b"partial");
    fixture.create_file("app.log", b"log lines");
    fixture.create_file("done.pdf", b"pdf data");

    // Default filters exclude tmp and log files.
    let organizer = organizer_from(&test_config());
    let summary = organizer
        .place_all(fixture.path(), fixture.path(), &StopSignal::new())
        .expect("batch should run");

    assert_eq!(summary.total, 1);
    assert_eq!(summary.success, 1);
    assert_eq!(summary.skipped, 2);
    fixture.assert_file_exists("download.tmp");
    fixture.assert_file_exists("app.log");
    fixture.assert_file_exists("Docs/done.pdf");
}

#[test]
fn test_process_hidden_files_when_enabled() {
    let fixture = TestFixture::new();
    fixture.create_file("~backup.pdf", b"pdf data");

    let mut config = test_config();
    config.filters.process_hidden_files = true;

    let organizer = organizer_from(&config);
    let summary = organizer
        .place_all(fixture.path(), fixture.path(), &StopSignal::new())
        .expect("batch should run");

    assert_eq!(summary.success, 1);
    fixture.assert_file_exists("Docs/~backup.pdf");
}

#[test]
fn test_glob_pattern_exclusion() {
    let fixture = TestFixture::new();
    fixture.create_file("draft-v1.pdf", b"pdf data");
    fixture.create_file("final.pdf", b"pdf data 2");

    let mut config = test_config();
    config.filters.excluded_patterns = vec!["draft-*".to_string()];

    let organizer = organizer_from(&config);
    let summary = organizer
        .place_all(fixture.path(), fixture.path(), &StopSignal::new())
        .expect("batch should run");

    assert_eq!(summary.success, 1);
    fixture.assert_file_exists("draft-v1.pdf");
    fixture.assert_file_exists("Docs/final.pdf");
}

#[cfg(unix)]
#[test]
fn test_unreadable_file_counts_in_total_and_skipped() {
    use std::os::unix::fs::PermissionsExt;

    let fixture = TestFixture::new();
    fixture.create_file("locked.pdf", b"pdf data");
    let locked = fixture.path().join("locked.pdf");
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000))
        .expect("Failed to strip permissions");

    // Mode bits do not bind root, so there is nothing to observe then.
    if File::open(&locked).is_ok() {
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o644))
            .expect("Failed to restore permissions");
        return;
    }

    let organizer = organizer_from(&test_config());
    let summary = organizer
        .place_all(fixture.path(), fixture.path(), &StopSignal::new())
        .expect("batch should run");

    fs::set_permissions(&locked, fs::Permissions::from_mode(0o644))
        .expect("Failed to restore permissions");

    assert_eq!(summary.total, 1);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.success, 0);
    assert_eq!(summary.failed, 0);
    fixture.assert_file_exists("locked.pdf");
    fixture.assert_file_absent("Docs/locked.pdf");
}

#[test]
fn test_one_failure_does_not_abort_the_batch() {
    let source = TestFixture::new();
    let target = TestFixture::new();
    source.create_file("a.jpg", b"jpeg data");
    source.create_file("b.pdf", b"pdf data");
    // A plain file squatting on the category directory name makes the
    // Images placement fail while the Docs placement still goes through.
    target.create_file("Images", b"not a directory");

    let organizer = organizer_from(&test_config());
    let summary = organizer
        .place_all(source.path(), target.path(), &StopSignal::new())
        .expect("batch should run");

    assert_eq!(summary.total, 2);
    assert_eq!(summary.success, 1);
    assert_eq!(summary.failed, 1);
    target.assert_file_exists("Docs/b.pdf");
    // The failed source is untouched.
    source.assert_file_exists("a.jpg");
}

#[test]
fn test_stop_signal_halts_batch_before_first_file() {
    let fixture = TestFixture::new();
    fixture.create_file("a.jpg", b"jpeg data");
    fixture.create_file("b.pdf", b"pdf data");

    let stop = StopSignal::new();
    stop.stop();

    let organizer = organizer_from(&test_config());
    let summary = organizer
        .place_all(fixture.path(), fixture.path(), &stop)
        .expect("batch should run");

    assert_eq!(summary.total, 0);
    assert_eq!(summary.success, 0);
    fixture.assert_file_exists("a.jpg");
    fixture.assert_file_exists("b.pdf");
}

// ============================================================================
// Preview and statistics
// ============================================================================

#[test]
fn test_preview_moves_nothing() {
    let fixture = TestFixture::new();
    fixture.create_file("a.jpg", b"jpeg data");
    fixture.create_file("b.pdf", b"pdf data");
    fixture.create_file(".hidden", b"secret");

    let organizer = organizer_from(&test_config());
    let planned = organizer
        .preview(fixture.path(), fixture.path())
        .expect("preview should run");

    assert_eq!(planned.len(), 2);
    assert!(planned.iter().all(|p| p.file_name != ".hidden"));

    let image = planned
        .iter()
        .find(|p| p.file_name == "a.jpg")
        .expect("a.jpg should be planned");
    assert_eq!(image.category, "Images");
    assert!(image.target_dir.ends_with("Images"));

    // Everything is still where it started.
    fixture.assert_file_exists("a.jpg");
    fixture.assert_file_exists("b.pdf");
    fixture.assert_file_absent("Images/a.jpg");
}

#[test]
fn test_statistics_counts_by_extension_and_category() {
    let fixture = TestFixture::new();
    fixture.create_file("a.jpg", b"12345");
    fixture.create_file("b.jpg", b"123");
    fixture.create_file("c.pdf", b"12");
    fixture.create_file(".secret", b"xxxxx");
    fixture.create_subdir("Sub");

    let organizer = organizer_from(&test_config());
    let stats = organizer
        .statistics(fixture.path())
        .expect("statistics should run");

    assert_eq!(stats.total_files, 3);
    assert_eq!(stats.total_size, 10);
    assert_eq!(stats.by_extension.get(".jpg"), Some(&2));
    assert_eq!(stats.by_extension.get(".pdf"), Some(&1));
    assert_eq!(stats.by_category.get("Images"), Some(&2));
    assert_eq!(stats.by_category.get("Docs"), Some(&1));
}

// ============================================================================
// Configuration round-trips
// ============================================================================

#[test]
fn test_config_save_and_load_round_trip() {
    let fixture = TestFixture::new();
    let config_path = fixture.path().join("sortd.toml");

    let config = test_config();
    config.save(&config_path).expect("save should succeed");

    let loaded = Config::load(Some(&config_path)).expect("load should succeed");
    assert_eq!(loaded.default_category, "Other");
    assert_eq!(loaded.rule_set().classify("jpg"), "Images");
    assert_eq!(loaded.rule_set().classify("pdf"), "Docs");
    assert_eq!(loaded.rule_set().classify("xyz"), "Other");
}

#[test]
fn test_config_add_rule_persists() {
    let fixture = TestFixture::new();
    let config_path = fixture.path().join("sortd.toml");

    let mut config = test_config();
    let mut rules = config.rule_set();
    rules.add_rule("Ebooks", &["epub".to_string(), "mobi".to_string()]);
    config.categories = rules.rules().to_vec();
    config.save(&config_path).expect("save should succeed");

    let loaded = Config::load(Some(&config_path)).expect("load should succeed");
    assert_eq!(loaded.rule_set().classify("epub"), "Ebooks");
    // Earlier categories keep their extensions.
    assert_eq!(loaded.rule_set().classify("jpg"), "Images");
}

#[test]
fn test_config_missing_explicit_path_is_an_error() {
    let fixture = TestFixture::new();
    let missing = fixture.path().join("absent.toml");

    let result = Config::load(Some(&missing));
    assert!(matches!(result, Err(ConfigError::NotFound(_))));
}

#[test]
fn test_config_invalid_toml_is_an_error() {
    let fixture = TestFixture::new();
    let config_path = fixture.path().join("broken.toml");
    fs::write(&config_path, "not = [valid").expect("write should succeed");

    let result = Config::load(Some(&config_path));
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

// ============================================================================
// Watch mode
// ============================================================================

#[test]
fn test_watch_mode_places_new_files() {
    let fixture = TestFixture::new();
    let dir = fixture.path().to_path_buf();

    let organizer = Arc::new(organizer_from(&test_config()));
    let stop = StopSignal::new();

    let handle = {
        let organizer = Arc::clone(&organizer);
        let stop = stop.clone();
        let dir = dir.clone();
        std::thread::spawn(move || {
            watcher::run_watch(&organizer, &dir, &dir, Duration::from_millis(10), &stop)
        })
    };

    // Give the watcher time to register before creating the file.
    std::thread::sleep(Duration::from_millis(300));
    fs::write(dir.join("incoming.jpg"), b"jpeg data").expect("write should succeed");

    let target = dir.join("Images").join("incoming.jpg");
    let deadline = Instant::now() + Duration::from_secs(10);
    while !target.exists() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(100));
    }

    stop.stop();
    handle
        .join()
        .expect("watch thread should not panic")
        .expect("watch loop should exit cleanly");

    assert!(target.is_file(), "watched file should have been organized");
    assert!(!dir.join("incoming.jpg").exists());
}

#[test]
fn test_watch_ignores_temporary_files() {
    let fixture = TestFixture::new();
    let dir = fixture.path().to_path_buf();

    let organizer = Arc::new(organizer_from(&test_config()));
    let stop = StopSignal::new();

    let handle = {
        let organizer = Arc::clone(&organizer);
        let stop = stop.clone();
        let dir = dir.clone();
        std::thread::spawn(move || {
            watcher::run_watch(&organizer, &dir, &dir, Duration::from_millis(10), &stop)
        })
    };

    std::thread::sleep(Duration::from_millis(300));
    fs::write(dir.join("movie.mkv.part"), b"partial download").expect("write should succeed");
    std::thread::sleep(Duration::from_millis(800));

    stop.stop();
    handle
        .join()
        .expect("watch thread should not panic")
        .expect("watch loop should exit cleanly");

    fixture.assert_file_exists("movie.mkv.part");
    fixture.assert_file_absent("Other/movie.mkv.part");
}
