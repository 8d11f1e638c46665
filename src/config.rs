//! Configuration: classification rules, exclusion filters, watch settings.
//!
//! Configuration is stored in TOML:
//!
//! ```toml
//! default_category = "Other"
//! organize_by_date = false
//! date_format = "%Y-%m"
//!
//! [[category]]
//! name = "Images"
//! extensions = ["jpg", "png"]
//!
//! [filters]
//! process_hidden_files = false
//! excluded_extensions = ["tmp", "temp", "log", "cache"]
//! excluded_filenames = ["Thumbs.db", ".DS_Store", "desktop.ini"]
//! excluded_patterns = ["*.part"]
//! excluded_regex = []
//!
//! [watch]
//! settle_delay_ms = 1000
//! ```
//!
//! Categories are an ordered array of tables so the first-match tie-break
//! for duplicated extensions is stable.

use crate::rules::{CategoryRule, RuleSet};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading, saving or compiling configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Invalid glob pattern '{0}'")]
    InvalidGlobPattern(String),

    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },

    #[error("IO error reading configuration: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level configuration, deserialized from TOML.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Classification rules in priority order.
    #[serde(rename = "category", default = "default_categories")]
    pub categories: Vec<CategoryRule>,

    /// Category assigned when no rule matches.
    #[serde(default = "default_default_category")]
    pub default_category: String,

    /// Whether to add a date subfolder under each category.
    #[serde(default)]
    pub organize_by_date: bool,

    /// Format for the date subfolder.
    #[serde(default = "default_date_format")]
    pub date_format: String,

    /// Rules for excluding files from organization.
    #[serde(default)]
    pub filters: FilterRules,

    /// Watch mode settings.
    #[serde(default)]
    pub watch: WatchSettings,
}

/// Exclusion rules applied before a file is placed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether to organize hidden (`.` or `~` prefixed) files. Defaults to false.
    #[serde(default)]
    pub process_hidden_files: bool,

    /// Extensions to skip (stored without the leading dot).
    #[serde(default = "default_excluded_extensions")]
    pub excluded_extensions: Vec<String>,

    /// Exact filenames to skip.
    #[serde(default = "default_excluded_filenames")]
    pub excluded_filenames: Vec<String>,

    /// Glob patterns to skip, matched against the file name.
    #[serde(default)]
    pub excluded_patterns: Vec<String>,

    /// Regex patterns to skip, matched against the file name.
    #[serde(default)]
    pub excluded_regex: Vec<String>,
}

/// Settings for the directory watch mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchSettings {
    /// How long to wait after a create event before placing the file,
    /// giving the writer time to finish.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

fn default_categories() -> Vec<CategoryRule> {
    RuleSet::default().rules().to_vec()
}

fn default_default_category() -> String {
    "Other".to_string()
}

fn default_date_format() -> String {
    "%Y-%m".to_string()
}

fn default_excluded_extensions() -> Vec<String> {
    vec!["tmp", "temp", "log", "cache"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_excluded_filenames() -> Vec<String> {
    vec!["Thumbs.db", ".DS_Store", "desktop.ini"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_settle_delay_ms() -> u64 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            categories: default_categories(),
            default_category: default_default_category(),
            organize_by_date: false,
            date_format: default_date_format(),
            filters: FilterRules::default(),
            watch: WatchSettings::default(),
        }
    }
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            process_hidden_files: false,
            excluded_extensions: default_excluded_extensions(),
            excluded_filenames: default_excluded_filenames(),
            excluded_patterns: Vec::new(),
            excluded_regex: Vec::new(),
        }
    }
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            settle_delay_ms: default_settle_delay_ms(),
        }
    }
}

impl Config {
    /// Load configuration, falling back through the search chain:
    ///
    /// 1. An explicitly provided path (missing file is an error here)
    /// 2. `.sortd.toml` in the current directory
    /// 3. `~/.config/sortd/config.toml`
    /// 4. Built-in defaults
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if an explicitly provided path does
    /// not exist, and `ConfigError::Invalid` if a file is found but cannot
    /// be parsed. A missing file elsewhere in the chain is not an error.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".sortd.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(home_config) = Self::default_path()
            && home_config.exists()
        {
            return Self::load_from_file(&home_config);
        }

        Ok(Self::default())
    }

    /// The per-user config location, `~/.config/sortd/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        std::env::var("HOME").ok().map(|home| {
            PathBuf::from(home)
                .join(".config")
                .join("sortd")
                .join("config.toml")
        })
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Serialize the configuration back to `path`, creating parent
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file or its parent directories
    /// cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Builds the runtime rule set from the configured categories.
    pub fn rule_set(&self) -> RuleSet {
        RuleSet::new(
            self.categories.clone(),
            self.default_category.clone(),
            self.organize_by_date,
            self.date_format.clone(),
        )
    }

    /// Pre-compiles the exclusion filters for per-file matching.
    ///
    /// # Errors
    ///
    /// Returns an error if any configured glob or regex pattern is invalid.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }
}

/// Pre-compiled exclusion filters.
///
/// Glob and regex patterns are compiled once so per-file checks are a set
/// lookup plus a linear scan over the configured patterns.
pub struct CompiledFilters {
    process_hidden_files: bool,
    excluded_filenames: HashSet<String>,
    excluded_extensions: HashSet<String>,
    excluded_patterns: Vec<Pattern>,
    excluded_regexes: Vec<Regex>,
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let excluded_patterns = rules
            .excluded_patterns
            .iter()
            .map(|p| Pattern::new(p).map_err(|_| ConfigError::InvalidGlobPattern(p.clone())))
            .collect::<Result<Vec<_>, _>>()?;

        let excluded_regexes = rules
            .excluded_regex
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: p.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            process_hidden_files: rules.process_hidden_files,
            excluded_filenames: rules.excluded_filenames.iter().cloned().collect(),
            excluded_extensions: rules
                .excluded_extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            excluded_patterns,
            excluded_regexes,
        })
    }

    /// Whether a file name is hidden by the `.`/`~` prefix convention.
    pub fn is_hidden(&self, file_name: &str) -> bool {
        file_name.starts_with('.') || file_name.starts_with('~')
    }

    /// Whether a file should be organized.
    ///
    /// Checks, in order: hidden-file prefix, exact filename, extension,
    /// glob patterns, regex patterns.
    pub fn should_process(&self, file_name: &str) -> bool {
        if !self.process_hidden_files && self.is_hidden(file_name) {
            return false;
        }

        if self.excluded_filenames.contains(file_name) {
            return false;
        }

        if let Some(idx) = file_name.rfind('.')
            && idx > 0
        {
            let ext = file_name[idx + 1..].to_lowercase();
            if self.excluded_extensions.contains(&ext) {
                return false;
            }
        }

        if self.excluded_patterns.iter().any(|p| p.matches(file_name)) {
            return false;
        }

        if self.excluded_regexes.iter().any(|r| r.is_match(file_name)) {
            return false;
        }

        true
    }
}
