//! Extension-based classification rules.
//!
//! A [`RuleSet`] maps file extensions to named categories. Categories keep
//! their configured order, and a reverse index from extension to category
//! makes classification O(1) per file instead of scanning every rule.
//!
//! # Examples
//!
//! ```
//! use sortd::rules::{CategoryRule, RuleSet};
//!
//! let rules = RuleSet::default();
//! assert_eq!(rules.classify(".pdf"), "Documents");
//! assert_eq!(rules.classify("JPG"), "Images");
//! assert_eq!(rules.classify(".xyz"), "Other");
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One named category and the extensions that belong to it.
///
/// Extensions are stored normalized: lower-cased, without the leading dot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryRule {
    /// Category name, used as the destination subdirectory name.
    pub name: String,
    /// Extensions claimed by this category.
    pub extensions: Vec<String>,
}

impl CategoryRule {
    /// Creates a rule with normalized extensions.
    pub fn new(name: &str, extensions: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            extensions: extensions.iter().map(|e| normalize_extension(e)).collect(),
        }
    }
}

/// Ordered set of classification rules plus placement options.
///
/// Rule order matters: if an extension appears in more than one category
/// (a misconfiguration, not an error), the first category wins, and that
/// choice is stable across runs.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<CategoryRule>,
    /// Category assigned when no rule matches.
    pub default_category: String,
    /// Whether to add a date-derived subfolder under the category.
    pub organize_by_date: bool,
    /// `chrono` format string for the date subfolder, e.g. `%Y-%m`.
    pub date_format: String,
    // Reverse index: normalized extension -> index into `rules`.
    index: HashMap<String, usize>,
}

impl RuleSet {
    /// Builds a rule set, normalizing every extension and indexing them.
    pub fn new(
        rules: Vec<CategoryRule>,
        default_category: String,
        organize_by_date: bool,
        date_format: String,
    ) -> Self {
        let mut set = Self {
            rules,
            default_category,
            organize_by_date,
            date_format,
            index: HashMap::new(),
        };
        set.normalize();
        set.rebuild_index();
        set
    }

    /// Returns the category for a file extension.
    ///
    /// The extension may be given with or without the leading dot and in any
    /// case. Always returns a category: unmatched (or empty) extensions map
    /// to the default category.
    ///
    /// # Example
    ///
    /// ```
    /// use sortd::rules::RuleSet;
    /// let rules = RuleSet::default();
    /// assert_eq!(rules.classify(".MP3"), "Audio");
    /// assert_eq!(rules.classify("unknown"), "Other");
    /// ```
    pub fn classify(&self, extension: &str) -> &str {
        let ext = normalize_extension(extension);
        if ext.is_empty() {
            return &self.default_category;
        }
        match self.index.get(&ext) {
            Some(&idx) => &self.rules[idx].name,
            None => &self.default_category,
        }
    }

    /// Adds extensions to a category, creating the category if needed.
    ///
    /// Extensions already claimed by an earlier category keep their original
    /// owner (first match wins); within the target category duplicates are
    /// dropped.
    ///
    /// # Arguments
    ///
    /// * `category` - Category name, created if it does not exist
    /// * `extensions` - Extensions to claim, normalized before insertion
    pub fn add_rule(&mut self, category: &str, extensions: &[String]) {
        let normalized: Vec<String> = extensions
            .iter()
            .map(|e| normalize_extension(e))
            .filter(|e| !e.is_empty())
            .collect();

        match self.rules.iter_mut().find(|r| r.name == category) {
            Some(rule) => {
                for ext in normalized {
                    if !rule.extensions.contains(&ext) {
                        rule.extensions.push(ext);
                    }
                }
            }
            None => self.rules.push(CategoryRule {
                name: category.to_string(),
                extensions: normalized,
            }),
        }
        self.rebuild_index();
    }

    /// Removes a category rule and frees its extensions.
    ///
    /// Returns `false` if no category with that name exists. Extensions the
    /// removed category had claimed over a later duplicate fall to the next
    /// category in order once the index is rebuilt.
    pub fn remove_rule(&mut self, category: &str) -> bool {
        let before = self.rules.len();
        self.rules.retain(|r| r.name != category);
        if self.rules.len() == before {
            return false;
        }
        self.rebuild_index();
        true
    }

    /// All category names in rule order, with the default category last.
    pub fn category_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.rules.iter().map(|r| r.name.as_str()).collect();
        names.push(&self.default_category);
        names
    }

    /// The rules in their configured order.
    pub fn rules(&self) -> &[CategoryRule] {
        &self.rules
    }

    /// Total number of extensions across all rules.
    pub fn extension_count(&self) -> usize {
        self.rules.iter().map(|r| r.extensions.len()).sum()
    }

    fn normalize(&mut self) {
        for rule in &mut self.rules {
            for ext in &mut rule.extensions {
                *ext = normalize_extension(ext);
            }
            rule.extensions.retain(|e| !e.is_empty());
        }
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (idx, rule) in self.rules.iter().enumerate() {
            for ext in &rule.extensions {
                // First category to claim an extension keeps it.
                self.index.entry(ext.clone()).or_insert(idx);
            }
        }
    }
}

impl Default for RuleSet {
    /// The built-in rules: common personal-file categories.
    fn default() -> Self {
        Self::new(
            vec![
                CategoryRule::new(
                    "Images",
                    &["jpg", "jpeg", "png", "gif", "bmp", "tiff", "svg", "webp", "ico"],
                ),
                CategoryRule::new(
                    "Documents",
                    &["doc", "docx", "pdf", "txt", "rtf", "odt", "pages", "md"],
                ),
                CategoryRule::new("Spreadsheets", &["xls", "xlsx", "csv", "ods", "numbers"]),
                CategoryRule::new("Presentations", &["ppt", "pptx", "odp", "key"]),
                CategoryRule::new(
                    "Audio",
                    &["mp3", "wav", "flac", "aac", "ogg", "wma", "m4a"],
                ),
                CategoryRule::new(
                    "Video",
                    &["mp4", "avi", "mkv", "mov", "wmv", "flv", "webm", "m4v"],
                ),
                CategoryRule::new("Archives", &["zip", "rar", "7z", "tar", "gz", "bz2", "xz"]),
                CategoryRule::new(
                    "Programs",
                    &["exe", "msi", "dmg", "pkg", "deb", "rpm", "app"],
                ),
                CategoryRule::new(
                    "Code",
                    &["py", "js", "html", "css", "java", "cpp", "c", "php", "rb", "go", "rs"],
                ),
                CategoryRule::new("Fonts", &["ttf", "otf", "woff", "woff2", "eot"]),
            ],
            "Other".to_string(),
            false,
            "%Y-%m".to_string(),
        )
    }
}

/// Strips leading dots and lower-cases an extension.
fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}
