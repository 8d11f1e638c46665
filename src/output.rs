//! Console output formatting.
//!
//! Centralizes all CLI presentation: colored status lines, the batch
//! summary, category tables and human-readable sizes.

use crate::organizer::BatchSummary;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;

/// Styled console output for the CLI.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    ///
    /// # Arguments
    ///
    /// * `message` - The message to display
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sortd::output::OutputFormatter;
    /// OutputFormatter::success("Organization complete!");
    /// ```
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with a cross mark, to stderr.
    ///
    /// # Arguments
    ///
    /// * `message` - The message to display
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sortd::output::OutputFormatter;
    /// OutputFormatter::error("Failed to move file");
    /// ```
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    ///
    /// # Arguments
    ///
    /// * `message` - The message to display
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sortd::output::OutputFormatter;
    /// OutputFormatter::warning("Some files were skipped");
    /// ```
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Cyan informational line.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Plain unstyled line.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Bold section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Yellow dry-run marker line.
    pub fn dry_run_notice(message: &str) {
        println!("{}", format!("[DRY RUN] {}", message).yellow());
    }

    /// Creates a spinner shown while a batch run is in flight.
    ///
    /// # Arguments
    ///
    /// * `message` - The status text displayed next to the spinner
    pub fn create_spinner(message: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }

    /// Prints the batch counters.
    pub fn batch_summary(summary: &BatchSummary) {
        Self::header("RESULT");
        println!("  Total:   {}", summary.total);
        println!("  Moved:   {}", summary.success.to_string().green());
        println!("  Skipped: {}", summary.skipped.to_string().yellow());
        if summary.failed > 0 {
            println!("  Failed:  {}", summary.failed.to_string().red());
        } else {
            println!("  Failed:  {}", summary.failed);
        }
    }

    /// Prints a table of per-category file counts.
    pub fn category_table(counts: &HashMap<String, usize>, total_files: usize) {
        // Sort names for stable output.
        let mut categories: Vec<_> = counts.iter().collect();
        categories.sort_by_key(|&(name, _)| name);

        let width = categories
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max(8);

        println!("{:<width$} | {}", "Category".bold(), "Files".bold());
        println!("{}", "-".repeat(width + 10));

        for (category, count) in &categories {
            println!(
                "{:<width$} | {}",
                category,
                count.to_string().green(),
            );
        }

        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
        );
    }

    /// Formats a byte count for humans.
    ///
    /// # Example
    ///
    /// ```
    /// use sortd::output::OutputFormatter;
    /// assert_eq!(OutputFormatter::format_size(1536), "1.50 KB");
    /// assert_eq!(OutputFormatter::format_size(42), "42 B");
    /// ```
    pub fn format_size(size_bytes: u64) -> String {
        const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
        if size_bytes == 0 {
            return "0 B".to_string();
        }
        let mut size = size_bytes as f64;
        let mut unit = 0;
        while size >= 1024.0 && unit < UNITS.len() - 1 {
            size /= 1024.0;
            unit += 1;
        }
        if unit == 0 {
            format!("{} {}", size_bytes, UNITS[unit])
        } else {
            format!("{:.2} {}", size, UNITS[unit])
        }
    }
}
