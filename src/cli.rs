//! Command-line interface.
//!
//! Maps user commands onto the placement engine: batch organization (with a
//! dry-run mode), directory watching, previews, directory statistics and
//! rule management.

use crate::config::{Config, ConfigError};
use crate::organizer::{Organizer, PlannedMove, StopSignal};
use crate::output::OutputFormatter;
use crate::watcher;
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// sortd - classify files into category subdirectories by extension rules.
#[derive(Parser, Debug)]
#[command(name = "sortd")]
#[command(version)]
#[command(about = "Rule-driven file organizer", long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential log output.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Organize the files of a directory into category subdirectories.
    Organize {
        /// Directory whose files should be organized.
        dir: PathBuf,

        /// Destination root; defaults to the source directory itself.
        #[arg(short, long)]
        target: Option<PathBuf>,

        /// Show what would happen without moving anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Watch a directory and organize new files as they appear.
    Watch {
        /// Directory to watch.
        dir: PathBuf,

        /// Destination root; defaults to the watched directory itself.
        #[arg(short, long)]
        target: Option<PathBuf>,
    },

    /// Preview how files would be organized, grouped by category.
    Preview {
        /// Directory to preview.
        dir: PathBuf,

        /// Maximum number of files to list.
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Show file statistics for a directory.
    Stats {
        /// Directory to analyze.
        dir: PathBuf,
    },

    /// Manage the configuration.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print a summary of the active configuration.
    Show,

    /// Write the default configuration to the config file.
    Reset,

    /// Add extensions to a category rule (comma separated).
    AddRule {
        /// Category name, used as the destination subdirectory.
        category: String,

        /// Extensions, e.g. "epub,mobi,azw3".
        extensions: String,
    },

    /// Remove a category rule and its extensions.
    RemoveRule {
        /// Category name to remove.
        category: String,
    },

    /// Write the active configuration to a file.
    Export {
        /// Destination path for the exported TOML.
        path: PathBuf,
    },

    /// Replace the configuration with the contents of a TOML file.
    Import {
        /// File to import; it is validated before anything is overwritten.
        path: PathBuf,
    },
}

/// Executes the parsed command.
pub fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Organize {
            dir,
            target,
            dry_run,
        } => cmd_organize(&config, dir, target, dry_run),
        Commands::Watch { dir, target } => cmd_watch(&config, dir, target),
        Commands::Preview { dir, limit } => cmd_preview(&config, dir, limit),
        Commands::Stats { dir } => cmd_stats(&config, dir),
        Commands::Config { action } => cmd_config(config, cli.config, action),
    }
}

/// Loads configuration, falling back to defaults when the file is present
/// but malformed. A missing explicitly-given path is still an error.
fn load_config(cli: &Cli) -> Result<Config> {
    match Config::load(cli.config.as_deref()) {
        Ok(config) => Ok(config),
        Err(e @ ConfigError::Invalid(_)) => {
            warn!(error = %e, "configuration invalid, using defaults");
            OutputFormatter::warning(&format!("{}; using default configuration", e));
            Ok(Config::default())
        }
        Err(e) => Err(e).context("failed to load configuration"),
    }
}

fn build_organizer(config: &Config) -> Result<Organizer> {
    let filters = config
        .compile_filters()
        .context("invalid filter configuration")?;
    Ok(Organizer::new(config.rule_set(), filters))
}

fn cmd_organize(
    config: &Config,
    dir: PathBuf,
    target: Option<PathBuf>,
    dry_run: bool,
) -> Result<()> {
    if !dir.is_dir() {
        bail!("directory does not exist: {}", dir.display());
    }
    let target_root = target.unwrap_or_else(|| dir.clone());
    let organizer = build_organizer(config)?;

    if dry_run {
        OutputFormatter::dry_run_notice(&format!("Analyzing {}", dir.display()));
        let planned = organizer.preview(&dir, &target_root)?;
        print_planned(&planned, usize::MAX);
        OutputFormatter::success("Dry run complete. No files were modified.");
        return Ok(());
    }

    OutputFormatter::info(&format!("Organizing {}", dir.display()));
    let spinner = OutputFormatter::create_spinner("Organizing files...");
    let summary = organizer.place_all(&dir, &target_root, &StopSignal::new())?;
    spinner.finish_and_clear();

    OutputFormatter::batch_summary(&summary);
    if summary.failed > 0 {
        OutputFormatter::warning("Some files could not be organized; see the log above.");
    } else {
        OutputFormatter::success("Organization complete!");
    }
    Ok(())
}

fn cmd_watch(config: &Config, dir: PathBuf, target: Option<PathBuf>) -> Result<()> {
    if !dir.is_dir() {
        bail!("watch directory does not exist: {}", dir.display());
    }
    let target_root = target.unwrap_or_else(|| dir.clone());
    let organizer = build_organizer(config)?;
    let settle_delay = Duration::from_millis(config.watch.settle_delay_ms);

    OutputFormatter::info(&format!("Watching {}", dir.display()));
    OutputFormatter::plain("New files will be organized automatically. Press Ctrl+C to stop.");

    // Runs until the process is terminated; a single move is atomic, so
    // stopping between files loses nothing.
    let stop = StopSignal::new();
    watcher::run_watch(&organizer, &dir, &target_root, settle_delay, &stop)
        .context("watch session failed")?;
    Ok(())
}

fn cmd_preview(config: &Config, dir: PathBuf, limit: usize) -> Result<()> {
    if !dir.is_dir() {
        bail!("directory does not exist: {}", dir.display());
    }
    let organizer = build_organizer(config)?;
    let planned = organizer.preview(&dir, &dir)?;
    print_planned(&planned, limit);
    Ok(())
}

fn print_planned(planned: &[PlannedMove], limit: usize) {
    if planned.is_empty() {
        OutputFormatter::plain("No files found to organize.");
        return;
    }

    OutputFormatter::plain(&format!("{} file(s) would be organized:", planned.len()));

    let mut by_category: HashMap<&str, Vec<&PlannedMove>> = HashMap::new();
    for item in planned.iter().take(limit) {
        by_category.entry(&item.category).or_default().push(item);
    }

    let mut categories: Vec<_> = by_category.into_iter().collect();
    categories.sort_by_key(|&(name, _)| name);

    for (category, files) in categories {
        OutputFormatter::header(&format!("{} ({} file(s))", category, files.len()));
        for item in files {
            OutputFormatter::plain(&format!(
                "  {} ({}) → {}/",
                item.file_name,
                OutputFormatter::format_size(item.size),
                item.target_dir.display()
            ));
        }
    }

    if planned.len() > limit {
        OutputFormatter::plain(&format!("... and {} more", planned.len() - limit));
    }
}

fn cmd_stats(config: &Config, dir: PathBuf) -> Result<()> {
    if !dir.is_dir() {
        bail!("directory does not exist: {}", dir.display());
    }
    let organizer = build_organizer(config)?;
    let stats = organizer.statistics(&dir)?;

    OutputFormatter::header(&format!("Statistics for {}", dir.display()));
    OutputFormatter::plain(&format!("Files: {}", stats.total_files));
    OutputFormatter::plain(&format!(
        "Total size: {}",
        OutputFormatter::format_size(stats.total_size)
    ));

    OutputFormatter::header("By category");
    OutputFormatter::category_table(&stats.by_category, stats.total_files);

    OutputFormatter::header("Top extensions");
    let mut extensions: Vec<_> = stats.by_extension.iter().collect();
    extensions.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (ext, count) in extensions.into_iter().take(10) {
        let display = if ext.is_empty() { "(none)" } else { ext };
        OutputFormatter::plain(&format!("  {}: {}", display, count));
    }
    Ok(())
}

fn cmd_config(mut config: Config, config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let rules = config.rule_set();
            OutputFormatter::header("Configuration");
            OutputFormatter::plain(&format!("Categories: {}", config.categories.len()));
            OutputFormatter::plain(&format!("Extensions: {}", rules.extension_count()));
            OutputFormatter::plain(&format!("Default category: {}", config.default_category));
            OutputFormatter::plain(&format!("Organize by date: {}", config.organize_by_date));

            OutputFormatter::header("Rules");
            for rule in rules.rules() {
                OutputFormatter::plain(&format!("  {}: {}", rule.name, rule.extensions.join(", ")));
            }
            Ok(())
        }
        ConfigAction::Reset => {
            let path = writable_config_path(config_path)?;
            Config::default().save(&path)?;
            OutputFormatter::success(&format!("Configuration reset: {}", path.display()));
            Ok(())
        }
        ConfigAction::AddRule {
            category,
            extensions,
        } => {
            let ext_list: Vec<String> = extensions
                .split(',')
                .map(|e| e.trim().to_string())
                .filter(|e| !e.is_empty())
                .collect();
            if ext_list.is_empty() {
                bail!("no extensions given");
            }

            let mut rules = config.rule_set();
            rules.add_rule(&category, &ext_list);
            config.categories = rules.rules().to_vec();

            let path = writable_config_path(config_path)?;
            config.save(&path)?;
            OutputFormatter::success(&format!(
                "Added rule: {} -> {}",
                category,
                ext_list.join(", ")
            ));
            Ok(())
        }
        ConfigAction::RemoveRule { category } => {
            let mut rules = config.rule_set();
            if !rules.remove_rule(&category) {
                bail!("no such category: {}", category);
            }
            config.categories = rules.rules().to_vec();

            let path = writable_config_path(config_path)?;
            config.save(&path)?;
            OutputFormatter::success(&format!("Removed rule: {}", category));
            Ok(())
        }
        ConfigAction::Export { path } => {
            config.save(&path)?;
            OutputFormatter::success(&format!("Configuration exported: {}", path.display()));
            Ok(())
        }
        ConfigAction::Import { path } => {
            let imported =
                Config::load(Some(&path)).context("cannot import configuration file")?;
            let dest = writable_config_path(config_path)?;
            imported.save(&dest)?;
            OutputFormatter::success(&format!(
                "Configuration imported from {}",
                path.display()
            ));
            Ok(())
        }
    }
}

/// Where configuration changes are written: the explicit `--config` path if
/// given, otherwise the per-user location.
fn writable_config_path(config_path: Option<PathBuf>) -> Result<PathBuf> {
    config_path
        .or_else(Config::default_path)
        .context("cannot determine a config file location (HOME not set)")
}
