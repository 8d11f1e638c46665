//! sortd - a rule-driven file organization utility
//!
//! This library classifies files by extension into named categories, resolves
//! collision-free destination names (detecting byte-identical duplicates),
//! and moves files into category subdirectories. It supports one-shot batch
//! organization, previews, directory statistics, a watch mode for organizing
//! files as they appear, and TOML-configured rules and exclusion filters.

pub mod cli;
pub mod config;
pub mod organizer;
pub mod output;
pub mod record;
pub mod rules;
pub mod watcher;

pub use config::{CompiledFilters, Config, ConfigError};
pub use organizer::{
    BatchSummary, OrganizeError, Organizer, OutcomeSink, PlacementOutcome, PlacementResult,
    PlannedMove, StopSignal,
};
pub use record::FileRecord;
pub use rules::{CategoryRule, RuleSet};
pub use watcher::{DirWatcher, WatchError};

pub use cli::{Cli, run};
