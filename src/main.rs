use clap::Parser;
use sortd::cli::Cli;
use sortd::output::OutputFormatter;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // RUST_LOG overrides the flag-derived default.
    let default_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    if let Err(e) = sortd::cli::run(cli) {
        OutputFormatter::error(&format!("{e:#}"));
        std::process::exit(1);
    }
}
