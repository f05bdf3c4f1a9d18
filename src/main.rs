mod config;
mod metric;
mod naming;
mod prompt;
mod session;
mod store;

use clap::Parser;
use std::path::PathBuf;

/// Prompt for personal metrics and append a timestamped row to the
/// tracker's CSV log.
#[derive(Parser, Debug)]
#[command(name = "tally", version, about)]
pub struct Cli {
    /// Tracker definition file (TOML)
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Data directory (overrides config)
    #[arg(short, long)]
    data_dir: Option<PathBuf>,

    /// Max prompt attempts per metric, 0 = retry forever (overrides config)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Validate the config and print resolved metrics, don't prompt
    #[arg(long)]
    dry_run: bool,

    /// Suppress the title banner
    #[arg(short, long)]
    quiet: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_target(false)
        .with_thread_ids(false)
        .init();

    tracing::debug!(?cli, "parsed CLI arguments");

    if let Err(e) = run(&cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = config::TrackerConfig::load(&cli.config)?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = dir.clone();
    }
    if let Some(n) = cli.max_attempts {
        config.max_attempts = n;
    }

    let session = session::TrackerSession::from_config(&config)?;

    if cli.dry_run {
        println!("Tracker: {}", session.tracker());
        println!("Store:   {}", session.store_path().display());
        for metric in session.metrics() {
            println!("  {} ({})", metric.name(), metric.kind());
        }
        return Ok(());
    }

    let mut prompter = prompt::StdinPrompter::new();
    session.run(&mut prompter, cli.quiet)?;
    Ok(())
}
