mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{analyze, clip, import, isochrones};
use tracing_subscriber::EnvFilter;

/// Map the `-v` count onto a log filter; `RUST_LOG` wins when set.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Commands::Import(args) => import::run(&cli, args),
        Commands::Clip(args) => clip::run(&cli, args),
        Commands::Isochrones(args) => isochrones::run(&cli, args),
        Commands::Analyze(args) => analyze::run(&cli, args),
    }
}

fn main() -> anyhow::Result<()> { run() }
