//! usdgen - procedural USDA scene assembly.

use anyhow::Result;
use clap::Parser;

use usdgen_cli::cli::Cli;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG still wins over -v
    let level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    usdgen_cli::run(&cli)
}
