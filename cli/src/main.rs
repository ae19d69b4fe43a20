mod cli;
mod commands;

use cli::{Cli, Commands};
use commands::{cityhall, extract, landuse, naturalearth, population, regions};

/// Log to stdout without timestamps; `-v` raises geoprep's level from info to debug, `-vv` to trace.
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(format!("warn,geoprep={level},geoprep_cli={level}"))
        .with_writer(std::io::stdout)
        .with_target(false)
        .without_time()
        .init();
}

pub fn run() -> anyhow::Result<()> {
    use clap::Parser;

    let cli = Cli::parse();
    init_logging(cli.verbose);
    match &cli.command {
        Commands::Extract(args) => extract::run(&cli, args),
        Commands::Landuse(args) => landuse::run(&cli, args),
        Commands::Regions(args) => regions::run(&cli, args),
        Commands::Population(args) => population::run(&cli, args),
        Commands::Cityhall(args) => cityhall::run(&cli, args),
        Commands::NaturalEarth(args) => naturalearth::run(&cli, args),
    }
}

fn main() -> anyhow::Result<()> { run() }
