use std::error::Error;

use clap::{ArgAction, Parser, Subcommand};
use commands::{
    check::{self, CheckArgs},
    defaults::{self, DefaultsArgs},
    dilute::{self, DiluteArgs},
    pool::{self, PoolArgs},
    version::{self, VersionArgs},
};
use tracing::Level;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "lh-sim", about = "Liquid-handling worklist executor CLI")]
struct Cli {
    /// Raise log verbosity (`-v` debug, `-vv` trace).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Pre-load water with one tip, then move DNA with a fresh tip per row.
    Dilute(DiluteArgs),
    /// Pool plate wells into tubes with a fresh tip per row.
    Pool(PoolArgs),
    /// Parse and validate a worklist without running it.
    Check(CheckArgs),
    /// Print the built-in protocol configuration as YAML.
    Defaults(DefaultsArgs),
    /// Print version information.
    Version(VersionArgs),
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.command {
        Command::Dilute(args) => dilute::run(&args),
        Command::Pool(args) => pool::run(&args),
        Command::Check(args) => check::run(&args),
        Command::Defaults(args) => defaults::run(&args),
        Command::Version(args) => version::run(&args),
    }
}
