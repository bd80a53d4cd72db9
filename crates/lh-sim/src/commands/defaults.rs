use std::error::Error;
use std::fs;
use std::path::PathBuf;

use clap::Args;
use lh_exec::{to_yaml_string, DilutionConfig, PoolingConfig};

use super::Protocol;

#[derive(Args, Debug)]
pub struct DefaultsArgs {
    /// Protocol whose built-in configuration is printed.
    #[arg(long, value_enum)]
    pub protocol: Protocol,
    /// Write the YAML to a file instead of stdout.
    #[arg(long)]
    pub out: Option<PathBuf>,
}

pub fn run(args: &DefaultsArgs) -> Result<(), Box<dyn Error>> {
    let yaml = match args.protocol {
        Protocol::Dilution => to_yaml_string(&DilutionConfig::default())?,
        Protocol::Pooling => to_yaml_string(&PoolingConfig::default())?,
    };
    match &args.out {
        Some(path) => fs::write(path, yaml)?,
        None => print!("{yaml}"),
    }
    Ok(())
}
