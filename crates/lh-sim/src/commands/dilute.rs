use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use lh_exec::{load_or_default, DilutionConfig, Executor};
use lh_worklist::read_dilution;

use super::FaultSpec;

#[derive(Args, Debug)]
pub struct DiluteArgs {
    /// Dilution worklist CSV with `Well`, `Vol of dna` and `Vol of water` columns.
    #[arg(long)]
    pub worklist: PathBuf,
    /// YAML protocol configuration; the built-in deck layout is used when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Output directory for the command log and report.
    #[arg(long)]
    pub out: PathBuf,
    /// Fail the simulated run at `<command>:<occurrence>`.
    #[arg(long)]
    pub fault: Option<FaultSpec>,
}

pub fn run(args: &DiluteArgs) -> Result<(), Box<dyn Error>> {
    let worklist = read_dilution(&args.worklist)?;
    let config: DilutionConfig = load_or_default(args.config.as_deref())?;
    let mut runtime = super::simulated_runtime(args.fault);
    let result = Executor::new(&mut runtime).run_dilution(&worklist, &config);
    super::finish(&args.out, runtime, result)
}
