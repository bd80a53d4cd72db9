use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use lh_exec::{load_or_default, Executor, PoolingConfig};
use lh_worklist::read_pooling;

use super::FaultSpec;

#[derive(Args, Debug)]
pub struct PoolArgs {
    /// Pooling worklist CSV: an id preamble line, then `SourceWell`,
    /// `DestinationWell` and `VolumeToTransfer` columns.
    #[arg(long)]
    pub worklist: PathBuf,
    /// YAML protocol configuration; the built-in deck layout is used when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Output directory for the command log and report.
    #[arg(long)]
    pub out: PathBuf,
    /// Skip the operator pause showing the worklist id.
    #[arg(long)]
    pub no_confirm: bool,
    /// Fail the simulated run at `<command>:<occurrence>`.
    #[arg(long)]
    pub fault: Option<FaultSpec>,
}

pub fn run(args: &PoolArgs) -> Result<(), Box<dyn Error>> {
    let worklist = read_pooling(&args.worklist)?;
    let mut config: PoolingConfig = load_or_default(args.config.as_deref())?;
    if args.no_confirm {
        config.confirm_worklist = false;
    }
    let mut runtime = super::simulated_runtime(args.fault);
    let result = Executor::new(&mut runtime).run_pooling(&worklist, &config);
    super::finish(&args.out, runtime, result)
}
