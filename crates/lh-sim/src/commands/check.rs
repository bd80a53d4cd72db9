use std::error::Error;
use std::path::PathBuf;

use clap::Args;
use lh_exec::{
    load_or_default, plan_dilution, plan_pooling, DilutionConfig, LabwareCatalog, PoolingConfig,
};
use lh_worklist::{
    read_dilution, read_pooling, summarize_dilution, summarize_pooling, to_canonical_json_bytes,
    WorklistSummary,
};
use serde::Serialize;

use super::Protocol;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Worklist CSV to validate.
    #[arg(long)]
    pub worklist: PathBuf,
    /// Worklist format.
    #[arg(long, value_enum)]
    pub kind: Protocol,
    /// YAML protocol configuration to validate against; built-in when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct CheckReport {
    summary: WorklistSummary,
    tips_required: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    water_refills: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    water_drawn_ul: Option<f64>,
}

pub fn run(args: &CheckArgs) -> Result<(), Box<dyn Error>> {
    let catalog = LabwareCatalog::builtin();
    let report = match args.kind {
        Protocol::Dilution => {
            let worklist = read_dilution(&args.worklist)?;
            let config: DilutionConfig = load_or_default(args.config.as_deref())?;
            let plan = plan_dilution(&worklist, &config, &catalog)?;
            CheckReport {
                summary: summarize_dilution(&worklist)?,
                tips_required: plan.dna.len() + 1,
                water_refills: Some(plan.water.refill_count()),
                water_drawn_ul: Some(plan.water.source_volume_ul()),
            }
        }
        Protocol::Pooling => {
            let worklist = read_pooling(&args.worklist)?;
            let config: PoolingConfig = load_or_default(args.config.as_deref())?;
            let plan = plan_pooling(&worklist, &config, &catalog)?;
            CheckReport {
                summary: summarize_pooling(&worklist)?,
                tips_required: plan.transfers.len(),
                water_refills: None,
                water_drawn_ul: None,
            }
        }
    };
    tracing::debug!(rows = report.summary.rows, "worklist is valid");
    let json = to_canonical_json_bytes(&report)?;
    println!("{}", String::from_utf8(json)?);
    Ok(())
}
