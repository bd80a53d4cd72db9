pub mod check;
pub mod defaults;
pub mod dilute;
pub mod pool;
pub mod version;

use std::error::Error;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use clap::ValueEnum;
use lh_core::LhError;
use lh_exec::{write_json, CommandKind, ExecutionReport, SimulatedRuntime};

/// Worklist flavour selected on the command line.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Protocol {
    Dilution,
    Pooling,
}

/// Simulated hardware fault, written `<command>:<occurrence>` (e.g. `pick_up_tip:3`).
#[derive(Clone, Copy, Debug)]
pub struct FaultSpec {
    pub kind: CommandKind,
    pub occurrence: usize,
}

impl FromStr for FaultSpec {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (name, occurrence) = value
            .split_once(':')
            .ok_or_else(|| format!("expected <command>:<occurrence>, got `{value}`"))?;
        let kind: CommandKind = serde_json::from_value(serde_json::Value::String(name.into()))
            .map_err(|_| format!("unknown command `{name}`"))?;
        let occurrence: usize = occurrence
            .parse()
            .map_err(|_| format!("occurrence must be a positive integer, got `{occurrence}`"))?;
        if occurrence == 0 {
            return Err("occurrence is 1-based".into());
        }
        Ok(Self { kind, occurrence })
    }
}

pub fn simulated_runtime(fault: Option<FaultSpec>) -> SimulatedRuntime {
    let mut runtime = SimulatedRuntime::default();
    if let Some(fault) = fault {
        tracing::warn!(command = ?fault.kind, occurrence = fault.occurrence, "fault injection enabled");
        runtime.inject_fault(fault.kind, fault.occurrence);
    }
    runtime
}

/// Writes the command log plus either `report.json` or `failure.json`.
pub fn finish(
    out: &Path,
    runtime: SimulatedRuntime,
    result: Result<ExecutionReport, LhError>,
) -> Result<(), Box<dyn Error>> {
    fs::create_dir_all(out)?;
    write_json(runtime.commands(), &out.join("commands.json"))?;
    let (written, stale) = match &result {
        Ok(report) => {
            report.write(&out.join("report.json"))?;
            ("report.json", "failure.json")
        }
        Err(err) => {
            write_json(err, &out.join("failure.json"))?;
            ("failure.json", "report.json")
        }
    };
    if out.join(stale).exists() {
        fs::remove_file(out.join(stale))?;
    }

    match result {
        Ok(report) => {
            tracing::info!(
                commands = runtime.commands().len(),
                tips = report.tips_used(),
                out = %out.join(written).display(),
                "run complete"
            );
            Ok(())
        }
        Err(err) => {
            tracing::error!(
                family = err.family(),
                code = %err.info().code,
                commands = runtime.commands().len(),
                "run aborted"
            );
            Err(Box::new(err))
        }
    }
}
