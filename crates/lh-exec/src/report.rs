use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use lh_core::errors::ErrorInfo;
use lh_core::{LhError, Mount, RunProvenance, SchemaVersion};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::instrument::{PipetteStats, PipetteTracker};
use crate::transfer::PhaseCounters;

/// Summary of one protocol phase (water distribution, DNA transfer, pooling).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseReport {
    pub name: String,
    pub pipette: String,
    pub mount: Mount,
    pub rows: usize,
    pub tips_used: usize,
    pub aspirations: usize,
    pub dispenses: usize,
    pub blow_outs: usize,
    /// Refills after the initial fill; zero for one-tip-per-row phases.
    pub refills: usize,
    pub volume_dispensed_ul: f64,
}

impl PhaseReport {
    /// Builds a phase entry from the replay counters and the pipette that ran it.
    ///
    /// Pipette statistics are cumulative, so `before` is the snapshot taken
    /// when the phase started.
    pub(crate) fn from_phase(
        name: &str,
        pipette: &PipetteTracker,
        before: &PipetteStats,
        counters: &PhaseCounters,
    ) -> Self {
        let stats = pipette.stats();
        Self {
            name: name.to_string(),
            pipette: pipette.model().name.clone(),
            mount: pipette.mount(),
            rows: counters.rows,
            tips_used: stats.tips_picked - before.tips_picked,
            aspirations: stats.aspirations - before.aspirations,
            dispenses: stats.dispenses - before.dispenses,
            blow_outs: stats.blow_outs - before.blow_outs,
            refills: counters.refills,
            volume_dispensed_ul: counters.dispensed_ul,
        }
    }
}

/// Report written after a successful run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub schema_version: SchemaVersion,
    pub protocol: String,
    pub provenance: RunProvenance,
    pub phases: Vec<PhaseReport>,
}

impl ExecutionReport {
    pub(crate) fn new(protocol: &str, worklist_hash: String, config_hash: String) -> Self {
        let mut tool_versions = BTreeMap::new();
        tool_versions.insert("lh-exec".to_string(), env!("CARGO_PKG_VERSION").to_string());
        Self {
            schema_version: SchemaVersion::default(),
            protocol: protocol.to_string(),
            provenance: RunProvenance {
                worklist_hash,
                config_hash,
                worklist_id: None,
                created_at: chrono::Utc::now().to_rfc3339(),
                tool_versions,
            },
            phases: Vec::new(),
        }
    }

    /// Total tips consumed across every phase.
    pub fn tips_used(&self) -> usize {
        self.phases.iter().map(|phase| phase.tips_used).sum()
    }

    /// Writes the report to a JSON file.
    pub fn write(&self, path: &Path) -> Result<(), LhError> {
        write_json(self, path)
    }

    /// Loads a report from disk.
    pub fn load(path: &Path) -> Result<Self, LhError> {
        read_json(path)
    }
}

fn io_error(code: &str, err: impl ToString, path: &Path) -> LhError {
    LhError::Io(ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()))
}

/// Writes any serializable artefact as pretty JSON, creating parent directories.
pub fn write_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<(), LhError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|err| io_error("lh_exec.report_mkdir", err, parent))?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|err| io_error("lh_exec.report_serialize", err, path))?;
    fs::write(path, json).map_err(|err| io_error("lh_exec.report_write", err, path))
}

/// Reads a JSON artefact written by [`write_json`].
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, LhError> {
    let contents =
        fs::read_to_string(path).map_err(|err| io_error("lh_exec.report_read", err, path))?;
    serde_json::from_str(&contents).map_err(|err| io_error("lh_exec.report_parse", err, path))
}
