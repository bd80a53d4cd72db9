use lh_core::LhError;
use serde::{Deserialize, Serialize};

use crate::dilution::DilutionWorklist;
use crate::hash::stable_hash_string;
use crate::pooling::PoolingWorklist;

/// Supported worklist layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorklistKind {
    /// `Well`, `Vol of dna`, `Vol of water` columns.
    Dilution,
    /// Preamble line plus `SourceWell`, `DestinationWell`, `VolumeToTransfer`.
    Pooling,
}

/// Validation summary printed by `lh-sim check`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorklistSummary {
    pub kind: WorklistKind,
    /// Identifier from the pooling preamble; absent for dilution worklists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worklist_id: Option<String>,
    /// Number of data rows.
    pub rows: usize,
    /// Total per volume column, keyed by column name.
    pub totals: Vec<VolumeTotal>,
    /// SHA-256 of the canonical JSON form, hex encoded.
    pub worklist_hash: String,
}

/// Aggregate of one volume column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeTotal {
    /// Column header as it appears in the CSV.
    pub column: String,
    /// Sum of the column in µL.
    pub total_ul: f64,
    /// Largest single value in µL.
    pub max_ul: f64,
}

fn total(column: &str, volumes: impl Iterator<Item = f64>) -> VolumeTotal {
    let (total_ul, max_ul) = volumes.fold((0.0f64, 0.0f64), |(sum, max), v| (sum + v, max.max(v)));
    VolumeTotal {
        column: column.to_string(),
        total_ul,
        max_ul,
    }
}

/// Summarises a dilution worklist, hashing its canonical JSON form.
pub fn summarize_dilution(worklist: &DilutionWorklist) -> Result<WorklistSummary, LhError> {
    Ok(WorklistSummary {
        kind: WorklistKind::Dilution,
        worklist_id: None,
        rows: worklist.len(),
        totals: vec![
            total(
                crate::dilution::DNA_COLUMN,
                worklist.entries().iter().map(|e| e.dna.as_ul()),
            ),
            total(
                crate::dilution::WATER_COLUMN,
                worklist.entries().iter().map(|e| e.water.as_ul()),
            ),
        ],
        worklist_hash: stable_hash_string(worklist)?,
    })
}

/// Summarises a pooling worklist, hashing its canonical JSON form.
pub fn summarize_pooling(worklist: &PoolingWorklist) -> Result<WorklistSummary, LhError> {
    Ok(WorklistSummary {
        kind: WorklistKind::Pooling,
        worklist_id: Some(worklist.worklist_id().to_string()),
        rows: worklist.transfers().len(),
        totals: vec![total(
            crate::pooling::VOLUME_COLUMN,
            worklist.transfers().rows().iter().map(|row| row.volume.as_ul()),
        )],
        worklist_hash: stable_hash_string(worklist)?,
    })
}
