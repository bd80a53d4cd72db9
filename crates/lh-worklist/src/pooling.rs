use std::fs;
use std::io::Read;
use std::path::Path;

use lh_core::{LhError, TransferRow, Worklist};
use serde::{Deserialize, Serialize};

use crate::table::CsvTable;

/// Column naming the plate well liquid is taken from.
pub const SOURCE_COLUMN: &str = "SourceWell";
/// Column naming the tube liquid is pooled into.
pub const DESTINATION_COLUMN: &str = "DestinationWell";
/// Column holding the volume to move.
pub const VOLUME_COLUMN: &str = "VolumeToTransfer";

/// Parsed pooling worklist: a preamble line carrying the worklist id, then transfers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolingWorklist {
    worklist_id: String,
    transfers: Worklist,
}

impl PoolingWorklist {
    /// Builds a pooling worklist, rejecting empty identifiers and empty transfer lists.
    pub fn new(worklist_id: impl Into<String>, transfers: Worklist) -> Result<Self, LhError> {
        let worklist_id = worklist_id.into();
        if worklist_id.trim().is_empty() {
            return Err(LhError::parse(
                "lh_worklist.worklist_id",
                "pooling worklist preamble has no worklist identifier",
            )
            .with_context("line", "1"));
        }
        if transfers.is_empty() {
            return Err(LhError::parse(
                "lh_worklist.empty",
                "pooling worklist contains no rows",
            ));
        }
        Ok(Self {
            worklist_id,
            transfers,
        })
    }

    /// Identifier shown to the operator before the run starts.
    pub fn worklist_id(&self) -> &str {
        &self.worklist_id
    }

    /// Transfers in file order.
    pub fn transfers(&self) -> &Worklist {
        &self.transfers
    }
}

/// Parses a pooling worklist from any reader.
///
/// The first line is a preamble whose second comma-separated field is the
/// worklist identifier; the header row follows on line two.
pub fn parse_pooling<R: Read>(mut reader: R) -> Result<PoolingWorklist, LhError> {
    let mut contents = String::new();
    reader
        .read_to_string(&mut contents)
        .map_err(|err| LhError::io("lh_worklist.read", err.to_string()))?;
    let contents = contents.strip_prefix('\u{feff}').unwrap_or(&contents);
    let (preamble, body) = contents.split_once('\n').unwrap_or((contents, ""));
    let worklist_id = preamble
        .trim_end_matches('\r')
        .split(',')
        .nth(1)
        .map(|field| field.trim().to_string())
        .unwrap_or_default();

    let table = CsvTable::read(body.as_bytes(), 1)?;
    let [source_col, destination_col, volume_col] =
        table.require_columns([SOURCE_COLUMN, DESTINATION_COLUMN, VOLUME_COLUMN])?;
    let mut rows = Vec::with_capacity(table.len());
    for row in table.rows() {
        rows.push(TransferRow {
            source: row.well(source_col, SOURCE_COLUMN)?,
            destination: row.well(destination_col, DESTINATION_COLUMN)?,
            volume: row.volume(volume_col, VOLUME_COLUMN)?,
        });
    }
    tracing::debug!(rows = rows.len(), worklist = %worklist_id, "parsed pooling worklist");
    PoolingWorklist::new(worklist_id, Worklist::new(rows))
}

/// Reads and parses a pooling worklist file.
pub fn read_pooling(path: &Path) -> Result<PoolingWorklist, LhError> {
    let contents = fs::read(path).map_err(|err| {
        LhError::io("lh_worklist.open", err.to_string())
            .with_context("path", path.display().to_string())
    })?;
    parse_pooling(contents.as_slice())
        .map_err(|err| err.with_context("path", path.display().to_string()))
}
