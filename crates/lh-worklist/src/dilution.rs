use std::fs::File;
use std::io::Read;
use std::path::Path;

use lh_core::{LhError, TransferRow, Volume, WellId, Worklist};
use serde::{Deserialize, Serialize};

use crate::table::CsvTable;

/// Column holding the well shared by the DNA and dilution plates.
pub const WELL_COLUMN: &str = "Well";
/// Column holding the DNA volume to transfer.
pub const DNA_COLUMN: &str = "Vol of dna";
/// Column holding the water volume to pre-load.
pub const WATER_COLUMN: &str = "Vol of water";

/// One row of a dilution worklist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DilutionEntry {
    /// Well position, identical on the DNA and dilution plates.
    pub well: WellId,
    /// Volume of DNA moved from the DNA plate.
    pub dna: Volume,
    /// Volume of water distributed into the dilution plate first.
    pub water: Volume,
}

/// Parsed dilution worklist. Immutable once read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DilutionWorklist {
    entries: Vec<DilutionEntry>,
}

impl DilutionWorklist {
    /// Builds a worklist from pre-validated entries.
    pub fn new(entries: Vec<DilutionEntry>) -> Result<Self, LhError> {
        if entries.is_empty() {
            return Err(LhError::parse(
                "lh_worklist.empty",
                "dilution worklist contains no rows",
            ));
        }
        Ok(Self { entries })
    }

    /// Entries in file order.
    pub fn entries(&self) -> &[DilutionEntry] {
        &self.entries
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a constructed worklist; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Wells in file order.
    pub fn wells(&self) -> Vec<WellId> {
        self.entries.iter().map(|entry| entry.well).collect()
    }

    /// DNA volumes aligned with [`Self::wells`].
    pub fn dna_volumes(&self) -> Vec<Volume> {
        self.entries.iter().map(|entry| entry.dna).collect()
    }

    /// Water volumes aligned with [`Self::wells`].
    pub fn water_volumes(&self) -> Vec<Volume> {
        self.entries.iter().map(|entry| entry.water).collect()
    }

    /// DNA transfers: each well on the DNA plate into the same well on the dilution plate.
    pub fn dna_transfers(&self) -> Worklist {
        Worklist::new(
            self.entries
                .iter()
                .map(|entry| TransferRow {
                    source: entry.well,
                    destination: entry.well,
                    volume: entry.dna,
                })
                .collect(),
        )
    }

    /// Water requests as `(destination, volume)` pairs in dispense order.
    pub fn water_requests(&self) -> Vec<(WellId, Volume)> {
        self.entries
            .iter()
            .map(|entry| (entry.well, entry.water))
            .collect()
    }
}

/// Parses a dilution worklist from any reader.
pub fn parse_dilution<R: Read>(reader: R) -> Result<DilutionWorklist, LhError> {
    let table = CsvTable::read(reader, 0)?;
    let [well_col, dna_col, water_col] =
        table.require_columns([WELL_COLUMN, DNA_COLUMN, WATER_COLUMN])?;
    let mut entries = Vec::with_capacity(table.len());
    for row in table.rows() {
        entries.push(DilutionEntry {
            well: row.well(well_col, WELL_COLUMN)?,
            dna: row.volume(dna_col, DNA_COLUMN)?,
            water: row.volume(water_col, WATER_COLUMN)?,
        });
    }
    tracing::debug!(rows = entries.len(), "parsed dilution worklist");
    DilutionWorklist::new(entries)
}

/// Reads and parses a dilution worklist file.
pub fn read_dilution(path: &Path) -> Result<DilutionWorklist, LhError> {
    let file = File::open(path).map_err(|err| {
        LhError::io("lh_worklist.open", err.to_string())
            .with_context("path", path.display().to_string())
    })?;
    parse_dilution(file).map_err(|err| err.with_context("path", path.display().to_string()))
}
