//! Labware geometry catalog.

use lh_core::{LhError, WellId};
use serde::{Deserialize, Serialize};

/// Broad category of a labware definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LabwareKind {
    /// Multi-well plate.
    Plate,
    /// Rack holding individual tubes.
    TubeRack,
    /// Rack of disposable tips.
    TipRack,
}

/// Grid geometry for a labware load name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabwareDefinition {
    pub load_name: String,
    pub kind: LabwareKind,
    pub rows: u16,
    pub columns: u16,
    /// Nominal capacity of a single well in microlitres.
    pub well_volume_ul: f64,
}

impl LabwareDefinition {
    fn new(load_name: &str, kind: LabwareKind, rows: u16, columns: u16, well_volume_ul: f64) -> Self {
        Self {
            load_name: load_name.to_string(),
            kind,
            rows,
            columns,
            well_volume_ul,
        }
    }

    /// Whether `well` lies inside the grid.
    pub fn contains(&self, well: WellId) -> bool {
        well.row() < self.rows && well.column() >= 1 && well.column() <= self.columns
    }

    /// Total number of wells (or tips, for tip racks).
    pub fn well_count(&self) -> usize {
        self.rows as usize * self.columns as usize
    }

    /// Well at `index` in column-major order (`A1`, `B1`, ... `H1`, `A2`, ...).
    pub fn well_at(&self, index: usize) -> Option<WellId> {
        if index >= self.well_count() {
            return None;
        }
        let row = (index % self.rows as usize) as u16;
        let column = (index / self.rows as usize) as u16 + 1;
        WellId::new(row, column).ok()
    }

    /// Fails with a configuration error when `well` is outside the grid.
    pub fn ensure_contains(&self, well: WellId) -> Result<(), LhError> {
        if self.contains(well) {
            return Ok(());
        }
        Err(LhError::configuration(
            "lh_exec.well_out_of_range",
            "well does not exist in labware",
        )
        .with_context("well", well.to_string())
        .with_context("labware", self.load_name.clone())
        .with_context("grid", format!("{}x{}", self.rows, self.columns)))
    }
}

/// Known labware definitions keyed by load name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabwareCatalog {
    definitions: Vec<LabwareDefinition>,
}

impl LabwareCatalog {
    /// Definitions for the plates, racks and tips used by the bundled protocols.
    pub fn builtin() -> Self {
        Self {
            definitions: vec![
                LabwareDefinition::new("4t_96_wellplate_200ul", LabwareKind::Plate, 8, 12, 200.0),
                LabwareDefinition::new(
                    "biomekmicrofuge_24_wellplate_1700ul",
                    LabwareKind::TubeRack,
                    4,
                    6,
                    1700.0,
                ),
                LabwareDefinition::new(
                    "opentrons_96_tiprack_20ul",
                    LabwareKind::TipRack,
                    8,
                    12,
                    20.0,
                ),
                LabwareDefinition::new(
                    "opentrons_96_tiprack_300ul",
                    LabwareKind::TipRack,
                    8,
                    12,
                    300.0,
                ),
            ],
        }
    }

    /// Looks up a definition by load name.
    pub fn get(&self, load_name: &str) -> Result<&LabwareDefinition, LhError> {
        self.definitions
            .iter()
            .find(|def| def.load_name == load_name)
            .ok_or_else(|| {
                LhError::configuration("lh_exec.unknown_labware", "labware load name is not known")
                    .with_context("load_name", load_name)
            })
    }
}

impl Default for LabwareCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
