use std::fs;
use std::path::Path;

use lh_core::errors::{ErrorInfo, LhError};
use lh_core::{Mount, Slot, WellId};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::instrument::TouchTip;

/// Descriptive metadata carried into reports and the operator pause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProtocolMetadata {
    pub protocol_name: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub description: String,
    /// Runtime API level the protocol was written against.
    #[serde(default = "default_api_level")]
    pub api_level: String,
}

fn default_api_level() -> String {
    "2.5".to_string()
}

/// Labware placed on a deck slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabwarePlacement {
    pub load_name: String,
    pub slot: Slot,
}

impl LabwarePlacement {
    fn builtin(load_name: &str, slot: u8) -> Self {
        Self {
            load_name: load_name.to_string(),
            // Only called with literal slots inside 1..=11.
            slot: Slot::new(slot).unwrap_or_else(|_| unreachable!("builtin slot {slot}")),
        }
    }
}

/// Pipette model attached to a mount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipettePlacement {
    pub model: String,
    pub mount: Mount,
}

/// Move to a point above the dispense height and blow out residual liquid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlowOutSettings {
    /// Height above the dispense point, in mm.
    #[serde(default = "default_blow_out_offset")]
    pub height_above_dispense_mm: f64,
}

fn default_blow_out_offset() -> f64 {
    0.5
}

/// Liquid handling for one-tip-per-row transfers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferSettings {
    /// Aspirate height above the source well bottom, in mm.
    #[serde(default = "default_aspirate_clearance")]
    pub aspirate_clearance_mm: f64,
    /// Dispense height above the destination well bottom for the first row, in mm.
    #[serde(default = "default_dispense_clearance")]
    pub dispense_clearance_mm: f64,
    /// Added to the dispense height for each subsequent row, in mm.
    #[serde(default)]
    pub dispense_increment_mm: f64,
    pub source_touch: TouchTip,
    pub destination_touch: TouchTip,
    #[serde(default)]
    pub blow_out: Option<BlowOutSettings>,
}

fn default_aspirate_clearance() -> f64 {
    2.0
}

fn default_dispense_clearance() -> f64 {
    1.0
}

fn ensure_height(setting: &str, value: f64) -> Result<(), LhError> {
    if value.is_finite() && value >= 0.0 {
        return Ok(());
    }
    Err(LhError::configuration(
        "lh_exec.invalid_height",
        "heights and offsets must be finite and not negative",
    )
    .with_context("setting", setting)
    .with_context("value", value.to_string()))
}

fn ensure_touch(setting: &str, touch: &TouchTip) -> Result<(), LhError> {
    touch
        .validate()
        .map_err(|err| err.with_context("setting", setting))
}

impl TransferSettings {
    /// Dispense height for the zero-based row `index`.
    pub fn dispense_height(&self, index: usize) -> f64 {
        self.dispense_clearance_mm + index as f64 * self.dispense_increment_mm
    }

    /// Checks heights and touch-tip parameters.
    pub fn validate(&self) -> Result<(), LhError> {
        ensure_height("aspirate_clearance_mm", self.aspirate_clearance_mm)?;
        ensure_height("dispense_clearance_mm", self.dispense_clearance_mm)?;
        ensure_height("dispense_increment_mm", self.dispense_increment_mm)?;
        if let Some(blow_out) = self.blow_out {
            ensure_height(
                "blow_out.height_above_dispense_mm",
                blow_out.height_above_dispense_mm,
            )?;
        }
        ensure_touch("source_touch", &self.source_touch)?;
        ensure_touch("destination_touch", &self.destination_touch)
    }
}

/// Liquid handling for one-source-to-many-destination distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributeSettings {
    /// Source well on the reservoir labware.
    pub source_well: WellId,
    /// Usable volume the tip is filled to on every (re)fill, in µL.
    pub fill_volume_ul: f64,
    /// Cushion aspirated on top of the first fill and never dispensed, in µL.
    #[serde(default)]
    pub reserve_volume_ul: f64,
    #[serde(default = "default_aspirate_clearance")]
    pub aspirate_clearance_mm: f64,
    #[serde(default = "default_dispense_clearance")]
    pub dispense_clearance_mm: f64,
    pub touch: TouchTip,
}

impl DistributeSettings {
    /// Checks heights and touch-tip parameters. Fill and reserve volumes are
    /// checked by [`crate::RefillPolicy::new`].
    pub fn validate(&self) -> Result<(), LhError> {
        ensure_height("aspirate_clearance_mm", self.aspirate_clearance_mm)?;
        ensure_height("dispense_clearance_mm", self.dispense_clearance_mm)?;
        ensure_touch("touch", &self.touch)
    }
}

/// Full configuration of the dilution protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DilutionConfig {
    pub metadata: ProtocolMetadata,
    pub dna_plate: LabwarePlacement,
    pub dilution_plate: LabwarePlacement,
    pub water_rack: LabwarePlacement,
    pub small_tips: LabwarePlacement,
    pub large_tips: LabwarePlacement,
    /// Pipette moving DNA, one tip per row.
    pub dna_pipette: PipettePlacement,
    /// Pipette distributing water.
    pub water_pipette: PipettePlacement,
    pub dna_transfer: TransferSettings,
    pub water: DistributeSettings,
}

impl Default for DilutionConfig {
    fn default() -> Self {
        Self {
            metadata: ProtocolMetadata {
                protocol_name: "Dilution Protocol".to_string(),
                author: String::new(),
                description: "Water pre-load followed by DNA transfer".to_string(),
                api_level: "2.4".to_string(),
            },
            dna_plate: LabwarePlacement::builtin("4t_96_wellplate_200ul", 8),
            dilution_plate: LabwarePlacement::builtin("4t_96_wellplate_200ul", 7),
            water_rack: LabwarePlacement::builtin("biomekmicrofuge_24_wellplate_1700ul", 4),
            small_tips: LabwarePlacement::builtin("opentrons_96_tiprack_20ul", 10),
            large_tips: LabwarePlacement::builtin("opentrons_96_tiprack_300ul", 11),
            dna_pipette: PipettePlacement {
                model: "p20_single_gen2".to_string(),
                mount: Mount::Left,
            },
            water_pipette: PipettePlacement {
                model: "p300_single_gen2".to_string(),
                mount: Mount::Right,
            },
            dna_transfer: TransferSettings {
                aspirate_clearance_mm: 2.0,
                dispense_clearance_mm: 1.0,
                dispense_increment_mm: 0.0,
                source_touch: TouchTip {
                    speed: 20.0,
                    v_offset: -3.0,
                },
                destination_touch: TouchTip {
                    speed: 20.0,
                    v_offset: -4.0,
                },
                blow_out: Some(BlowOutSettings {
                    height_above_dispense_mm: 0.5,
                }),
            },
            water: DistributeSettings {
                source_well: WellId::new(0, 1)
                    .unwrap_or_else(|_| unreachable!("A1 is a valid well")),
                fill_volume_ul: 200.0,
                reserve_volume_ul: 20.0,
                aspirate_clearance_mm: 2.0,
                dispense_clearance_mm: 1.0,
                touch: TouchTip {
                    speed: 20.0,
                    v_offset: -3.0,
                },
            },
        }
    }
}

/// Full configuration of the pooling protocol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolingConfig {
    pub metadata: ProtocolMetadata,
    /// Pause before any movement and show the worklist identifier.
    #[serde(default = "default_confirm")]
    pub confirm_worklist: bool,
    pub source_plate: LabwarePlacement,
    pub pool_rack: LabwarePlacement,
    pub tips: LabwarePlacement,
    pub pipette: PipettePlacement,
    pub transfer: TransferSettings,
}

fn default_confirm() -> bool {
    true
}

impl Default for PoolingConfig {
    fn default() -> Self {
        Self {
            metadata: ProtocolMetadata {
                protocol_name: "Pooling Protocol".to_string(),
                author: String::new(),
                description: "Pooling for library preparation".to_string(),
                api_level: default_api_level(),
            },
            confirm_worklist: true,
            source_plate: LabwarePlacement::builtin("4t_96_wellplate_200ul", 7),
            pool_rack: LabwarePlacement::builtin("biomekmicrofuge_24_wellplate_1700ul", 8),
            tips: LabwarePlacement::builtin("opentrons_96_tiprack_20ul", 10),
            pipette: PipettePlacement {
                model: "p20_single_gen2".to_string(),
                mount: Mount::Right,
            },
            transfer: TransferSettings {
                aspirate_clearance_mm: 2.0,
                dispense_clearance_mm: 1.0,
                dispense_increment_mm: 0.0,
                source_touch: TouchTip {
                    speed: 20.0,
                    v_offset: -8.0,
                },
                destination_touch: TouchTip {
                    speed: 20.0,
                    v_offset: -8.0,
                },
                blow_out: Some(BlowOutSettings {
                    height_above_dispense_mm: 0.0,
                }),
            },
        }
    }
}

fn config_error(code: &str, err: impl ToString, path: &Path) -> ErrorInfo {
    ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string())
}

/// Loads a YAML configuration file.
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T, LhError> {
    let contents = fs::read_to_string(path)
        .map_err(|err| LhError::Io(config_error("lh_exec.config_read", err, path)))?;
    serde_yaml::from_str(&contents)
        .map_err(|err| LhError::Configuration(config_error("lh_exec.config_parse", err, path)))
}

/// Loads a YAML configuration file, or returns the built-in default when no path is given.
pub fn load_or_default<T: DeserializeOwned + Default>(path: Option<&Path>) -> Result<T, LhError> {
    match path {
        Some(path) => load_config(path),
        None => Ok(T::default()),
    }
}

/// Renders a configuration as YAML, e.g. to seed an editable file.
pub fn to_yaml_string<T: Serialize>(config: &T) -> Result<String, LhError> {
    serde_yaml::to_string(config)
        .map_err(|err| LhError::Io(ErrorInfo::new("lh_exec.config_serialize", err.to_string())))
}
