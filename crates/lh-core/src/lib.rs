#![deny(missing_docs)]
#![doc = "Core types, errors and the robot runtime contract for the liquid-handling worklist executor."]

use std::fmt;

use serde::{Deserialize, Serialize};

pub mod errors;
pub mod provenance;
mod types;

pub use errors::{ErrorInfo, LhError};
pub use provenance::{RunProvenance, SchemaVersion};
pub use types::{TransferRow, Volume, WellId, Worklist};

/// Handle for a piece of labware loaded onto the deck by a [`Runtime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LabwareId(u32);

impl LabwareId {
    /// Creates a new handle from its raw integer representation.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the handle.
    pub fn as_raw(&self) -> u32 {
        self.0
    }
}

/// Handle for a pipette loaded onto a mount by a [`Runtime`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InstrumentId(u32);

impl InstrumentId {
    /// Creates a new handle from its raw integer representation.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the handle.
    pub fn as_raw(&self) -> u32 {
        self.0
    }
}

/// Numbered deck position. Slots 1 through 11 accept labware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Slot(u8);

impl Slot {
    /// Highest slot number that accepts labware; slot 12 holds the fixed trash.
    pub const MAX: u8 = 11;

    /// Creates a slot, rejecting positions outside `1..=11`.
    pub fn new(number: u8) -> Result<Self, LhError> {
        if number == 0 || number > Self::MAX {
            return Err(LhError::configuration(
                "lh_core.slot_range",
                format!("deck slot must be between 1 and {}", Self::MAX),
            )
            .with_context("slot", number.to_string()));
        }
        Ok(Self(number))
    }

    /// Returns the slot number.
    pub fn number(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for Slot {
    type Error = LhError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Slot::new(value)
    }
}

impl From<Slot> for u8 {
    fn from(value: Slot) -> Self {
        value.0
    }
}

/// Pipette mount on the gantry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mount {
    /// Left-hand mount.
    Left,
    /// Right-hand mount.
    Right,
}

impl fmt::Display for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mount::Left => write!(f, "left"),
            Mount::Right => write!(f, "right"),
        }
    }
}

/// A specific well within a loaded piece of labware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WellRef {
    /// Labware the well belongs to.
    pub labware: LabwareId,
    /// Well within the labware.
    pub well: WellId,
}

impl WellRef {
    /// Creates a reference to `well` within `labware`.
    pub fn new(labware: LabwareId, well: WellId) -> Self {
        Self { labware, well }
    }

    /// Point `mm` above the bottom of the well.
    pub fn bottom(self, mm: f64) -> Location {
        Location {
            target: self,
            position: WellPosition::Bottom(mm),
        }
    }

    /// Point `mm` relative to the top of the well; negative values sit below the rim.
    pub fn top(self, mm: f64) -> Location {
        Location {
            target: self,
            position: WellPosition::Top(mm),
        }
    }
}

impl fmt::Display for WellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "labware#{}:{}", self.labware.as_raw(), self.well)
    }
}

/// Vertical reference point inside a well.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "from", content = "mm", rename_all = "lowercase")]
pub enum WellPosition {
    /// Offset above the well bottom.
    Bottom(f64),
    /// Offset from the well top.
    Top(f64),
}

/// Fully resolved point the pipette can be sent to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Well the point belongs to.
    pub target: WellRef,
    /// Vertical position within the well.
    pub position: WellPosition,
}

/// Contract for the robot runtime that performs physical actions.
///
/// Every call is synchronous and either completes or returns an error. The
/// executor never retries; a failed call aborts the worklist.
pub trait Runtime {
    /// Places labware of the given kind on a deck slot.
    fn load_container(&mut self, kind: &str, slot: Slot) -> Result<LabwareId, LhError>;

    /// Attaches a pipette to a mount, supplying tips from the given racks.
    fn load_instrument(
        &mut self,
        kind: &str,
        mount: Mount,
        tip_racks: &[LabwareId],
    ) -> Result<InstrumentId, LhError>;

    /// Picks up the next fresh tip.
    fn pick_up_tip(&mut self, pipette: InstrumentId) -> Result<(), LhError>;

    /// Discards the current tip.
    fn drop_tip(&mut self, pipette: InstrumentId) -> Result<(), LhError>;

    /// Draws `volume` into the tip at `location`.
    fn aspirate(
        &mut self,
        pipette: InstrumentId,
        volume: Volume,
        location: &Location,
    ) -> Result<(), LhError>;

    /// Expels `volume` from the tip at `location`.
    fn dispense(
        &mut self,
        pipette: InstrumentId,
        volume: Volume,
        location: &Location,
    ) -> Result<(), LhError>;

    /// Touches the tip against the wall of `well` at `v_offset` mm from its top.
    fn touch_tip(
        &mut self,
        pipette: InstrumentId,
        well: WellRef,
        speed: f64,
        v_offset: f64,
    ) -> Result<(), LhError>;

    /// Moves the pipette directly to `location`.
    fn move_to(&mut self, pipette: InstrumentId, location: &Location) -> Result<(), LhError>;

    /// Expels everything left in the tip, at `location` or the current position.
    fn blow_out(&mut self, pipette: InstrumentId, location: Option<&Location>)
        -> Result<(), LhError>;

    /// Halts until the operator resumes, showing `message`.
    fn pause(&mut self, message: &str) -> Result<(), LhError>;
}
