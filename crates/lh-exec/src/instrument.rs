//! Pipette models and the per-tip state machine.

use std::ops::RangeInclusive;

use lh_core::{InstrumentId, LhError, Location, Mount, Runtime, Volume, WellRef};
use serde::{Deserialize, Serialize};

/// Tolerance used when comparing tracked volumes.
pub const VOLUME_EPSILON: f64 = 1e-9;

/// Touch-tip speeds accepted by the robot, in mm/s.
pub const TOUCH_SPEED_RANGE: RangeInclusive<f64> = 1.0..=80.0;

/// Single-channel models accepted by [`PipetteModel::lookup`].
pub const SUPPORTED_PIPETTES: [&str; 3] = ["p20_single_gen2", "p300_single_gen2", "p1000_single_gen2"];

/// Volume range of a pipette model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipetteModel {
    pub name: String,
    pub min_volume_ul: f64,
    pub max_volume_ul: f64,
}

impl PipetteModel {
    /// Looks up one of the supported single-channel models.
    pub fn lookup(name: &str) -> Result<Self, LhError> {
        let (min, max) = match name {
            "p20_single_gen2" => (1.0, 20.0),
            "p300_single_gen2" => (20.0, 300.0),
            "p1000_single_gen2" => (100.0, 1000.0),
            _ => {
                return Err(LhError::configuration(
                    "lh_exec.unknown_pipette",
                    "pipette model is not known",
                )
                .with_context("model", name))
            }
        };
        Ok(Self {
            name: name.to_string(),
            min_volume_ul: min,
            max_volume_ul: max,
        })
    }

    /// Rejects volumes above capacity; volumes below the minimum only warn.
    pub fn check_request(&self, volume: Volume) -> Result<(), LhError> {
        if volume.as_ul() > self.max_volume_ul + VOLUME_EPSILON {
            return Err(LhError::configuration(
                "lh_exec.volume_exceeds_capacity",
                "requested volume exceeds pipette capacity",
            )
            .with_context("volume", volume.as_ul().to_string())
            .with_context("capacity", self.max_volume_ul.to_string())
            .with_context("pipette", self.name.clone()));
        }
        if volume.as_ul() + VOLUME_EPSILON < self.min_volume_ul {
            tracing::warn!(
                pipette = %self.name,
                volume = volume.as_ul(),
                min = self.min_volume_ul,
                "requested volume is below the pipette minimum"
            );
        }
        Ok(())
    }
}

/// Tip lifecycle as tracked by the executor.
///
/// `NoTip -> TipLoaded -> (Holding <-> TipLoaded)* -> NoTip`. A tip can only
/// be dropped once it holds no liquid.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum TipState {
    NoTip,
    TipLoaded,
    Holding { volume_ul: f64 },
}

/// Touch-tip parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchTip {
    /// Lateral speed in mm/s.
    pub speed: f64,
    /// Vertical offset from the well top; negative is below the rim.
    pub v_offset: f64,
}

impl TouchTip {
    /// Rejects speeds the robot refuses and non-finite offsets.
    pub fn validate(&self) -> Result<(), LhError> {
        if !TOUCH_SPEED_RANGE.contains(&self.speed) {
            return Err(LhError::configuration(
                "lh_exec.touch_speed",
                "touch tip speed is outside the supported range",
            )
            .with_context("speed", self.speed.to_string())
            .with_context(
                "range",
                format!("{}-{}", TOUCH_SPEED_RANGE.start(), TOUCH_SPEED_RANGE.end()),
            ));
        }
        if !self.v_offset.is_finite() {
            return Err(LhError::configuration(
                "lh_exec.touch_offset",
                "touch tip offset must be a finite number",
            )
            .with_context("v_offset", self.v_offset.to_string()));
        }
        Ok(())
    }
}

/// Counters accumulated over the lifetime of a tracked pipette.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipetteStats {
    pub tips_picked: usize,
    pub tips_dropped: usize,
    pub aspirations: usize,
    pub dispenses: usize,
    pub blow_outs: usize,
    pub aspirated_ul: f64,
    pub dispensed_ul: f64,
}

/// A loaded pipette whose tip and volume state is checked before every runtime call.
#[derive(Debug, Clone)]
pub struct PipetteTracker {
    id: InstrumentId,
    mount: Mount,
    model: PipetteModel,
    state: TipState,
    stats: PipetteStats,
}

fn state_error(code: &str, message: &str, model: &PipetteModel, state: TipState) -> LhError {
    LhError::configuration(code, message)
        .with_context("pipette", model.name.clone())
        .with_context("state", format!("{state:?}"))
}

impl PipetteTracker {
    /// Loads the instrument through the runtime and starts tracking it.
    pub fn load<R: Runtime + ?Sized>(
        runtime: &mut R,
        model: PipetteModel,
        mount: Mount,
        tip_racks: &[lh_core::LabwareId],
    ) -> Result<Self, LhError> {
        let id = runtime.load_instrument(&model.name, mount, tip_racks)?;
        Ok(Self {
            id,
            mount,
            model,
            state: TipState::NoTip,
            stats: PipetteStats::default(),
        })
    }

    /// Runtime handle of the loaded instrument.
    pub fn id(&self) -> InstrumentId {
        self.id
    }

    /// Mount the pipette was loaded on.
    pub fn mount(&self) -> Mount {
        self.mount
    }

    /// Model the tracker checks volumes against.
    pub fn model(&self) -> &PipetteModel {
        &self.model
    }

    /// Current tip state.
    pub fn state(&self) -> TipState {
        self.state
    }

    /// Counters since the pipette was loaded.
    pub fn stats(&self) -> &PipetteStats {
        &self.stats
    }

    /// Liquid currently held in the tip.
    pub fn held_ul(&self) -> f64 {
        match self.state {
            TipState::Holding { volume_ul } => volume_ul,
            _ => 0.0,
        }
    }

    fn require_tip(&self, action: &str) -> Result<(), LhError> {
        if self.state == TipState::NoTip {
            return Err(state_error(
                "lh_exec.no_tip",
                "action requires a tip",
                &self.model,
                self.state,
            )
            .with_context("action", action));
        }
        Ok(())
    }

    /// Picks up the next tip; fails if one is already loaded.
    pub fn pick_up_tip<R: Runtime + ?Sized>(&mut self, runtime: &mut R) -> Result<(), LhError> {
        if self.state != TipState::NoTip {
            return Err(state_error(
                "lh_exec.tip_already_loaded",
                "cannot pick up a tip while one is loaded",
                &self.model,
                self.state,
            ));
        }
        runtime.pick_up_tip(self.id)?;
        self.state = TipState::TipLoaded;
        self.stats.tips_picked += 1;
        Ok(())
    }

    /// Draws `volume` into the tip. Fails without a tip or when the held
    /// volume would exceed the pipette capacity.
    pub fn aspirate<R: Runtime + ?Sized>(
        &mut self,
        runtime: &mut R,
        volume: Volume,
        location: &Location,
    ) -> Result<(), LhError> {
        self.require_tip("aspirate")?;
        let held = self.held_ul();
        if held + volume.as_ul() > self.model.max_volume_ul + VOLUME_EPSILON {
            return Err(state_error(
                "lh_exec.aspirate_over_capacity",
                "aspirate would exceed pipette capacity",
                &self.model,
                self.state,
            )
            .with_context("volume", volume.as_ul().to_string())
            .with_context("held", held.to_string()));
        }
        runtime.aspirate(self.id, volume, location)?;
        self.state = TipState::Holding {
            volume_ul: held + volume.as_ul(),
        };
        self.stats.aspirations += 1;
        self.stats.aspirated_ul += volume.as_ul();
        Ok(())
    }

    /// Expels `volume`, which must not exceed what the tip holds.
    pub fn dispense<R: Runtime + ?Sized>(
        &mut self,
        runtime: &mut R,
        volume: Volume,
        location: &Location,
    ) -> Result<(), LhError> {
        self.require_tip("dispense")?;
        let held = self.held_ul();
        if volume.as_ul() > held + VOLUME_EPSILON {
            return Err(state_error(
                "lh_exec.dispense_exceeds_held",
                "dispense volume exceeds the liquid held in the tip",
                &self.model,
                self.state,
            )
            .with_context("volume", volume.as_ul().to_string())
            .with_context("held", held.to_string()));
        }
        runtime.dispense(self.id, volume, location)?;
        let remaining = held - volume.as_ul();
        self.state = if remaining <= VOLUME_EPSILON {
            TipState::TipLoaded
        } else {
            TipState::Holding {
                volume_ul: remaining,
            }
        };
        self.stats.dispenses += 1;
        self.stats.dispensed_ul += volume.as_ul();
        Ok(())
    }

    /// Touches the tip against the walls of `well`.
    pub fn touch_tip<R: Runtime + ?Sized>(
        &mut self,
        runtime: &mut R,
        well: WellRef,
        touch: TouchTip,
    ) -> Result<(), LhError> {
        self.require_tip("touch_tip")?;
        runtime.touch_tip(self.id, well, touch.speed, touch.v_offset)
    }

    /// Moves the loaded tip to `location` without pipetting.
    pub fn move_to<R: Runtime + ?Sized>(
        &mut self,
        runtime: &mut R,
        location: &Location,
    ) -> Result<(), LhError> {
        self.require_tip("move_to")?;
        runtime.move_to(self.id, location)
    }

    /// Expels everything in the tip; the tip is left loaded and empty.
    pub fn blow_out<R: Runtime + ?Sized>(
        &mut self,
        runtime: &mut R,
        location: Option<&Location>,
    ) -> Result<(), LhError> {
        self.require_tip("blow_out")?;
        runtime.blow_out(self.id, location)?;
        self.state = TipState::TipLoaded;
        self.stats.blow_outs += 1;
        Ok(())
    }

    /// Drops the tip into the trash. The tip must be empty.
    pub fn drop_tip<R: Runtime + ?Sized>(&mut self, runtime: &mut R) -> Result<(), LhError> {
        self.require_tip("drop_tip")?;
        if let TipState::Holding { volume_ul } = self.state {
            return Err(state_error(
                "lh_exec.drop_with_liquid",
                "tip still holds liquid; blow out or dispense before dropping",
                &self.model,
                self.state,
            )
            .with_context("held", volume_ul.to_string()));
        }
        runtime.drop_tip(self.id)?;
        self.state = TipState::NoTip;
        self.stats.tips_dropped += 1;
        Ok(())
    }
}
