//! In-process stand-in for the robot runtime.
//!
//! Mirrors the runtime checks the executor relies on (deck occupancy, well
//! existence, tip supply, pipette volume bounds) and records every call so a
//! run can be inspected or written out as a command log.

use std::collections::BTreeMap;

use lh_core::{
    InstrumentId, LabwareId, LhError, Location, Mount, Runtime, Slot, Volume, WellId, WellRef,
};
use serde::{Deserialize, Serialize};

use crate::instrument::{PipetteModel, TOUCH_SPEED_RANGE, VOLUME_EPSILON};
use crate::labware::{LabwareCatalog, LabwareDefinition, LabwareKind};

/// Kind of runtime call, used to address fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    LoadContainer,
    LoadInstrument,
    PickUpTip,
    DropTip,
    Aspirate,
    Dispense,
    TouchTip,
    MoveTo,
    BlowOut,
    Pause,
}

/// One recorded runtime call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    LoadContainer {
        labware: LabwareId,
        load_name: String,
        slot: Slot,
    },
    LoadInstrument {
        pipette: InstrumentId,
        model: String,
        mount: Mount,
        tip_racks: Vec<LabwareId>,
    },
    PickUpTip {
        pipette: InstrumentId,
        rack: LabwareId,
        tip: WellId,
    },
    DropTip {
        pipette: InstrumentId,
    },
    Aspirate {
        pipette: InstrumentId,
        volume_ul: f64,
        location: Location,
    },
    Dispense {
        pipette: InstrumentId,
        volume_ul: f64,
        location: Location,
    },
    TouchTip {
        pipette: InstrumentId,
        well: WellRef,
        speed: f64,
        v_offset: f64,
    },
    MoveTo {
        pipette: InstrumentId,
        location: Location,
    },
    BlowOut {
        pipette: InstrumentId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        location: Option<Location>,
    },
    Pause {
        message: String,
    },
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::LoadContainer { .. } => CommandKind::LoadContainer,
            Command::LoadInstrument { .. } => CommandKind::LoadInstrument,
            Command::PickUpTip { .. } => CommandKind::PickUpTip,
            Command::DropTip { .. } => CommandKind::DropTip,
            Command::Aspirate { .. } => CommandKind::Aspirate,
            Command::Dispense { .. } => CommandKind::Dispense,
            Command::TouchTip { .. } => CommandKind::TouchTip,
            Command::MoveTo { .. } => CommandKind::MoveTo,
            Command::BlowOut { .. } => CommandKind::BlowOut,
            Command::Pause { .. } => CommandKind::Pause,
        }
    }
}

#[derive(Debug, Clone)]
struct SimLabware {
    definition: LabwareDefinition,
    slot: Slot,
    tips_used: usize,
}

#[derive(Debug, Clone)]
struct SimInstrument {
    model: PipetteModel,
    mount: Mount,
    tip_racks: Vec<LabwareId>,
    has_tip: bool,
    held_ul: f64,
}

#[derive(Debug, Clone, Copy)]
struct Fault {
    kind: CommandKind,
    occurrence: usize,
}

/// Simulated runtime recording a command log.
#[derive(Debug, Clone)]
pub struct SimulatedRuntime {
    catalog: LabwareCatalog,
    labware: Vec<SimLabware>,
    deck: BTreeMap<Slot, LabwareId>,
    instruments: Vec<SimInstrument>,
    commands: Vec<Command>,
    calls: BTreeMap<CommandKind, usize>,
    fault: Option<Fault>,
}

impl Default for SimulatedRuntime {
    fn default() -> Self {
        Self::new(LabwareCatalog::builtin())
    }
}

fn sim_error(code: &str, message: &str) -> LhError {
    LhError::runtime(code, message)
}

impl SimulatedRuntime {
    pub fn new(catalog: LabwareCatalog) -> Self {
        Self {
            catalog,
            labware: Vec::new(),
            deck: BTreeMap::new(),
            instruments: Vec::new(),
            commands: Vec::new(),
            calls: BTreeMap::new(),
            fault: None,
        }
    }

    /// Makes the `occurrence`-th (1-based) call of `kind` fail with a runtime error.
    pub fn inject_fault(&mut self, kind: CommandKind, occurrence: usize) {
        self.fault = Some(Fault { kind, occurrence });
    }

    /// Every successfully executed call, in order.
    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    /// Number of recorded calls of `kind`.
    pub fn count(&self, kind: CommandKind) -> usize {
        self.commands.iter().filter(|cmd| cmd.kind() == kind).count()
    }

    fn enter(&mut self, kind: CommandKind) -> Result<(), LhError> {
        let counter = self.calls.entry(kind).or_insert(0);
        *counter += 1;
        if let Some(fault) = self.fault {
            if fault.kind == kind && fault.occurrence == *counter {
                return Err(sim_error("lh_sim.injected_fault", "simulated hardware fault")
                    .with_context("command", format!("{kind:?}"))
                    .with_context("occurrence", counter.to_string()));
            }
        }
        Ok(())
    }

    fn labware(&self, id: LabwareId) -> Result<&SimLabware, LhError> {
        self.labware.get(id.as_raw() as usize).ok_or_else(|| {
            sim_error("lh_sim.unknown_labware", "labware handle was never loaded")
                .with_context("labware", id.as_raw().to_string())
        })
    }

    fn instrument_mut(&mut self, id: InstrumentId) -> Result<&mut SimInstrument, LhError> {
        self.instruments.get_mut(id.as_raw() as usize).ok_or_else(|| {
            sim_error("lh_sim.unknown_pipette", "pipette handle was never loaded")
                .with_context("pipette", id.as_raw().to_string())
        })
    }

    fn check_well(&self, well: WellRef) -> Result<(), LhError> {
        let labware = self.labware(well.labware)?;
        if labware.definition.kind == LabwareKind::TipRack {
            return Err(sim_error(
                "lh_sim.liquid_in_tip_rack",
                "liquid handling targeted a tip rack",
            )
            .with_context("labware", labware.definition.load_name.clone()));
        }
        if !labware.definition.contains(well.well) {
            return Err(sim_error("lh_sim.no_such_well", "well does not exist")
                .with_context("well", well.well.to_string())
                .with_context("labware", labware.definition.load_name.clone())
                .with_context("slot", labware.slot.to_string()));
        }
        Ok(())
    }

    fn require_tip(&mut self, pipette: InstrumentId) -> Result<&mut SimInstrument, LhError> {
        let instrument = self.instrument_mut(pipette)?;
        if !instrument.has_tip {
            return Err(sim_error("lh_sim.no_tip", "pipette has no tip attached")
                .with_context("pipette", instrument.model.name.clone()));
        }
        Ok(instrument)
    }
}

impl Runtime for SimulatedRuntime {
    fn load_container(&mut self, kind: &str, slot: Slot) -> Result<LabwareId, LhError> {
        self.enter(CommandKind::LoadContainer)?;
        let definition = self.catalog.get(kind)?.clone();
        if let Some(existing) = self.deck.get(&slot) {
            return Err(sim_error("lh_sim.slot_occupied", "deck slot already holds labware")
                .with_context("slot", slot.to_string())
                .with_context("occupant", existing.as_raw().to_string()));
        }
        let id = LabwareId::from_raw(self.labware.len() as u32);
        self.labware.push(SimLabware {
            definition,
            slot,
            tips_used: 0,
        });
        self.deck.insert(slot, id);
        self.commands.push(Command::LoadContainer {
            labware: id,
            load_name: kind.to_string(),
            slot,
        });
        Ok(id)
    }

    fn load_instrument(
        &mut self,
        kind: &str,
        mount: Mount,
        tip_racks: &[LabwareId],
    ) -> Result<InstrumentId, LhError> {
        self.enter(CommandKind::LoadInstrument)?;
        let model = PipetteModel::lookup(kind)?;
        if self.instruments.iter().any(|inst| inst.mount == mount) {
            return Err(sim_error("lh_sim.mount_occupied", "mount already holds a pipette")
                .with_context("mount", mount.to_string()));
        }
        for rack in tip_racks {
            if self.labware(*rack)?.definition.kind != LabwareKind::TipRack {
                return Err(sim_error("lh_sim.not_a_tip_rack", "tip source is not a tip rack")
                    .with_context("labware", rack.as_raw().to_string()));
            }
        }
        let id = InstrumentId::from_raw(self.instruments.len() as u32);
        self.instruments.push(SimInstrument {
            model,
            mount,
            tip_racks: tip_racks.to_vec(),
            has_tip: false,
            held_ul: 0.0,
        });
        self.commands.push(Command::LoadInstrument {
            pipette: id,
            model: kind.to_string(),
            mount,
            tip_racks: tip_racks.to_vec(),
        });
        Ok(id)
    }

    fn pick_up_tip(&mut self, pipette: InstrumentId) -> Result<(), LhError> {
        self.enter(CommandKind::PickUpTip)?;
        let instrument = self.instrument_mut(pipette)?;
        if instrument.has_tip {
            return Err(sim_error("lh_sim.tip_attached", "pipette already has a tip")
                .with_context("pipette", instrument.model.name.clone()));
        }
        let racks = instrument.tip_racks.clone();
        let mut picked = None;
        for rack in racks {
            let labware = self
                .labware
                .get_mut(rack.as_raw() as usize)
                .ok_or_else(|| sim_error("lh_sim.unknown_labware", "tip rack was never loaded"))?;
            if let Some(tip) = labware.definition.well_at(labware.tips_used) {
                labware.tips_used += 1;
                picked = Some((rack, tip));
                break;
            }
        }
        let Some((rack, tip)) = picked else {
            return Err(sim_error("lh_sim.out_of_tips", "tip racks are exhausted")
                .with_context("pipette", pipette.as_raw().to_string())
                .with_hint("refill the tip racks and restart the worklist"));
        };
        self.instrument_mut(pipette)?.has_tip = true;
        self.commands.push(Command::PickUpTip { pipette, rack, tip });
        Ok(())
    }

    fn drop_tip(&mut self, pipette: InstrumentId) -> Result<(), LhError> {
        self.enter(CommandKind::DropTip)?;
        let instrument = self.require_tip(pipette)?;
        instrument.has_tip = false;
        instrument.held_ul = 0.0;
        self.commands.push(Command::DropTip { pipette });
        Ok(())
    }

    fn aspirate(
        &mut self,
        pipette: InstrumentId,
        volume: Volume,
        location: &Location,
    ) -> Result<(), LhError> {
        self.enter(CommandKind::Aspirate)?;
        self.check_well(location.target)?;
        let instrument = self.require_tip(pipette)?;
        let next = instrument.held_ul + volume.as_ul();
        if next > instrument.model.max_volume_ul + VOLUME_EPSILON {
            return Err(sim_error("lh_sim.over_capacity", "aspirate exceeds tip capacity")
                .with_context("requested", volume.as_ul().to_string())
                .with_context("held", instrument.held_ul.to_string()));
        }
        instrument.held_ul = next;
        self.commands.push(Command::Aspirate {
            pipette,
            volume_ul: volume.as_ul(),
            location: *location,
        });
        Ok(())
    }

    fn dispense(
        &mut self,
        pipette: InstrumentId,
        volume: Volume,
        location: &Location,
    ) -> Result<(), LhError> {
        self.enter(CommandKind::Dispense)?;
        self.check_well(location.target)?;
        let instrument = self.require_tip(pipette)?;
        if volume.as_ul() > instrument.held_ul + VOLUME_EPSILON {
            return Err(sim_error("lh_sim.dispense_exceeds_held", "dispense exceeds tip contents")
                .with_context("requested", volume.as_ul().to_string())
                .with_context("held", instrument.held_ul.to_string()));
        }
        instrument.held_ul = (instrument.held_ul - volume.as_ul()).max(0.0);
        self.commands.push(Command::Dispense {
            pipette,
            volume_ul: volume.as_ul(),
            location: *location,
        });
        Ok(())
    }

    fn touch_tip(
        &mut self,
        pipette: InstrumentId,
        well: WellRef,
        speed: f64,
        v_offset: f64,
    ) -> Result<(), LhError> {
        self.enter(CommandKind::TouchTip)?;
        self.check_well(well)?;
        self.require_tip(pipette)?;
        if !TOUCH_SPEED_RANGE.contains(&speed) {
            return Err(sim_error("lh_sim.touch_speed", "touch tip speed must be 1-80 mm/s")
                .with_context("speed", speed.to_string()));
        }
        self.commands.push(Command::TouchTip {
            pipette,
            well,
            speed,
            v_offset,
        });
        Ok(())
    }

    fn move_to(&mut self, pipette: InstrumentId, location: &Location) -> Result<(), LhError> {
        self.enter(CommandKind::MoveTo)?;
        self.check_well(location.target)?;
        self.instrument_mut(pipette)?;
        self.commands.push(Command::MoveTo {
            pipette,
            location: *location,
        });
        Ok(())
    }

    fn blow_out(
        &mut self,
        pipette: InstrumentId,
        location: Option<&Location>,
    ) -> Result<(), LhError> {
        self.enter(CommandKind::BlowOut)?;
        if let Some(location) = location {
            self.check_well(location.target)?;
        }
        let instrument = self.require_tip(pipette)?;
        instrument.held_ul = 0.0;
        self.commands.push(Command::BlowOut {
            pipette,
            location: location.copied(),
        });
        Ok(())
    }

    fn pause(&mut self, message: &str) -> Result<(), LhError> {
        self.enter(CommandKind::Pause)?;
        tracing::info!(%message, "operator pause");
        self.commands.push(Command::Pause {
            message: message.to_string(),
        });
        Ok(())
    }
}
