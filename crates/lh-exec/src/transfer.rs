//! Replays transfer rows and distribute plans against a runtime.

use lh_core::{LabwareId, LhError, Runtime, TransferRow, Volume, WellId, WellRef, Worklist};
use serde::{Deserialize, Serialize};

use crate::config::{DistributeSettings, TransferSettings};
use crate::distribute::{DistributePlan, DistributeStep, RefillDecision};
use crate::instrument::{PipetteTracker, VOLUME_EPSILON};

/// Counters for one replayed phase.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseCounters {
    pub rows: usize,
    pub tips_used: usize,
    pub dispensed_ul: f64,
    pub refills: usize,
}

fn row_error(err: LhError, index: usize, source: WellId, destination: WellId) -> LhError {
    err.with_context("row", (index + 1).to_string())
        .with_context("source", source.to_string())
        .with_context("destination", destination.to_string())
}

/// Moves every row with a fresh tip, aborting on the first failure.
///
/// Errors carry the 1-based `row` and both well ids in their context.
pub fn run_fixed_height<R: Runtime + ?Sized>(
    runtime: &mut R,
    pipette: &mut PipetteTracker,
    source: LabwareId,
    destination: LabwareId,
    worklist: &Worklist,
    settings: &TransferSettings,
) -> Result<PhaseCounters, LhError> {
    let mut counters = PhaseCounters::default();
    for (index, row) in worklist.rows().iter().enumerate() {
        tracing::info!(
            row = index + 1,
            source = %row.source,
            destination = %row.destination,
            volume = row.volume.as_ul(),
            pipette = %pipette.model().name,
            "transfer"
        );
        transfer_row(runtime, pipette, source, destination, index, row, settings)
            .map_err(|err| row_error(err, index, row.source, row.destination))?;
        counters.rows += 1;
        counters.tips_used += 1;
        counters.dispensed_ul += row.volume.as_ul();
    }
    Ok(counters)
}

fn transfer_row<R: Runtime + ?Sized>(
    runtime: &mut R,
    pipette: &mut PipetteTracker,
    source: LabwareId,
    destination: LabwareId,
    index: usize,
    row: &TransferRow,
    settings: &TransferSettings,
) -> Result<(), LhError> {
    let from = WellRef::new(source, row.source);
    let to = WellRef::new(destination, row.destination);
    let dispense_height = settings.dispense_height(index);

    pipette.pick_up_tip(runtime)?;
    pipette.aspirate(runtime, row.volume, &from.bottom(settings.aspirate_clearance_mm))?;
    pipette.touch_tip(runtime, from, settings.source_touch)?;
    pipette.dispense(runtime, row.volume, &to.bottom(dispense_height))?;
    if let Some(blow_out) = settings.blow_out {
        let above = to.bottom(dispense_height + blow_out.height_above_dispense_mm);
        pipette.move_to(runtime, &above)?;
        pipette.blow_out(runtime, None)?;
    }
    pipette.touch_tip(runtime, to, settings.destination_touch)?;
    pipette.drop_tip(runtime)
}

/// Replays a distribute plan with a single tip.
///
/// The tip is filled with the usable volume plus the reserve, refilled where
/// the plan says so, and finally blown out over the source before it is
/// dropped.
pub fn run_distribute<R: Runtime + ?Sized>(
    runtime: &mut R,
    pipette: &mut PipetteTracker,
    source: WellRef,
    destination: LabwareId,
    plan: &DistributePlan,
    settings: &DistributeSettings,
) -> Result<PhaseCounters, LhError> {
    let mut counters = PhaseCounters::default();
    if plan.steps.is_empty() {
        return Ok(counters);
    }
    let draw = source.bottom(settings.aspirate_clearance_mm);
    let reserve = plan.policy.reserve_ul();

    pipette.pick_up_tip(runtime)?;
    counters.tips_used += 1;
    pipette.aspirate(runtime, Volume::new(plan.policy.initial_aspirate_ul())?, &draw)?;
    pipette.touch_tip(runtime, source, settings.touch)?;

    for (index, step) in plan.steps.iter().enumerate() {
        distribute_step(runtime, pipette, source, destination, index, step, reserve, settings)
            .map_err(|err| row_error(err, index, source.well, step.destination))?;
        if matches!(step.decision, RefillDecision::NeedsRefill { .. }) {
            counters.refills += 1;
        }
        debug_assert!((pipette.held_ul() - reserve - step.remaining_ul).abs() < 1e-6);
        counters.rows += 1;
        counters.dispensed_ul += step.volume.as_ul();
    }

    if pipette.held_ul() > VOLUME_EPSILON {
        pipette.blow_out(runtime, Some(&source.top(0.0)))?;
    }
    pipette.drop_tip(runtime)?;
    Ok(counters)
}

#[allow(clippy::too_many_arguments)]
fn distribute_step<R: Runtime + ?Sized>(
    runtime: &mut R,
    pipette: &mut PipetteTracker,
    source: WellRef,
    destination: LabwareId,
    index: usize,
    step: &DistributeStep,
    reserve: f64,
    settings: &DistributeSettings,
) -> Result<(), LhError> {
    if let RefillDecision::NeedsRefill { top_up_ul } = step.decision {
        tracing::info!(
            row = index + 1,
            destination = %step.destination,
            in_tip = pipette.held_ul() - reserve,
            top_up = top_up_ul,
            "refilling tip"
        );
        pipette.aspirate(
            runtime,
            Volume::new(top_up_ul)?,
            &source.bottom(settings.aspirate_clearance_mm),
        )?;
        pipette.touch_tip(runtime, source, settings.touch)?;
    }
    let to = WellRef::new(destination, step.destination);
    pipette.dispense(runtime, step.volume, &to.bottom(settings.dispense_clearance_mm))?;
    pipette.touch_tip(runtime, to, settings.touch)
}
