//! Protocol drivers for the dilution and pooling worklists.
//!
//! Every run is planned and validated in full before the first runtime call,
//! so capacity violations, unknown labware and out-of-range wells never leave
//! the deck half-processed.

use std::collections::BTreeMap;

use lh_core::{LabwareId, LhError, Mount, Runtime, Slot, Volume, WellId, WellRef, Worklist};
use lh_worklist::{stable_hash_string, DilutionWorklist, PoolingWorklist};

use crate::config::{DilutionConfig, LabwarePlacement, PipettePlacement, PoolingConfig};
use crate::distribute::{plan_distribute, DistributePlan, RefillPolicy};
use crate::instrument::{PipetteModel, PipetteTracker, VOLUME_EPSILON};
use crate::labware::{LabwareCatalog, LabwareDefinition, LabwareKind};
use crate::report::{ExecutionReport, PhaseReport};
use crate::transfer::{run_distribute, run_fixed_height};

/// Validated dilution run, ready to execute.
#[derive(Debug, Clone)]
pub struct DilutionPlan {
    pub dna_pipette: PipetteModel,
    pub water_pipette: PipetteModel,
    pub water: DistributePlan,
    pub dna: Worklist,
}

/// Validated pooling run, ready to execute.
#[derive(Debug, Clone)]
pub struct PoolingPlan {
    pub pipette: PipetteModel,
    pub transfers: Worklist,
}

/// Tracks deck slots claimed by the placements of one protocol.
struct DeckLayout<'c> {
    catalog: &'c LabwareCatalog,
    slots: BTreeMap<Slot, &'static str>,
}

impl<'c> DeckLayout<'c> {
    fn new(catalog: &'c LabwareCatalog) -> Self {
        Self {
            catalog,
            slots: BTreeMap::new(),
        }
    }

    fn claim(
        &mut self,
        role: &'static str,
        placement: &LabwarePlacement,
        tips: bool,
    ) -> Result<&'c LabwareDefinition, LhError> {
        let definition = self
            .catalog
            .get(&placement.load_name)
            .map_err(|err| err.with_context("role", role))?;
        if tips != (definition.kind == LabwareKind::TipRack) {
            let expected = if tips { "tip rack" } else { "plate or tube rack" };
            return Err(LhError::configuration(
                "lh_exec.labware_kind",
                "labware kind does not fit its role",
            )
            .with_context("role", role)
            .with_context("labware", placement.load_name.clone())
            .with_context("expected", expected));
        }
        if let Some(holder) = self.slots.insert(placement.slot, role) {
            return Err(LhError::configuration(
                "lh_exec.slot_conflict",
                "two labware placements share a deck slot",
            )
            .with_context("slot", placement.slot.to_string())
            .with_context("first", holder)
            .with_context("second", role));
        }
        Ok(definition)
    }
}

fn ensure_tip_supply(rack: &LabwareDefinition, needed: usize, role: &str) -> Result<(), LhError> {
    if needed > rack.well_count() {
        return Err(LhError::configuration(
            "lh_exec.insufficient_tips",
            "worklist needs more tips than the rack holds",
        )
        .with_context("role", role)
        .with_context("needed", needed.to_string())
        .with_context("available", rack.well_count().to_string())
        .with_hint("split the worklist or add a second tip rack"));
    }
    Ok(())
}

fn check_row(
    index: usize,
    model: &PipetteModel,
    volume: Volume,
    wells: &[(&LabwareDefinition, WellId)],
) -> Result<(), LhError> {
    let checks = || -> Result<(), LhError> {
        model.check_request(volume)?;
        for (definition, well) in wells {
            definition.ensure_contains(*well)?;
        }
        Ok(())
    };
    checks().map_err(|err| err.with_context("row", (index + 1).to_string()))
}

/// Fails when the liquid added to any well of `definition` would exceed its
/// nominal capacity. `fills` yields `(row index, well, volume)`.
fn ensure_well_capacity(
    definition: &LabwareDefinition,
    role: &str,
    fills: impl IntoIterator<Item = (usize, WellId, Volume)>,
) -> Result<(), LhError> {
    let mut totals: BTreeMap<WellId, f64> = BTreeMap::new();
    for (index, well, volume) in fills {
        let total = totals.entry(well).or_insert(0.0);
        *total += volume.as_ul();
        if *total > definition.well_volume_ul + VOLUME_EPSILON {
            return Err(LhError::configuration(
                "lh_exec.well_overflow",
                "liquid added to a well exceeds its capacity",
            )
            .with_context("row", (index + 1).to_string())
            .with_context("role", role)
            .with_context("well", well.to_string())
            .with_context("total", (*total).to_string())
            .with_context("capacity", definition.well_volume_ul.to_string()));
        }
    }
    Ok(())
}

fn warn_small_top_ups(plan: &DistributePlan, pipette: &PipetteModel) {
    for row in plan.top_ups_below(pipette.min_volume_ul) {
        tracing::warn!(
            row,
            pipette = %pipette.name,
            min = pipette.min_volume_ul,
            "refill top-up is below the pipette minimum"
        );
    }
}

fn lookup_pipette(placement: &PipettePlacement, role: &str) -> Result<PipetteModel, LhError> {
    PipetteModel::lookup(&placement.model).map_err(|err| err.with_context("role", role))
}

/// Validates a dilution worklist against its configuration.
pub fn plan_dilution(
    worklist: &DilutionWorklist,
    config: &DilutionConfig,
    catalog: &LabwareCatalog,
) -> Result<DilutionPlan, LhError> {
    let mut deck = DeckLayout::new(catalog);
    let dna_plate = deck.claim("dna_plate", &config.dna_plate, false)?;
    let dilution_plate = deck.claim("dilution_plate", &config.dilution_plate, false)?;
    let water_rack = deck.claim("water_rack", &config.water_rack, false)?;
    let small_tips = deck.claim("small_tips", &config.small_tips, true)?;
    let large_tips = deck.claim("large_tips", &config.large_tips, true)?;

    if config.dna_pipette.mount == config.water_pipette.mount {
        return Err(LhError::configuration(
            "lh_exec.mount_conflict",
            "both pipettes are assigned to the same mount",
        )
        .with_context("mount", config.dna_pipette.mount.to_string()));
    }
    let dna_pipette = lookup_pipette(&config.dna_pipette, "dna_pipette")?;
    let water_pipette = lookup_pipette(&config.water_pipette, "water_pipette")?;
    config
        .dna_transfer
        .validate()
        .map_err(|err| err.with_context("role", "dna_transfer"))?;
    config
        .water
        .validate()
        .map_err(|err| err.with_context("role", "water"))?;

    for (index, entry) in worklist.entries().iter().enumerate() {
        check_row(
            index,
            &dna_pipette,
            entry.dna,
            &[(dna_plate, entry.well), (dilution_plate, entry.well)],
        )?;
        check_row(index, &water_pipette, entry.water, &[])?;
    }
    water_rack
        .ensure_contains(config.water.source_well)
        .map_err(|err| err.with_context("role", "water_source"))?;
    ensure_tip_supply(small_tips, worklist.len(), "small_tips")?;
    ensure_tip_supply(large_tips, 1, "large_tips")?;

    let policy = RefillPolicy::new(
        config.water.fill_volume_ul,
        config.water.reserve_volume_ul,
        &water_pipette,
    )?;
    let water = plan_distribute(&worklist.water_requests(), policy)?;
    warn_small_top_ups(&water, &water_pipette);
    ensure_well_capacity(
        dilution_plate,
        "dilution_plate",
        worklist.entries().iter().enumerate().flat_map(|(index, entry)| {
            [(index, entry.well, entry.water), (index, entry.well, entry.dna)]
        }),
    )?;
    Ok(DilutionPlan {
        dna_pipette,
        water_pipette,
        water,
        dna: worklist.dna_transfers(),
    })
}

/// Validates a pooling worklist against its configuration.
pub fn plan_pooling(
    worklist: &PoolingWorklist,
    config: &PoolingConfig,
    catalog: &LabwareCatalog,
) -> Result<PoolingPlan, LhError> {
    let mut deck = DeckLayout::new(catalog);
    let source_plate = deck.claim("source_plate", &config.source_plate, false)?;
    let pool_rack = deck.claim("pool_rack", &config.pool_rack, false)?;
    let tips = deck.claim("tips", &config.tips, true)?;
    let pipette = lookup_pipette(&config.pipette, "pipette")?;
    config
        .transfer
        .validate()
        .map_err(|err| err.with_context("role", "transfer"))?;

    let transfers = worklist.transfers();
    for (index, row) in transfers.rows().iter().enumerate() {
        check_row(
            index,
            &pipette,
            row.volume,
            &[(source_plate, row.source), (pool_rack, row.destination)],
        )?;
    }
    ensure_tip_supply(tips, transfers.len(), "tips")?;
    ensure_well_capacity(
        pool_rack,
        "pool_rack",
        transfers
            .rows()
            .iter()
            .enumerate()
            .map(|(index, row)| (index, row.destination, row.volume)),
    )?;
    Ok(PoolingPlan {
        pipette,
        transfers: transfers.clone(),
    })
}

/// Drives protocols against a [`Runtime`].
pub struct Executor<'r, R: Runtime + ?Sized> {
    runtime: &'r mut R,
    catalog: LabwareCatalog,
}

impl<'r, R: Runtime + ?Sized> Executor<'r, R> {
    /// Executor validating against the built-in labware catalog.
    pub fn new(runtime: &'r mut R) -> Self {
        Self {
            runtime,
            catalog: LabwareCatalog::builtin(),
        }
    }

    fn load(&mut self, placement: &LabwarePlacement) -> Result<LabwareId, LhError> {
        self.runtime.load_container(&placement.load_name, placement.slot)
    }

    fn load_pipette(
        &mut self,
        model: PipetteModel,
        mount: Mount,
        tips: LabwareId,
    ) -> Result<PipetteTracker, LhError> {
        PipetteTracker::load(&mut *self.runtime, model, mount, &[tips])
    }

    /// Distributes water into the dilution plate, then moves DNA with a fresh
    /// tip per row.
    pub fn run_dilution(
        &mut self,
        worklist: &DilutionWorklist,
        config: &DilutionConfig,
    ) -> Result<ExecutionReport, LhError> {
        let plan = plan_dilution(worklist, config, &self.catalog)?;
        let mut report = ExecutionReport::new(
            &config.metadata.protocol_name,
            stable_hash_string(worklist)?,
            stable_hash_string(config)?,
        );
        tracing::info!(
            protocol = %config.metadata.protocol_name,
            rows = worklist.len(),
            refills = plan.water.refill_count(),
            "starting dilution run"
        );

        let dna_plate = self.load(&config.dna_plate)?;
        let dilution_plate = self.load(&config.dilution_plate)?;
        let water_rack = self.load(&config.water_rack)?;
        let small_tips = self.load(&config.small_tips)?;
        let large_tips = self.load(&config.large_tips)?;
        let mut dna_pipette =
            self.load_pipette(plan.dna_pipette, config.dna_pipette.mount, small_tips)?;
        let mut water_pipette =
            self.load_pipette(plan.water_pipette, config.water_pipette.mount, large_tips)?;

        let before = water_pipette.stats().clone();
        let counters = run_distribute(
            &mut *self.runtime,
            &mut water_pipette,
            WellRef::new(water_rack, config.water.source_well),
            dilution_plate,
            &plan.water,
            &config.water,
        )
        .map_err(|err| err.with_context("phase", "water"))?;
        report
            .phases
            .push(PhaseReport::from_phase("water", &water_pipette, &before, &counters));

        let before = dna_pipette.stats().clone();
        let counters = run_fixed_height(
            &mut *self.runtime,
            &mut dna_pipette,
            dna_plate,
            dilution_plate,
            &plan.dna,
            &config.dna_transfer,
        )
        .map_err(|err| err.with_context("phase", "dna"))?;
        report
            .phases
            .push(PhaseReport::from_phase("dna", &dna_pipette, &before, &counters));

        tracing::info!(tips = report.tips_used(), "dilution run complete");
        Ok(report)
    }

    /// Optionally pauses on the worklist id, then pools every row with a fresh tip.
    pub fn run_pooling(
        &mut self,
        worklist: &PoolingWorklist,
        config: &PoolingConfig,
    ) -> Result<ExecutionReport, LhError> {
        let plan = plan_pooling(worklist, config, &self.catalog)?;
        let mut report = ExecutionReport::new(
            &config.metadata.protocol_name,
            stable_hash_string(worklist)?,
            stable_hash_string(config)?,
        );
        report.provenance.worklist_id = Some(worklist.worklist_id().to_string());
        tracing::info!(
            protocol = %config.metadata.protocol_name,
            worklist_id = worklist.worklist_id(),
            rows = plan.transfers.len(),
            volume = plan.transfers.total_volume(),
            "starting pooling run"
        );

        if config.confirm_worklist {
            self.runtime.pause(&format!(
                "The worklist about to be processed is {}. Please ensure this is correct before proceeding.",
                worklist.worklist_id()
            ))?;
        }

        let source_plate = self.load(&config.source_plate)?;
        let pool_rack = self.load(&config.pool_rack)?;
        let tips = self.load(&config.tips)?;
        let mut pipette = self.load_pipette(plan.pipette, config.pipette.mount, tips)?;

        let before = pipette.stats().clone();
        let counters = run_fixed_height(
            &mut *self.runtime,
            &mut pipette,
            source_plate,
            pool_rack,
            &plan.transfers,
            &config.transfer,
        )
        .map_err(|err| err.with_context("phase", "pooling"))?;
        report
            .phases
            .push(PhaseReport::from_phase("pooling", &pipette, &before, &counters));

        tracing::info!(tips = report.tips_used(), "pooling run complete");
        Ok(report)
    }
}
