use lh_core::{LhError, Mount, Runtime, Slot};
use lh_exec::{
    CommandKind, DilutionConfig, Executor, PipetteModel, PipetteTracker, PoolingConfig,
    SimulatedRuntime,
};
use lh_worklist::{parse_dilution, parse_pooling, PoolingWorklist};

fn pooling(rows: &[(&str, &str, &str)]) -> PoolingWorklist {
    let mut csv = String::from("Worklist,WL-1\nSourceWell,DestinationWell,VolumeToTransfer\n");
    for (source, destination, volume) in rows {
        csv.push_str(&format!("{source},{destination},{volume}\n"));
    }
    parse_pooling(csv.as_bytes()).unwrap()
}

fn context<'a>(err: &'a LhError, key: &str) -> Option<&'a str> {
    err.info().context.get(key).map(String::as_str)
}

#[test]
fn runtime_fault_aborts_with_row_context() {
    let worklist = pooling(&[
        ("A1", "A1", "4"),
        ("B1", "A1", "4"),
        ("C1", "B1", "4"),
        ("D1", "B1", "4"),
    ]);
    let mut runtime = SimulatedRuntime::default();
    runtime.inject_fault(CommandKind::PickUpTip, 3);
    let err = Executor::new(&mut runtime)
        .run_pooling(&worklist, &PoolingConfig::default())
        .unwrap_err();

    assert!(matches!(err, LhError::Runtime(_)));
    assert_eq!(err.info().code, "lh_sim.injected_fault");
    assert_eq!(context(&err, "row"), Some("3"));
    assert_eq!(context(&err, "source"), Some("C1"));
    assert_eq!(context(&err, "destination"), Some("B1"));
    assert_eq!(context(&err, "phase"), Some("pooling"));

    // Rows 1 and 2 completed, nothing was attempted after the fault.
    assert_eq!(runtime.count(CommandKind::PickUpTip), 2);
    assert_eq!(runtime.count(CommandKind::DropTip), 2);
    assert_eq!(
        runtime.commands().last().map(|cmd| cmd.kind()),
        Some(CommandKind::DropTip)
    );
}

#[test]
fn dispense_fault_mid_row_reports_that_row() {
    let worklist = pooling(&[("A1", "A1", "4"), ("B1", "A1", "4")]);
    let mut runtime = SimulatedRuntime::default();
    runtime.inject_fault(CommandKind::Dispense, 2);
    let err = Executor::new(&mut runtime)
        .run_pooling(&worklist, &PoolingConfig::default())
        .unwrap_err();
    assert_eq!(err.family(), "runtime");
    assert_eq!(context(&err, "row"), Some("2"));
    assert_eq!(runtime.count(CommandKind::Dispense), 1);
}

#[test]
fn tip_racks_run_out() {
    let mut runtime = SimulatedRuntime::default();
    let tips = runtime
        .load_container("opentrons_96_tiprack_20ul", Slot::new(10).unwrap())
        .unwrap();
    let model = PipetteModel::lookup("p20_single_gen2").unwrap();
    let mut pipette = PipetteTracker::load(&mut runtime, model, Mount::Left, &[tips]).unwrap();
    for _ in 0..96 {
        pipette.pick_up_tip(&mut runtime).unwrap();
        pipette.drop_tip(&mut runtime).unwrap();
    }
    let err = pipette.pick_up_tip(&mut runtime).unwrap_err();
    assert!(matches!(err, LhError::Runtime(_)));
    assert_eq!(err.info().code, "lh_sim.out_of_tips");
    assert!(err.info().hint.is_some());
}

#[test]
fn out_of_range_well_fails_before_any_command() {
    let worklist = pooling(&[("A1", "A1", "4"), ("B1", "E1", "4")]);
    let mut runtime = SimulatedRuntime::default();
    let err = Executor::new(&mut runtime)
        .run_pooling(&worklist, &PoolingConfig::default())
        .unwrap_err();
    assert!(matches!(err, LhError::Configuration(_)));
    assert_eq!(err.info().code, "lh_exec.well_out_of_range");
    assert_eq!(context(&err, "row"), Some("2"));
    assert_eq!(context(&err, "well"), Some("E1"));
    assert!(runtime.commands().is_empty());
}

#[test]
fn volume_above_capacity_fails_before_any_command() {
    let worklist = pooling(&[("A1", "A1", "4"), ("B1", "A1", "25")]);
    let mut runtime = SimulatedRuntime::default();
    let err = Executor::new(&mut runtime)
        .run_pooling(&worklist, &PoolingConfig::default())
        .unwrap_err();
    assert_eq!(err.info().code, "lh_exec.volume_exceeds_capacity");
    assert_eq!(context(&err, "pipette"), Some("p20_single_gen2"));
    assert!(runtime.commands().is_empty());
}

#[test]
fn below_minimum_volume_only_warns() {
    let worklist = pooling(&[("A1", "A1", "0.5")]);
    let mut runtime = SimulatedRuntime::default();
    let report = Executor::new(&mut runtime)
        .run_pooling(&worklist, &PoolingConfig::default())
        .unwrap();
    assert_eq!(report.phases[0].dispenses, 1);
}

#[test]
fn too_many_rows_for_one_rack_is_rejected() {
    let rows: Vec<(String, &str, &str)> = (0..97)
        .map(|index| (format!("{}{}", (b'A' + (index % 8) as u8) as char, index % 12 + 1), "A1", "1"))
        .collect();
    let borrowed: Vec<(&str, &str, &str)> = rows
        .iter()
        .map(|(source, destination, volume)| (source.as_str(), *destination, *volume))
        .collect();
    let worklist = pooling(&borrowed);
    let mut runtime = SimulatedRuntime::default();
    let err = Executor::new(&mut runtime)
        .run_pooling(&worklist, &PoolingConfig::default())
        .unwrap_err();
    assert_eq!(err.info().code, "lh_exec.insufficient_tips");
    assert!(runtime.commands().is_empty());
}

#[test]
fn water_request_above_fill_fails_before_any_command() {
    let csv = "Well,Vol of dna,Vol of water\nA1,5,50\nB1,5,250\n";
    let worklist = parse_dilution(csv.as_bytes()).unwrap();
    let mut runtime = SimulatedRuntime::default();
    let err = Executor::new(&mut runtime)
        .run_dilution(&worklist, &DilutionConfig::default())
        .unwrap_err();
    assert!(matches!(err, LhError::Configuration(_)));
    assert_eq!(err.info().code, "lh_exec.request_exceeds_fill");
    assert_eq!(context(&err, "destination"), Some("B1"));
    assert!(runtime.commands().is_empty());
}

#[test]
fn shared_slot_is_rejected() {
    let csv = "Well,Vol of dna,Vol of water\nA1,5,50\n";
    let worklist = parse_dilution(csv.as_bytes()).unwrap();
    let mut config = DilutionConfig::default();
    config.water_rack.slot = config.dna_plate.slot;
    let mut runtime = SimulatedRuntime::default();
    let err = Executor::new(&mut runtime)
        .run_dilution(&worklist, &config)
        .unwrap_err();
    assert_eq!(err.info().code, "lh_exec.slot_conflict");
    assert!(runtime.commands().is_empty());
}

#[test]
fn touch_speed_out_of_range_fails_before_any_command() {
    let worklist = pooling(&[("A1", "A1", "4")]);
    let mut config = PoolingConfig::default();
    config.transfer.source_touch.speed = 100.0;
    let mut runtime = SimulatedRuntime::default();
    let err = Executor::new(&mut runtime)
        .run_pooling(&worklist, &config)
        .unwrap_err();
    assert!(matches!(err, LhError::Configuration(_)));
    assert_eq!(err.info().code, "lh_exec.touch_speed");
    assert_eq!(context(&err, "setting"), Some("source_touch"));
    assert_eq!(context(&err, "role"), Some("transfer"));
    assert!(runtime.commands().is_empty());
}

#[test]
fn negative_or_non_finite_heights_fail_before_any_command() {
    let csv = "Well,Vol of dna,Vol of water\nA1,5,50\n";
    let worklist = parse_dilution(csv.as_bytes()).unwrap();

    let mut config = DilutionConfig::default();
    config.dna_transfer.dispense_increment_mm = -0.5;
    let mut runtime = SimulatedRuntime::default();
    let err = Executor::new(&mut runtime)
        .run_dilution(&worklist, &config)
        .unwrap_err();
    assert_eq!(err.info().code, "lh_exec.invalid_height");
    assert_eq!(context(&err, "setting"), Some("dispense_increment_mm"));
    assert_eq!(context(&err, "role"), Some("dna_transfer"));
    assert!(runtime.commands().is_empty());

    let mut config = DilutionConfig::default();
    config.water.aspirate_clearance_mm = f64::NAN;
    let err = Executor::new(&mut runtime)
        .run_dilution(&worklist, &config)
        .unwrap_err();
    assert_eq!(err.info().code, "lh_exec.invalid_height");
    assert_eq!(context(&err, "role"), Some("water"));
    assert!(runtime.commands().is_empty());
}

#[test]
fn overfilled_pool_tube_fails_before_any_command() {
    let rows: Vec<(String, &str, &str)> = (0..86)
        .map(|index| (format!("{}{}", (b'A' + (index % 8) as u8) as char, index / 8 + 1), "A1", "20"))
        .collect();
    let borrowed: Vec<(&str, &str, &str)> = rows
        .iter()
        .map(|(source, destination, volume)| (source.as_str(), *destination, *volume))
        .collect();
    let worklist = pooling(&borrowed);
    let mut runtime = SimulatedRuntime::default();
    let err = Executor::new(&mut runtime)
        .run_pooling(&worklist, &PoolingConfig::default())
        .unwrap_err();
    assert!(matches!(err, LhError::Configuration(_)));
    assert_eq!(err.info().code, "lh_exec.well_overflow");
    assert_eq!(context(&err, "row"), Some("86"));
    assert_eq!(context(&err, "well"), Some("A1"));
    assert_eq!(context(&err, "capacity"), Some("1700"));
    assert!(runtime.commands().is_empty());
}

#[test]
fn overfilled_dilution_well_fails_before_any_command() {
    let csv = "Well,Vol of dna,Vol of water\nA1,5,50\nB1,10,195\n";
    let worklist = parse_dilution(csv.as_bytes()).unwrap();
    let mut runtime = SimulatedRuntime::default();
    let err = Executor::new(&mut runtime)
        .run_dilution(&worklist, &DilutionConfig::default())
        .unwrap_err();
    assert_eq!(err.info().code, "lh_exec.well_overflow");
    assert_eq!(context(&err, "row"), Some("2"));
    assert_eq!(context(&err, "well"), Some("B1"));
    assert_eq!(context(&err, "role"), Some("dilution_plate"));
    assert!(runtime.commands().is_empty());
}
