use criterion::{criterion_group, criterion_main, Criterion};
use lh_core::{Volume, WellId};
use lh_exec::{plan_distribute, DilutionConfig, Executor, PipetteModel, RefillPolicy, SimulatedRuntime};
use lh_worklist::parse_dilution;

fn full_plate_requests() -> Vec<(WellId, Volume)> {
    (0..96u16)
        .map(|index| {
            let well = WellId::new(index % 8, index / 8 + 1).expect("well");
            let volume = Volume::new(20.0 + f64::from(index % 9) * 20.0).expect("volume");
            (well, volume)
        })
        .collect()
}

fn full_plate_csv() -> String {
    let mut csv = String::from("Well,Vol of dna,Vol of water\n");
    for (well, water) in full_plate_requests() {
        csv.push_str(&format!("{well},5,{}\n", water.as_ul()));
    }
    csv
}

fn bench_plan(c: &mut Criterion) {
    let model = PipetteModel::lookup("p300_single_gen2").expect("model");
    let policy = RefillPolicy::new(200.0, 20.0, &model).expect("policy");
    let requests = full_plate_requests();
    c.bench_function("distribute_plan_96", |b| {
        b.iter(|| plan_distribute(&requests, policy).expect("plan"));
    });
}

fn bench_dilution_run(c: &mut Criterion) {
    let worklist = parse_dilution(full_plate_csv().as_bytes()).expect("worklist");
    let config = DilutionConfig::default();
    c.bench_function("dilution_run_96", |b| {
        b.iter(|| {
            let mut runtime = SimulatedRuntime::default();
            Executor::new(&mut runtime)
                .run_dilution(&worklist, &config)
                .expect("run");
        });
    });
}

criterion_group!(benches, bench_plan, bench_dilution_run);
criterion_main!(benches);
