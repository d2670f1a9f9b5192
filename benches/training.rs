use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::Array1;
use punctuality::preprocessing::{DayPeriod, ModelingRecord, ModelingTable, TrainType};
use punctuality::training::{roc_auc, ModelKind, ModelSpec, Workflow};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

fn create_table(n_rows: usize) -> ModelingTable {
    let mut rng = ChaCha8Rng::seed_from_u64(42);

    let records = (0..n_rows)
        .map(|i| {
            let train_type = TrainType::ALL[i % TrainType::ALL.len()];
            let delay_in: f64 = rng.gen_range(-60.0..600.0);
            let hour = rng.gen_range(5..23);
            let p_late = if delay_in < 200.0 && train_type == TrainType::Local { 0.8 } else { 0.1 };
            let accrued = if rng.gen::<f64>() < p_late { 120.0 } else { 10.0 };
            ModelingRecord {
                train_type,
                delay_in,
                planned_dep_hour: hour,
                station_stops: 1 + i % 50,
                is_late: accrued > 60.0,
                station: format!("Station {}", i % 50),
                train_no: i.to_string(),
                operator: "SNCB/NMBS".to_string(),
                delay_out: delay_in + accrued,
                accrued_delay: accrued,
                day_period: DayPeriod::from_hour(hour),
            }
        })
        .collect();

    ModelingTable::new(records)
}

/// Mid-range configuration of each family's search space
fn mid_spec(kind: ModelKind) -> ModelSpec {
    let space = kind.search_space();
    let params = space.from_unit(&vec![0.3; space.len()]);
    ModelSpec::from_params(kind, &params, 42).unwrap()
}

fn bench_workflow_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("workflow_fit");
    group.sample_size(10); // Fewer samples for training benchmarks

    for n_rows in [500, 2000].iter() {
        let table = create_table(*n_rows);
        let rows: Vec<usize> = (0..table.len()).collect();

        for kind in ModelKind::ALL {
            let workflow = Workflow::new(mid_spec(kind));
            group.bench_with_input(
                BenchmarkId::new(kind.name(), n_rows),
                &rows,
                |b, rows| b.iter(|| workflow.fit(black_box(&table), rows).unwrap()),
            );
        }
    }

    group.finish();
}

fn bench_roc_auc(c: &mut Criterion) {
    let mut group = c.benchmark_group("roc_auc");
    let mut rng = ChaCha8Rng::seed_from_u64(7);

    for n in [1000, 100_000].iter() {
        let y: Array1<f64> = (0..*n).map(|_| if rng.gen::<f64>() < 0.3 { 1.0 } else { 0.0 }).collect();
        let s: Array1<f64> = (0..*n).map(|_| rng.gen::<f64>()).collect();
        group.bench_with_input(BenchmarkId::from_parameter(n), &(y, s), |b, (y, s)| {
            b.iter(|| roc_auc(black_box(y), black_box(s)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_workflow_fit, bench_roc_auc);
criterion_main!(benches);
