//! Propagation benchmarks
//!
//! Measures the cost of notifying subscribers: wide fan-out from one key,
//! deep chains of computed values, and dependency re-collection on every
//! effect run.

use std::cell::Cell;
use std::rc::Rc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use refract_core::{computed, effect, reactive, value_ref, Computed, Subscriber, Target, Value};

fn bench_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");

    for width in [1usize, 10, 100, 1_000] {
        let state = reactive(&Target::record_from([("count", 0)]));
        let runs = Rc::new(Cell::new(0usize));
        let effects: Vec<Subscriber> = (0..width)
            .map(|_| {
                let (source, observed) = (state.clone(), runs.clone());
                effect(move || {
                    black_box(source.get("count"));
                    observed.set(observed.get() + 1);
                })
            })
            .collect();

        group.throughput(Throughput::Elements(width as u64));
        group.bench_with_input(BenchmarkId::from_parameter(width), &width, |b, _| {
            let mut next = 0i64;
            b.iter(|| {
                next += 1;
                state.set("count", next);
            });
        });
        drop(effects);
    }

    group.finish();
}

fn bench_computed_chain(c: &mut Criterion) {
    let mut group = c.benchmark_group("computed_chain");

    for depth in [1usize, 10, 100] {
        let base = value_ref(0);
        let source = base.clone();
        let first = computed(move || source.get().as_int().unwrap_or(0));
        let last: Computed<i64> = (1..depth).fold(first, |prev, _| computed(move || prev.get() + 1));

        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            let mut next = 0i64;
            b.iter(|| {
                next += 1;
                base.set(next);
                black_box(last.get())
            });
        });
    }

    group.finish();
}

fn bench_dependency_recollection(c: &mut Criterion) {
    let mut group = c.benchmark_group("dependency_recollection");

    for reads in [4usize, 32, 256] {
        let raw = Target::map_from((0..reads).map(|i| (Value::from(i as i64), Value::from(0))));
        let state = reactive(&raw);
        let trigger = value_ref(0);

        let (source, driver) = (state.clone(), trigger.clone());
        let _effect = effect(move || {
            driver.get();
            for i in 0..reads {
                black_box(source.get(i as i64));
            }
        });

        group.bench_with_input(BenchmarkId::from_parameter(reads), &reads, |b, _| {
            let mut next = 0i64;
            b.iter(|| {
                next += 1;
                trigger.set(next);
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_fan_out,
    bench_computed_chain,
    bench_dependency_recollection
);
criterion_main!(benches);
