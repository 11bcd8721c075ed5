//! Tracking Engine Benchmarks
//!
//! Measures the hot paths of the engine: re-running an effect whose
//! dependencies are unchanged, fanning a write out to many effects, and
//! the array mutation methods.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use lattice_observe::reactive::{
    effect, reactive, EffectOptions, EffectRunner, Key, RawObject, Value,
};

fn wide_record(fields: usize) -> RawObject {
    RawObject::record((0..fields).map(|i| (Key::from(format!("f{i}")), Value::from(i))))
}

/// One effect reading `fields` slots, re-run by a write to the first one.
fn bench_rerun_stable_deps(c: &mut Criterion) {
    let mut group = c.benchmark_group("rerun_stable_deps");
    for fields in [1, 16, 128] {
        let state = reactive(&wide_record(fields));
        let s = state.clone();
        let _runner = effect(
            move || {
                for i in 0..fields {
                    black_box(s.get(format!("f{i}")));
                }
            },
            EffectOptions::new(),
        );
        let mut next = 0usize;
        group.bench_with_input(BenchmarkId::from_parameter(fields), &fields, |b, _| {
            b.iter(|| {
                next += 1;
                state.set("f0", next);
            })
        });
    }
    group.finish();
}

/// One write notifying `effects` subscribers.
fn bench_trigger_fan_out(c: &mut Criterion) {
    let mut group = c.benchmark_group("trigger_fan_out");
    for effects in [1, 32, 256] {
        let state = reactive(&wide_record(1));
        let runners: Vec<EffectRunner> = (0..effects)
            .map(|_| {
                let s = state.clone();
                effect(move || drop(black_box(s.get("f0"))), EffectOptions::new())
            })
            .collect();
        let mut next = 0usize;
        group.bench_with_input(BenchmarkId::from_parameter(effects), &effects, |b, _| {
            b.iter(|| {
                next += 1;
                state.set("f0", next);
            })
        });
        drop(runners);
    }
    group.finish();
}

fn bench_array_push_pop(c: &mut Criterion) {
    let list = reactive(&RawObject::array([]));
    let l = list.clone();
    let _runner = effect(move || drop(black_box(l.len())), EffectOptions::new());
    c.bench_function("array_push_pop", |b| {
        b.iter(|| {
            list.push([Value::from(1)]);
            black_box(list.pop());
        })
    });
}

criterion_group!(
    benches,
    bench_rerun_stable_deps,
    bench_trigger_fan_out,
    bench_array_push_pop
);
criterion_main!(benches);
