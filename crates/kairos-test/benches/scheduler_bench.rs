//! Benchmarks for the countdown scheduler hot path

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use kairos_core::{MonoTime, PulseCalendar, PulseConfig};
use kairos_test::scenarios;
use kairos_time::{DriverKind, DriverTag, TruthSnapshot, WakeQueue};

fn bench_snapshot_take(c: &mut Criterion) {
    let calendar = PulseCalendar::default();
    let wall = PulseConfig::KKS.epoch() + Duration::from_secs(3600);

    c.bench_function("truth_snapshot_take", |b| {
        b.iter(|| TruthSnapshot::take(&calendar, black_box(wall), black_box(MonoTime::from_millis(10))))
    });
}

fn bench_estimate_wall(c: &mut Criterion) {
    let calendar = PulseCalendar::default();
    let snapshot = TruthSnapshot::take(&calendar, PulseConfig::KKS.epoch(), MonoTime::ZERO).unwrap();

    c.bench_function("estimate_wall", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i = i.wrapping_add(16_000);
            black_box(snapshot.estimate_wall(MonoTime::from_micros(i)))
        })
    });
}

fn bench_evaluate(c: &mut Criterion) {
    let mut rig = scenarios::steady();
    rig.harness.suspend();
    rig.start();

    c.bench_function("scheduler_evaluate", |b| {
        b.iter(|| {
            // step past the minimum gap so every evaluation does real work
            rig.harness.advance(Duration::from_millis(9)).unwrap();
            rig.scheduler.lock().evaluate();
        })
    });
}

fn bench_simulated_second(c: &mut Criterion) {
    let mut rig = scenarios::steady();
    rig.start();

    c.bench_function("simulated_second", |b| {
        b.iter(|| black_box(rig.harness.advance(Duration::from_secs(1)).unwrap()))
    });
}

fn bench_queue_pop(c: &mut Criterion) {
    c.bench_function("wake_queue_pop", |b| {
        b.iter(|| {
            let mut queue = WakeQueue::new(Duration::from_millis(16));
            let now = MonoTime::ZERO;
            for owner in 0..8 {
                queue.add_interval(owner, DriverTag::new(1, DriverKind::Fallback), now, Duration::from_millis(33));
                queue.add_interval(owner, DriverTag::new(1, DriverKind::Resync), now, Duration::from_millis(250));
                queue.add_frame(owner, DriverTag::new(1, DriverKind::Frame), now);
            }
            let mut popped = 0;
            while popped < 64 && queue.pop_due(MonoTime::from_millis(40)).is_some() {
                popped += 1;
            }
            black_box(popped)
        })
    });
}

criterion_group!(
    benches,
    bench_snapshot_take,
    bench_estimate_wall,
    bench_evaluate,
    bench_simulated_second,
    bench_queue_pop,
);
criterion_main!(benches);
