//! Benchmarks for pulse calendar arithmetic

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use kairos_core::{
    format_remaining_micros, normalize_raw_epoch, PulseCalendar, PulseConfig, Weekday,
};

fn bench_micro_pulses_since_epoch(c: &mut Criterion) {
    let calendar = PulseCalendar::default();
    let now = PulseConfig::KKS.epoch() + Duration::from_secs(86_400 * 365);

    c.bench_function("micro_pulses_since_epoch", |b| {
        b.iter(|| calendar.micro_pulses_since_epoch(black_box(now)))
    });
}

fn bench_calendar_position(c: &mut Criterion) {
    let calendar = PulseCalendar::default();
    let total = calendar.micro_pulses_since_epoch(PulseConfig::KKS.epoch() + Duration::from_secs(1_000_000));

    c.bench_function("calendar_position", |b| {
        b.iter(|| black_box(total).calendar_position())
    });
}

fn bench_next_boundary(c: &mut Criterion) {
    let calendar = PulseCalendar::default();
    let start = PulseConfig::KKS.epoch();

    c.bench_function("remaining_from", |b| {
        let mut i = 0u64;
        b.iter(|| {
            i = i.wrapping_add(7919);
            calendar.remaining_from(black_box(start + Duration::from_micros(i)))
        })
    });
}

fn bench_normalize_raw_epoch(c: &mut Criterion) {
    let calendar = PulseCalendar::default();
    let inputs: [i128; 3] = [1_715_323_541_888, 1_715_323_541_888_000, 123_456_789_000];

    c.bench_function("normalize_raw_epoch", |b| {
        b.iter(|| {
            for raw in inputs {
                black_box(normalize_raw_epoch(black_box(raw), &calendar));
            }
        })
    });
}

fn bench_labels(c: &mut Criterion) {
    c.bench_function("weekday_label", |b| {
        let mut i = 0i64;
        b.iter(|| {
            i = (i + 1) % 6;
            black_box(Weekday::from_index(black_box(i)).name())
        })
    });
}

fn bench_format_remaining(c: &mut Criterion) {
    c.bench_function("format_remaining", |b| {
        b.iter(|| format_remaining_micros(black_box(2_618_001)))
    });
}

criterion_group!(
    benches,
    bench_micro_pulses_since_epoch,
    bench_calendar_position,
    bench_next_boundary,
    bench_normalize_raw_epoch,
    bench_labels,
    bench_format_remaining,
);
criterion_main!(benches);
