#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use kairos_core::{normalize_raw_epoch, MicroPulses, PulseCalendar, WallTime};

#[derive(Arbitrary, Debug)]
struct Input {
    wall_micros: i64,
    raw_epoch: i128,
    micro_pulses: i128,
}

fuzz_target!(|input: Input| {
    let calendar = PulseCalendar::default();

    let at = WallTime::from_micros(input.wall_micros);
    let total = calendar.micro_pulses_since_epoch(at);
    let position = total.calendar_position();
    assert!(position.weekday <= 5);
    assert!(position.beat <= 35);
    assert!(position.step <= 43);
    assert!((1..=42).contains(&position.day_of_month));
    assert!((1..=8).contains(&position.month));

    let boundary = calendar.next_boundary_from(total);
    if boundary != WallTime::MAX && boundary != WallTime::MIN {
        assert!(boundary > at);
    }

    let fraction = MicroPulses(input.micro_pulses).sub_pulse_fraction();
    assert!((0.0..1.0).contains(&fraction));

    let _ = normalize_raw_epoch(input.raw_epoch, &calendar);
});
