#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use kairos_core::{MonoTime, PulseCalendar, WallTime};
use kairos_time::TruthSnapshot;

#[derive(Arbitrary, Debug)]
struct Input {
    wall_micros: i64,
    anchor_mono: u64,
    reads: Vec<u64>,
}

fuzz_target!(|input: Input| {
    let calendar = PulseCalendar::default();
    let wall = WallTime::from_micros(input.wall_micros);

    let Ok(mut snapshot) = TruthSnapshot::take(&calendar, wall, MonoTime::from_micros(input.anchor_mono)) else {
        return;
    };
    assert!(snapshot.next_boundary() > snapshot.anchor_wall());

    for read in input.reads.iter().take(64) {
        let mono = MonoTime::from_micros(*read);
        match snapshot.estimate_wall(mono) {
            Ok(estimate) => {
                assert!(estimate >= snapshot.anchor_wall());
                snapshot.advance_boundary(estimate, calendar.config().pulse());
                if snapshot.next_boundary() != WallTime::MAX {
                    assert!(snapshot.next_boundary() > estimate);
                }
            }
            Err(_) => assert!(mono < snapshot.anchor_mono()),
        }
    }
});
