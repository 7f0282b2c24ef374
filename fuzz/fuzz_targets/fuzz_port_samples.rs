//! Fuzz target: `MeterBank::on_port_change`
//!
//! Drives arbitrary port samples and timestamps into a fully armed bank and
//! checks that every falling edge is counted exactly once.
//!
//! cargo fuzz run fuzz_port_samples

#![no_main]

use libfuzzer_sys::fuzz_target;
use s0meter::meter::MeterBank;
use s0meter::pins::{MAX_CHANNELS, S0_PIN_FIRST};

fuzz_target!(|data: &[u8]| {
    let mut bank = MeterBank::new();
    for id in 0..MAX_CHANNELS as u8 {
        if bank.init_channel(id, "fuzz", S0_PIN_FIRST + id, 1 + u32::from(id) * 700).is_err() {
            return;
        }
        if bank.channel(id).and_then(|c| c.enable()).is_err() {
            return;
        }
    }

    let mut expected = [0u32; MAX_CHANNELS];
    let mut last = 0xFFu8;
    let mut now = 0u32;
    for pair in data.chunks_exact(2) {
        let (port, dt) = (pair[0], pair[1]);
        now = now.wrapping_add(u32::from(dt));
        let falling = last & !port;
        for (bit, count) in expected.iter_mut().enumerate() {
            if falling & (1 << bit) != 0 {
                *count += 1;
            }
        }
        last = port;
        bank.on_port_change(port, now);
        bank.tick_decay_all(now);
    }

    for (id, want) in expected.iter().enumerate() {
        let got = bank.read(id as u8).map(|r| r.pulses).unwrap_or(u32::MAX);
        assert_eq!(got, *want, "channel {} miscounted", id);
    }
});
