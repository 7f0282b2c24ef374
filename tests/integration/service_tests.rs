//! Integration tests for the boot → arm → capture → decay → read pipeline.
//!
//! Pulses are injected as port samples through `MeterBank::on_port_change`,
//! the same entry point the GPIO interrupt uses.

use s0meter::api::channel_document;
use s0meter::app::events::AppEvent;
use s0meter::app::service::{MeterService, boot_bank};
use s0meter::error::ChannelError;
use s0meter::meter::{MeterBank, Reading};

use crate::mock_hw::{InputCall, MockClock, MockInputs, MockStore, RecordingSink, pulse};

const GRID_PIN: u8 = 4;
const PV_PIN: u8 = 5;

fn store() -> MockStore {
    MockStore::new()
        .with_channel(0, "Grid", GRID_PIN, 1000)
        .with_channel(1, "PV", PV_PIN, 2000)
}

fn booted(store: &mut MockStore, sink: &mut RecordingSink) -> MeterBank {
    let mut bank = MeterBank::new();
    boot_bank(&mut bank, store, sink).unwrap();
    bank
}

#[test]
fn boot_arms_every_enabled_record() {
    let mut store = store();
    let mut sink = RecordingSink::new();
    let bank = booted(&mut store, &mut sink);

    let mut inputs = MockInputs::new();
    let mut svc = MeterService::new(&bank, None);
    assert_eq!(svc.arm(&mut inputs, &mut sink), 2);

    assert_eq!(inputs.calls, vec![InputCall::Arm(GRID_PIN), InputCall::Arm(PV_PIN)]);
    let armed: Vec<_> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::ChannelArmed { id, pin } => Some((*id, *pin)),
            _ => None,
        })
        .collect();
    assert_eq!(armed, vec![(0, GRID_PIN), (1, PV_PIN)]);
}

#[test]
fn pulses_become_power_and_energy() {
    let mut store = store();
    let mut sink = RecordingSink::new();
    let bank = booted(&mut store, &mut sink);
    let mut svc = MeterService::new(&bank, None);
    svc.arm(&mut MockInputs::new(), &mut sink);

    pulse(&bank, GRID_PIN, 10_000);
    pulse(&bank, PV_PIN, 10_000);
    pulse(&bank, GRID_PIN, 11_000);
    pulse(&bank, PV_PIN, 12_000);

    let grid = svc.read(0).unwrap();
    assert_eq!(grid.name.as_str(), "Grid");
    assert_eq!(grid.reading, Reading { power_w: 3600, energy_ws: 7200, pulses: 2 });

    // 1800 Ws per pulse over 2 s.
    let pv = svc.read(1).unwrap();
    assert_eq!(pv.reading, Reading { power_w: 900, energy_ws: 3600, pulses: 2 });

    // Second read: power stays, window is empty.
    assert_eq!(svc.read(0).unwrap().reading, Reading { power_w: 3600, energy_ws: 0, pulses: 0 });
    assert!(svc.read(2).is_none());
}

#[test]
fn refused_input_leaves_channel_disabled() {
    let mut store = store();
    let mut sink = RecordingSink::new();
    let bank = booted(&mut store, &mut sink);
    let mut svc = MeterService::new(&bank, None);

    let mut inputs = MockInputs::refusing(PV_PIN);
    assert_eq!(svc.arm(&mut inputs, &mut sink), 1);
    assert!(!bank.channel(1).unwrap().is_enabled());
    assert!(sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::ChannelArmFailed { id: 1, pin: PV_PIN })));

    pulse(&bank, PV_PIN, 100);
    assert_eq!(bank.read(1).unwrap().pulses, 0);
    assert_eq!(svc.snapshot_all().len(), 1);
}

#[test]
fn bad_records_are_skipped_at_boot() {
    let mut store = store()
        .with_channel(3, "dup", GRID_PIN, 1000)
        .with_channel(4, "zero", 8, 0)
        .with_channel(5, "nopin", 40, 1000);
    let mut sink = RecordingSink::new();
    let bank = booted(&mut store, &mut sink);

    let failures: Vec<_> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::ChannelInitFailed { id, error } => Some((*id, *error)),
            _ => None,
        })
        .collect();
    assert_eq!(
        failures,
        vec![
            (3, ChannelError::PinInUse(GRID_PIN)),
            (4, ChannelError::PulsesOutOfRange(0)),
            (5, ChannelError::InvalidPin(40)),
        ]
    );
    assert!(bank.channel(0).unwrap().calibration().is_some());
    assert!(bank.channel(3).unwrap().calibration().is_none());
}

#[test]
fn tick_decays_stale_estimate() {
    let mut store = store();
    let mut sink = RecordingSink::new();
    let bank = booted(&mut store, &mut sink);
    let mut svc = MeterService::new(&bank, None);
    svc.arm(&mut MockInputs::new(), &mut sink);

    pulse(&bank, GRID_PIN, 0);
    pulse(&bank, GRID_PIN, 1_000);

    let clock = MockClock::at(2_999);
    svc.tick(&clock, &mut sink);
    assert_eq!(svc.total_power_w(), 3600);

    // Window 2000 ms: drop by 1800 W, window → 4000 ms.
    clock.set(3_000);
    svc.tick(&clock, &mut sink);
    assert_eq!(bank.channel(0).unwrap().power_w(), 1800);

    // The window is measured from the last edge.
    clock.set(4_999);
    svc.tick(&clock, &mut sink);
    assert_eq!(bank.channel(0).unwrap().power_w(), 1800);
    clock.set(5_000);
    svc.tick(&clock, &mut sink);
    assert_eq!(bank.channel(0).unwrap().power_w(), 900);

    // Keep ticking: the estimate reaches exactly zero.
    for _ in 0..10_000 {
        clock.advance(10_000);
        svc.tick(&clock, &mut sink);
    }
    assert_eq!(bank.channel(0).unwrap().power_w(), 0);

    // Pulses were never consumed by the ticks.
    assert_eq!(svc.read(0).unwrap().reading.pulses, 2);
}

#[test]
fn interval_spans_clock_rollover() {
    let mut store = store();
    let mut sink = RecordingSink::new();
    let bank = booted(&mut store, &mut sink);
    let mut svc = MeterService::new(&bank, None);
    svc.arm(&mut MockInputs::new(), &mut sink);

    pulse(&bank, GRID_PIN, u32::MAX - 499);
    pulse(&bank, GRID_PIN, 500);
    assert_eq!(svc.read(0).unwrap().reading.power_w, 3600);
}

#[test]
fn periodic_report_lists_enabled_channels() {
    let mut store = store();
    let mut sink = RecordingSink::new();
    let bank = booted(&mut store, &mut sink);
    let mut svc = MeterService::new(&bank, Some(60_000));
    svc.arm(&mut MockInputs::new(), &mut sink);
    pulse(&bank, GRID_PIN, 100);
    sink.events.clear();

    let clock = MockClock::at(59_999);
    svc.tick(&clock, &mut sink);
    assert!(sink.events.is_empty());

    clock.set(60_000);
    svc.tick(&clock, &mut sink);
    let [AppEvent::Report(reports)] = sink.events.as_slice() else {
        panic!("expected one report, got {:?}", sink.events);
    };
    let ids: Vec<u8> = reports.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![0, 1]);
    assert_eq!(reports[0].reading.pulses, 1);

    // The report only peeks.
    assert_eq!(svc.read(0).unwrap().reading.pulses, 1);
}

#[test]
fn api_reads_see_pulses_after_report() {
    let mut store = store();
    let mut sink = RecordingSink::new();
    let bank = booted(&mut store, &mut sink);
    let mut svc = MeterService::new(&bank, Some(60_000));
    svc.arm(&mut MockInputs::new(), &mut sink);

    pulse(&bank, GRID_PIN, 10_000);
    pulse(&bank, GRID_PIN, 11_000);
    svc.tick(&MockClock::at(60_000), &mut sink);
    assert!(sink.events.iter().any(|e| matches!(e, AppEvent::Report(_))));

    assert_eq!(
        channel_document(&svc, "0"),
        r#"{"data":{"id":0,"name":"Grid","powerConsumption":1800,"pulses":2,"energyConsumption":7200},"status":0}"#
    );
}

#[test]
fn rearming_a_line_held_low_counts_no_pulse() {
    let mut store = store();
    let mut sink = RecordingSink::new();
    let bank = booted(&mut store, &mut sink);
    let mut svc = MeterService::new(&bank, None);
    let mut inputs = MockInputs::new();
    svc.arm(&mut inputs, &mut sink);

    // PV line drops while its channel is disarmed and stays low.
    svc.disarm(1, &mut inputs).unwrap();
    bank.on_port_change(0b1111_1101, 100);
    svc.arm(&mut inputs, &mut sink);
    assert!(bank.channel(1).unwrap().is_enabled());

    // A grid pulse samples the block with the PV line still low.
    bank.on_port_change(0b1111_1100, 200);
    bank.on_port_change(0b1111_1101, 230);
    assert_eq!(svc.read(1).unwrap().reading.pulses, 0);
    assert_eq!(svc.read(0).unwrap().reading.pulses, 1);

    // The next real falling edge on the PV line counts.
    bank.on_port_change(0b1111_1111, 300);
    bank.on_port_change(0b1111_1101, 400);
    assert_eq!(svc.read(1).unwrap().reading.pulses, 1);
}

#[test]
fn disarm_freezes_channel() {
    let mut store = store();
    let mut sink = RecordingSink::new();
    let bank = booted(&mut store, &mut sink);
    let mut svc = MeterService::new(&bank, None);
    let mut inputs = MockInputs::new();
    svc.arm(&mut inputs, &mut sink);

    pulse(&bank, GRID_PIN, 0);
    pulse(&bank, GRID_PIN, 1_000);
    svc.disarm(0, &mut inputs).unwrap();
    assert_eq!(inputs.calls.last(), Some(&InputCall::Disarm(GRID_PIN)));

    pulse(&bank, GRID_PIN, 1_500);
    svc.tick(&MockClock::at(1_000_000), &mut sink);

    // Disabled channels are not served, but the bank still reads them.
    assert!(svc.read(0).is_none());
    assert_eq!(
        bank.read(0).unwrap(),
        Reading { power_w: 3600, energy_ws: 7200, pulses: 2 }
    );
}
