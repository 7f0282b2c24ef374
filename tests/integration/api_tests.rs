//! Integration tests for the JSON documents, byte for byte.

use s0meter::api::handle_get;
use s0meter::app::service::{MeterService, boot_bank};
use s0meter::meter::MeterBank;

use crate::mock_hw::{MockInputs, MockStore, RecordingSink, pulse};

fn bank() -> MeterBank {
    let mut store = MockStore::new()
        .with_channel(0, "Grid", 4, 1000)
        .with_channel(3, "Heat pump", 7, 800);
    let mut bank = MeterBank::new();
    boot_bank(&mut bank, &mut store, &mut RecordingSink::new()).unwrap();
    bank
}

#[test]
fn single_interface_document_resets_pulses() {
    let bank = bank();
    let mut svc = MeterService::new(&bank, None);
    svc.arm(&mut MockInputs::new(), &mut RecordingSink::new());

    pulse(&bank, 4, 10_000);
    pulse(&bank, 4, 11_000);

    assert_eq!(
        handle_get(&svc, "/api/s0-interface/0").as_deref(),
        Some(r#"{"data":{"id":0,"name":"Grid","powerConsumption":3600,"pulses":2,"energyConsumption":7200},"status":0}"#)
    );
    assert_eq!(
        handle_get(&svc, "/api/s0-interface/0").as_deref(),
        Some(r#"{"data":{"id":0,"name":"Grid","powerConsumption":3600,"pulses":0,"energyConsumption":0},"status":0}"#)
    );
}

#[test]
fn all_interfaces_document() {
    let bank = bank();
    let mut svc = MeterService::new(&bank, None);
    svc.arm(&mut MockInputs::new(), &mut RecordingSink::new());

    // 800 pulses/kWh → 4500 Ws per pulse; 3 s apart → 1500 W.
    pulse(&bank, 7, 0);
    pulse(&bank, 7, 3_000);

    assert_eq!(
        handle_get(&svc, "/api/s0-interfaces").as_deref(),
        Some(concat!(
            r#"{"data":["#,
            r#"{"id":0,"name":"Grid","powerConsumption":0,"pulses":0,"energyConsumption":0},"#,
            r#"{"id":3,"name":"Heat pump","powerConsumption":1500,"pulses":2,"energyConsumption":9000}"#,
            r#"],"status":0}"#
        ))
    );
}

#[test]
fn unarmed_and_unknown_interfaces() {
    let bank = bank();
    // Channels are configured but nothing has been armed yet.
    let svc = MeterService::new(&bank, None);

    assert_eq!(
        handle_get(&svc, "/api/s0-interface/3").as_deref(),
        Some(r#"{"data":{},"status":0}"#)
    );
    assert_eq!(
        handle_get(&svc, "/api/s0-interface/42").as_deref(),
        Some(r#"{"data":{},"status":3}"#)
    );
    assert_eq!(
        handle_get(&svc, "/api/s0-interfaces").as_deref(),
        Some(r#"{"data":[],"status":0}"#)
    );
    assert_eq!(handle_get(&svc, "/api/configure/0"), None);
}
