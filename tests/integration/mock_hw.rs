//! Mock adapters for integration tests.
//!
//! Record every port call so tests can assert on the full history without
//! touching real GPIO registers or flash.

use std::cell::Cell;

use s0meter::app::events::AppEvent;
use s0meter::app::ports::{
    ClockPort, ConfigError, ConfigPort, EventSink, PulseInputError, PulseInputPort, StoreStatus,
};
use s0meter::config::{ChannelConfig, SystemConfig, truncated_name};
use s0meter::meter::MeterBank;
use s0meter::pins;

// ── MockClock ─────────────────────────────────────────────────

#[derive(Default)]
pub struct MockClock {
    now: Cell<u32>,
}

#[allow(dead_code)]
impl MockClock {
    pub fn at(ms: u32) -> Self {
        Self { now: Cell::new(ms) }
    }

    pub fn set(&self, ms: u32) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl ClockPort for MockClock {
    fn now_ms(&self) -> u32 {
        self.now.get()
    }
}

// ── MockInputs ────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum InputCall {
    Arm(u8),
    Disarm(u8),
}

#[derive(Default)]
pub struct MockInputs {
    pub calls: Vec<InputCall>,
    /// Pins whose arming fails.
    pub refuse: Vec<u8>,
}

#[allow(dead_code)]
impl MockInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refusing(pin: u8) -> Self {
        Self {
            calls: Vec::new(),
            refuse: vec![pin],
        }
    }

    pub fn armed_pins(&self) -> Vec<u8> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                InputCall::Arm(p) => Some(*p),
                InputCall::Disarm(_) => None,
            })
            .collect()
    }
}

impl PulseInputPort for MockInputs {
    fn arm(&mut self, pin: u8) -> Result<(), PulseInputError> {
        self.calls.push(InputCall::Arm(pin));
        if self.refuse.contains(&pin) {
            Err(PulseInputError::IsrHandler(-1))
        } else {
            Ok(())
        }
    }

    fn disarm(&mut self, pin: u8) -> Result<(), PulseInputError> {
        self.calls.push(InputCall::Disarm(pin));
        Ok(())
    }
}

// ── MockStore ─────────────────────────────────────────────────

/// In-memory channel table.  Saves are validated like the NVS adapter.
pub struct MockStore {
    pub table: SystemConfig,
    pub status: StoreStatus,
    pub saves: usize,
}

#[allow(dead_code)]
impl MockStore {
    pub fn new() -> Self {
        Self {
            table: SystemConfig::default(),
            status: StoreStatus::Valid,
            saves: 0,
        }
    }

    /// Enable record `id` on `pin` with the given calibration.
    pub fn with_channel(mut self, id: u8, name: &str, pin: u8, pulses_per_kwh: u32) -> Self {
        self.table.channels[usize::from(id)] = ChannelConfig {
            enabled: true,
            name: truncated_name(name),
            pin,
            pulses_per_kwh,
        };
        self
    }
}

impl Default for MockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigPort for MockStore {
    fn init(&mut self) -> Result<StoreStatus, ConfigError> {
        Ok(self.status)
    }

    fn load_channel(&self, index: u8) -> Result<ChannelConfig, ConfigError> {
        self.table
            .channels
            .get(usize::from(index))
            .cloned()
            .ok_or(ConfigError::InvalidIndex(index))
    }

    fn save_channel(&mut self, index: u8, config: &ChannelConfig) -> Result<(), ConfigError> {
        config.validate().map_err(ConfigError::ValidationFailed)?;
        let slot = self
            .table
            .channels
            .get_mut(usize::from(index))
            .ok_or(ConfigError::InvalidIndex(index))?;
        *slot = config.clone();
        self.saves += 1;
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Stimulus ──────────────────────────────────────────────────

/// One S0 pulse on `pin`: the line falls at `at_ms` and recovers 30 ms later.
pub fn pulse(bank: &MeterBank, pin: u8, at_ms: u32) {
    let bit = 1u8 << pins::port_bit(pin);
    bank.on_port_change(!bit, at_ms);
    bank.on_port_change(0xFF, at_ms.wrapping_add(30));
}
