//! S0 pulse meter channels.
//!
//! An S0 output closes once per fixed quantum of energy.  Each [`S0Meter`]
//! turns those pulses into an instantaneous power estimate and an energy
//! total per read window.
//!
//! ## Execution contexts
//!
//! ```text
//! ┌──────────────┐  on_edge()   ┌──────────────────────┐  tick_decay()  ┌──────────────┐
//! │ GPIO ISR     │─────────────▶│  EstimatorState      │◀───────────────│  Main loop   │
//! │ (producer)   │              │  (critical section)  │◀───────────────│  (consumer)  │
//! └──────────────┘              └──────────────────────┘     read()     └──────────────┘
//! ```
//!
//! The ISR is the only producer.  The foreground loop takes the critical
//! section once per call; sections never nest and never wait on each other.
//! On the target the critical section masks interrupts and restores the
//! previous mask on exit, so it is safe to take with interrupts already
//! disabled.  It never blocks.
//!
//! ## Lifecycle
//!
//! `Uninitialized → Configured → {Enabled ⇄ Disabled}`.  Only an enabled
//! channel accepts edges and decays; a disabled one keeps its state frozen.

pub mod bank;
pub mod estimator;
mod raw_mutex;

use core::cell::Cell;
use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::blocking_mutex::Mutex;

use crate::config::{ChannelName, PULSES_PER_KWH_MAX, PULSES_PER_KWH_MIN, truncated_name};
use crate::error::ChannelError;
use crate::pins;

use raw_mutex::StateRawMutex;

pub use bank::MeterBank;
pub use estimator::{EstimatorState, Sample};

/// Ws in one kWh.
pub const WS_PER_KWH: u32 = 3_600_000;

/// Result of [`S0Meter::read`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Reading {
    /// Current power estimate (W).  Not reset by a read.
    pub power_w: u32,
    /// Energy of the pulses in this read window (Ws).
    pub energy_ws: u64,
    /// Pulses since the previous read.
    pub pulses: u32,
}

/// Validated, immutable-after-init parameters of a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Calibration {
    pub id: u8,
    pub name: ChannelName,
    pub pin: u8,
    pub pulses_per_kwh: u32,
    /// `3_600_000 / pulses_per_kwh`, fixed for the channel's lifetime.
    pub energy_per_pulse_ws: u32,
}

impl Calibration {
    /// Bit of this channel's line inside the input port byte.
    pub fn port_bit(&self) -> u8 {
        pins::port_bit(self.pin)
    }
}

/// One S0 input channel.
pub struct S0Meter {
    calibration: Option<Calibration>,
    enabled: AtomicBool,
    state: Mutex<StateRawMutex, Cell<EstimatorState>>,
}

impl Default for S0Meter {
    fn default() -> Self {
        Self::new()
    }
}

impl S0Meter {
    /// An uninitialised, disabled channel.
    pub const fn new() -> Self {
        Self {
            calibration: None,
            enabled: AtomicBool::new(false),
            state: Mutex::new(Cell::new(EstimatorState::new())),
        }
    }

    /// Validate and store the channel configuration.
    ///
    /// On failure nothing is touched.  On success the channel is
    /// `Configured` but disarmed; re-initialising an existing channel
    /// disarms it and clears its estimation state.
    pub fn init(
        &mut self,
        id: u8,
        name: &str,
        pin: u8,
        pulses_per_kwh: u32,
    ) -> Result<(), ChannelError> {
        if !pins::is_s0_pin(pin) {
            return Err(ChannelError::InvalidPin(pin));
        }
        if !(PULSES_PER_KWH_MIN..=PULSES_PER_KWH_MAX).contains(&pulses_per_kwh) {
            return Err(ChannelError::PulsesOutOfRange(pulses_per_kwh));
        }

        self.enabled.store(false, Ordering::Release);
        self.state.lock(|s| s.set(EstimatorState::new()));
        self.calibration = Some(Calibration {
            id,
            name: truncated_name(name),
            pin,
            pulses_per_kwh,
            energy_per_pulse_ws: WS_PER_KWH / pulses_per_kwh,
        });
        Ok(())
    }

    /// Arm pulse delivery.  Idempotent; never touches counters.
    pub fn enable(&self) -> Result<(), ChannelError> {
        if self.calibration.is_none() {
            return Err(ChannelError::NotInitialized);
        }
        self.enabled.store(true, Ordering::Release);
        Ok(())
    }

    /// Disarm pulse delivery and freeze the estimate.  Idempotent.
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Release);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.calibration.as_ref()
    }

    /// Account for one falling edge at `now_ms`.
    ///
    /// Interrupt context only: no allocation, no logging, bounded time.
    /// Ignored unless the channel is enabled.
    pub fn on_edge(&self, now_ms: u32) {
        let Some(cal) = self.armed() else {
            return;
        };
        let energy = cal.energy_per_pulse_ws;
        self.state.lock(|cell| {
            let mut s = cell.get();
            s.on_edge(now_ms, energy);
            cell.set(s);
        });
    }

    /// Degrade a stale power estimate.  Call every foreground iteration.
    pub fn tick_decay(&self, now_ms: u32) {
        let Some(cal) = self.armed() else {
            return;
        };
        let energy = cal.energy_per_pulse_ws;
        self.state.lock(|cell| {
            let mut s = cell.get();
            s.decay(now_ms, energy);
            cell.set(s);
        });
    }

    /// Current power estimate without resetting anything.
    pub fn power_w(&self) -> u32 {
        self.state.lock(|cell| cell.get().power_w())
    }

    /// Snapshot power and pulses, reset the pulse counter.
    ///
    /// Every counted edge lands in exactly one read window.  An
    /// uninitialised channel reads as zero.
    pub fn read(&self) -> Reading {
        let Some(cal) = self.calibration.as_ref() else {
            return Reading::default();
        };
        let sample = self.state.lock(|cell| {
            let mut s = cell.get();
            let sample = s.take();
            cell.set(s);
            sample
        });
        Self::reading(cal, sample)
    }

    /// Like [`read`](Self::read), but the pulses stay in the current read
    /// window.
    pub fn peek(&self) -> Reading {
        let Some(cal) = self.calibration.as_ref() else {
            return Reading::default();
        };
        let sample = self.state.lock(|cell| cell.get().peek());
        Self::reading(cal, sample)
    }

    fn reading(cal: &Calibration, sample: Sample) -> Reading {
        Reading {
            power_w: sample.power_w,
            energy_ws: u64::from(sample.pulses) * u64::from(cal.energy_per_pulse_ws),
            pulses: sample.pulses,
        }
    }

    fn armed(&self) -> Option<&Calibration> {
        if self.is_enabled() {
            self.calibration.as_ref()
        } else {
            None
        }
    }
}
