//! Application service — the hexagonal core.
//!
//! [`MeterService`] drives the channel bank from the foreground loop: it
//! boots channels from the persisted table, arms their inputs, runs the
//! decay estimator every iteration, produces snapshots and applies
//! configuration changes.  All I/O flows through port traits injected at
//! call sites.
//!
//! ```text
//!   ConfigPort ──▶ ┌────────────────────────┐ ──▶ EventSink
//!                  │      MeterService       │
//! PulseInputPort ◀─│  MeterBank · decay      │◀── ClockPort
//!                  └────────────────────────┘
//! ```
//!
//! The bank itself is shared with the interrupt dispatcher, so the service
//! only ever holds a shared reference to it after boot.

use heapless::Vec;
use log::{info, warn};

use crate::config::SystemConfig;
use crate::error::{Error, Result};
use crate::meter::{MeterBank, Reading, S0Meter};
use crate::pins::MAX_CHANNELS;

use super::events::{AppEvent, ChannelReport};
use super::ports::{ClockPort, ConfigError, ConfigPort, EventSink, PulseInputPort};

/// Result of [`MeterService::update_channel`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The body did not change the record.
    Unchanged,
    /// The record would share its pin with another enabled channel.
    PinConflict,
    /// Persisted; takes effect after reboot.
    Saved,
}

/// Initialise every enabled record of the stored table into `bank`.
///
/// Channels are left configured but disarmed; [`MeterService::arm`] arms
/// them once the bank is shared with the interrupt dispatcher.  A record the
/// channel rejects is reported and skipped; it never stops the others.
pub fn boot_bank(
    bank: &mut MeterBank,
    store: &mut impl ConfigPort,
    sink: &mut impl EventSink,
) -> Result<SystemConfig> {
    let status = store.init().map_err(|e| {
        warn!("config store init failed: {}", e);
        Error::Config("configuration store unavailable")
    })?;
    sink.emit(&AppEvent::ConfigStore(status));

    let table = store.load_all();
    for (index, rec) in table.channels.iter().enumerate() {
        if !rec.enabled {
            continue;
        }
        let id = index as u8;
        info!(
            "Init. interface {} '{}' at pin {} ({} pulses/kWh)",
            id, rec.name, rec.pin, rec.pulses_per_kwh
        );
        if let Err(error) = bank.init_channel(id, &rec.name, rec.pin, rec.pulses_per_kwh) {
            warn!("interface {}: init failed: {}", id, error);
            sink.emit(&AppEvent::ChannelInitFailed { id, error });
        }
    }

    Ok(table)
}

/// Foreground driver of a [`MeterBank`].
pub struct MeterService<'a> {
    bank: &'a MeterBank,
    /// `None` disables the periodic report.
    report_interval_ms: Option<u32>,
    last_report_ms: u32,
}

impl<'a> MeterService<'a> {
    pub fn new(bank: &'a MeterBank, report_interval_ms: Option<u32>) -> Self {
        Self {
            bank,
            report_interval_ms,
            last_report_ms: 0,
        }
    }

    pub fn bank(&self) -> &'a MeterBank {
        self.bank
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Enable every configured channel and arm its input line.
    ///
    /// Returns the number of armed channels.  If the hardware refuses a line
    /// the channel is disabled again.
    pub fn arm(&mut self, inputs: &mut impl PulseInputPort, sink: &mut impl EventSink) -> usize {
        let mut armed = 0;
        for ch in self.bank.channels() {
            let Some(cal) = ch.calibration() else {
                continue;
            };
            let (id, pin) = (cal.id, cal.pin);
            if ch.enable().is_err() {
                continue;
            }
            match inputs.arm(pin) {
                Ok(()) => {
                    armed += 1;
                    sink.emit(&AppEvent::ChannelArmed { id, pin });
                }
                Err(e) => {
                    ch.disable();
                    warn!("interface {}: arming pin {} failed: {}", id, pin, e);
                    sink.emit(&AppEvent::ChannelArmFailed { id, pin });
                }
            }
        }
        armed
    }

    /// Disarm channel `id` without discarding its state.
    pub fn disarm(&mut self, id: u8, inputs: &mut impl PulseInputPort) -> Result<()> {
        let ch = self.bank.channel(id)?;
        ch.disable();
        if let Some(cal) = ch.calibration() {
            if let Err(e) = inputs.disarm(cal.pin) {
                warn!("interface {}: disarming pin {} failed: {}", id, cal.pin, e);
                return Err(Error::Init("pulse input disarm failed"));
            }
        }
        Ok(())
    }

    // ── Per-iteration orchestration ───────────────────────────

    /// One foreground iteration: decay every channel, report if due.
    ///
    /// The report peeks; read windows belong to API clients.
    pub fn tick(&mut self, clock: &impl ClockPort, sink: &mut impl EventSink) {
        let now = clock.now_ms();
        self.bank.tick_decay_all(now);

        if let Some(interval) = self.report_interval_ms {
            if now.wrapping_sub(self.last_report_ms) >= interval {
                self.last_report_ms = now;
                sink.emit(&AppEvent::Report(self.peek_all()));
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Snapshot-and-reset one channel.  `None` if the id is out of range or
    /// the channel is not enabled.
    pub fn read(&self, id: u8) -> Option<ChannelReport> {
        self.report(id, S0Meter::read)
    }

    /// Snapshot-and-reset every enabled channel, in id order.
    pub fn snapshot_all(&self) -> Vec<ChannelReport, MAX_CHANNELS> {
        self.report_all(S0Meter::read)
    }

    /// Every enabled channel without resetting its read window.
    pub fn peek_all(&self) -> Vec<ChannelReport, MAX_CHANNELS> {
        self.report_all(S0Meter::peek)
    }

    fn report(&self, id: u8, reading: fn(&S0Meter) -> Reading) -> Option<ChannelReport> {
        let ch = self.bank.channel(id).ok()?;
        if !ch.is_enabled() {
            return None;
        }
        let cal = ch.calibration()?;
        Some(ChannelReport {
            id: cal.id,
            name: cal.name.clone(),
            reading: reading(ch),
        })
    }

    fn report_all(&self, reading: fn(&S0Meter) -> Reading) -> Vec<ChannelReport, MAX_CHANNELS> {
        let mut out = Vec::new();
        for id in 0..MAX_CHANNELS as u8 {
            if let Some(report) = self.report(id, reading) {
                // Capacity equals the channel count.
                let _ = out.push(report);
            }
        }
        out
    }

    /// Sum of the current power estimates of all enabled channels, without
    /// resetting anything.
    pub fn total_power_w(&self) -> u64 {
        self.bank
            .channels()
            .filter(|ch| ch.is_enabled())
            .map(|ch| u64::from(ch.power_w()))
            .sum()
    }

    // ── Configuration ─────────────────────────────────────────

    /// Apply a form-encoded update to the stored record of channel `id`.
    ///
    /// The running channel is untouched; the new record applies after
    /// reboot.
    pub fn update_channel(
        &mut self,
        id: u8,
        body: &str,
        store: &mut impl ConfigPort,
        sink: &mut impl EventSink,
    ) -> core::result::Result<UpdateOutcome, ConfigError> {
        if usize::from(id) >= MAX_CHANNELS {
            return Err(ConfigError::InvalidIndex(id));
        }

        let mut rec = store.load_channel(id)?;
        let outcome = if !rec.apply_form(body) {
            UpdateOutcome::Unchanged
        } else if rec.enabled && pin_taken(store, id, rec.pin)? {
            UpdateOutcome::PinConflict
        } else {
            store.save_channel(id, &rec)?;
            UpdateOutcome::Saved
        };

        match outcome {
            UpdateOutcome::Unchanged => info!("Parameter not updated."),
            UpdateOutcome::PinConflict => info!("Parameter not updated, because they are invalid."),
            UpdateOutcome::Saved => info!("Parameter updated. Please reboot."),
        }
        sink.emit(&AppEvent::ConfigUpdated { id, outcome });
        Ok(outcome)
    }
}

/// Whether an enabled record other than `id` uses `pin`.
fn pin_taken(
    store: &impl ConfigPort,
    id: u8,
    pin: u8,
) -> core::result::Result<bool, ConfigError> {
    for other in (0..MAX_CHANNELS as u8).filter(|&i| i != id) {
        let rec = store.load_channel(other)?;
        if rec.enabled && rec.pin == pin {
            return Ok(true);
        }
    }
    Ok(false)
}
