//! The process-wide set of S0 channels and the interrupt dispatcher.
//!
//! All S0 inputs sit on one 8-bit port.  A single interrupt callback samples
//! the port, derives the falling edges against the previous sample and hands
//! each one to the enabled channel bound to that bit.

use core::sync::atomic::{AtomicU8, Ordering};

use crate::error::ChannelError;
use crate::pins::MAX_CHANNELS;

use super::{Reading, S0Meter};

/// Port idle level: S0 outputs are open collector with pull-ups.
const PORT_IDLE: u8 = 0xFF;

/// Fixed array of channels indexed by id.
pub struct MeterBank {
    channels: [S0Meter; MAX_CHANNELS],
    /// Port sample seen by the previous interrupt.
    last_port: AtomicU8,
}

impl Default for MeterBank {
    fn default() -> Self {
        Self::new()
    }
}

impl MeterBank {
    pub const fn new() -> Self {
        Self {
            channels: [const { S0Meter::new() }; MAX_CHANNELS],
            last_port: AtomicU8::new(PORT_IDLE),
        }
    }

    /// Initialise channel `id`.  Fails if the id is out of range, the pin is
    /// bound to another configured channel, or the channel rejects the
    /// parameters.
    pub fn init_channel(
        &mut self,
        id: u8,
        name: &str,
        pin: u8,
        pulses_per_kwh: u32,
    ) -> Result<(), ChannelError> {
        let index = Self::index(id)?;
        let taken = self
            .channels
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != index)
            .filter_map(|(_, ch)| ch.calibration())
            .any(|cal| cal.pin == pin);
        if taken {
            return Err(ChannelError::PinInUse(pin));
        }
        self.channels[index].init(id, name, pin, pulses_per_kwh)
    }

    pub fn channel(&self, id: u8) -> Result<&S0Meter, ChannelError> {
        Ok(&self.channels[Self::index(id)?])
    }

    pub fn channels(&self) -> impl Iterator<Item = &S0Meter> {
        self.channels.iter()
    }

    /// Snapshot-and-reset channel `id`.
    pub fn read(&self, id: u8) -> Result<Reading, ChannelError> {
        Ok(self.channel(id)?.read())
    }

    /// Port bits of every enabled channel.
    pub fn armed_mask(&self) -> u8 {
        self.channels
            .iter()
            .filter(|ch| ch.is_enabled())
            .filter_map(S0Meter::calibration)
            .fold(0, |mask, cal| mask | (1 << cal.port_bit()))
    }

    /// Interrupt callback: `port` is the raw level of every S0 line.
    ///
    /// The raw sample is kept for the next call; only lines of enabled
    /// channels can produce an edge.  A line that is already low when its
    /// channel is armed counts on its next falling edge, not before.
    ///
    /// Runs in interrupt context.  No allocation, no logging.
    pub fn on_port_change(&self, port: u8, now_ms: u32) {
        let last = self.last_port.swap(port, Ordering::AcqRel);
        let falling = last & !port & self.armed_mask();
        if falling == 0 {
            return;
        }

        for ch in &self.channels {
            if !ch.is_enabled() {
                continue;
            }
            if let Some(cal) = ch.calibration() {
                if falling & (1 << cal.port_bit()) != 0 {
                    ch.on_edge(now_ms);
                }
            }
        }
    }

    /// Run the decay estimator on every channel.
    pub fn tick_decay_all(&self, now_ms: u32) {
        for ch in &self.channels {
            ch.tick_decay(now_ms);
        }
    }

    fn index(id: u8) -> Result<usize, ChannelError> {
        let index = usize::from(id);
        if index < MAX_CHANNELS {
            Ok(index)
        } else {
            Err(ChannelError::InvalidId(id))
        }
    }
}
