//! System configuration parameters.
//!
//! One persisted [`ChannelConfig`] per S0 input, plus compile-time timing of
//! the foreground loop.  Records are loaded through the
//! [`ConfigPort`](crate::app::ports::ConfigPort) at boot and written back when
//! a client changes them.

use core::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::pins::{self, MAX_CHANNELS};

/// Maximum length of a channel name in bytes.
pub const NAME_CAPACITY: usize = 31;

/// Fixed-capacity channel name.
pub type ChannelName = heapless::String<NAME_CAPACITY>;

/// Lowest accepted calibration.
pub const PULSES_PER_KWH_MIN: u32 = 1;
/// Highest accepted calibration.
pub const PULSES_PER_KWH_MAX: u32 = 6000;
/// Calibration of a freshly restored record.
pub const PULSES_PER_KWH_DEFAULT: u32 = 1000;

/// Foreground loop period (milliseconds).
pub const LOOP_INTERVAL_MS: u32 = 10;
/// Period of the log report (milliseconds).
pub const REPORT_INTERVAL_MS: u32 = 60_000;

/// Persisted parameters of one S0 channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Arm the channel at boot.
    pub enabled: bool,
    /// User friendly name.
    pub name: ChannelName,
    /// GPIO the S0 output is wired to.
    pub pin: u8,
    /// Meter calibration.
    pub pulses_per_kwh: u32,
}

impl ChannelConfig {
    /// Factory record for channel `index`: disabled, named `S0-<index>`.
    ///
    /// The pin is left at 0, which is never a valid S0 input, so a restored
    /// channel cannot be armed until somebody configures it.
    pub fn default_for(index: usize) -> Self {
        let mut name = ChannelName::new();
        let _ = write!(name, "S0-{}", index);
        Self {
            enabled: false,
            name,
            pin: 0,
            pulses_per_kwh: PULSES_PER_KWH_DEFAULT,
        }
    }

    /// Range-check the record.  Names are bounded by their type; the pin
    /// only has to be valid once the record is enabled.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.enabled && !pins::is_s0_pin(self.pin) {
            return Err("pin must be inside the S0 input block");
        }
        if !(PULSES_PER_KWH_MIN..=PULSES_PER_KWH_MAX).contains(&self.pulses_per_kwh) {
            return Err("pulses_per_kwh must be 1–6000");
        }
        Ok(())
    }

    /// Apply a form-encoded update (`isEnabled=1&name=Heat+pump&pinS0=5&pulsesPerKWH=800`).
    ///
    /// Unknown keys and out-of-range values are ignored key by key.  An
    /// empty `name=` clears the name.  Returns `true` if anything changed.
    pub fn apply_form(&mut self, body: &str) -> bool {
        let mut dirty = false;

        for pair in body.split('&').filter(|p| !p.is_empty()) {
            let (key, raw) = pair.split_once('=').unwrap_or((pair, ""));
            let value = url_decode(raw);

            match key {
                "isEnabled" => {
                    if let Ok(v) = value.trim().parse::<i64>() {
                        let enabled = v != 0;
                        if enabled != self.enabled {
                            self.enabled = enabled;
                            dirty = true;
                        }
                    }
                }
                "name" => {
                    let name = truncated_name(&value);
                    if name != self.name {
                        self.name = name;
                        dirty = true;
                    }
                }
                "pinS0" => {
                    if let Ok(pin) = value.trim().parse::<u8>() {
                        if pin != self.pin && pins::is_s0_pin(pin) {
                            self.pin = pin;
                            dirty = true;
                        }
                    }
                }
                "pulsesPerKWH" => {
                    if let Ok(pulses) = value.trim().parse::<u32>() {
                        if pulses != self.pulses_per_kwh
                            && (PULSES_PER_KWH_MIN..=PULSES_PER_KWH_MAX).contains(&pulses)
                        {
                            self.pulses_per_kwh = pulses;
                            dirty = true;
                        }
                    }
                }
                _ => log::debug!("config form: ignoring key '{}'", key),
            }
        }

        dirty
    }
}

/// The full channel table as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    pub channels: [ChannelConfig; MAX_CHANNELS],
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            channels: core::array::from_fn(ChannelConfig::default_for),
        }
    }
}

/// Copy `name` into a [`ChannelName`], cutting at a char boundary.
pub fn truncated_name(name: &str) -> ChannelName {
    let mut end = name.len().min(NAME_CAPACITY);
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    let mut out = ChannelName::new();
    let _ = out.push_str(&name[..end]);
    out
}

/// Decode `application/x-www-form-urlencoded` escapes (`+`, `%XX`).
/// Malformed escapes are kept verbatim.
fn url_decode(raw: &str) -> String {
    let bytes = raw.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                let hex = core::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                match hex {
                    Some(b) => {
                        out.push(b);
                        i += 2;
                    }
                    None => out.push(b'%'),
                }
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}
