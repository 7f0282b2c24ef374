//! Unified error types for the S0 smartmeter firmware.
//!
//! A single `Error` enum that every subsystem can convert into, keeping the
//! foreground loop's error handling uniform.  All variants are `Copy` so they
//! can be passed around without allocation.
//!
//! Degenerate pulse timing (zero-length interval, clock wraparound) is not an
//! error: the estimator absorbs it silently.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A channel rejected its configuration or a lifecycle request.
    Channel(ChannelError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Channel(e) => write!(f, "channel: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Channel errors
// ---------------------------------------------------------------------------

/// Synchronous configuration / lifecycle failures of an S0 channel.
///
/// A failed `init` never mutates the channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// The pin is not inside the S0 input block.
    InvalidPin(u8),
    /// Pulses per kWh outside `[1, 6000]`.
    PulsesOutOfRange(u32),
    /// The channel has not been successfully initialised.
    NotInitialized,
    /// Channel id outside the bank.
    InvalidId(u8),
    /// Another configured channel already listens on this pin.
    PinInUse(u8),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidPin(pin) => write!(f, "pin {pin} is not an S0 input"),
            Self::PulsesOutOfRange(p) => write!(f, "{p} pulses/kWh out of range"),
            Self::NotInitialized => write!(f, "channel not initialised"),
            Self::InvalidId(id) => write!(f, "no channel with id {id}"),
            Self::PinInUse(pin) => write!(f, "pin {pin} already bound to another channel"),
        }
    }
}

impl std::error::Error for ChannelError {}

impl From<ChannelError> for Error {
    fn from(e: ChannelError) -> Self {
        Self::Channel(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
