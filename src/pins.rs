//! GPIO assignments for the S0 smartmeter board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.
//!
//! The S0 inputs occupy one block of eight contiguous GPIOs so that a single
//! read of the input register yields one "port" byte, bit `n` belonging to
//! GPIO `S0_PIN_FIRST + n`.  Edge detection works on that byte.

// ---------------------------------------------------------------------------
// S0 pulse inputs (open-collector, internal pull-up, active low)
// ---------------------------------------------------------------------------

/// Lowest GPIO usable as an S0 input.
pub const S0_PIN_FIRST: u8 = 4;
/// Highest GPIO usable as an S0 input.
pub const S0_PIN_LAST: u8 = 11;

/// Maximum number of S0 channels: one per bit of the input port.
pub const MAX_CHANNELS: usize = 8;

const _: () = assert!((S0_PIN_LAST - S0_PIN_FIRST + 1) as usize == MAX_CHANNELS);

/// Whether `pin` lies inside the S0 input block.
pub const fn is_s0_pin(pin: u8) -> bool {
    pin >= S0_PIN_FIRST && pin <= S0_PIN_LAST
}

/// Bit position of `pin` inside the port byte.
///
/// Only meaningful for pins accepted by [`is_s0_pin`].
pub const fn port_bit(pin: u8) -> u8 {
    pin - S0_PIN_FIRST
}
