//! Power / energy estimation state shared between the pulse ISR and the
//! foreground loop.
//!
//! This module is pure integer arithmetic: it never reads a clock, never
//! logs and never allocates.  The caller supplies the monotonic millisecond
//! timestamp and is responsible for running every transition inside the
//! channel's critical section (see [`S0Meter`](super::S0Meter)).
//!
//! ## Estimation
//!
//! Each pulse is one quantum of `energy_per_pulse` Ws.  The instantaneous
//! power after an edge is `energy_per_pulse * 1000 / interval_ms`.
//!
//! ## Decay
//!
//! If pulses stop, the last estimate would stay pinned forever.  Once
//! `decay_window_ms` (initially twice the last interval) has elapsed since
//! the last edge, the estimate drops by `energy_per_pulse * 1000 /
//! decay_window_ms` and the window doubles.  The estimate therefore falls
//! monotonically and reaches exactly zero after a bounded number of steps.

/// Window value before the first interval is known: never decays.
pub const DECAY_WINDOW_UNSET_MS: u32 = u32::MAX;

/// Milliseconds per second, used to turn Ws/ms into W.
const MS_PER_S: u64 = 1000;

/// Snapshot returned by [`EstimatorState::take`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sample {
    /// Current power estimate (W).
    pub power_w: u32,
    /// Pulses counted since the previous take.
    pub pulses: u32,
}

/// The shared mutable fields of one channel.
///
/// `Copy` so it can live in a `Cell` behind a critical-section mutex and be
/// updated with a get → mutate → set sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimatorState {
    pulse_count: u32,
    /// `None` until the first edge has been seen.
    last_pulse_ms: Option<u32>,
    last_interval_ms: u32,
    power_w: u32,
    decay_window_ms: u32,
    has_second_pulse: bool,
}

impl Default for EstimatorState {
    fn default() -> Self {
        Self::new()
    }
}

impl EstimatorState {
    pub const fn new() -> Self {
        Self {
            pulse_count: 0,
            last_pulse_ms: None,
            last_interval_ms: 0,
            power_w: 0,
            decay_window_ms: DECAY_WINDOW_UNSET_MS,
            has_second_pulse: false,
        }
    }

    /// Account for one falling edge observed at `now_ms`.
    ///
    /// Interrupt context: bounded time, no allocation, no logging.  A zero
    /// interval (two edges on the same tick) still counts the pulse but
    /// skips the power update.
    pub fn on_edge(&mut self, now_ms: u32, energy_per_pulse_ws: u32) {
        self.pulse_count = self.pulse_count.wrapping_add(1);

        let Some(last) = self.last_pulse_ms else {
            self.last_pulse_ms = Some(now_ms);
            self.has_second_pulse = false;
            return;
        };

        // Wrapping difference stays correct across a u32 rollover.
        let interval = now_ms.wrapping_sub(last);
        if interval == 0 {
            return;
        }

        self.last_interval_ms = interval;
        self.decay_window_ms = interval.saturating_mul(2);
        self.power_w = power_from(energy_per_pulse_ws, interval);
        self.last_pulse_ms = Some(now_ms);
        self.has_second_pulse = true;
    }

    /// Degrade a stale estimate.  Call once per foreground iteration.
    pub fn decay(&mut self, now_ms: u32, energy_per_pulse_ws: u32) {
        if !self.has_second_pulse || self.power_w == 0 {
            return;
        }
        let Some(last) = self.last_pulse_ms else {
            return;
        };

        if now_ms.wrapping_sub(last) < self.decay_window_ms {
            return;
        }

        let delta = power_from(energy_per_pulse_ws, self.decay_window_ms);
        if delta <= 1 || delta >= self.power_w {
            self.power_w = 0;
        } else {
            self.power_w -= delta;
        }

        self.decay_window_ms = self.decay_window_ms.saturating_mul(2);
    }

    /// Read the power estimate and the pulse count, resetting the count.
    ///
    /// The power estimate is a rate, not an accumulator, so it survives.
    pub fn take(&mut self) -> Sample {
        let sample = Sample {
            power_w: self.power_w,
            pulses: self.pulse_count,
        };
        self.pulse_count = 0;
        sample
    }

    /// Same as [`take`](Self::take) but leaves the count alone.
    pub fn peek(&self) -> Sample {
        Sample {
            power_w: self.power_w,
            pulses: self.pulse_count,
        }
    }

    /// Current estimate without touching the counter.
    pub fn power_w(&self) -> u32 {
        self.power_w
    }

    /// Interval between the two most recent edges (ms), 0 before then.
    pub fn last_interval_ms(&self) -> u32 {
        self.last_interval_ms
    }

    /// Current decay window (ms).
    pub fn decay_window_ms(&self) -> u32 {
        self.decay_window_ms
    }

    /// Whether an interval (and therefore power) is known.
    pub fn has_second_pulse(&self) -> bool {
        self.has_second_pulse
    }
}

/// `energy * 1000 / interval` in W, clamped to `u32`.  `interval_ms > 0`.
fn power_from(energy_per_pulse_ws: u32, interval_ms: u32) -> u32 {
    let w = u64::from(energy_per_pulse_ws) * MS_PER_S / u64::from(interval_ms);
    u32::try_from(w).unwrap_or(u32::MAX)
}
