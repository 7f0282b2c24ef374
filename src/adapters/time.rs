//! ESP32 time adapter.
//!
//! Provides the millisecond tick the pulse estimator runs on.
//!
//! - **`target_os = "espidf"`** — wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer (microsecond precision, monotonic).
//!   Safe to call from interrupt context.
//! - **`not(target_os = "espidf")`** — uses `std::time::Instant` for
//!   host-side testing and simulation.
//!
//! Milliseconds are truncated to `u32` and wrap after ~49.7 days; every
//! consumer uses wrapping subtraction.

use crate::app::ports::ClockPort;

/// Time adapter for the ESP32-S3 platform.
#[derive(Clone, Copy)]
pub struct Esp32TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Microseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    /// Seconds since boot, for log lines.
    pub fn uptime_secs(&self) -> u64 {
        self.uptime_us() / 1_000_000
    }
}

impl ClockPort for Esp32TimeAdapter {
    fn now_ms(&self) -> u32 {
        // Truncation is the wrap.
        (self.uptime_us() / 1_000) as u32
    }
}
