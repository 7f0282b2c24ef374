//! Raw mutex guarding channel state shared with the GPIO interrupt.
//!
//! On the target the lock is an interrupt-masking critical section
//! (`portENTER_CRITICAL` via [`esp_idf_hal::interrupt::free`]): the GPIO
//! interrupt cannot run while the foreground loop holds it, and the previous
//! interrupt state is restored on exit.  It never blocks, so the interrupt
//! handler can take it as well.
//!
//! Host builds use the `critical-section` crate's std implementation.

#[cfg(target_os = "espidf")]
pub use isr::IsrRawMutex as StateRawMutex;

#[cfg(not(target_os = "espidf"))]
pub use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex as StateRawMutex;

#[cfg(target_os = "espidf")]
mod isr {
    use embassy_sync::blocking_mutex::raw::RawMutex;

    pub struct IsrRawMutex(());

    // SAFETY: `interrupt::free` masks interrupts on this core and takes the
    // port spinlock, so no other context can be inside `lock` concurrently.
    unsafe impl RawMutex for IsrRawMutex {
        const INIT: Self = Self(());

        fn lock<R>(&self, f: impl FnOnce() -> R) -> R {
            esp_idf_hal::interrupt::free(f)
        }
    }
}
