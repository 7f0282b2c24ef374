//! GPIO pulse input adapter.
//!
//! Implements [`PulseInputPort`] for the S0 input block.
//!
//! All armed lines share one interrupt handler.  On any edge it samples the
//! whole block into a port byte and hands it to
//! [`MeterBank::on_port_change`], which derives the falling edges of the
//! enabled channels.  The sample is passed on raw.
//!
//! - **`target_os = "espidf"`** — `gpio_config` with pull-up, any-edge
//!   interrupts, per-pin handlers on the shared GPIO ISR service.
//! - **`not(target_os = "espidf")`** — records armed lines; tests inject
//!   port samples with [`GpioPulseInput::inject_port`].

use log::info;

use crate::app::ports::{PulseInputError, PulseInputPort};
use crate::meter::MeterBank;
use crate::pins;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

pub struct GpioPulseInput {
    bank: &'static MeterBank,
    /// Port bits whose interrupt is attached.
    armed: u8,
    #[cfg(target_os = "espidf")]
    isr_service: bool,
}

impl GpioPulseInput {
    pub fn new(bank: &'static MeterBank) -> Self {
        Self {
            bank,
            armed: 0,
            #[cfg(target_os = "espidf")]
            isr_service: false,
        }
    }

    pub fn armed_mask(&self) -> u8 {
        self.armed
    }

    fn bit(pin: u8) -> Result<u8, PulseInputError> {
        if pins::is_s0_pin(pin) {
            Ok(1 << pins::port_bit(pin))
        } else {
            Err(PulseInputError::GpioConfig(-1))
        }
    }

    /// Feed a raw port sample as if the interrupt fired at `now_ms`.
    #[cfg(not(target_os = "espidf"))]
    pub fn inject_port(&self, port: u8, now_ms: u32) {
        self.bank.on_port_change(port, now_ms);
    }

    #[cfg(target_os = "espidf")]
    fn install_isr_service(&mut self) -> Result<(), PulseInputError> {
        if self.isr_service {
            return Ok(());
        }
        // SAFETY: ESP_ERR_INVALID_STATE means another driver already
        // installed the service, which is fine.
        let ret = unsafe { gpio_install_isr_service(0) };
        if ret != ESP_OK as i32 && ret != ESP_ERR_INVALID_STATE as i32 {
            return Err(PulseInputError::IsrHandler(ret));
        }
        self.isr_service = true;
        Ok(())
    }
}

// ── Interrupt handler ─────────────────────────────────────────

/// Level of every S0 line, bit n = line `S0_PIN_FIRST + n`.
#[cfg(target_os = "espidf")]
fn sample_port() -> u8 {
    (pins::S0_PIN_FIRST..=pins::S0_PIN_LAST).fold(0u8, |port, pin| {
        // SAFETY: gpio_get_level is a register read; safe in ISR context.
        let high = unsafe { gpio_get_level(i32::from(pin)) } != 0;
        port | (u8::from(high) << pins::port_bit(pin))
    })
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn s0_gpio_isr(arg: *mut core::ffi::c_void) {
    // SAFETY: `arg` is the `&'static MeterBank` registered in `arm`.
    let bank = unsafe { &*(arg as *const MeterBank) };
    // SAFETY: esp_timer_get_time is a RTC counter read; safe in ISR context.
    let now_ms = (unsafe { esp_timer_get_time() } / 1_000) as u32;
    bank.on_port_change(sample_port(), now_ms);
}

impl PulseInputPort for GpioPulseInput {
    #[cfg(target_os = "espidf")]
    fn arm(&mut self, pin: u8) -> Result<(), PulseInputError> {
        let bit = Self::bit(pin)?;
        self.install_isr_service()?;

        let gpio = i32::from(pin);
        let cfg = gpio_config_t {
            pin_bit_mask: 1u64 << pin,
            mode: gpio_mode_t_GPIO_MODE_INPUT,
            pull_up_en: gpio_pullup_t_GPIO_PULLUP_ENABLE,
            pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
            intr_type: gpio_int_type_t_GPIO_INTR_ANYEDGE,
        };
        // SAFETY: configures a pin of the S0 block from the main task.
        let ret = unsafe { gpio_config(&cfg) };
        if ret != ESP_OK as i32 {
            return Err(PulseInputError::GpioConfig(ret));
        }

        // SAFETY: the handler only touches the static bank, which outlives
        // the registration.
        let ret = unsafe {
            gpio_isr_handler_add(
                gpio,
                Some(s0_gpio_isr),
                self.bank as *const MeterBank as *mut core::ffi::c_void,
            )
        };
        if ret != ESP_OK as i32 {
            return Err(PulseInputError::IsrHandler(ret));
        }
        unsafe { gpio_intr_enable(gpio) };

        self.armed |= bit;
        info!("pulse_input: pin {} armed", pin);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn arm(&mut self, pin: u8) -> Result<(), PulseInputError> {
        self.armed |= Self::bit(pin)?;
        info!("pulse_input(sim): pin {} armed", pin);
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn disarm(&mut self, pin: u8) -> Result<(), PulseInputError> {
        let bit = Self::bit(pin)?;
        let gpio = i32::from(pin);
        // SAFETY: removing a handler this adapter registered.
        unsafe { gpio_intr_disable(gpio) };
        let ret = unsafe { gpio_isr_handler_remove(gpio) };
        if ret != ESP_OK as i32 {
            return Err(PulseInputError::IsrHandler(ret));
        }
        self.armed &= !bit;
        info!("pulse_input: pin {} disarmed", pin);
        Ok(())
    }

    #[cfg(not(target_os = "espidf"))]
    fn disarm(&mut self, pin: u8) -> Result<(), PulseInputError> {
        self.armed &= !Self::bit(pin)?;
        info!("pulse_input(sim): pin {} disarmed", pin);
        Ok(())
    }
}
