//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::{EventSink, StoreStatus};
use crate::app::service::UpdateOutcome;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::ConfigStore(StoreStatus::Valid) => {
                info!("CONFIG | stored table valid");
            }
            AppEvent::ConfigStore(StoreStatus::Restored) => {
                warn!("CONFIG | stored table invalid, factory defaults restored");
            }
            AppEvent::ChannelArmed { id, pin } => {
                info!("S0 | interface {} armed on pin {}", id, pin);
            }
            AppEvent::ChannelInitFailed { id, error } => {
                warn!("S0 | interface {} init failed: {}", id, error);
            }
            AppEvent::ChannelArmFailed { id, pin } => {
                warn!("S0 | interface {} could not arm pin {}", id, pin);
            }
            AppEvent::ConfigUpdated { id, outcome } => {
                let what = match outcome {
                    UpdateOutcome::Unchanged => "unchanged",
                    UpdateOutcome::PinConflict => "rejected (pin in use)",
                    UpdateOutcome::Saved => "saved, reboot to apply",
                };
                info!("CONFIG | interface {} {}", id, what);
            }
            AppEvent::Report(reports) => {
                for r in reports {
                    info!(
                        "REPORT | #{} '{}' | P={}W | pulses={} | E={}Ws",
                        r.id, r.name, r.reading.power_w, r.reading.pulses, r.reading.energy_ws,
                    );
                }
            }
        }
    }
}
