//! S0 smartmeter firmware — main entry point.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  GpioPulseInput    LogEventSink   NvsAdapter   Esp32Time       │
//! │  (PulseInput+ISR)  (EventSink)    (Config+NVS) (ClockPort)     │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            MeterService (pure logic)                   │    │
//! │  │  MeterBank · estimator · snapshots · config update     │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Boot order: NVS → channel table → bank init → publish bank to the ISR →
//! arm inputs → foreground loop (decay every `LOOP_INTERVAL_MS`, periodic
//! report).
#![deny(unused_must_use)]

use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Result, anyhow};
use log::{error, info, warn};

use s0meter::adapters::log_sink::LogEventSink;
use s0meter::adapters::nvs::NvsAdapter;
use s0meter::adapters::pulse_input::GpioPulseInput;
use s0meter::adapters::time::Esp32TimeAdapter;
use s0meter::app::service::{MeterService, boot_bank};
use s0meter::config::{LOOP_INTERVAL_MS, REPORT_INTERVAL_MS};
use s0meter::meter::MeterBank;

/// Channel bank shared between the foreground loop and the GPIO interrupt.
static BANK: OnceLock<MeterBank> = OnceLock::new();

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  S0 smartmeter v{}                ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Configuration store ────────────────────────────────
    let mut nvs = NvsAdapter::new().map_err(|e| anyhow!("NVS init failed: {}", e))?;
    let mut log_sink = LogEventSink::new();

    // ── 3. Channels ───────────────────────────────────────────
    let mut bank = MeterBank::new();
    let table = boot_bank(&mut bank, &mut nvs, &mut log_sink)?;
    let configured = table.channels.iter().filter(|c| c.enabled).count();

    if BANK.set(bank).is_err() {
        return Err(anyhow!("channel bank published twice"));
    }
    let bank: &'static MeterBank = BANK.get().ok_or_else(|| anyhow!("channel bank missing"))?;

    // ── 4. Pulse inputs ───────────────────────────────────────
    let mut inputs = GpioPulseInput::new(bank);
    let mut service = MeterService::new(bank, Some(REPORT_INTERVAL_MS));
    let armed = service.arm(&mut inputs, &mut log_sink);
    if armed < configured {
        warn!("{} of {} configured interfaces armed", armed, configured);
    }
    if armed == 0 {
        error!("No S0 interface armed; configure one and reboot.");
    }

    let clock = Esp32TimeAdapter::new();
    info!(
        "System ready after {} s. Entering foreground loop.",
        clock.uptime_secs()
    );

    // ── 5. Foreground loop ────────────────────────────────────
    loop {
        service.tick(&clock, &mut log_sink);
        std::thread::sleep(Duration::from_millis(u64::from(LOOP_INTERVAL_MS)));
    }
}
