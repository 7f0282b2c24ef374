//! Port traits — the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ MeterService (domain)
//! ```
//!
//! Driven adapters (clock, pulse inputs, configuration store, event sinks)
//! implement these traits.  The [`MeterService`](super::service::MeterService)
//! consumes them via generics, so the domain core never touches hardware
//! directly.

use crate::config::{ChannelConfig, SystemConfig};

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock.  Wraps at `u32::MAX`; consumers use
/// wrapping arithmetic.
pub trait ClockPort {
    fn now_ms(&self) -> u32;
}

// ───────────────────────────────────────────────────────────────
// Pulse input port (driven adapter: domain → GPIO interrupt hardware)
// ───────────────────────────────────────────────────────────────

/// Arms or disarms the falling-edge interrupt of one S0 line.
///
/// Arming must not discard channel state; it only gates delivery.
pub trait PulseInputPort {
    fn arm(&mut self, pin: u8) -> Result<(), PulseInputError>;

    fn disarm(&mut self, pin: u8) -> Result<(), PulseInputError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Outcome of [`ConfigPort::init`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreStatus {
    /// Stored table was intact.
    Valid,
    /// Stored table was missing or stale and has been rewritten with defaults.
    Restored,
}

/// Loads and persists the per-channel records.
///
/// # Validation
///
/// Implementations MUST validate records before persisting.  Invalid ranges
/// are rejected with [`ConfigError::ValidationFailed`], not silently clamped.
pub trait ConfigPort {
    /// Check the store's integrity marker; rewrite defaults if it is stale.
    fn init(&mut self) -> Result<StoreStatus, ConfigError>;

    /// Load the record of channel `index`.  Returns the factory record if
    /// none is stored.
    fn load_channel(&self, index: u8) -> Result<ChannelConfig, ConfigError>;

    /// Validate and persist the record of channel `index`.
    fn save_channel(&mut self, index: u8, config: &ChannelConfig) -> Result<(), ConfigError>;

    /// Load the whole table.  Unreadable records fall back to defaults.
    fn load_all(&self) -> SystemConfig {
        let mut table = SystemConfig::default();
        for (i, slot) in table.channels.iter_mut().enumerate() {
            match self.load_channel(i as u8) {
                Ok(cfg) => *slot = cfg,
                Err(e) => log::warn!("config: channel {} unreadable ({}), using defaults", i, e),
            }
        }
        table
    }
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST be atomic — no partial writes on power loss.
///   The ESP-IDF NVS API guarantees this natively; in-memory simulation
///   achieves it trivially.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug)]
pub enum ConfigError {
    /// Channel index outside the table.
    InvalidIndex(u8),
    /// Stored record failed integrity / deserialization check.
    Corrupted,
    /// A field failed range validation.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] operations.
#[derive(Debug)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
}

/// Errors from [`PulseInputPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PulseInputError {
    /// GPIO configuration failed (driver return code).
    GpioConfig(i32),
    /// The ISR handler could not be attached or removed.
    IsrHandler(i32),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InvalidIndex(i) => write!(f, "no channel record {}", i),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for PulseInputError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfig(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::IsrHandler(rc) => write!(f, "ISR handler update failed (rc={})", rc),
        }
    }
}

impl From<StorageError> for ConfigError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::Full => Self::StorageFull,
            StorageError::NotFound | StorageError::IoError => Self::IoError,
        }
    }
}
