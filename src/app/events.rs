//! Outbound application events.
//!
//! The [`MeterService`](super::service::MeterService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them — log to serial, publish over the network, etc.

use heapless::Vec;

use crate::config::ChannelName;
use crate::error::ChannelError;
use crate::meter::Reading;
use crate::pins::MAX_CHANNELS;

use super::ports::StoreStatus;
use super::service::UpdateOutcome;

/// Structured events emitted by the application core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Configuration store checked at boot.
    ConfigStore(StoreStatus),

    /// A channel passed init and its input is armed.
    ChannelArmed { id: u8, pin: u8 },

    /// A stored record was rejected by the channel.
    ChannelInitFailed { id: u8, error: ChannelError },

    /// The pulse input of an initialised channel could not be armed.
    ChannelArmFailed { id: u8, pin: u8 },

    /// A client changed a channel record.
    ConfigUpdated { id: u8, outcome: UpdateOutcome },

    /// Periodic view of every enabled channel.  Does not reset read windows.
    Report(Vec<ChannelReport, MAX_CHANNELS>),
}

/// One channel's contribution to a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelReport {
    pub id: u8,
    pub name: ChannelName,
    pub reading: Reading,
}
