//! Application core — pure domain logic, zero I/O.
//!
//! This module contains the business rules of the meter: booting channels
//! from the stored table, arming inputs, the periodic decay tick, snapshots
//! and configuration updates.  All interaction with hardware happens through
//! **port traits** defined in [`ports`], keeping this layer fully testable
//! without real peripherals.

pub mod events;
pub mod ports;
pub mod service;
