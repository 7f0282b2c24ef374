//! S0 smartmeter firmware library.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod meter;
pub mod pins;

// The ESP-IDF implementations are guarded by cfg attributes inside; host
// builds get the simulation backends.
pub mod adapters;
