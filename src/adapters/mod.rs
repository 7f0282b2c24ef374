//! Adapters — concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to              |
//! |----------------|--------------------|--------------------------|
//! | `log_sink`     | EventSink          | Serial log output        |
//! | `nvs`          | ConfigPort         | NVS / in-memory store    |
//! |                | StoragePort        |                          |
//! | `pulse_input`  | PulseInputPort     | ESP32 GPIO + ISR service |
//! | `time`         | ClockPort          | ESP32 system timer       |

pub mod log_sink;
pub mod nvs;
pub mod pulse_input;
pub mod time;
