//! JSON documents served to network clients.
//!
//! ```text
//! GET /api/s0-interface/<id>  → {"data":{…},"status":0}
//! GET /api/s0-interfaces      → {"data":[…],"status":0}
//! ```
//!
//! Rendering a channel reads it, so every document resets the pulse counters
//! of the channels it contains.  The HTTP transport is not part of this
//! crate; it hands the request path to [`handle_get`] and sends back the
//! returned body with `Content-Type: application/json`.

use serde::{Serialize, Serializer};

use crate::app::events::ChannelReport;
use crate::app::service::MeterService;

const SINGLE_PREFIX: &str = "/api/s0-interface/";
const ALL_PATH: &str = "/api/s0-interfaces";

/// Fallback body if serialisation itself fails.
const INTERNAL_ERROR_BODY: &str = r#"{"data":{},"status":4}"#;

/// Status codes carried in every document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusId {
    Ok = 0,
    ParameterInvalid = 3,
    Internal = 4,
}

impl Serialize for StatusId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(*self as u8)
    }
}

/// Routes served by this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route<'a> {
    /// One channel; the id is still raw text.
    Interface(&'a str),
    Interfaces,
}

impl<'a> Route<'a> {
    /// Resolve a request path.  The query string, if any, is ignored.
    pub fn resolve(path: &'a str) -> Option<Self> {
        let path = path.split_once('?').map_or(path, |(p, _)| p);
        if path == ALL_PATH {
            return Some(Self::Interfaces);
        }
        path.strip_prefix(SINGLE_PREFIX)
            .filter(|id| !id.contains('/'))
            .map(Self::Interface)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChannelJson<'a> {
    id: u8,
    name: &'a str,
    power_consumption: u32,
    pulses: u32,
    energy_consumption: u64,
}

impl<'a> From<&'a ChannelReport> for ChannelJson<'a> {
    fn from(r: &'a ChannelReport) -> Self {
        Self {
            id: r.id,
            name: r.name.as_str(),
            power_consumption: r.reading.power_w,
            pulses: r.reading.pulses,
            energy_consumption: r.reading.energy_ws,
        }
    }
}

#[derive(Serialize)]
struct Empty {}

#[derive(Serialize)]
struct Envelope<T> {
    data: T,
    status: StatusId,
}

fn render<T: Serialize>(data: T, status: StatusId) -> String {
    serde_json::to_string(&Envelope { data, status }).unwrap_or_else(|e| {
        log::error!("api: serialisation failed: {}", e);
        INTERNAL_ERROR_BODY.into()
    })
}

/// Document for `GET /api/s0-interface/<id>`.
///
/// A disabled channel yields an empty object with status ok; an id that is
/// not a number below the channel count yields status
/// [`StatusId::ParameterInvalid`].
pub fn channel_document(service: &MeterService<'_>, id: &str) -> String {
    let Some(id) = id.parse::<u8>().ok().filter(|&i| service.bank().channel(i).is_ok()) else {
        return render(Empty {}, StatusId::ParameterInvalid);
    };
    match service.read(id) {
        Some(report) => render(ChannelJson::from(&report), StatusId::Ok),
        None => render(Empty {}, StatusId::Ok),
    }
}

/// Document for `GET /api/s0-interfaces`: every enabled channel in id order.
pub fn all_channels_document(service: &MeterService<'_>) -> String {
    let reports = service.snapshot_all();
    let data: Vec<ChannelJson<'_>> = reports.iter().map(ChannelJson::from).collect();
    render(data, StatusId::Ok)
}

/// Serve a GET request.  `None` if the path is not an API route.
pub fn handle_get(service: &MeterService<'_>, path: &str) -> Option<String> {
    match Route::resolve(path)? {
        Route::Interface(id) => Some(channel_document(service, id)),
        Route::Interfaces => Some(all_channels_document(service)),
    }
}
