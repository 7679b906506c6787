//! Vario Peripheral Protocol
//!
//! Identity constants, endpoint role classification, command encoding,
//! and telemetry payload decoding for the vario sensor unit.

use crate::domain::models::{now_ms, EndpointRole, TelemetryFrame};
use tracing::debug;

/// Textual prefix every advertised vario service UUID starts with.
pub const SERVICE_PREFIX: &str = "19B10000";

/// Altitude telemetry characteristic UUID
pub const ALTITUDE_CHAR_UUID: &str = "19B10001-E8F2-537E-4F6C-D104768A1214";

/// Pressure/temperature telemetry characteristic UUID
pub const PRESSURE_CHAR_UUID: &str = "19B10002-E8F2-537E-4F6C-D104768A1214";

/// Angle telemetry characteristic UUID
pub const ANGLE_CHAR_UUID: &str = "19B10003-E8F2-537E-4F6C-D104768A1214";

/// Buzzer control characteristic UUID (write-only)
pub const BUZZER_CHAR_UUID: &str = "19B10004-E8F2-537E-4F6C-D104768A1214";

/// Placeholder text substituted when a payload is not valid UTF-8.
pub const UNKNOWN_DATA: &str = "Unknown data";

/// Outbound commands accepted by the peripheral.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarioCommand {
    /// Mute the buzzer
    BuzzerMute,
    /// Restore the buzzer
    BuzzerUnmute,
}

impl VarioCommand {
    /// Single-byte wire encoding for the buzzer control endpoint.
    pub fn as_bytes(&self) -> &'static [u8] {
        match self {
            Self::BuzzerMute => &[0x01],
            Self::BuzzerUnmute => &[0x00],
        }
    }

    pub fn for_buzzer(enabled: bool) -> Self {
        if enabled {
            Self::BuzzerMute
        } else {
            Self::BuzzerUnmute
        }
    }
}

/// Check whether any advertised service id carries the vario prefix.
///
/// Matching is on the textual form, case-insensitive; the advertisement
/// filter lives here rather than in the adapter.
pub fn matches_service_prefix(service_ids: &[String]) -> bool {
    service_ids
        .iter()
        .any(|id| id.to_ascii_uppercase().starts_with(SERVICE_PREFIX))
}

/// Classify an endpoint UUID against the four known roles.
///
/// Exact match, case-insensitive. Unknown endpoints return `None` and are
/// still subscribed when notify-capable, but their frames are dropped.
pub fn classify_endpoint(endpoint_id: &str) -> Option<EndpointRole> {
    let id = endpoint_id.to_ascii_uppercase();
    match id.as_str() {
        ALTITUDE_CHAR_UUID => Some(EndpointRole::Altitude),
        PRESSURE_CHAR_UUID => Some(EndpointRole::Pressure),
        ANGLE_CHAR_UUID => Some(EndpointRole::Angle),
        BUZZER_CHAR_UUID => Some(EndpointRole::BuzzerControl),
        _ => None,
    }
}

/// Decode a raw notification payload into a telemetry frame.
///
/// The payload is UTF-8 text; malformed bytes substitute a placeholder
/// instead of failing, so a corrupted notification never ends the session.
pub fn decode(role: EndpointRole, payload: &[u8]) -> TelemetryFrame {
    let text = match std::str::from_utf8(payload) {
        Ok(text) => text.to_string(),
        Err(_) => {
            debug!(?role, len = payload.len(), "payload not valid UTF-8");
            UNKNOWN_DATA.to_string()
        }
    };

    TelemetryFrame {
        role,
        raw: payload.to_vec(),
        text,
        observed_at_ms: now_ms(),
    }
}
