//! Core domain types shared across discovery, session, and telemetry.

use std::hash::{Hash, Hasher};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::VarioError;

/// Opaque reference to a platform peripheral object.
///
/// The core never interprets the inner value; it is handed back to the
/// adapter verbatim for connect/enumerate/subscribe/write calls.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PeripheralHandle(pub String);

impl std::fmt::Display for PeripheralHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A discovered peripheral as shown in the device list.
///
/// Identity is the stable `id` alone; `display_name` and `handle` do not
/// participate in equality or hashing.
#[derive(Debug, Clone, Eq)]
pub struct DeviceRecord {
    pub id: String,
    pub display_name: String,
    pub handle: PeripheralHandle,
}

impl PartialEq for DeviceRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Hash for DeviceRecord {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Logical role of a peripheral endpoint, classified by its UUID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EndpointRole {
    Altitude,
    Pressure,
    Angle,
    BuzzerControl,
}

impl EndpointRole {
    /// Roles that carry telemetry notifications (everything but the
    /// write-only buzzer control).
    pub fn is_telemetry(self) -> bool {
        !matches!(self, Self::BuzzerControl)
    }
}

/// Discovery attempt state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryState {
    Idle,
    Scanning,
    TimedOut,
}

/// Connection session state, in transition order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    DiscoveringServices,
    DiscoveringCharacteristics,
    Subscribing,
    Active,
    /// Link lost after the session had reached `Active`.
    Disconnected,
    /// The session ended before ever reaching `Active`.
    Failed(String),
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Disconnected | Self::Failed(_))
    }
}

/// One decoded telemetry notification.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryFrame {
    pub role: EndpointRole,
    pub raw: Vec<u8>,
    pub text: String,
    pub observed_at_ms: i64,
}

/// Milliseconds since the Unix epoch, for frame timestamps.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Events pushed outward to the presentation layer.
#[derive(Debug, Clone, PartialEq)]
pub enum VarioEvent {
    DeviceListChanged(Vec<DeviceRecord>),
    DiscoveryTimedOut,
    ConnectionState(ConnectionState),
    Telemetry(TelemetryFrame),
    /// Asynchronous failures forwarded as data (enumeration errors,
    /// failed write acknowledgements).
    Error(VarioError),
}
