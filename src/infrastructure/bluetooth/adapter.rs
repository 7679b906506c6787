//! Capability Adapter boundary.
//!
//! The platform radio stack is consumed through this trait; the core never
//! talks to a concrete BLE implementation directly. Backend callbacks are
//! modeled as one event enum so every completion flows through a single
//! transition entry point instead of a family of handler methods.

use crate::domain::models::PeripheralHandle;
use crate::error::AdapterError;

/// Write acknowledgement mode for characteristic writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Acknowledged write; completion is reported via
    /// [`AdapterEvent::WriteComplete`].
    WithResponse,
    /// Fire-and-forget write.
    WithoutResponse,
}

/// Capability flags of a discovered endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EndpointProperties {
    pub read: bool,
    pub notify: bool,
    pub write: bool,
}

impl EndpointProperties {
    pub fn supports_read_or_notify(&self) -> bool {
        self.read || self.notify
    }
}

/// One endpoint as reported by characteristic enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    pub id: String,
    pub properties: EndpointProperties,
}

/// Commands the core issues against the platform radio stack.
///
/// All calls are request submissions; completions arrive asynchronously as
/// [`AdapterEvent`]s. An `Err` means the request could not even be issued.
pub trait BleAdapter {
    fn start_scan(&mut self) -> Result<(), AdapterError>;
    fn stop_scan(&mut self) -> Result<(), AdapterError>;
    fn connect(&mut self, handle: &PeripheralHandle) -> Result<(), AdapterError>;
    fn disconnect(&mut self, handle: &PeripheralHandle) -> Result<(), AdapterError>;
    fn discover_services(&mut self, handle: &PeripheralHandle) -> Result<(), AdapterError>;
    fn discover_characteristics(
        &mut self,
        handle: &PeripheralHandle,
        service_id: &str,
    ) -> Result<(), AdapterError>;
    fn subscribe(&mut self, handle: &PeripheralHandle, endpoint_id: &str)
        -> Result<(), AdapterError>;
    fn write(
        &mut self,
        handle: &PeripheralHandle,
        endpoint_id: &str,
        bytes: &[u8],
        mode: WriteMode,
    ) -> Result<(), AdapterError>;
}

/// Asynchronous completions and notifications from the radio backend.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterEvent {
    Advertisement {
        id: String,
        name: String,
        service_ids: Vec<String>,
        handle: PeripheralHandle,
    },
    Connected {
        handle: PeripheralHandle,
    },
    Disconnected {
        handle: PeripheralHandle,
        reason: Option<String>,
    },
    ServicesDiscovered {
        handle: PeripheralHandle,
        service_ids: Vec<String>,
        error: Option<AdapterError>,
    },
    CharacteristicsDiscovered {
        handle: PeripheralHandle,
        service_id: String,
        endpoints: Vec<EndpointInfo>,
        error: Option<AdapterError>,
    },
    ValueUpdated {
        handle: PeripheralHandle,
        endpoint_id: String,
        bytes: Vec<u8>,
        error: Option<AdapterError>,
    },
    WriteComplete {
        handle: PeripheralHandle,
        endpoint_id: String,
        error: Option<AdapterError>,
    },
}

impl AdapterEvent {
    /// The peripheral this event concerns.
    pub fn handle(&self) -> &PeripheralHandle {
        match self {
            Self::Advertisement { handle, .. }
            | Self::Connected { handle }
            | Self::Disconnected { handle, .. }
            | Self::ServicesDiscovered { handle, .. }
            | Self::CharacteristicsDiscovered { handle, .. }
            | Self::ValueUpdated { handle, .. }
            | Self::WriteComplete { handle, .. } => handle,
        }
    }
}
