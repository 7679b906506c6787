//! variolink — connection-management core for a BLE vario unit.
//!
//! Discovers vario peripherals by advertised service identity, runs the
//! connection session state machine (connect, enumerate, subscribe,
//! stream), decodes telemetry notifications, and dispatches buzzer
//! commands. The platform radio stack is consumed through the
//! [`infrastructure::bluetooth::adapter::BleAdapter`] trait; the
//! presentation layer consumes [`domain::models::VarioEvent`]s.

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::models::{
    ConnectionState, DeviceRecord, DiscoveryState, EndpointRole, PeripheralHandle, TelemetryFrame,
    VarioEvent,
};
pub use domain::registry::DeviceRegistry;
pub use domain::settings::{LogSettings, Settings, SettingsService};
pub use error::{AdapterError, EnumerationPhase, VarioError};
pub use infrastructure::bluetooth::adapter::{
    AdapterEvent, BleAdapter, EndpointInfo, EndpointProperties, WriteMode,
};
pub use infrastructure::bluetooth::{ServiceCommand, VarioService};
pub use infrastructure::logging::{init_logger, LoggingGuard};
