//! Recording adapter for tests and headless development.
//!
//! Every issued request is appended to `calls`; completions are injected
//! by the caller as [`AdapterEvent`]s, so state-machine behavior can be
//! driven deterministically without a radio.

use crate::domain::models::PeripheralHandle;
use crate::error::AdapterError;
use crate::infrastructure::bluetooth::adapter::{BleAdapter, WriteMode};

/// One recorded adapter request.
#[derive(Debug, Clone, PartialEq)]
pub enum AdapterCall {
    StartScan,
    StopScan,
    Connect(PeripheralHandle),
    Disconnect(PeripheralHandle),
    DiscoverServices(PeripheralHandle),
    DiscoverCharacteristics(PeripheralHandle, String),
    Subscribe(PeripheralHandle, String),
    Write {
        handle: PeripheralHandle,
        endpoint_id: String,
        bytes: Vec<u8>,
        mode: WriteMode,
    },
}

#[derive(Debug, Default)]
pub struct MockAdapter {
    pub calls: Vec<AdapterCall>,
    /// When set, the next request fails with this error instead of being
    /// recorded as issued.
    pub fail_next: Option<AdapterError>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&mut self, call: AdapterCall) -> Result<(), AdapterError> {
        if let Some(err) = self.fail_next.take() {
            return Err(err);
        }
        self.calls.push(call);
        Ok(())
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Endpoint ids of all subscribe requests issued so far.
    pub fn subscribed_endpoints(&self) -> Vec<String> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                AdapterCall::Subscribe(_, endpoint) => Some(endpoint.clone()),
                _ => None,
            })
            .collect()
    }

    /// Payloads of all write requests issued so far.
    pub fn written_payloads(&self) -> Vec<(String, Vec<u8>, WriteMode)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                AdapterCall::Write {
                    endpoint_id,
                    bytes,
                    mode,
                    ..
                } => Some((endpoint_id.clone(), bytes.clone(), *mode)),
                _ => None,
            })
            .collect()
    }
}

impl BleAdapter for MockAdapter {
    fn start_scan(&mut self) -> Result<(), AdapterError> {
        self.record(AdapterCall::StartScan)
    }

    fn stop_scan(&mut self) -> Result<(), AdapterError> {
        self.record(AdapterCall::StopScan)
    }

    fn connect(&mut self, handle: &PeripheralHandle) -> Result<(), AdapterError> {
        self.record(AdapterCall::Connect(handle.clone()))
    }

    fn disconnect(&mut self, handle: &PeripheralHandle) -> Result<(), AdapterError> {
        self.record(AdapterCall::Disconnect(handle.clone()))
    }

    fn discover_services(&mut self, handle: &PeripheralHandle) -> Result<(), AdapterError> {
        self.record(AdapterCall::DiscoverServices(handle.clone()))
    }

    fn discover_characteristics(
        &mut self,
        handle: &PeripheralHandle,
        service_id: &str,
    ) -> Result<(), AdapterError> {
        self.record(AdapterCall::DiscoverCharacteristics(
            handle.clone(),
            service_id.to_string(),
        ))
    }

    fn subscribe(
        &mut self,
        handle: &PeripheralHandle,
        endpoint_id: &str,
    ) -> Result<(), AdapterError> {
        self.record(AdapterCall::Subscribe(
            handle.clone(),
            endpoint_id.to_string(),
        ))
    }

    fn write(
        &mut self,
        handle: &PeripheralHandle,
        endpoint_id: &str,
        bytes: &[u8],
        mode: WriteMode,
    ) -> Result<(), AdapterError> {
        self.record(AdapterCall::Write {
            handle: handle.clone(),
            endpoint_id: endpoint_id.to_string(),
            bytes: bytes.to_vec(),
            mode,
        })
    }
}
