//! Connection session state machine
//!
//! Owns the lifecycle of one connection attempt: connecting, service and
//! characteristic enumeration, subscription, streaming, and link loss.
//! Every adapter completion is dispatched through [`ConnectionSession::handle_event`].

use std::collections::{HashMap, HashSet};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::domain::models::{
    ConnectionState, DeviceRecord, EndpointRole, PeripheralHandle, TelemetryFrame, VarioEvent,
};
use crate::error::{AdapterError, EnumerationPhase, VarioError};
use crate::infrastructure::bluetooth::adapter::{AdapterEvent, BleAdapter, EndpointInfo};
use crate::infrastructure::bluetooth::protocol;

/// One connection attempt against a single peripheral.
///
/// Terminal states (`Disconnected`, `Failed`) end the session instance; a
/// fresh `connect` creates a new one. An enumeration error freezes the
/// session in its current sub-state instead of retrying.
pub struct ConnectionSession {
    handle: PeripheralHandle,
    state: ConnectionState,
    endpoints: HashMap<EndpointRole, String>,
    /// Subscribed endpoint ids (uppercased) mapped to their role, if any.
    /// Unclassified notify endpoints are subscribed too but produce no
    /// forwarded frames.
    endpoint_roles: HashMap<String, Option<EndpointRole>>,
    pending_services: HashSet<String>,
    frozen: bool,
    reached_active: bool,
    event_sender: mpsc::UnboundedSender<VarioEvent>,
}

impl ConnectionSession {
    /// Start a connection attempt against a registered device.
    pub fn begin(
        record: &DeviceRecord,
        adapter: &mut impl BleAdapter,
        event_sender: mpsc::UnboundedSender<VarioEvent>,
    ) -> Result<Self, VarioError> {
        adapter.connect(&record.handle)?;
        info!(device = %record.id, "connecting");

        let session = Self {
            handle: record.handle.clone(),
            state: ConnectionState::Connecting,
            endpoints: HashMap::new(),
            endpoint_roles: HashMap::new(),
            pending_services: HashSet::new(),
            frozen: false,
            reached_active: false,
            event_sender,
        };
        session.emit_state();
        Ok(session)
    }

    /// Dispatch one adapter completion through the state machine.
    ///
    /// Returns a decoded telemetry frame when the event carried a
    /// notification from a classified endpoint.
    pub fn handle_event(
        &mut self,
        adapter: &mut impl BleAdapter,
        event: AdapterEvent,
    ) -> Option<TelemetryFrame> {
        if *event.handle() != self.handle {
            debug!("event for foreign peripheral ignored");
            return None;
        }
        if self.state.is_terminal() {
            return None;
        }

        match event {
            AdapterEvent::Connected { .. } => {
                self.on_connected(adapter);
                None
            }
            AdapterEvent::Disconnected { reason, .. } => {
                self.on_disconnected(reason);
                None
            }
            AdapterEvent::ServicesDiscovered {
                service_ids, error, ..
            } => {
                self.on_services_discovered(adapter, service_ids, error);
                None
            }
            AdapterEvent::CharacteristicsDiscovered {
                service_id,
                endpoints,
                error,
                ..
            } => {
                self.on_characteristics_discovered(adapter, service_id, endpoints, error);
                None
            }
            AdapterEvent::ValueUpdated {
                endpoint_id,
                bytes,
                error,
                ..
            } => self.on_value_updated(endpoint_id, bytes, error),
            AdapterEvent::WriteComplete {
                endpoint_id, error, ..
            } => {
                self.on_write_complete(endpoint_id, error);
                None
            }
            AdapterEvent::Advertisement { .. } => None,
        }
    }

    fn on_connected(&mut self, adapter: &mut impl BleAdapter) {
        if self.frozen || self.state != ConnectionState::Connecting {
            return;
        }
        self.set_state(ConnectionState::DiscoveringServices);
        // All services, unfiltered; classification happens per endpoint.
        if let Err(err) = adapter.discover_services(&self.handle) {
            self.freeze(EnumerationPhase::Services, err);
        }
    }

    fn on_services_discovered(
        &mut self,
        adapter: &mut impl BleAdapter,
        service_ids: Vec<String>,
        error: Option<AdapterError>,
    ) {
        if self.frozen || self.state != ConnectionState::DiscoveringServices {
            return;
        }
        if let Some(err) = error {
            self.freeze(EnumerationPhase::Services, err);
            return;
        }

        self.set_state(ConnectionState::DiscoveringCharacteristics);
        self.pending_services = service_ids.iter().cloned().collect();
        for service_id in service_ids {
            if let Err(err) = adapter.discover_characteristics(&self.handle, &service_id) {
                self.freeze(EnumerationPhase::Characteristics, err);
                return;
            }
        }
        // A peripheral with no services at all has nothing to subscribe.
        self.maybe_activate();
    }

    fn on_characteristics_discovered(
        &mut self,
        adapter: &mut impl BleAdapter,
        service_id: String,
        endpoints: Vec<EndpointInfo>,
        error: Option<AdapterError>,
    ) {
        if self.frozen || self.state != ConnectionState::DiscoveringCharacteristics {
            return;
        }
        if let Some(err) = error {
            self.freeze(EnumerationPhase::Characteristics, err);
            return;
        }
        if !self.pending_services.remove(&service_id) {
            debug!(%service_id, "characteristics for unknown service ignored");
            return;
        }

        for endpoint in endpoints {
            let role = protocol::classify_endpoint(&endpoint.id);
            let key = endpoint.id.to_ascii_uppercase();

            if endpoint.properties.supports_read_or_notify() {
                // Classified or not, notify-capable endpoints are always
                // subscribed; unclassified frames are dropped later.
                if let Err(err) = adapter.subscribe(&self.handle, &endpoint.id) {
                    self.freeze(EnumerationPhase::Characteristics, err);
                    return;
                }
                self.endpoint_roles.insert(key, role);
                if let Some(role) = role {
                    self.endpoints.insert(role, endpoint.id.clone());
                }
            } else if endpoint.properties.write && role == Some(EndpointRole::BuzzerControl) {
                // Write-only command endpoint: recorded, never subscribed.
                self.endpoints
                    .insert(EndpointRole::BuzzerControl, endpoint.id.clone());
                info!(endpoint = %endpoint.id, "buzzer control endpoint recorded");
            } else {
                debug!(endpoint = %endpoint.id, "endpoint without usable properties skipped");
            }
        }

        self.maybe_activate();
    }

    /// Issuing every subscribe is sufficient to go active; subscribe
    /// confirmations are advisory only.
    fn maybe_activate(&mut self) {
        if !self.pending_services.is_empty() {
            return;
        }
        self.set_state(ConnectionState::Subscribing);
        self.reached_active = true;
        self.set_state(ConnectionState::Active);
        info!(endpoints = self.endpoints.len(), "session active");
    }

    fn on_disconnected(&mut self, reason: Option<String>) {
        let reason = reason.unwrap_or_else(|| "link lost".to_string());
        if self.reached_active {
            info!(%reason, "peripheral disconnected");
            self.set_state(ConnectionState::Disconnected);
        } else {
            warn!(%reason, "connection lost before becoming active");
            self.set_state(ConnectionState::Failed(reason));
        }
    }

    fn on_value_updated(
        &mut self,
        endpoint_id: String,
        bytes: Vec<u8>,
        error: Option<AdapterError>,
    ) -> Option<TelemetryFrame> {
        if let Some(err) = error {
            debug!(%endpoint_id, %err, "value update carried an error, dropped");
            return None;
        }
        match self.endpoint_roles.get(&endpoint_id.to_ascii_uppercase()) {
            Some(Some(role)) if role.is_telemetry() => Some(protocol::decode(*role, &bytes)),
            Some(None) | Some(Some(_)) => {
                debug!(%endpoint_id, "notification from unclassified endpoint dropped");
                None
            }
            None => {
                debug!(%endpoint_id, "notification from unsubscribed endpoint dropped");
                None
            }
        }
    }

    fn on_write_complete(&mut self, endpoint_id: String, error: Option<AdapterError>) {
        match error {
            Some(err) => {
                warn!(%endpoint_id, %err, "acknowledged write failed");
                let _ = self
                    .event_sender
                    .send(VarioEvent::Error(VarioError::WriteFailed(err.to_string())));
            }
            None => debug!(%endpoint_id, "write acknowledged"),
        }
    }

    fn freeze(&mut self, phase: EnumerationPhase, err: AdapterError) {
        warn!(%phase, %err, "enumeration failed, session frozen");
        self.frozen = true;
        let _ = self
            .event_sender
            .send(VarioEvent::Error(VarioError::EnumerationFailed {
                phase,
                reason: err.to_string(),
            }));
    }

    fn set_state(&mut self, state: ConnectionState) {
        self.state = state.clone();
        let _ = self.event_sender.send(VarioEvent::ConnectionState(state));
    }

    fn emit_state(&self) {
        let _ = self
            .event_sender
            .send(VarioEvent::ConnectionState(self.state.clone()));
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn handle(&self) -> &PeripheralHandle {
        &self.handle
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Endpoint id recorded for a role, once enumeration found it.
    pub fn endpoint(&self, role: EndpointRole) -> Option<&str> {
        self.endpoints.get(&role).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::adapter::EndpointProperties;
    use crate::infrastructure::bluetooth::mock::MockAdapter;
    use tokio::sync::mpsc::UnboundedReceiver;

    const SERVICE_ID: &str = "19B10000-E8F2-537E-4F6C-D104768A1214";

    fn record() -> DeviceRecord {
        DeviceRecord {
            id: "A1".to_string(),
            display_name: "Vario A1".to_string(),
            handle: PeripheralHandle("handle-A1".to_string()),
        }
    }

    fn notify_endpoint(id: &str) -> EndpointInfo {
        EndpointInfo {
            id: id.to_string(),
            properties: EndpointProperties {
                read: false,
                notify: true,
                write: false,
            },
        }
    }

    fn write_endpoint(id: &str) -> EndpointInfo {
        EndpointInfo {
            id: id.to_string(),
            properties: EndpointProperties {
                read: false,
                notify: false,
                write: true,
            },
        }
    }

    fn start_session(
        adapter: &mut MockAdapter,
    ) -> (ConnectionSession, UnboundedReceiver<VarioEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = ConnectionSession::begin(&record(), adapter, tx).unwrap();
        (session, rx)
    }

    fn run_enumeration(
        session: &mut ConnectionSession,
        adapter: &mut MockAdapter,
        endpoints: Vec<EndpointInfo>,
    ) {
        let handle = session.handle().clone();
        session.handle_event(adapter, AdapterEvent::Connected { handle: handle.clone() });
        session.handle_event(
            adapter,
            AdapterEvent::ServicesDiscovered {
                handle: handle.clone(),
                service_ids: vec![SERVICE_ID.to_string()],
                error: None,
            },
        );
        session.handle_event(
            adapter,
            AdapterEvent::CharacteristicsDiscovered {
                handle,
                service_id: SERVICE_ID.to_string(),
                endpoints,
                error: None,
            },
        );
    }

    fn all_endpoints() -> Vec<EndpointInfo> {
        vec![
            notify_endpoint(protocol::ALTITUDE_CHAR_UUID),
            notify_endpoint(protocol::PRESSURE_CHAR_UUID),
            notify_endpoint(protocol::ANGLE_CHAR_UUID),
            write_endpoint(protocol::BUZZER_CHAR_UUID),
        ]
    }

    #[test]
    fn reaches_active_and_classifies_every_role() {
        let mut adapter = MockAdapter::new();
        let (mut session, _rx) = start_session(&mut adapter);
        run_enumeration(&mut session, &mut adapter, all_endpoints());

        assert_eq!(*session.state(), ConnectionState::Active);
        assert_eq!(
            session.endpoint(EndpointRole::Altitude),
            Some(protocol::ALTITUDE_CHAR_UUID)
        );
        assert_eq!(
            session.endpoint(EndpointRole::BuzzerControl),
            Some(protocol::BUZZER_CHAR_UUID)
        );
        // Three notify endpoints subscribed, command endpoint not.
        assert_eq!(adapter.subscribed_endpoints().len(), 3);
        assert!(!adapter
            .subscribed_endpoints()
            .contains(&protocol::BUZZER_CHAR_UUID.to_string()));
    }

    #[test]
    fn endpoint_map_is_order_independent() {
        let mut baseline = None;
        // A few representative permutations of arrival order.
        let orders: [[usize; 4]; 4] = [[0, 1, 2, 3], [3, 2, 1, 0], [1, 3, 0, 2], [2, 0, 3, 1]];
        for order in orders {
            let endpoints = all_endpoints();
            let permuted: Vec<EndpointInfo> =
                order.iter().map(|&i| endpoints[i].clone()).collect();

            let mut adapter = MockAdapter::new();
            let (mut session, _rx) = start_session(&mut adapter);
            run_enumeration(&mut session, &mut adapter, permuted);

            assert_eq!(*session.state(), ConnectionState::Active);
            let map: Vec<_> = [
                EndpointRole::Altitude,
                EndpointRole::Pressure,
                EndpointRole::Angle,
                EndpointRole::BuzzerControl,
            ]
            .iter()
            .map(|&r| session.endpoint(r).map(str::to_string))
            .collect();

            match &baseline {
                None => baseline = Some(map),
                Some(expected) => assert_eq!(&map, expected),
            }
        }
    }

    #[test]
    fn characteristics_resolve_out_of_order_across_services() {
        let mut adapter = MockAdapter::new();
        let (mut session, _rx) = start_session(&mut adapter);
        let handle = session.handle().clone();

        session.handle_event(&mut adapter, AdapterEvent::Connected { handle: handle.clone() });
        session.handle_event(
            &mut adapter,
            AdapterEvent::ServicesDiscovered {
                handle: handle.clone(),
                service_ids: vec!["svc-a".to_string(), "svc-b".to_string()],
                error: None,
            },
        );
        assert_eq!(*session.state(), ConnectionState::DiscoveringCharacteristics);

        // Second service resolves first.
        session.handle_event(
            &mut adapter,
            AdapterEvent::CharacteristicsDiscovered {
                handle: handle.clone(),
                service_id: "svc-b".to_string(),
                endpoints: vec![write_endpoint(protocol::BUZZER_CHAR_UUID)],
                error: None,
            },
        );
        assert_eq!(*session.state(), ConnectionState::DiscoveringCharacteristics);

        session.handle_event(
            &mut adapter,
            AdapterEvent::CharacteristicsDiscovered {
                handle,
                service_id: "svc-a".to_string(),
                endpoints: vec![notify_endpoint(protocol::ALTITUDE_CHAR_UUID)],
                error: None,
            },
        );
        assert_eq!(*session.state(), ConnectionState::Active);
    }

    #[test]
    fn enumeration_error_freezes_session_without_retry() {
        let mut adapter = MockAdapter::new();
        let (mut session, mut rx) = start_session(&mut adapter);
        let handle = session.handle().clone();

        session.handle_event(&mut adapter, AdapterEvent::Connected { handle: handle.clone() });
        session.handle_event(
            &mut adapter,
            AdapterEvent::ServicesDiscovered {
                handle: handle.clone(),
                service_ids: Vec::new(),
                error: Some(AdapterError::Backend("gatt failure".to_string())),
            },
        );

        assert!(session.is_frozen());
        assert_eq!(*session.state(), ConnectionState::DiscoveringServices);

        // Further enumeration events are ignored while frozen.
        session.handle_event(
            &mut adapter,
            AdapterEvent::ServicesDiscovered {
                handle,
                service_ids: vec![SERVICE_ID.to_string()],
                error: None,
            },
        );
        assert_eq!(*session.state(), ConnectionState::DiscoveringServices);

        let mut saw_enumeration_error = false;
        while let Ok(event) = rx.try_recv() {
            if let VarioEvent::Error(VarioError::EnumerationFailed { .. }) = event {
                saw_enumeration_error = true;
            }
        }
        assert!(saw_enumeration_error);
    }

    #[test]
    fn disconnect_before_active_is_failed() {
        let mut adapter = MockAdapter::new();
        let (mut session, _rx) = start_session(&mut adapter);
        let handle = session.handle().clone();

        session.handle_event(
            &mut adapter,
            AdapterEvent::Disconnected {
                handle,
                reason: Some("peer vanished".to_string()),
            },
        );
        assert_eq!(
            *session.state(),
            ConnectionState::Failed("peer vanished".to_string())
        );
    }

    #[test]
    fn disconnect_after_active_is_disconnected() {
        let mut adapter = MockAdapter::new();
        let (mut session, _rx) = start_session(&mut adapter);
        run_enumeration(&mut session, &mut adapter, all_endpoints());

        let handle = session.handle().clone();
        session.handle_event(&mut adapter, AdapterEvent::Disconnected { handle, reason: None });
        assert_eq!(*session.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn telemetry_decoded_only_for_classified_endpoints() {
        let mut adapter = MockAdapter::new();
        let (mut session, _rx) = start_session(&mut adapter);
        let mut endpoints = all_endpoints();
        endpoints.push(notify_endpoint("0000180F-0000-1000-8000-00805F9B34FB"));
        run_enumeration(&mut session, &mut adapter, endpoints);

        let handle = session.handle().clone();
        let frame = session.handle_event(
            &mut adapter,
            AdapterEvent::ValueUpdated {
                handle: handle.clone(),
                endpoint_id: protocol::ALTITUDE_CHAR_UUID.to_ascii_lowercase(),
                bytes: b"812.4".to_vec(),
                error: None,
            },
        );
        assert_eq!(frame.unwrap().text, "812.4");

        let dropped = session.handle_event(
            &mut adapter,
            AdapterEvent::ValueUpdated {
                handle,
                endpoint_id: "0000180F-0000-1000-8000-00805F9B34FB".to_string(),
                bytes: b"99".to_vec(),
                error: None,
            },
        );
        assert!(dropped.is_none());
    }

    #[test]
    fn invalid_utf8_payload_becomes_placeholder_frame() {
        let mut adapter = MockAdapter::new();
        let (mut session, _rx) = start_session(&mut adapter);
        run_enumeration(&mut session, &mut adapter, all_endpoints());

        let handle = session.handle().clone();
        let frame = session.handle_event(
            &mut adapter,
            AdapterEvent::ValueUpdated {
                handle,
                endpoint_id: protocol::ALTITUDE_CHAR_UUID.to_string(),
                bytes: vec![0xFF, 0xFE],
                error: None,
            },
        );
        assert_eq!(frame.unwrap().text, protocol::UNKNOWN_DATA);
        assert_eq!(*session.state(), ConnectionState::Active);
    }

    #[test]
    fn failed_write_ack_is_surfaced() {
        let mut adapter = MockAdapter::new();
        let (mut session, mut rx) = start_session(&mut adapter);
        run_enumeration(&mut session, &mut adapter, all_endpoints());
        while rx.try_recv().is_ok() {}

        let handle = session.handle().clone();
        session.handle_event(
            &mut adapter,
            AdapterEvent::WriteComplete {
                handle,
                endpoint_id: protocol::BUZZER_CHAR_UUID.to_string(),
                error: Some(AdapterError::Backend("nack".to_string())),
            },
        );

        match rx.try_recv() {
            Ok(VarioEvent::Error(VarioError::WriteFailed(reason))) => {
                assert!(reason.contains("nack"))
            }
            other => panic!("expected WriteFailed event, got {other:?}"),
        }
    }

    #[test]
    fn events_for_other_peripherals_are_ignored() {
        let mut adapter = MockAdapter::new();
        let (mut session, _rx) = start_session(&mut adapter);

        session.handle_event(
            &mut adapter,
            AdapterEvent::Connected {
                handle: PeripheralHandle("someone-else".to_string()),
            },
        );
        assert_eq!(*session.state(), ConnectionState::Connecting);
    }
}
