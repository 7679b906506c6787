//! Vario Service
//!
//! Main coordinator and public API of the connection core: owns the
//! adapter, the discovery controller, and at most one connection session,
//! and serializes every adapter completion and deadline onto one logical
//! thread of control.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::domain::models::{ConnectionState, TelemetryFrame, VarioEvent};
use crate::domain::settings::Settings;
use crate::error::VarioError;
use crate::infrastructure::bluetooth::adapter::{AdapterEvent, BleAdapter};
use crate::infrastructure::bluetooth::command::CommandDispatcher;
use crate::infrastructure::bluetooth::discovery::DiscoveryController;
use crate::infrastructure::bluetooth::session::ConnectionSession;

/// Requests accepted by the service run loop.
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceCommand {
    StartDiscovery,
    /// Pause scanning but keep the device list, ahead of a connect.
    StopScanningOnly,
    /// Leave discovery entirely: stop scanning, clear the device list,
    /// and tear down any connection attempt.
    AbortDiscoveryAndDisconnect,
    Connect(String),
    Disconnect,
    SetBuzzer(bool),
}

/// Connection-management core for one vario client instance.
pub struct VarioService<A: BleAdapter> {
    adapter: A,
    discovery: DiscoveryController,
    session: Option<ConnectionSession>,
    history: VecDeque<TelemetryFrame>,
    history_capacity: usize,
    event_sender: mpsc::UnboundedSender<VarioEvent>,
}

impl<A: BleAdapter> VarioService<A> {
    pub fn new(
        adapter: A,
        settings: &Settings,
        event_sender: mpsc::UnboundedSender<VarioEvent>,
    ) -> Self {
        let timeout = Duration::from_secs(settings.discovery_timeout_secs);
        Self {
            adapter,
            discovery: DiscoveryController::new(timeout, event_sender.clone()),
            session: None,
            history: VecDeque::new(),
            history_capacity: settings.telemetry_history_capacity,
            event_sender,
        }
    }

    /// Begin a fresh discovery attempt; returns its generation token.
    pub fn start_discovery(&mut self) -> Result<u64, VarioError> {
        self.discovery.start(&mut self.adapter)
    }

    /// Stop scanning, keeping the registry for a pending device selection.
    pub fn stop_scanning_only(&mut self) -> Result<(), VarioError> {
        self.discovery.stop_scanning_only(&mut self.adapter)
    }

    /// Abandon discovery and terminate any connection attempt.
    pub fn abort_discovery_and_disconnect(&mut self) -> Result<(), VarioError> {
        self.discovery.abort(&mut self.adapter)?;
        self.disconnect()
    }

    /// Connect to a previously discovered device.
    ///
    /// The record must still be in the registry; otherwise fails with
    /// `InvalidTarget` and issues no adapter call. A new connect
    /// supersedes any session already in flight.
    pub fn connect(&mut self, device_id: &str) -> Result<(), VarioError> {
        let record = self
            .discovery
            .registry()
            .get(device_id)
            .cloned()
            .ok_or_else(|| VarioError::InvalidTarget(device_id.to_string()))?;

        self.discovery.stop_scanning_only(&mut self.adapter)?;

        if let Some(old) = self.session.take() {
            info!(device = %old.handle(), "superseding previous session");
            if let Err(err) = self.adapter.disconnect(old.handle()) {
                warn!(device = %old.handle(), %err, "disconnect of superseded session failed");
            }
        }

        let session =
            ConnectionSession::begin(&record, &mut self.adapter, self.event_sender.clone())?;
        self.session = Some(session);
        Ok(())
    }

    /// Tear down the current session, if any.
    pub fn disconnect(&mut self) -> Result<(), VarioError> {
        if let Some(session) = self.session.take() {
            let result = self.adapter.disconnect(session.handle());
            // The session is gone either way; consumers must see Idle
            // even when the submission failed.
            let _ = self
                .event_sender
                .send(VarioEvent::ConnectionState(ConnectionState::Idle));
            match result {
                Ok(()) => info!(device = %session.handle(), "disconnected"),
                Err(err) => {
                    warn!(device = %session.handle(), %err, "disconnect submission failed");
                    return Err(err.into());
                }
            }
        }
        Ok(())
    }

    /// Mute or unmute the peripheral's buzzer.
    pub fn set_buzzer(&mut self, enabled: bool) -> Result<(), VarioError> {
        let session = self.session.as_ref().ok_or(VarioError::NoCommandEndpoint)?;
        CommandDispatcher::set_buzzer(&mut self.adapter, session, enabled)
    }

    /// Single entry point for every adapter completion.
    pub fn handle_event(&mut self, event: AdapterEvent) {
        if let AdapterEvent::Advertisement {
            id,
            name,
            service_ids,
            handle,
        } = event
        {
            self.discovery
                .handle_advertisement(id, name, &service_ids, handle);
            return;
        }

        let frame = match self.session.as_mut() {
            Some(session) => session.handle_event(&mut self.adapter, event),
            None => None,
        };

        if let Some(frame) = frame {
            self.push_frame(frame.clone());
            let _ = self.event_sender.send(VarioEvent::Telemetry(frame));
        }
    }

    /// Apply an expired discovery deadline; stale generations are no-ops.
    pub fn handle_discovery_deadline(&mut self, generation: u64) -> Result<(), VarioError> {
        self.discovery.handle_deadline(&mut self.adapter, generation)
    }

    fn push_frame(&mut self, frame: TelemetryFrame) {
        self.history.push_back(frame);
        while self.history.len() > self.history_capacity {
            self.history.pop_front();
        }
    }

    /// Bounded history of recent frames, oldest first. Display-only.
    pub fn recent_frames(&self) -> impl Iterator<Item = &TelemetryFrame> {
        self.history.iter()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session
            .as_ref()
            .map(|s| s.state().clone())
            .unwrap_or(ConnectionState::Idle)
    }

    pub fn discovery(&self) -> &DiscoveryController {
        &self.discovery
    }

    /// Drive the service from a command channel and the adapter's event
    /// channel until both close, firing the discovery deadline in between.
    pub async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<ServiceCommand>,
        mut adapter_events: mpsc::UnboundedReceiver<AdapterEvent>,
    ) {
        loop {
            let deadline = self.discovery.pending_deadline();
            let sleep_target = deadline
                .map(|(at, _)| tokio::time::Instant::from_std(at))
                .unwrap_or_else(|| tokio::time::Instant::now());

            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.apply_command(command),
                    None => break,
                },
                event = adapter_events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => break,
                },
                _ = tokio::time::sleep_until(sleep_target), if deadline.is_some() => {
                    if let Some((_, generation)) = deadline {
                        if let Err(err) = self.handle_discovery_deadline(generation) {
                            self.report(err);
                        }
                    }
                }
            }
        }
        info!("service loop stopped");
    }

    fn apply_command(&mut self, command: ServiceCommand) {
        let result = match command {
            ServiceCommand::StartDiscovery => self.start_discovery().map(|_| ()),
            ServiceCommand::StopScanningOnly => self.stop_scanning_only(),
            ServiceCommand::AbortDiscoveryAndDisconnect => self.abort_discovery_and_disconnect(),
            ServiceCommand::Connect(id) => self.connect(&id),
            ServiceCommand::Disconnect => self.disconnect(),
            ServiceCommand::SetBuzzer(enabled) => self.set_buzzer(enabled),
        };
        if let Err(err) = result {
            self.report(err);
        }
    }

    fn report(&self, err: VarioError) {
        error!(%err, "command failed");
        let _ = self.event_sender.send(VarioEvent::Error(err));
    }
}
