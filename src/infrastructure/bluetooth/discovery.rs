//! Device discovery
//!
//! Drives a bounded-time scan for vario peripherals, filters advertisements
//! by the advertised service prefix, and maintains the device registry.

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::domain::models::{DeviceRecord, DiscoveryState, PeripheralHandle, VarioEvent};
use crate::domain::registry::DeviceRegistry;
use crate::error::VarioError;
use crate::infrastructure::bluetooth::adapter::BleAdapter;
use crate::infrastructure::bluetooth::protocol;

/// One-shot discovery controller.
///
/// Each attempt is identified by a generation number; a restart or stop
/// bumps the generation, so a deadline scheduled for a superseded attempt
/// is rejected instead of firing a spurious timeout.
pub struct DiscoveryController {
    registry: DeviceRegistry,
    state: DiscoveryState,
    generation: u64,
    deadline: Option<Instant>,
    timeout: Duration,
    event_sender: mpsc::UnboundedSender<VarioEvent>,
}

impl DiscoveryController {
    pub fn new(timeout: Duration, event_sender: mpsc::UnboundedSender<VarioEvent>) -> Self {
        Self {
            registry: DeviceRegistry::new(),
            state: DiscoveryState::Idle,
            generation: 0,
            deadline: None,
            timeout,
            event_sender,
        }
    }

    /// Begin a fresh discovery attempt.
    ///
    /// Clears the registry, restarts the scan if one is already running,
    /// and arms the timeout deadline. Returns the generation identifying
    /// this attempt.
    pub fn start(&mut self, adapter: &mut impl BleAdapter) -> Result<u64, VarioError> {
        if self.state == DiscoveryState::Scanning {
            adapter.stop_scan()?;
            self.state = DiscoveryState::Idle;
            self.deadline = None;
        }

        // No adapter-side service filter; prefix matching happens here.
        // Scanning state and the deadline are armed only once the scan
        // request is accepted, so a rejected start cannot leave a
        // live-looking attempt that later times out.
        adapter.start_scan()?;

        self.registry.clear();
        self.generation += 1;
        self.state = DiscoveryState::Scanning;
        self.deadline = Some(Instant::now() + self.timeout);

        info!(generation = self.generation, "discovery started");
        self.emit_device_list();
        Ok(self.generation)
    }

    /// Process one advertisement report.
    ///
    /// Accepted only while scanning, when an advertised service id carries
    /// the vario prefix and the device id is not yet registered.
    pub fn handle_advertisement(
        &mut self,
        id: String,
        name: String,
        service_ids: &[String],
        handle: PeripheralHandle,
    ) {
        if self.state != DiscoveryState::Scanning {
            return;
        }
        if !protocol::matches_service_prefix(service_ids) {
            debug!(%id, "advertisement without vario service prefix ignored");
            return;
        }

        let record = DeviceRecord {
            id,
            display_name: if name.is_empty() {
                "Unknown Device".to_string()
            } else {
                name
            },
            handle,
        };

        if self.registry.add(record) {
            info!(devices = self.registry.len(), "vario peripheral discovered");
            self.emit_device_list();
        }
    }

    /// Stop scanning but keep the registry, for when a connection attempt
    /// against a just-selected device is about to begin.
    pub fn stop_scanning_only(&mut self, adapter: &mut impl BleAdapter) -> Result<(), VarioError> {
        self.cancel_deadline();
        if self.state == DiscoveryState::Scanning {
            adapter.stop_scan()?;
            self.state = DiscoveryState::Idle;
            info!("scan stopped, registry preserved");
        }
        Ok(())
    }

    /// Abandon discovery entirely: stop the scan and clear the registry.
    pub fn abort(&mut self, adapter: &mut impl BleAdapter) -> Result<(), VarioError> {
        self.cancel_deadline();
        if self.state == DiscoveryState::Scanning {
            adapter.stop_scan()?;
        }
        self.state = DiscoveryState::Idle;
        self.registry.clear();
        info!("discovery aborted, registry cleared");
        self.emit_device_list();
        Ok(())
    }

    /// Handle an expired discovery deadline.
    ///
    /// A deadline from a superseded attempt is a no-op; the generation
    /// comparison makes staleness provable rather than relying on a
    /// nulled timer handle.
    pub fn handle_deadline(
        &mut self,
        adapter: &mut impl BleAdapter,
        generation: u64,
    ) -> Result<(), VarioError> {
        if generation != self.generation || self.state != DiscoveryState::Scanning {
            debug!(generation, current = self.generation, "stale deadline ignored");
            return Ok(());
        }
        self.deadline = None;

        // Discovery is a one-shot burst: scanning stops either way.
        adapter.stop_scan()?;

        if self.registry.is_empty() {
            self.state = DiscoveryState::TimedOut;
            info!("discovery timed out with no matching devices");
            let _ = self.event_sender.send(VarioEvent::DiscoveryTimedOut);
        } else {
            self.state = DiscoveryState::Idle;
            info!(devices = self.registry.len(), "discovery window closed");
        }
        Ok(())
    }

    fn cancel_deadline(&mut self) {
        self.generation += 1;
        self.deadline = None;
    }

    fn emit_device_list(&self) {
        let _ = self
            .event_sender
            .send(VarioEvent::DeviceListChanged(self.registry.all()));
    }

    pub fn state(&self) -> DiscoveryState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Armed deadline and the generation it belongs to, for the run loop.
    pub fn pending_deadline(&self) -> Option<(Instant, u64)> {
        self.deadline.map(|at| (at, self.generation))
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }
}
