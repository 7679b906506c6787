//! Command dispatch
//!
//! Encodes and writes outbound commands to the peripheral's writable
//! endpoint, with precondition checks instead of silent drops.

use tracing::info;

use crate::domain::models::{ConnectionState, EndpointRole};
use crate::error::VarioError;
use crate::infrastructure::bluetooth::adapter::{BleAdapter, WriteMode};
use crate::infrastructure::bluetooth::protocol::VarioCommand;
use crate::infrastructure::bluetooth::session::ConnectionSession;

/// Stateless dispatcher over the active session's command endpoint.
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Mute (`enabled == true`) or unmute the peripheral's buzzer.
    ///
    /// Requires an `Active` session with a known buzzer-control endpoint;
    /// otherwise fails with `NoCommandEndpoint` and issues no adapter
    /// call. The write is acknowledged; a failed acknowledgement later
    /// surfaces as a `WriteFailed` event.
    pub fn set_buzzer(
        adapter: &mut impl BleAdapter,
        session: &ConnectionSession,
        enabled: bool,
    ) -> Result<(), VarioError> {
        if *session.state() != ConnectionState::Active {
            return Err(VarioError::NoCommandEndpoint);
        }
        let endpoint_id = session
            .endpoint(EndpointRole::BuzzerControl)
            .ok_or(VarioError::NoCommandEndpoint)?
            .to_string();

        let command = VarioCommand::for_buzzer(enabled);
        adapter
            .write(
                session.handle(),
                &endpoint_id,
                command.as_bytes(),
                WriteMode::WithResponse,
            )
            .map_err(|err| VarioError::WriteFailed(err.to_string()))?;

        info!(?command, "buzzer command written");
        Ok(())
    }
}
