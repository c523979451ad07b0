//! Application state for the proxy API

use std::sync::Arc;
use std::time::Duration;

use ble_proxy_core::{CommandSession, KeyError, VehicleTransport, COMMAND_TIMEOUT};
use parking_lot::RwLock;

use crate::error::ApiError;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Link collaborators handed to every new session
    transport: VehicleTransport,
    /// Per-command timeout for new sessions
    command_timeout: Duration,
    /// The active vehicle session, replaced wholesale by /car-credentials
    active: Arc<RwLock<Option<Arc<CommandSession>>>>,
}

impl AppState {
    /// Create state with no credentials installed
    pub fn new(transport: VehicleTransport) -> Self {
        Self {
            transport,
            command_timeout: COMMAND_TIMEOUT,
            active: Arc::new(RwLock::new(None)),
        }
    }

    /// Override the command timeout applied to sessions created from now on
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Build a session for `vin` without installing it
    pub fn create_session(&self, raw_key: &[u8], vin: &str) -> Result<CommandSession, KeyError> {
        Ok(CommandSession::create(raw_key, vin, self.transport.clone())?
            .with_command_timeout(self.command_timeout))
    }

    /// Make `session` the active one; returns the session it replaced.
    ///
    /// Commands already running keep the session they started with.
    pub fn install(&self, session: Arc<CommandSession>) -> Option<Arc<CommandSession>> {
        self.active.write().replace(session)
    }

    /// Snapshot of the active session, if any
    pub fn active(&self) -> Option<Arc<CommandSession>> {
        self.active.read().clone()
    }

    /// Snapshot of the active session, or `CredentialsNeeded`
    pub fn current(&self) -> Result<Arc<CommandSession>, ApiError> {
        self.active().ok_or(ApiError::CredentialsNeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ble_proxy_core::SimulatedVehicle;

    #[test]
    fn test_no_session_until_installed() {
        let state = AppState::new(SimulatedVehicle::new().transport());
        assert!(state.active().is_none());
        assert!(matches!(state.current(), Err(ApiError::CredentialsNeeded)));
    }

    #[test]
    fn test_create_session_rejects_garbage() {
        let state = AppState::new(SimulatedVehicle::new().transport());
        let err = state.create_session(b"not a key", "VIN").unwrap_err();
        assert!(matches!(err, KeyError::InvalidCredentialFormat(_)));
        assert!(state.active().is_none());
    }
}
