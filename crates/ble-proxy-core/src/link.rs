//! Vehicle link collaborators
//!
//! The proxy core never talks to a radio or encodes a vehicle protocol
//! message itself. It drives two collaborators through a fixed lifecycle:
//!
//! ```text
//! ConnectorFactory::open ──► SessionClientFactory::new_client
//!        │                          │
//!        │                  connect ─► start_session ─► update_cache ─► <action>
//!        │                          │
//!        └──────── close ◄──────── disconnect
//! ```
//!
//! Every potentially slow call receives the command deadline and must return
//! [`LinkError::DeadlineExceeded`] promptly once it has passed.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::time::Instant;

use crate::cache::SessionCache;
use crate::key::KeyHandle;

/// Errors reported by connectors and session clients
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// Radio or data-channel failure
    #[error("{0}")]
    Io(String),

    /// Vehicle answered but refused the request
    #[error("vehicle rejected request: {0}")]
    Rejected(String),

    /// Command deadline passed while waiting on the vehicle
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// An open physical link to one vehicle
#[async_trait]
pub trait Connector: Send + Sync {
    /// Tear the link down. Called exactly once per opened connector.
    async fn close(&self);
}

/// Opens physical links (one per command)
#[async_trait]
pub trait ConnectorFactory: Send + Sync {
    /// Discover the vehicle and open a data channel to it
    async fn open(&self, vin: &str, deadline: Instant) -> Result<Arc<dyn Connector>, LinkError>;
}

/// Authenticated command channel running over a [`Connector`]
#[async_trait]
pub trait SessionClient: Send {
    /// Connect handshake over the link
    async fn connect(&mut self, deadline: Instant) -> Result<(), LinkError>;

    /// Release session resources. Only called after a successful `connect`.
    async fn disconnect(&mut self);

    /// Start a new authenticated session or resume a cached one
    async fn start_session(&mut self, deadline: Instant) -> Result<(), LinkError>;

    /// Write the current session parameters into `cache`
    fn update_cache(&self, cache: &mut SessionCache);

    async fn wakeup(&mut self, deadline: Instant) -> Result<(), LinkError>;

    async fn lock(&mut self, deadline: Instant) -> Result<(), LinkError>;

    async fn unlock(&mut self, deadline: Instant) -> Result<(), LinkError>;

    async fn charge_start(&mut self, deadline: Instant) -> Result<(), LinkError>;

    async fn charge_stop(&mut self, deadline: Instant) -> Result<(), LinkError>;

    async fn set_charging_amps(&mut self, deadline: Instant, amps: i32) -> Result<(), LinkError>;

    async fn change_charge_limit(
        &mut self,
        deadline: Instant,
        percent: i32,
    ) -> Result<(), LinkError>;
}

/// Builds session clients over freshly opened connectors
pub trait SessionClientFactory: Send + Sync {
    /// Create a client that will authenticate with `key`, seeded with the
    /// parameters in `cache`. Must not perform I/O.
    fn new_client(
        &self,
        connector: Arc<dyn Connector>,
        key: &KeyHandle,
        cache: &SessionCache,
    ) -> Result<Box<dyn SessionClient>, LinkError>;
}

/// The pair of collaborators a [`CommandSession`](crate::CommandSession) needs
#[derive(Clone)]
pub struct VehicleTransport {
    pub connectors: Arc<dyn ConnectorFactory>,
    pub clients: Arc<dyn SessionClientFactory>,
}

impl VehicleTransport {
    pub fn new(
        connectors: Arc<dyn ConnectorFactory>,
        clients: Arc<dyn SessionClientFactory>,
    ) -> Self {
        Self {
            connectors,
            clients,
        }
    }
}
