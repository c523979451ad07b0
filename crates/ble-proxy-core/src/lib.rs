//! ble-proxy-core - Command sessions for a single BLE-connected vehicle
//!
//! This crate holds everything below the HTTP surface: private key loading,
//! the per-vehicle session cache, the serialized command lifecycle and the
//! collaborator traits a vehicle link has to implement.

pub mod action;
pub mod cache;
pub mod error;
pub mod key;
pub mod link;
pub mod session;
pub mod simulator;

pub use action::VehicleAction;
pub use cache::{SessionCache, SessionInfo, VehicleDomain};
pub use error::{CommandError, CommandResult, KeyError};
pub use key::{load_private_key, KeyHandle};
pub use link::{
    Connector, ConnectorFactory, LinkError, SessionClient, SessionClientFactory, VehicleTransport,
};
pub use session::{CommandSession, COMMAND_TIMEOUT};
pub use simulator::SimulatedVehicle;
