//! Serialized command execution against one vehicle
//!
//! A [`CommandSession`] owns everything needed to talk to the configured car:
//! its VIN, the signing key and the session cache. The physical link is not
//! kept between commands; every command opens a fresh connector, resumes the
//! cached cryptographic session when the vehicle still accepts it, performs a
//! single action and tears everything down again.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::action::VehicleAction;
use crate::cache::SessionCache;
use crate::error::{CommandError, CommandResult, KeyError};
use crate::key::{load_private_key, KeyHandle};
use crate::link::{Connector, LinkError, SessionClient, VehicleTransport};

/// Upper bound for a whole command, from lock acquisition to teardown
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Time allowed for disconnect/close once a command has finished
const CLEANUP_GRACE: Duration = Duration::from_secs(5);

/// The currently configured vehicle.
///
/// The cache mutex doubles as the run-lock: holding its guard is what makes a
/// command the only one in flight, and the guard is the only path to the
/// cache.
pub struct CommandSession {
    vin: String,
    key: KeyHandle,
    transport: VehicleTransport,
    command_timeout: Duration,
    run_lock: Mutex<SessionCache>,
}

impl CommandSession {
    /// Load the credential and prepare an idle session with an empty cache
    pub fn create(
        raw_key: &[u8],
        vin: impl Into<String>,
        transport: VehicleTransport,
    ) -> Result<Self, KeyError> {
        let key = load_private_key(raw_key)?;
        let vin = vin.into();

        info!(vin = %vin, key = %key.fingerprint(), "Vehicle credentials loaded");

        Ok(Self {
            vin,
            key,
            transport,
            command_timeout: COMMAND_TIMEOUT,
            run_lock: Mutex::new(SessionCache::new()),
        })
    }

    /// Override the per-command timeout
    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn vin(&self) -> &str {
        &self.vin
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// Copy of the session cache. Waits for any in-flight command.
    pub async fn cache_snapshot(&self) -> SessionCache {
        self.run_lock.lock().await.clone()
    }

    /// Run one action against the vehicle.
    ///
    /// Commands are executed one at a time in lock acquisition order. The
    /// connector and session client are released on every exit path. The
    /// parameters read back after a verified session start are committed to
    /// the cache only when the action succeeds too, so a failed command leaves
    /// the cache exactly as it found it.
    pub async fn run_command(&self, action: VehicleAction) -> CommandResult<()> {
        let mut cache = self.run_lock.lock().await;

        let started = Instant::now();
        let deadline = started + self.command_timeout;
        debug!(vin = %self.vin, %action, "Running vehicle command");

        let connector = self
            .bounded(
                deadline,
                "open",
                self.transport.connectors.open(&self.vin, deadline),
                CommandError::ConnectionFailed,
            )
            .await
            .inspect_err(|e| self.log_failure(action, e, started))?;

        let result = self
            .exchange(connector.clone(), &mut cache, action, deadline)
            .await;

        release("close", connector.close()).await;

        match &result {
            Ok(()) => info!(
                vin = %self.vin,
                %action,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Vehicle command completed"
            ),
            Err(e) => self.log_failure(action, e, started),
        }

        result
    }

    /// Steps 4-9: everything that happens over an open connector
    async fn exchange(
        &self,
        connector: Arc<dyn Connector>,
        cache: &mut SessionCache,
        action: VehicleAction,
        deadline: Instant,
    ) -> CommandResult<()> {
        let mut client = self
            .transport
            .clients
            .new_client(connector, &self.key, &*cache)
            .map_err(|e| CommandError::HandshakeFailed(format!("session client setup: {}", e)))?;

        self.bounded(
            deadline,
            "handshake",
            client.connect(deadline),
            CommandError::HandshakeFailed,
        )
        .await?;

        let result = self
            .authenticated(client.as_mut(), cache, action, deadline)
            .await;

        release("disconnect", client.disconnect()).await;

        result
    }

    async fn authenticated(
        &self,
        client: &mut dyn SessionClient,
        cache: &mut SessionCache,
        action: VehicleAction,
        deadline: Instant,
    ) -> CommandResult<()> {
        self.bounded(
            deadline,
            "session_start",
            client.start_session(deadline),
            CommandError::SessionStartFailed,
        )
        .await?;

        // refreshed parameters only replace the cache once the whole command
        // has succeeded
        let mut refreshed = cache.clone();
        client.update_cache(&mut refreshed);

        self.bounded(
            deadline,
            action.name(),
            action.execute(client, deadline),
            |message| CommandError::ActionFailed {
                action: action.name(),
                message,
            },
        )
        .await?;

        *cache = refreshed;
        Ok(())
    }

    /// Await a collaborator call under the command deadline
    async fn bounded<T, F, C>(
        &self,
        deadline: Instant,
        step: &'static str,
        fut: F,
        classify: C,
    ) -> CommandResult<T>
    where
        F: Future<Output = Result<T, LinkError>>,
        C: FnOnce(String) -> CommandError,
    {
        match tokio::time::timeout_at(deadline, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(LinkError::DeadlineExceeded)) | Err(_) => Err(CommandError::Timeout {
                step,
                timeout_secs: self.command_timeout.as_secs(),
            }),
            Ok(Err(e)) => Err(classify(e.to_string())),
        }
    }

    fn log_failure(&self, action: VehicleAction, error: &CommandError, started: Instant) {
        warn!(
            vin = %self.vin,
            %action,
            kind = error.kind(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            error = %error,
            "Vehicle command failed"
        );
    }
}

impl std::fmt::Debug for CommandSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSession")
            .field("vin", &self.vin)
            .field("key", &self.key)
            .field("command_timeout", &self.command_timeout)
            .finish_non_exhaustive()
    }
}

/// Await a teardown call; it runs outside the command deadline
async fn release(what: &'static str, fut: impl Future<Output = ()>) {
    if tokio::time::timeout(CLEANUP_GRACE, fut).await.is_err() {
        warn!(step = what, "Vehicle link teardown did not finish in time");
    }
}
