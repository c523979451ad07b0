//! In-process simulated vehicle
//!
//! Implements both link collaborators so the proxy can run without a radio.
//! The simulation keeps enough of the real behaviour to be useful:
//!
//! - The handshake is a real P-256 ECDH between the proxy key and the
//!   vehicle key, and the session epoch is derived from the shared secret.
//! - Cached sessions are resumed only when the epoch still matches and the
//!   counter moves forward; otherwise a fresh session is negotiated.
//! - Charging parameters are range-checked by the vehicle.
//!
//! Every lifecycle call is journaled, and failures and latency can be
//! injected per step, which is what the test suites build on.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use p256::{PublicKey, SecretKey};
use parking_lot::Mutex;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::debug;

use crate::action::VehicleAction;
use crate::cache::{SessionCache, SessionInfo, VehicleDomain};
use crate::key::KeyHandle;
use crate::link::{
    Connector, ConnectorFactory, LinkError, SessionClient, SessionClientFactory, VehicleTransport,
};

const DOMAINS: [VehicleDomain; 2] = [VehicleDomain::VehicleSecurity, VehicleDomain::Infotainment];

/// Charging current range accepted by the simulated charger
const CHARGING_AMPS_RANGE: std::ops::RangeInclusive<i32> = 0..=48;

/// Charge limit range accepted by the vehicle
const CHARGE_LIMIT_RANGE: std::ops::RangeInclusive<i32> = 50..=100;

/// Lifecycle step, used for latency injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Open,
    Connect,
    StartSession,
    Action,
}

/// Step at which the vehicle reports a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    Open,
    Connect,
    StartSession,
    Action,
}

/// Journal entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Open(String),
    Connect,
    StartSession { resumed: bool },
    Action(VehicleAction),
    Disconnect,
    Close,
}

/// Observable vehicle state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleState {
    pub awake: bool,
    pub locked: bool,
    pub charging: bool,
    pub charging_amps: i32,
    pub charge_limit_percent: i32,
}

impl Default for VehicleState {
    fn default() -> Self {
        Self {
            awake: false,
            locked: true,
            charging: false,
            charging_amps: 32,
            charge_limit_percent: 90,
        }
    }
}

struct Shared {
    vin: Option<String>,
    secret: SecretKey,
    booted: Instant,
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    state: VehicleState,
    events: Vec<LinkEvent>,
    failure: Option<FailurePoint>,
    latency: HashMap<Step, Duration>,
    open_connections: usize,
    max_concurrent: usize,
    overlapping_opens: usize,
    /// Bumped when the vehicle forgets its sessions
    generation: u64,
    /// Highest counter accepted per domain in the current generation
    counters: HashMap<VehicleDomain, u32>,
}

/// Simulated car answering on the link collaborators
#[derive(Clone)]
pub struct SimulatedVehicle {
    shared: Arc<Shared>,
}

impl Default for SimulatedVehicle {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedVehicle {
    /// Vehicle that answers to any VIN
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Vehicle that is only discoverable under `vin`
    pub fn with_vin(vin: impl Into<String>) -> Self {
        Self::build(Some(vin.into()))
    }

    fn build(vin: Option<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                vin,
                secret: SecretKey::random(&mut OsRng),
                booted: Instant::now(),
                inner: Mutex::new(Inner::default()),
            }),
        }
    }

    /// Collaborators for a [`CommandSession`](crate::CommandSession)
    pub fn transport(&self) -> VehicleTransport {
        VehicleTransport::new(Arc::new(self.clone()), Arc::new(self.clone()))
    }

    /// Vehicle public key (what the proxy key agrees with)
    pub fn public_key(&self) -> PublicKey {
        self.shared.secret.public_key()
    }

    pub fn state(&self) -> VehicleState {
        self.shared.inner.lock().state.clone()
    }

    pub fn events(&self) -> Vec<LinkEvent> {
        self.shared.inner.lock().events.clone()
    }

    /// Links currently open
    pub fn open_connections(&self) -> usize {
        self.shared.inner.lock().open_connections
    }

    /// Highest number of links that were open at the same time
    pub fn max_concurrent_connections(&self) -> usize {
        self.shared.inner.lock().max_concurrent
    }

    /// Opens that happened while another link was still open
    pub fn overlapping_opens(&self) -> usize {
        self.shared.inner.lock().overlapping_opens
    }

    /// Make every call at `point` fail until cleared with `None`
    pub fn fail_at(&self, point: Option<FailurePoint>) {
        self.shared.inner.lock().failure = point;
    }

    /// Delay every call of `step`
    pub fn set_latency(&self, step: Step, latency: Duration) {
        self.shared.inner.lock().latency.insert(step, latency);
    }

    /// Apply the same latency to every step
    pub fn set_uniform_latency(&self, latency: Duration) {
        for step in [Step::Open, Step::Connect, Step::StartSession, Step::Action] {
            self.set_latency(step, latency);
        }
    }

    /// Forget all sessions, as after a vehicle reboot
    pub fn rotate_epoch(&self) {
        let mut inner = self.shared.inner.lock();
        inner.generation += 1;
        inner.counters.clear();
    }

    fn record(&self, event: LinkEvent) {
        self.shared.inner.lock().events.push(event);
    }

    fn check_failure(&self, point: FailurePoint) -> Result<(), LinkError> {
        if self.shared.inner.lock().failure == Some(point) {
            return Err(LinkError::Io(format!("injected failure at {:?}", point)));
        }
        Ok(())
    }

    /// Sleep for the configured latency, but never past the deadline
    async fn delay(&self, step: Step, deadline: Instant) -> Result<(), LinkError> {
        let latency = self.shared.inner.lock().latency.get(&step).copied();
        if let Some(latency) = latency {
            let until = Instant::now() + latency;
            if until > deadline {
                tokio::time::sleep_until(deadline).await;
                return Err(LinkError::DeadlineExceeded);
            }
            tokio::time::sleep_until(until).await;
        }
        Ok(())
    }

    /// Vehicle half of the handshake: returns the key confirmation and the
    /// current epoch for this client key
    fn handshake(&self, client_public: &PublicKey) -> ([u8; 32], Vec<u8>) {
        let shared =
            p256::ecdh::diffie_hellman(self.shared.secret.to_nonzero_scalar(), client_public.as_affine());
        let generation = self.shared.inner.lock().generation;

        let confirmation: [u8; 32] = Sha256::digest(shared.raw_secret_bytes()).into();

        let mut hasher = Sha256::new();
        hasher.update(shared.raw_secret_bytes());
        hasher.update(generation.to_be_bytes());
        let epoch = hasher.finalize()[..16].to_vec();

        (confirmation, epoch)
    }

    /// Accept a resumed session if the counter moves forward
    fn accept_counter(&self, domain: VehicleDomain, counter: u32) -> bool {
        let mut inner = self.shared.inner.lock();
        let last = inner.counters.entry(domain).or_insert(0);
        if counter > *last {
            *last = counter;
            true
        } else {
            false
        }
    }

    /// Start a fresh session; returns the first counter to use
    fn fresh_counter(&self, domain: VehicleDomain) -> u32 {
        let mut inner = self.shared.inner.lock();
        let last = inner.counters.entry(domain).or_insert(0);
        *last += 1;
        *last
    }

    fn clock_time(&self) -> u32 {
        self.shared.booted.elapsed().as_secs() as u32
    }

    fn apply(&self, action: VehicleAction) -> Result<(), LinkError> {
        let mut inner = self.shared.inner.lock();
        let state = &mut inner.state;
        match action {
            VehicleAction::Wakeup => state.awake = true,
            VehicleAction::Lock => state.locked = true,
            VehicleAction::Unlock => state.locked = false,
            VehicleAction::ChargeStart => state.charging = true,
            VehicleAction::ChargeStop => state.charging = false,
            VehicleAction::SetChargingAmps { amps } => {
                if !CHARGING_AMPS_RANGE.contains(&amps) {
                    return Err(LinkError::Rejected(format!(
                        "charging current {}A out of range",
                        amps
                    )));
                }
                state.charging_amps = amps;
            }
            VehicleAction::ChangeChargeLimit { percent } => {
                if !CHARGE_LIMIT_RANGE.contains(&percent) {
                    return Err(LinkError::Rejected(format!(
                        "charge limit {}% out of range",
                        percent
                    )));
                }
                state.charge_limit_percent = percent;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ConnectorFactory for SimulatedVehicle {
    async fn open(&self, vin: &str, deadline: Instant) -> Result<Arc<dyn Connector>, LinkError> {
        self.delay(Step::Open, deadline).await?;
        self.check_failure(FailurePoint::Open)?;

        if let Some(expected) = &self.shared.vin {
            if expected != vin {
                return Err(LinkError::Io(format!("vehicle {} not in range", vin)));
            }
        }

        {
            let mut inner = self.shared.inner.lock();
            if inner.open_connections > 0 {
                inner.overlapping_opens += 1;
            }
            inner.open_connections += 1;
            inner.max_concurrent = inner.max_concurrent.max(inner.open_connections);
            inner.events.push(LinkEvent::Open(vin.to_string()));
        }
        debug!(vin, "Simulated link opened");

        Ok(Arc::new(SimulatedConnector {
            vehicle: self.clone(),
            closed: AtomicBool::new(false),
        }))
    }
}

impl SessionClientFactory for SimulatedVehicle {
    fn new_client(
        &self,
        connector: Arc<dyn Connector>,
        key: &KeyHandle,
        cache: &SessionCache,
    ) -> Result<Box<dyn SessionClient>, LinkError> {
        Ok(Box::new(SimulatedSessionClient {
            vehicle: self.clone(),
            _connector: connector,
            key: key.clone(),
            cached: cache.clone(),
            epoch: None,
            sessions: BTreeMap::new(),
        }))
    }
}

struct SimulatedConnector {
    vehicle: SimulatedVehicle,
    closed: AtomicBool,
}

#[async_trait]
impl Connector for SimulatedConnector {
    async fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut inner = self.vehicle.shared.inner.lock();
        inner.open_connections -= 1;
        inner.events.push(LinkEvent::Close);
    }
}

struct SimulatedSessionClient {
    vehicle: SimulatedVehicle,
    _connector: Arc<dyn Connector>,
    key: KeyHandle,
    cached: SessionCache,
    epoch: Option<Vec<u8>>,
    sessions: BTreeMap<VehicleDomain, SessionInfo>,
}

impl SimulatedSessionClient {
    async fn act(&mut self, action: VehicleAction, deadline: Instant) -> Result<(), LinkError> {
        self.vehicle.record(LinkEvent::Action(action));

        if !self.sessions.contains_key(&action.domain()) {
            return Err(LinkError::Rejected(format!(
                "no authenticated {} session",
                action.domain()
            )));
        }

        self.vehicle.delay(Step::Action, deadline).await?;
        self.vehicle.check_failure(FailurePoint::Action)?;
        self.vehicle.apply(action)
    }
}

#[async_trait]
impl SessionClient for SimulatedSessionClient {
    async fn connect(&mut self, deadline: Instant) -> Result<(), LinkError> {
        self.vehicle.delay(Step::Connect, deadline).await?;
        self.vehicle.check_failure(FailurePoint::Connect)?;

        let (confirmation, epoch) = self.vehicle.handshake(&self.key.public_key());

        let ours = self.key.diffie_hellman(&self.vehicle.public_key());
        let expected: [u8; 32] = Sha256::digest(ours.raw_secret_bytes()).into();
        if expected != confirmation {
            return Err(LinkError::Rejected("key confirmation mismatch".to_string()));
        }

        self.epoch = Some(epoch);
        self.vehicle.record(LinkEvent::Connect);
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.epoch = None;
        self.sessions.clear();
        self.vehicle.record(LinkEvent::Disconnect);
    }

    async fn start_session(&mut self, deadline: Instant) -> Result<(), LinkError> {
        self.vehicle.delay(Step::StartSession, deadline).await?;
        self.vehicle.check_failure(FailurePoint::StartSession)?;

        let epoch = self
            .epoch
            .clone()
            .ok_or_else(|| LinkError::Rejected("not connected".to_string()))?;

        let mut resumed = true;
        for domain in DOMAINS {
            let resumable = self
                .cached
                .get(domain)
                .filter(|info| info.epoch == epoch)
                .map(|info| info.counter.saturating_add(1))
                .filter(|next| self.vehicle.accept_counter(domain, *next));

            let counter = match resumable {
                Some(counter) => counter,
                None => {
                    resumed = false;
                    self.vehicle.fresh_counter(domain)
                }
            };

            self.sessions.insert(
                domain,
                SessionInfo {
                    epoch: epoch.clone(),
                    counter,
                    clock_time: self.vehicle.clock_time(),
                    updated_at: Utc::now(),
                },
            );
        }

        self.vehicle.record(LinkEvent::StartSession { resumed });
        Ok(())
    }

    fn update_cache(&self, cache: &mut SessionCache) {
        for (domain, info) in &self.sessions {
            cache.update(*domain, info.clone());
        }
    }

    async fn wakeup(&mut self, deadline: Instant) -> Result<(), LinkError> {
        self.act(VehicleAction::Wakeup, deadline).await
    }

    async fn lock(&mut self, deadline: Instant) -> Result<(), LinkError> {
        self.act(VehicleAction::Lock, deadline).await
    }

    async fn unlock(&mut self, deadline: Instant) -> Result<(), LinkError> {
        self.act(VehicleAction::Unlock, deadline).await
    }

    async fn charge_start(&mut self, deadline: Instant) -> Result<(), LinkError> {
        self.act(VehicleAction::ChargeStart, deadline).await
    }

    async fn charge_stop(&mut self, deadline: Instant) -> Result<(), LinkError> {
        self.act(VehicleAction::ChargeStop, deadline).await
    }

    async fn set_charging_amps(&mut self, deadline: Instant, amps: i32) -> Result<(), LinkError> {
        self.act(VehicleAction::SetChargingAmps { amps }, deadline)
            .await
    }

    async fn change_charge_limit(
        &mut self,
        deadline: Instant,
        percent: i32,
    ) -> Result<(), LinkError> {
        self.act(VehicleAction::ChangeChargeLimit { percent }, deadline)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::load_private_key;
    use crate::key::tests::{p256_secret, pkcs8_pem};

    fn key(fill: u8) -> KeyHandle {
        load_private_key(pkcs8_pem(&p256_secret(fill)).as_bytes()).unwrap()
    }

    fn far_deadline() -> Instant {
        Instant::now() + Duration::from_secs(30)
    }

    async fn connected_client(
        vehicle: &SimulatedVehicle,
        key: &KeyHandle,
        cache: &SessionCache,
    ) -> (Arc<dyn Connector>, Box<dyn SessionClient>) {
        let connector = vehicle.open("VIN", far_deadline()).await.unwrap();
        let mut client = vehicle.new_client(connector.clone(), key, cache).unwrap();
        client.connect(far_deadline()).await.unwrap();
        (connector, client)
    }

    #[tokio::test]
    async fn test_rejects_unknown_vin() {
        let vehicle = SimulatedVehicle::with_vin("5YJ3E1EA7KF000000");
        let err = vehicle
            .open("WRONGVIN", far_deadline())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, LinkError::Io(_)));
        assert_eq!(vehicle.open_connections(), 0);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let vehicle = SimulatedVehicle::new();
        let connector = vehicle.open("VIN", far_deadline()).await.unwrap();
        connector.close().await;
        connector.close().await;

        assert_eq!(vehicle.open_connections(), 0);
        assert_eq!(
            vehicle.events(),
            vec![LinkEvent::Open("VIN".to_string()), LinkEvent::Close]
        );
    }

    #[tokio::test]
    async fn test_epoch_differs_per_key() {
        let vehicle = SimulatedVehicle::new();
        let (_, epoch_a) = vehicle.handshake(&key(1).public_key());
        let (_, epoch_b) = vehicle.handshake(&key(2).public_key());
        assert_ne!(epoch_a, epoch_b);
    }

    #[tokio::test]
    async fn test_session_resumes_until_epoch_rotates() {
        let vehicle = SimulatedVehicle::new();
        let key = key(3);
        let mut cache = SessionCache::new();

        for _ in 0..2 {
            let (connector, mut client) = connected_client(&vehicle, &key, &cache).await;
            client.start_session(far_deadline()).await.unwrap();
            client.update_cache(&mut cache);
            client.disconnect().await;
            connector.close().await;
        }

        vehicle.rotate_epoch();
        let (_, mut client) = connected_client(&vehicle, &key, &cache).await;
        client.start_session(far_deadline()).await.unwrap();

        let starts: Vec<_> = vehicle
            .events()
            .into_iter()
            .filter(|e| matches!(e, LinkEvent::StartSession { .. }))
            .collect();
        assert_eq!(
            starts,
            vec![
                LinkEvent::StartSession { resumed: false },
                LinkEvent::StartSession { resumed: true },
                LinkEvent::StartSession { resumed: false },
            ]
        );
    }

    #[tokio::test]
    async fn test_stale_counter_falls_back_to_fresh_session() {
        let vehicle = SimulatedVehicle::new();
        let key = key(4);
        let mut cache = SessionCache::new();

        let (_, mut client) = connected_client(&vehicle, &key, &cache).await;
        client.start_session(far_deadline()).await.unwrap();
        client.update_cache(&mut cache);
        let stale = cache.clone();

        // a resumed session the proxy never recorded
        let (_, mut client) = connected_client(&vehicle, &key, &stale).await;
        client.start_session(far_deadline()).await.unwrap();

        let (_, mut client) = connected_client(&vehicle, &key, &stale).await;
        client.start_session(far_deadline()).await.unwrap();

        assert_eq!(
            vehicle.events().last(),
            Some(&LinkEvent::StartSession { resumed: false })
        );
    }

    #[tokio::test]
    async fn test_action_requires_session() {
        let vehicle = SimulatedVehicle::new();
        let (_, mut client) = connected_client(&vehicle, &key(5), &SessionCache::new()).await;

        let err = client.unlock(far_deadline()).await.unwrap_err();
        assert!(matches!(err, LinkError::Rejected(_)));
        assert!(vehicle.state().locked);
    }

    #[tokio::test]
    async fn test_charging_amps_range() {
        let vehicle = SimulatedVehicle::new();
        let (_, mut client) = connected_client(&vehicle, &key(6), &SessionCache::new()).await;
        client.start_session(far_deadline()).await.unwrap();

        client.set_charging_amps(far_deadline(), 16).await.unwrap();
        assert_eq!(vehicle.state().charging_amps, 16);

        let err = client.set_charging_amps(far_deadline(), -1).await.unwrap_err();
        assert!(matches!(err, LinkError::Rejected(_)));
        assert_eq!(vehicle.state().charging_amps, 16);
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_past_deadline_reports_deadline_exceeded() {
        let vehicle = SimulatedVehicle::new();
        vehicle.set_latency(Step::Open, Duration::from_secs(10));

        let deadline = Instant::now() + Duration::from_secs(1);
        let err = vehicle.open("VIN", deadline).await.err().unwrap();
        assert_eq!(err, LinkError::DeadlineExceeded);
    }
}
