//! Cached vehicle session parameters
//!
//! A successful session start leaves the vehicle and the proxy agreeing on a
//! per-domain epoch and counter. Keeping them lets the next connection resume
//! the session instead of negotiating a fresh one, as long as the vehicle
//! still recognizes the epoch.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// Vehicle subsystem that keeps its own authenticated session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VehicleDomain {
    /// Vehicle security controller (locks, wake)
    VehicleSecurity,
    /// Infotainment controller (charging)
    Infotainment,
}

impl std::fmt::Display for VehicleDomain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            VehicleDomain::VehicleSecurity => "vcsec",
            VehicleDomain::Infotainment => "infotainment",
        };
        write!(f, "{}", s)
    }
}

/// Negotiated parameters of one domain session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// Session epoch chosen by the vehicle
    pub epoch: Vec<u8>,
    /// Last counter value used in this epoch
    pub counter: u32,
    /// Vehicle clock at session start, seconds since epoch start
    pub clock_time: u32,
    /// When the proxy last stored these parameters
    pub updated_at: DateTime<Utc>,
}

/// Session parameters for the single configured vehicle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionCache {
    sessions: BTreeMap<VehicleDomain, SessionInfo>,
}

impl SessionCache {
    /// Empty cache, forcing a full handshake on first use
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, domain: VehicleDomain) -> Option<&SessionInfo> {
        self.sessions.get(&domain)
    }

    /// Store refreshed parameters for a domain
    pub fn update(&mut self, domain: VehicleDomain, info: SessionInfo) {
        self.sessions.insert(domain, info);
    }

    /// Forget a domain, e.g. after the vehicle rejected its epoch
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(counter: u32) -> SessionInfo {
        SessionInfo {
            epoch: vec![0xAB; 16],
            counter,
            clock_time: 42,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_update_replaces_domain_entry() {
        let mut cache = SessionCache::new();
        assert!(cache.is_empty());

        cache.update(VehicleDomain::VehicleSecurity, info(1));
        cache.update(VehicleDomain::VehicleSecurity, info(7));

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(VehicleDomain::VehicleSecurity).unwrap().counter, 7);
        assert!(cache.get(VehicleDomain::Infotainment).is_none());
    }

    #[test]
    fn test_clone_compares_equal_until_mutated() {
        let mut cache = SessionCache::new();
        cache.update(VehicleDomain::Infotainment, info(3));
        let before = cache.clone();
        assert_eq!(before, cache);

        cache.update(VehicleDomain::Infotainment, info(4));
        assert_ne!(before, cache);
    }
}
