//! Car actions relayed by the proxy

use tokio::time::Instant;

use crate::cache::VehicleDomain;
use crate::link::{LinkError, SessionClient};

/// One command sent to the vehicle.
///
/// Parameters are forwarded verbatim; range checks belong to the vehicle
/// protocol client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VehicleAction {
    Wakeup,
    Lock,
    Unlock,
    ChargeStart,
    ChargeStop,
    SetChargingAmps { amps: i32 },
    ChangeChargeLimit { percent: i32 },
}

impl VehicleAction {
    /// Action name used in logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            VehicleAction::Wakeup => "wakeup",
            VehicleAction::Lock => "lock",
            VehicleAction::Unlock => "unlock",
            VehicleAction::ChargeStart => "charge_start",
            VehicleAction::ChargeStop => "charge_stop",
            VehicleAction::SetChargingAmps { .. } => "set_charging_amps",
            VehicleAction::ChangeChargeLimit { .. } => "change_charge_limit",
        }
    }

    /// Vehicle domain that executes the action
    pub fn domain(&self) -> VehicleDomain {
        match self {
            VehicleAction::Wakeup | VehicleAction::Lock | VehicleAction::Unlock => {
                VehicleDomain::VehicleSecurity
            }
            VehicleAction::ChargeStart
            | VehicleAction::ChargeStop
            | VehicleAction::SetChargingAmps { .. }
            | VehicleAction::ChangeChargeLimit { .. } => VehicleDomain::Infotainment,
        }
    }

    /// Invoke the matching session client method
    pub(crate) async fn execute(
        self,
        client: &mut dyn SessionClient,
        deadline: Instant,
    ) -> Result<(), LinkError> {
        match self {
            VehicleAction::Wakeup => client.wakeup(deadline).await,
            VehicleAction::Lock => client.lock(deadline).await,
            VehicleAction::Unlock => client.unlock(deadline).await,
            VehicleAction::ChargeStart => client.charge_start(deadline).await,
            VehicleAction::ChargeStop => client.charge_stop(deadline).await,
            VehicleAction::SetChargingAmps { amps } => {
                client.set_charging_amps(deadline, amps).await
            }
            VehicleAction::ChangeChargeLimit { percent } => {
                client.change_charge_limit(deadline, percent).await
            }
        }
    }
}

impl std::fmt::Display for VehicleAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VehicleAction::SetChargingAmps { amps } => write!(f, "{}({}A)", self.name(), amps),
            VehicleAction::ChangeChargeLimit { percent } => {
                write!(f, "{}({}%)", self.name(), percent)
            }
            _ => write!(f, "{}", self.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_parameters() {
        assert_eq!(VehicleAction::Unlock.to_string(), "unlock");
        assert_eq!(
            VehicleAction::ChangeChargeLimit { percent: 80 }.to_string(),
            "change_charge_limit(80%)"
        );
        assert_eq!(
            VehicleAction::SetChargingAmps { amps: 16 }.to_string(),
            "set_charging_amps(16A)"
        );
    }

    #[test]
    fn test_domains() {
        assert_eq!(VehicleAction::Lock.domain(), VehicleDomain::VehicleSecurity);
        assert_eq!(
            VehicleAction::SetChargingAmps { amps: 8 }.domain(),
            VehicleDomain::Infotainment
        );
    }
}
